use std::env;
use std::str::FromStr;

/// Application configuration, built once at startup from environment
/// variables and injected via `web::Data` into the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// When disabled, every request resolves to the "anonymous" identity
    /// (or the `X-User-ID` header) and ownership checks are bypassed.
    pub enabled: bool,
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub origin: String,
    pub max_age: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: get_env("HOST", "127.0.0.1"),
                port: get_env_parse("PORT", 8080),
            },
            auth: AuthConfig {
                enabled: get_env_parse("AUTH_ENABLED", false),
                jwt_secret: get_env("JWT_SECRET", ""),
            },
            cors: CorsConfig {
                origin: get_env("CORS_ORIGIN", "http://localhost:3001"),
                max_age: get_env_parse("CORS_MAX_AGE", 3600),
            },
            database: DatabaseConfig {
                uri: get_env("MONGODB_URI", "mongodb://localhost:27017"),
                name: get_env("MONGODB_DATABASE", "golink"),
            },
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
