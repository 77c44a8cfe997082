use std::future::{Ready, ready};

use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header,
};
use futures_util::future::LocalBoxFuture;

use crate::config::AuthConfig;
use crate::errors::AppError;
use crate::utils::jwt::validate_token;

pub const ANONYMOUS: &str = "anonymous";

/// Requesting identity resolved for the current request, stored in request
/// extensions. The core never authenticates; it only consumes this string.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

/// Reads the identity a middleware stored for this request.
pub fn identity_from_request(req: &HttpRequest) -> String {
    req.extensions()
        .get::<Identity>()
        .map(|i| i.0.clone())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Resolves a requesting identity for every request and stores it in
/// request extensions.
///
/// With auth enabled, `/api/*` requires a valid Bearer JWT whose `sub`
/// becomes the identity; redirect and health paths fall back to the
/// `X-User-ID` header or "anonymous". With auth disabled, the fallback
/// applies everywhere.
pub struct IdentityExtractor {
    auth: AuthConfig,
}

impl IdentityExtractor {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityExtractor
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = IdentityExtractorMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityExtractorMiddleware {
            service,
            auth: self.auth.clone(),
        }))
    }
}

pub struct IdentityExtractorMiddleware<S> {
    service: S,
    auth: AuthConfig,
}

impl<S, B> Service<ServiceRequest> for IdentityExtractorMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let requires_auth = self.auth.enabled && req.path().starts_with("/api");

        let identity = if self.auth.enabled {
            match bearer_identity(&req, &self.auth) {
                Ok(Some(sub)) => sub,
                Ok(None) => {
                    if requires_auth {
                        return Box::pin(async move {
                            Err(AppError::unauthorized("Missing bearer token").into())
                        });
                    }
                    fallback_identity(&req)
                }
                Err(_) => {
                    if requires_auth {
                        return Box::pin(async move {
                            Err(AppError::unauthorized("Invalid bearer token").into())
                        });
                    }
                    fallback_identity(&req)
                }
            }
        } else {
            fallback_identity(&req)
        };

        req.extensions_mut().insert(Identity(identity));
        Box::pin(self.service.call(req))
    }
}

/// Extracts the identity from a Bearer JWT. `Ok(None)` means no token was
/// supplied; `Err` means one was supplied but did not validate.
fn bearer_identity(req: &ServiceRequest, auth: &AuthConfig) -> Result<Option<String>, ()> {
    let Some(header_value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let Ok(value) = header_value.to_str() else {
        return Err(());
    };

    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(());
    };

    match validate_token(token, &auth.jwt_secret) {
        Ok(claims) => Ok(Some(claims.sub)),
        Err(_) => Err(()),
    }
}

/// Identity used when no validated token applies: the `X-User-ID` header
/// kept for backward compatibility, or "anonymous".
fn fallback_identity(req: &ServiceRequest) -> String {
    req.headers()
        .get("X-User-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| ANONYMOUS.to_string())
}
