use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http, middleware::Logger, web};
use dotenv::dotenv;
use env_logger::Env;

use golink::config::Config;
use golink::db::mongodb::get_database;
use golink::middlewares::identity::IdentityExtractor;
use golink::repositories::LinkRepository;
use golink::repositories::mongo::MongoLinkRepository;
use golink::routes::init_routes;
use golink::state::app_state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();

    // Initialize the database connection
    let db = match get_database(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error connecting to the database: {}", e);
            std::process::exit(1);
        }
    };

    let repo: Arc<dyn LinkRepository> = Arc::new(MongoLinkRepository::new(&db));
    let app_state = web::Data::new(AppState { repo });
    let config = web::Data::new(config);

    let bind_addr = (config.server.host.clone(), config.server.port);
    log::info!(
        "starting golink server on {}:{} (auth enabled: {})",
        bind_addr.0,
        bind_addr.1,
        config.auth.enabled
    );

    // Start the Actix Web server
    HttpServer::new(move || {
        let logger = Logger::new("%a \"%r\" %s %b \"%{Referer}i\" \"%{User-Agent}i\" %D ms");
        let cors = Cors::default()
            .allowed_origin(&config.cors.origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
            .allowed_header(http::header::CONTENT_TYPE)
            .max_age(config.cors.max_age);
        App::new()
            .wrap(logger)
            .wrap(cors)
            .wrap(IdentityExtractor::new(config.auth.clone()))
            .app_data(app_state.clone())
            .app_data(config.clone())
            .configure(init_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
