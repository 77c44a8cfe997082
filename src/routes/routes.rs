use actix_web::web;

use crate::handlers::analytics_handlers::{get_link_stats, get_top_links};
use crate::handlers::health_handlers::health_check;
use crate::handlers::link_handlers::{
    create_link, delete_expired_links, delete_link, get_link, get_links, redirect_link,
    update_link,
};

/// Configure the routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/links", web::post().to(create_link))
            .route("/links", web::get().to(get_links))
            // Must come before the {short} routes.
            .route("/links/expired", web::delete().to(delete_expired_links))
            .route("/links/{short}", web::get().to(get_link))
            .route("/links/{short}", web::put().to(update_link))
            .route("/links/{short}", web::delete().to(delete_link))
            .route("/analytics/links/{short}", web::get().to(get_link_stats))
            .route("/analytics/top", web::get().to(get_top_links)),
    );
    cfg.route("/health", web::get().to(health_check));
    // Redirect route at the root level, registered last.
    cfg.route("/{short}", web::get().to(redirect_link));
}
