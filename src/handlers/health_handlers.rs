use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;

use crate::state::app_state::AppState;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    match state.repo.get_all().await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
        })),
        Err(e) => {
            log::error!("health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "error": "Database connection failed",
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
    }
}
