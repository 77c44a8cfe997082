use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde_json::json;

use crate::errors::{AppError, Result};
use crate::middlewares::identity::identity_from_request;
use crate::state::app_state::AppState;
use crate::structs::link_request::{LinkView, TopLinksParams};

const DEFAULT_TOP_LIMIT: usize = 10;

/// Per-link usage stats, visible to anyone the access evaluator admits.
pub async fn get_link_stats(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let short = path.into_inner();
    let identity = identity_from_request(&req);

    let link = state.repo.get_by_short(&short).await?;
    if !link.allows_access(&identity) {
        return Err(AppError::forbidden("Access denied"));
    }

    let stats = state.repo.get_link_stats(&short).await?;

    let now = Utc::now();
    let age_days = (now - link.created_at).num_seconds() as f64 / 86_400.0;

    let mut payload = json!({
        "link_id": link.id,
        "short": link.short,
        "url": link.url,
        "click_count": link.click_count,
        "created_at": link.created_at,
        "age_days": age_days,
        "access_level": link.access_level.as_str(),
        "is_expired": link.is_expired || link.is_past_expiry(now),
        "stats": stats,
    });
    if let Some(expires_at) = link.expires_at {
        payload["expires_at"] = json!(expires_at);
    }
    if age_days > 0.0 {
        payload["avg_clicks_per_day"] = json!(link.click_count as f64 / age_days);
    }

    Ok(HttpResponse::Ok().json(payload))
}

/// Most-clicked links visible to the requesting identity.
pub async fn get_top_links(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TopLinksParams>,
) -> Result<HttpResponse> {
    let identity = identity_from_request(&req);
    let limit = query.limit.filter(|n| *n > 0).unwrap_or(DEFAULT_TOP_LIMIT);

    let mut links: Vec<_> = state
        .repo
        .get_all()
        .await?
        .into_iter()
        .filter(|l| l.allows_access(&identity))
        .collect();

    links.sort_by(|a, b| b.click_count.cmp(&a.click_count));
    links.truncate(limit);

    let views: Vec<LinkView> = links.into_iter().map(LinkView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}
