use actix_web::{HttpRequest, HttpResponse, http, web};
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::middlewares::identity::identity_from_request;
use crate::models::link::{AccessLevel, Link, is_valid_short_code};
use crate::models::link_stats::ClickInfo;
use crate::state::app_state::AppState;
use crate::structs::link_request::{
    CreateLinkRequest, ExpiredSweepResponse, LinkQueryParams, LinkView, UpdateLinkRequest,
};
use crate::utils::detached::spawn_detached;

/// Ownership policy for mutations: enforced whenever auth is enabled; with
/// auth globally disabled the deployment is single-tenant and any identity
/// may mutate.
fn ensure_can_modify(link: &Link, identity: &str, auth_enabled: bool) -> Result<()> {
    if auth_enabled && link.created_by != identity {
        return Err(AppError::forbidden(
            "Only the creator can modify this link",
        ));
    }
    Ok(())
}

fn header_str<'a>(req: &'a HttpRequest, name: http::header::HeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn parse_future_expiry(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| {
            AppError::bad_request(
                "Invalid expiry date format. Use RFC3339 format (e.g. 2025-12-31T23:59:59Z)",
            )
        })?
        .with_timezone(&Utc);

    if parsed <= Utc::now() {
        return Err(AppError::bad_request("Expiry date must be in the future"));
    }
    Ok(parsed)
}

/// Create a shortened link
pub async fn create_link(
    state: web::Data<AppState>,
    req: HttpRequest,
    web::Json(body): web::Json<CreateLinkRequest>,
) -> Result<HttpResponse> {
    let identity = identity_from_request(&req);

    if body.short.is_empty() {
        return Err(AppError::bad_request("Short code is required"));
    }
    if !is_valid_short_code(&body.short) {
        return Err(AppError::bad_request(
            "Short code must contain only letters, numbers, and hyphens",
        ));
    }
    if body.url.is_empty() {
        return Err(AppError::bad_request("URL is required"));
    }
    if body.validate().is_err() {
        return Err(AppError::bad_request("Invalid URL format"));
    }

    let access_level = match body.access_level.as_deref() {
        Some(raw) => {
            AccessLevel::parse(raw).ok_or_else(|| AppError::bad_request("Invalid access level"))?
        }
        None => AccessLevel::default(),
    };

    let mut link = Link::new(&body.short, &body.url, &identity);
    link.access_level = access_level;
    if access_level == AccessLevel::Restricted {
        link.allowed_users = body.allowed_users.unwrap_or_default();
    }
    if let Some(raw) = body.expires_at.as_deref().filter(|s| !s.is_empty()) {
        link.set_expiry(parse_future_expiry(raw)?);
    }

    let created = state.repo.create(&link).await?;
    log::info!(
        "link created: short={} created_by={} access_level={}",
        created.short,
        created.created_by,
        created.access_level.as_str()
    );

    Ok(HttpResponse::Created().json(LinkView::from(created)))
}

/// List links, optionally filtered by access level or creator, reduced to
/// what the requesting identity may see.
pub async fn get_links(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LinkQueryParams>,
) -> Result<HttpResponse> {
    let identity = identity_from_request(&req);

    let links = match (&query.access_level, &query.created_by) {
        (Some(raw), owner) => {
            let level = AccessLevel::parse(raw)
                .ok_or_else(|| AppError::bad_request("Invalid access level"))?;
            let mut links = state.repo.get_by_access_level(level).await?;
            // Both filters given: intersect.
            if let Some(owner) = owner {
                links.retain(|l| &l.created_by == owner);
            }
            links
        }
        (None, Some(owner)) => state.repo.get_by_user(owner).await?,
        (None, None) => state.repo.get_all().await?,
    };

    // Opportunistic sticky-flag refresh for links observed past expiry;
    // re-reading each one triggers the repository's detached flush.
    let now = Utc::now();
    let stale: Vec<String> = links
        .iter()
        .filter(|l| l.is_past_expiry(now) && !l.is_expired)
        .map(|l| l.short.clone())
        .collect();
    if !stale.is_empty() {
        let repo = state.repo.clone();
        spawn_detached("list expiry flag refresh", async move {
            for short in stale {
                let _ = repo.get_by_short(&short).await;
            }
            Ok(())
        });
    }

    let visible: Vec<LinkView> = links
        .into_iter()
        .filter(|l| l.allows_access(&identity))
        .map(LinkView::from)
        .collect();

    Ok(HttpResponse::Ok().json(visible))
}

/// Fetch a single link
pub async fn get_link(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let short = path.into_inner();
    let identity = identity_from_request(&req);

    let link = state.repo.get_by_short(&short).await?;
    if !link.allows_access(&identity) {
        log::warn!(
            "access denied: short={} identity={} access_level={}",
            short,
            identity,
            link.access_level.as_str()
        );
        return Err(AppError::forbidden("Access denied"));
    }

    Ok(HttpResponse::Ok().json(LinkView::from(link)))
}

/// Update a link's target, access level, allow-list or expiry
pub async fn update_link(
    state: web::Data<AppState>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<String>,
    web::Json(body): web::Json<UpdateLinkRequest>,
) -> Result<HttpResponse> {
    let short = path.into_inner();
    let identity = identity_from_request(&req);

    let mut link = state.repo.get_by_short(&short).await?;
    ensure_can_modify(&link, &identity, config.auth.enabled)?;

    if body
        .url
        .as_deref()
        .is_some_and(|u| !u.is_empty() && body.validate().is_err())
    {
        return Err(AppError::bad_request("Invalid URL format"));
    }

    if let Some(url) = body.url.as_deref().filter(|u| !u.is_empty()) {
        link.url = url.to_string();
    }

    if let Some(raw) = body.access_level.as_deref() {
        link.access_level =
            AccessLevel::parse(raw).ok_or_else(|| AppError::bad_request("Invalid access level"))?;
    }

    // Allow-list is only meaningful for restricted links.
    if link.access_level == AccessLevel::Restricted {
        if let Some(users) = body.allowed_users {
            link.allowed_users = users;
        }
    } else {
        link.allowed_users.clear();
    }

    match body.expires_at.as_deref() {
        // Explicit empty string clears the expiry and resets the sticky flag.
        Some("") => link.clear_expiry(),
        Some(raw) => link.set_expiry(parse_future_expiry(raw)?),
        None => {}
    }

    let updated = state.repo.update(&link).await?;
    log::info!(
        "link updated: short={} identity={} access_level={}",
        updated.short,
        identity,
        updated.access_level.as_str()
    );

    Ok(HttpResponse::Ok().json(LinkView::from(updated)))
}

/// Delete a link
pub async fn delete_link(
    state: web::Data<AppState>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let short = path.into_inner();
    let identity = identity_from_request(&req);

    let link = state.repo.get_by_short(&short).await?;
    ensure_can_modify(&link, &identity, config.auth.enabled)?;

    state.repo.delete(&short).await?;
    log::info!("link deleted: short={} identity={}", short, identity);

    Ok(HttpResponse::NoContent().finish())
}

/// Bulk-delete expired links the caller is allowed to remove
pub async fn delete_expired_links(
    state: web::Data<AppState>,
    config: web::Data<Config>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let identity = identity_from_request(&req);

    let expired = state.repo.get_expired_links().await?;
    let mut deleted_count = 0;
    for link in expired {
        if ensure_can_modify(&link, &identity, config.auth.enabled).is_err() {
            continue;
        }
        match state.repo.delete(&link.short).await {
            Ok(()) => {
                deleted_count += 1;
                log::info!(
                    "deleted expired link: short={} identity={}",
                    link.short,
                    identity
                );
            }
            Err(e) => log::warn!("failed to delete expired link '{}': {}", link.short, e),
        }
    }

    Ok(HttpResponse::Ok().json(ExpiredSweepResponse {
        deleted_count,
        message: "Expired links deleted successfully".to_string(),
    }))
}

/// Redirect to the link target
pub async fn redirect_link(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let short = path.into_inner();
    let identity = identity_from_request(&req);

    let link = state.repo.get_by_short(&short).await?;

    if link.is_past_expiry(Utc::now()) {
        // get_by_short already scheduled the sticky-flag flush.
        log::info!("expired link access attempt: short={}", short);
        return Ok(HttpResponse::Gone().json(serde_json::json!({
            "error": {
                "code": "link_expired",
                "message": "This link has expired",
            }
        })));
    }

    if !link.allows_access(&identity) {
        log::warn!(
            "access denied for redirect: short={} identity={}",
            short,
            identity
        );
        return Err(AppError::forbidden("Access denied"));
    }

    // Count the click without delaying the redirect.
    let click = ClickInfo::from_headers(
        header_str(&req, http::header::USER_AGENT),
        header_str(&req, http::header::REFERER),
    );
    let repo = state.repo.clone();
    let code = short.clone();
    spawn_detached("click count increment", async move {
        repo.increment_click_count(&code, click).await
    });

    Ok(HttpResponse::Found()
        .append_header((http::header::LOCATION, link.url.clone()))
        .finish())
}
