use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::link::Link;

#[derive(Deserialize, Serialize, Validate)]
pub struct CreateLinkRequest {
    pub short: String,
    #[serde(default)]
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,
    pub access_level: Option<String>,
    pub allowed_users: Option<Vec<String>>,
    /// RFC3339 timestamp; must be in the future.
    pub expires_at: Option<String>,
}

#[derive(Deserialize, Serialize, Validate, Default)]
pub struct UpdateLinkRequest {
    #[validate(url(message = "Invalid URL format"))]
    pub url: Option<String>,
    pub access_level: Option<String>,
    pub allowed_users: Option<Vec<String>>,
    /// RFC3339 timestamp for a new expiry; an explicit empty string clears
    /// the expiry and resets the sticky expired flag.
    pub expires_at: Option<String>,
}

#[derive(Deserialize)]
pub struct LinkQueryParams {
    pub access_level: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Deserialize)]
pub struct TopLinksParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ExpiredSweepResponse {
    pub deleted_count: usize,
    pub message: String,
}

/// Link as served to clients: the persisted record plus the computed
/// expiry badge.
#[derive(Serialize)]
pub struct LinkView {
    #[serde(flatten)]
    pub link: Link,
    pub expiring: bool,
    pub expiry_reason: &'static str,
}

impl From<Link> for LinkView {
    fn from(link: Link) -> Self {
        let (expiring, expiry_reason) = link.expiry_status(Utc::now());
        Self {
            link,
            expiring,
            expiry_reason,
        }
    }
}
