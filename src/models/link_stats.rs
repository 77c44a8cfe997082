use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Click dimensions extracted from the redirect request's headers. Absent
/// dimensions leave their buckets untouched.
#[derive(Debug, Clone, Default)]
pub struct ClickInfo {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub referrer: Option<String>,
    pub device_type: Option<String>,
}

impl ClickInfo {
    /// Coarse substring classification of the User-Agent; bucket-level
    /// stats do not warrant a full UA parser.
    pub fn from_headers(user_agent: Option<&str>, referrer: Option<&str>) -> Self {
        let ua = user_agent.filter(|s| !s.is_empty());
        Self {
            browser: ua.map(|ua| browser_from_ua(ua).to_string()),
            os: ua.map(|ua| os_from_ua(ua).to_string()),
            referrer: referrer.filter(|s| !s.is_empty()).map(String::from),
            device_type: ua.map(|ua| device_from_ua(ua).to_string()),
        }
    }
}

fn browser_from_ua(ua: &str) -> &'static str {
    // Order matters: Edge and Opera UAs also contain "Chrome", and Chrome
    // UAs also contain "Safari".
    if ua.contains("Edg") {
        "Edge"
    } else if ua.contains("OPR") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("Safari") {
        "Safari"
    } else {
        "Other"
    }
}

fn os_from_ua(ua: &str) -> &'static str {
    if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iOS") {
        "iOS"
    } else if ua.contains("Mac OS") || ua.contains("Macintosh") {
        "macOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        "Other"
    }
}

fn device_from_ua(ua: &str) -> &'static str {
    if ua.contains("Mobile") || ua.contains("Android") || ua.contains("iPhone") {
        "Mobile"
    } else if ua.contains("iPad") || ua.contains("Tablet") {
        "Tablet"
    } else {
        "Desktop"
    }
}

/// Derived per-link statistics, stored separately from the link itself and
/// lazily created by the repository on first access.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LinkStats {
    pub short: String,
    pub total_clicks: i64,
    pub unique_clicks: i64,
    #[serde(default)]
    pub referring_sites: HashMap<String, i64>,
    #[serde(default)]
    pub browsers: HashMap<String, i64>,
    #[serde(default)]
    pub operating_systems: HashMap<String, i64>,
    #[serde(default)]
    pub countries: HashMap<String, i64>,
    #[serde(default)]
    pub clicks_by_date: HashMap<String, i64>,
    #[serde(default)]
    pub device_types: HashMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

impl LinkStats {
    pub fn new(short: &str) -> Self {
        Self {
            short: short.to_string(),
            total_clicks: 0,
            unique_clicks: 0,
            referring_sites: HashMap::new(),
            browsers: HashMap::new(),
            operating_systems: HashMap::new(),
            countries: HashMap::new(),
            clicks_by_date: HashMap::new(),
            device_types: HashMap::new(),
            last_clicked_at: None,
            created_at: Utc::now(),
            status: "active".to_string(),
        }
    }

    /// Records one click with its dimension buckets.
    pub fn record_click(&mut self, click: &ClickInfo) {
        self.total_clicks += 1;
        self.unique_clicks += 1;

        for (value, bucket) in [
            (&click.browser, &mut self.browsers),
            (&click.os, &mut self.operating_systems),
            (&click.referrer, &mut self.referring_sites),
            (&click.device_type, &mut self.device_types),
        ] {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                *bucket.entry(v.to_string()).or_insert(0) += 1;
            }
        }

        let now = Utc::now();
        let today = now.format("%Y-%m-%d").to_string();
        *self.clicks_by_date.entry(today).or_insert(0) += 1;
        self.last_clicked_at = Some(now);
    }
}
