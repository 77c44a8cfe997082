use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who may resolve or read a link.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    /// Anyone, including anonymous visitors.
    #[default]
    Public,
    /// Only the creator.
    Private,
    /// The creator plus an explicit allow-list.
    Restricted,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "Public",
            AccessLevel::Private => "Private",
            AccessLevel::Restricted => "Restricted",
        }
    }

    pub fn parse(s: &str) -> Option<AccessLevel> {
        match s {
            "Public" => Some(AccessLevel::Public),
            "Private" => Some(AccessLevel::Private),
            "Restricted" => Some(AccessLevel::Restricted),
            _ => None,
        }
    }
}

/// A shortened link. One document per short code; the short code is the
/// natural primary key and is immutable after creation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Link {
    pub id: String,
    pub short: String,
    pub url: String,
    pub created_by: String,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Sticky expiry cache: flipped to true the first time a read observes
    /// the link past its expiry, and only reset by an explicit expiry clear.
    #[serde(default)]
    pub is_expired: bool,
}

impl Link {
    pub fn new(short: &str, url: &str, created_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: short.to_string(),
            short: short.to_string(),
            url: url.to_string(),
            created_by: created_by.to_string(),
            access_level: AccessLevel::Public,
            allowed_users: Vec::new(),
            click_count: 0,
            created_at: now,
            updated_at: now,
            expires_at: None,
            is_expired: false,
        }
    }

    pub fn set_expiry(&mut self, expires: DateTime<Utc>) {
        self.expires_at = Some(expires);
        self.updated_at = Utc::now();
    }

    /// Removes the expiration and resets the sticky expired flag. This is
    /// the only path that flips `is_expired` back to false.
    pub fn clear_expiry(&mut self) {
        self.expires_at = None;
        self.is_expired = false;
        self.updated_at = Utc::now();
    }

    /// Access evaluator. Public links are open to everyone; private links
    /// to the creator; restricted links to the creator and the allow-list
    /// (exact string match, no case folding). Pure, no side effects.
    pub fn allows_access(&self, identity: &str) -> bool {
        match self.access_level {
            AccessLevel::Public => true,
            AccessLevel::Private => identity == self.created_by,
            AccessLevel::Restricted => {
                identity == self.created_by || self.allowed_users.iter().any(|u| u == identity)
            }
        }
    }

    /// A link with no expiry never expires.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now > expiry,
            None => false,
        }
    }

    /// Expiry badge for UI consumers: whether the link deserves a warning
    /// and the reason ("expired", "expiring_today", "expiring_soon").
    pub fn expiry_status(&self, now: DateTime<Utc>) -> (bool, &'static str) {
        let Some(expires_at) = self.expires_at else {
            return (false, "");
        };

        if self.is_expired {
            return (true, "expired");
        }

        let days_until_expiry = (expires_at - now).num_seconds() as f64 / 86_400.0;
        if days_until_expiry < 0.0 {
            (true, "expired")
        } else if days_until_expiry < 1.0 {
            (true, "expiring_today")
        } else if days_until_expiry < 7.0 {
            (true, "expiring_soon")
        } else {
            (false, "")
        }
    }
}

/// Short codes are path segments: letters, digits and hyphens only.
pub fn is_valid_short_code(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
