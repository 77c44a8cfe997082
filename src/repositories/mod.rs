use async_trait::async_trait;

use crate::errors::Result;
use crate::models::link::{AccessLevel, Link};
use crate::models::link_stats::{ClickInfo, LinkStats};

pub mod memory;
pub mod mongo;

/// Persistence contract for links. Two conforming implementations exist:
/// the MongoDB-backed production repository and a map-backed in-memory one
/// used by tests; both must pass the same contract test suite.
///
/// All methods are safe for concurrent invocation. Callers cancel a pending
/// operation by dropping its future; background writes spawned internally
/// (expiry-flag flush) deliberately outlive the triggering call.
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Persists a new link, assigning `created_at`/`updated_at`. Fails with
    /// `AlreadyExists` when the short code is taken.
    async fn create(&self, link: &Link) -> Result<Link>;

    /// Fetches a link by short code. When the link is observed past its
    /// expiry with the sticky flag still unset, the persisted flag is
    /// flushed to true as a best-effort detached write; the returned value
    /// already reflects the flag.
    async fn get_by_short(&self, short: &str) -> Result<Link>;

    /// Returns every link. No pagination; link volumes are small.
    async fn get_all(&self) -> Result<Vec<Link>>;

    async fn get_by_access_level(&self, level: AccessLevel) -> Result<Vec<Link>>;

    async fn get_by_user(&self, created_by: &str) -> Result<Vec<Link>>;

    /// Full-record overwrite, last-writer-wins. Refreshes `updated_at`.
    async fn update(&self, link: &Link) -> Result<Link>;

    /// Removes the link and its derived stats.
    async fn delete(&self, short: &str) -> Result<()>;

    /// Best-effort read-modify-write counter bump; concurrent increments
    /// may lose updates and callers must not assume exactness. Also records
    /// the click's dimension buckets in the derived stats.
    async fn increment_click_count(&self, short: &str, click: ClickInfo) -> Result<()>;

    /// Loads the link and delegates to the access evaluator.
    async fn check_access(&self, short: &str, identity: &str) -> Result<bool> {
        let link = self.get_by_short(short).await?;
        Ok(link.allows_access(identity))
    }

    /// Links currently past their expiry or already flagged expired.
    async fn get_expired_links(&self) -> Result<Vec<Link>>;

    /// Links filtered by the persisted sticky flag.
    async fn get_links_by_expiry_status(&self, is_expired: bool) -> Result<Vec<Link>>;

    /// Loads the stats record for a link, lazily creating a zeroed one
    /// (seeded with the link's click count) on first access.
    async fn get_link_stats(&self, short: &str) -> Result<LinkStats>;
}
