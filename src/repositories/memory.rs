use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::errors::{AppError, Result};
use crate::models::link::{AccessLevel, Link};
use crate::models::link_stats::{ClickInfo, LinkStats};
use crate::repositories::LinkRepository;
use crate::utils::detached::spawn_detached;

/// Map-backed repository used by tests. Not a mock of the Mongo
/// implementation's internals: a second conforming implementation of the
/// same contract. Readers proceed concurrently; writers are exclusive.
#[derive(Default)]
pub struct MemoryLinkRepository {
    links: Arc<RwLock<HashMap<String, Link>>>,
    stats: Arc<RwLock<HashMap<String, LinkStats>>>,
}

impl MemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_links(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Link>> {
        self.links.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_links(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Link>> {
        self.links.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LinkRepository for MemoryLinkRepository {
    async fn create(&self, link: &Link) -> Result<Link> {
        let mut links = self.write_links();
        if links.contains_key(&link.short) {
            return Err(AppError::already_exists(format!(
                "Link '{}' already exists",
                link.short
            )));
        }

        let now = Utc::now();
        let mut stored = link.clone();
        stored.created_at = now;
        stored.updated_at = now;
        links.insert(stored.short.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_by_short(&self, short: &str) -> Result<Link> {
        let mut link = {
            let links = self.read_links();
            links
                .get(short)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("Link '{}' not found", short)))?
        };

        // Sticky-expiry flush: flip the persisted flag in the background so
        // the read itself never fails or blocks on the write.
        if link.is_past_expiry(Utc::now()) && !link.is_expired {
            link.is_expired = true;
            let map = Arc::clone(&self.links);
            let short = short.to_string();
            spawn_detached("memory expiry flag flush", async move {
                let mut links = map.write().unwrap_or_else(|e| e.into_inner());
                if let Some(stored) = links.get_mut(&short) {
                    // An expiry clear may have raced in since the read that
                    // scheduled this flush; a cleared link must stay cleared.
                    if stored.is_past_expiry(Utc::now()) {
                        stored.is_expired = true;
                    }
                }
                Ok(())
            });
        }

        Ok(link)
    }

    async fn get_all(&self) -> Result<Vec<Link>> {
        Ok(self.read_links().values().cloned().collect())
    }

    async fn get_by_access_level(&self, level: AccessLevel) -> Result<Vec<Link>> {
        Ok(self
            .read_links()
            .values()
            .filter(|l| l.access_level == level)
            .cloned()
            .collect())
    }

    async fn get_by_user(&self, created_by: &str) -> Result<Vec<Link>> {
        Ok(self
            .read_links()
            .values()
            .filter(|l| l.created_by == created_by)
            .cloned()
            .collect())
    }

    async fn update(&self, link: &Link) -> Result<Link> {
        let mut links = self.write_links();
        if !links.contains_key(&link.short) {
            return Err(AppError::not_found(format!(
                "Link '{}' not found",
                link.short
            )));
        }

        let mut stored = link.clone();
        stored.updated_at = Utc::now();
        links.insert(stored.short.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, short: &str) -> Result<()> {
        let mut links = self.write_links();
        if links.remove(short).is_none() {
            return Err(AppError::not_found(format!("Link '{}' not found", short)));
        }
        drop(links);

        self.stats
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(short);
        Ok(())
    }

    async fn increment_click_count(&self, short: &str, click: ClickInfo) -> Result<()> {
        {
            let mut links = self.write_links();
            let link = links
                .get_mut(short)
                .ok_or_else(|| AppError::not_found(format!("Link '{}' not found", short)))?;
            link.click_count += 1;
            link.updated_at = Utc::now();
        }

        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        stats
            .entry(short.to_string())
            .or_insert_with(|| LinkStats::new(short))
            .record_click(&click);
        Ok(())
    }

    async fn get_expired_links(&self) -> Result<Vec<Link>> {
        let now = Utc::now();
        Ok(self
            .read_links()
            .values()
            .filter(|l| l.is_expired || l.is_past_expiry(now))
            .cloned()
            .collect())
    }

    async fn get_links_by_expiry_status(&self, is_expired: bool) -> Result<Vec<Link>> {
        Ok(self
            .read_links()
            .values()
            .filter(|l| l.is_expired == is_expired)
            .cloned()
            .collect())
    }

    async fn get_link_stats(&self, short: &str) -> Result<LinkStats> {
        let click_count = {
            let links = self.read_links();
            links
                .get(short)
                .map(|l| l.click_count)
                .ok_or_else(|| AppError::not_found(format!("Link '{}' not found", short)))?
        };

        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        let entry = stats.entry(short.to_string()).or_insert_with(|| {
            let mut fresh = LinkStats::new(short);
            fresh.total_clicks = click_count;
            fresh
        });
        Ok(entry.clone())
    }
}
