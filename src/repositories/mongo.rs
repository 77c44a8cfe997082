use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Cursor, Database};

use crate::errors::{AppError, Result};
use crate::models::link::{AccessLevel, Link};
use crate::models::link_stats::{ClickInfo, LinkStats};
use crate::repositories::LinkRepository;
use crate::utils::detached::spawn_detached;

/// Production repository backed by MongoDB. One document per link in the
/// `links` collection keyed by `short`; derived stats live in `link_stats`.
///
/// Timestamps are persisted as RFC3339 strings, so expiry scans filter in
/// process rather than with range queries; link volumes make that cheap.
pub struct MongoLinkRepository {
    links: Collection<Link>,
    stats: Collection<LinkStats>,
}

impl MongoLinkRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            links: db.collection("links"),
            stats: db.collection("link_stats"),
        }
    }

    async fn find_link(&self, short: &str) -> Result<Link> {
        self.links
            .find_one(doc! {"short": short})
            .await?
            .ok_or_else(|| AppError::not_found(format!("Link '{}' not found", short)))
    }

    async fn collect_links(&self, mut cursor: Cursor<Link>) -> Result<Vec<Link>> {
        let mut links = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(link) => links.push(link),
                Err(e) => log::warn!("skipping undecodable link document: {}", e),
            }
        }
        Ok(links)
    }
}

#[async_trait]
impl LinkRepository for MongoLinkRepository {
    async fn create(&self, link: &Link) -> Result<Link> {
        if self
            .links
            .find_one(doc! {"short": &link.short})
            .await?
            .is_some()
        {
            return Err(AppError::already_exists(format!(
                "Link '{}' already exists",
                link.short
            )));
        }

        let now = Utc::now();
        let mut stored = link.clone();
        stored.created_at = now;
        stored.updated_at = now;
        self.links.insert_one(&stored).await?;
        Ok(stored)
    }

    async fn get_by_short(&self, short: &str) -> Result<Link> {
        let mut link = self.find_link(short).await?;

        // Sticky-expiry flush: a read that observes the link past expiry
        // flips the persisted flag in a detached write. The write failing
        // never fails the read.
        if link.is_past_expiry(Utc::now()) && !link.is_expired {
            link.is_expired = true;
            let links = self.links.clone();
            let short = short.to_string();
            spawn_detached("mongo expiry flag flush", async move {
                // The expires_at filter keeps this write from landing after
                // a racing expiry clear; a cleared link must stay cleared.
                links
                    .update_one(
                        doc! {"short": &short, "expires_at": {"$exists": true}},
                        doc! {"$set": {"is_expired": true}},
                    )
                    .await?;
                Ok(())
            });
        }

        Ok(link)
    }

    async fn get_all(&self) -> Result<Vec<Link>> {
        let cursor = self.links.find(doc! {}).await?;
        self.collect_links(cursor).await
    }

    async fn get_by_access_level(&self, level: AccessLevel) -> Result<Vec<Link>> {
        let cursor = self
            .links
            .find(doc! {"access_level": level.as_str()})
            .await?;
        self.collect_links(cursor).await
    }

    async fn get_by_user(&self, created_by: &str) -> Result<Vec<Link>> {
        let cursor = self.links.find(doc! {"created_by": created_by}).await?;
        self.collect_links(cursor).await
    }

    async fn update(&self, link: &Link) -> Result<Link> {
        self.find_link(&link.short).await?;

        let mut stored = link.clone();
        stored.updated_at = Utc::now();
        self.links
            .replace_one(doc! {"short": &stored.short}, &stored)
            .await?;
        Ok(stored)
    }

    async fn delete(&self, short: &str) -> Result<()> {
        self.find_link(short).await?;

        self.links.delete_one(doc! {"short": short}).await?;
        self.stats.delete_one(doc! {"short": short}).await?;
        Ok(())
    }

    async fn increment_click_count(&self, short: &str, click: ClickInfo) -> Result<()> {
        // Read-modify-write: concurrent increments may lose an update,
        // which the contract accepts at this traffic scale.
        let mut link = self.find_link(short).await?;
        link.click_count += 1;
        link.updated_at = Utc::now();
        self.links.replace_one(doc! {"short": short}, &link).await?;

        let mut stats = match self.stats.find_one(doc! {"short": short}).await? {
            Some(stats) => stats,
            None => {
                let mut fresh = LinkStats::new(short);
                fresh.total_clicks = link.click_count - 1;
                fresh
            }
        };
        stats.record_click(&click);
        self.stats
            .replace_one(doc! {"short": short}, &stats)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_expired_links(&self) -> Result<Vec<Link>> {
        let now = Utc::now();
        let links = self.get_all().await?;
        Ok(links
            .into_iter()
            .filter(|l| l.is_expired || l.is_past_expiry(now))
            .collect())
    }

    async fn get_links_by_expiry_status(&self, is_expired: bool) -> Result<Vec<Link>> {
        let cursor = self.links.find(doc! {"is_expired": is_expired}).await?;
        self.collect_links(cursor).await
    }

    async fn get_link_stats(&self, short: &str) -> Result<LinkStats> {
        let link = self.find_link(short).await?;

        if let Some(stats) = self.stats.find_one(doc! {"short": short}).await? {
            return Ok(stats);
        }

        let mut fresh = LinkStats::new(short);
        fresh.total_clicks = link.click_count;
        self.stats.insert_one(&fresh).await?;
        Ok(fresh)
    }
}
