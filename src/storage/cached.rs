use crate::models::{Link, LinkUpdate, NewLink, Profile, ProfileUpdate};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{self, Instant};

/// Storage wrapper that caches per-owner link lists and buffers click increments
pub struct CachedStorage {
    /// Underlying storage implementation
    inner: Arc<dyn Storage>,
    /// Ordered link list per owner, dropped on every write for that owner
    links_cache: Cache<String, Arc<Vec<Link>>>,
    /// Bumped on every write for an owner; a list read across a bump is not cached
    generations: DashMap<String, u64>,
    clicks: Arc<ClickBuffer>,
    /// Shutdown signal sender
    shutdown_tx: watch::Sender<bool>,
}

/// Clicks recorded but not yet written, keyed by link id
#[derive(Default)]
struct ClickBuffer {
    counts: DashMap<String, u64>,
    /// Held for writing while counts move into storage, for reading while
    /// storage counts and buffered counts are summed
    flush_lock: RwLock<()>,
}

impl ClickBuffer {
    fn pending(&self, link_id: &str) -> i64 {
        self.counts
            .get(link_id)
            .map(|entry| *entry.value() as i64)
            .unwrap_or(0)
    }

    fn add(&self, link_id: &str, amount: u64) {
        self.counts
            .entry(link_id.to_string())
            .and_modify(|count| *count += amount)
            .or_insert(amount);
    }

    /// Drop `amount` clicks that storage now holds
    fn settle(&self, link_id: &str, amount: u64) {
        if let Some(mut count) = self.counts.get_mut(link_id) {
            *count = count.saturating_sub(amount);
        }
        self.counts.remove_if(link_id, |_, count| *count == 0);
    }
}

impl CachedStorage {
    pub fn new(
        inner: Arc<dyn Storage>,
        max_cache_entries: u64,
        cache_ttl_secs: u64,
        flush_interval_secs: u64,
    ) -> Self {
        let links_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(cache_ttl_secs.max(1)))
            .build();

        let clicks = Arc::new(ClickBuffer::default());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // Flush the click buffer periodically and once more on shutdown
        let storage = Arc::clone(&inner);
        let buffer = Arc::clone(&clicks);
        let cache = links_cache.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(flush_interval_secs.max(1));
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = flush_click_buffer(&storage, &buffer, &cache).await {
                            tracing::error!("Failed to flush click buffer: {}", e);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Shutdown signal received, flushing click buffer...");
                            if let Err(e) = flush_click_buffer(&storage, &buffer, &cache).await {
                                tracing::error!("Failed to flush click buffer on shutdown: {}", e);
                            } else {
                                tracing::info!("Click buffer flushed successfully on shutdown");
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            inner,
            links_cache,
            generations: DashMap::new(),
            clicks,
            shutdown_tx,
        }
    }

    /// Signal shutdown to flush buffered clicks
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Write every buffered click now
    pub async fn flush(&self) -> Result<()> {
        flush_click_buffer(&self.inner, &self.clicks, &self.links_cache).await
    }

    fn with_buffered_clicks(&self, mut link: Link) -> Link {
        link.clicks += self.clicks.pending(&link.id);
        link
    }

    fn generation(&self, owner_id: &str) -> u64 {
        self.generations.get(owner_id).map(|g| *g).unwrap_or(0)
    }

    async fn invalidate_owner(&self, owner_id: &str) {
        self.generations
            .entry(owner_id.to_string())
            .and_modify(|g| *g = g.wrapping_add(1))
            .or_insert(1);
        self.links_cache.invalidate(owner_id).await;
    }
}

/// Flush accumulated clicks to the database
async fn flush_click_buffer(
    storage: &Arc<dyn Storage>,
    buffer: &ClickBuffer,
    cache: &Cache<String, Arc<Vec<Link>>>,
) -> Result<()> {
    // Readers wait until written counts have left the buffer
    let _flushing = buffer.flush_lock.write().await;

    let pending_updates = buffer
        .counts
        .iter()
        .filter(|entry| *entry.value() > 0)
        .map(|entry| (entry.key().clone(), *entry.value()))
        .collect::<Vec<(String, u64)>>();

    if pending_updates.is_empty() {
        return Ok(());
    }

    let mut first_error = None;
    for (link_id, count) in pending_updates {
        match storage.increment_clicks(&link_id, count).await {
            // Clicks recorded during the write stay buffered
            Ok(()) => buffer.settle(&link_id, count),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    // Cached lists carry counts from before the flush
    cache.invalidate_all();

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert_link(&self, id: &str, owner_id: &str, link: &NewLink) -> StorageResult<Link> {
        let result = self.inner.insert_link(id, owner_id, link).await;
        self.invalidate_owner(owner_id).await;
        result
    }

    async fn get_link(&self, id: &str) -> Result<Option<Link>> {
        let _reading = self.clicks.flush_lock.read().await;
        let link = self.inner.get_link(id).await?;
        Ok(link.map(|l| self.with_buffered_clicks(l)))
    }

    async fn list_links(&self, owner_id: &str) -> Result<Vec<Link>> {
        let _reading = self.clicks.flush_lock.read().await;
        let links = match self.links_cache.get(owner_id).await {
            Some(cached) => cached,
            None => {
                let generation = self.generation(owner_id);
                let fresh = Arc::new(self.inner.list_links(owner_id).await?);
                self.links_cache
                    .insert(owner_id.to_string(), Arc::clone(&fresh))
                    .await;
                // A write landed while reading, so the list may predate it
                if self.generation(owner_id) != generation {
                    self.links_cache.invalidate(owner_id).await;
                }
                fresh
            }
        };

        Ok(links
            .iter()
            .cloned()
            .map(|l| self.with_buffered_clicks(l))
            .collect())
    }

    async fn list_owner_ids(&self) -> Result<Vec<String>> {
        self.inner.list_owner_ids().await
    }

    async fn delete_link(&self, id: &str) -> StorageResult<Link> {
        let deleted = self.inner.delete_link(id).await?;
        self.invalidate_owner(&deleted.owner_id).await;
        self.clicks.counts.remove(id);
        Ok(deleted)
    }

    async fn reorder_links(&self, owner_id: &str, ids: &[String]) -> StorageResult<()> {
        let result = self.inner.reorder_links(owner_id, ids).await;
        self.invalidate_owner(owner_id).await;
        result
    }

    async fn set_link_active(&self, id: &str, active: bool) -> StorageResult<Link> {
        let _reading = self.clicks.flush_lock.read().await;
        let link = self.inner.set_link_active(id, active).await?;
        self.invalidate_owner(&link.owner_id).await;
        Ok(self.with_buffered_clicks(link))
    }

    async fn update_link(&self, id: &str, update: &LinkUpdate) -> StorageResult<Link> {
        let _reading = self.clicks.flush_lock.read().await;
        let link = self.inner.update_link(id, update).await?;
        self.invalidate_owner(&link.owner_id).await;
        Ok(self.with_buffered_clicks(link))
    }

    async fn increment_clicks(&self, id: &str, amount: u64) -> Result<()> {
        if amount > 0 {
            self.clicks.add(id, amount);
        }
        Ok(())
    }

    async fn upsert_profile(
        &self,
        owner_id: &str,
        update: &ProfileUpdate,
    ) -> StorageResult<Profile> {
        self.inner.upsert_profile(owner_id, update).await
    }

    async fn get_profile(&self, owner_id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(owner_id).await
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        self.inner.get_profile_by_username(username).await
    }
}
