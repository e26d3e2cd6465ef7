//! Local cache of service descriptors with conditional refresh.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::lookup::DiscoveryLookupClient;
use crate::types::ServiceDescriptors;

/// Cache key: one entry per (service type, pool).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub service_type: String,
    pub pool: String,
}

impl ServiceKey {
    /// Key for the given service type and pool.
    pub fn new(service_type: impl Into<String>, pool: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            pool: pool.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    descriptors: Arc<ServiceDescriptors>,
    validated_at: Instant,
}

impl CacheEntry {
    fn new(descriptors: Arc<ServiceDescriptors>) -> Self {
        Self {
            descriptors,
            validated_at: Instant::now(),
        }
    }

    fn expires_in(&self) -> Duration {
        self.descriptors
            .max_age()
            .saturating_sub(self.validated_at.elapsed())
    }

    fn is_fresh(&self) -> bool {
        !self.expires_in().is_zero()
    }
}

/// Holds the last known descriptors for every (type, pool) looked up so far.
///
/// Entries are replaced wholesale: readers see either the previous snapshot
/// or the new one, never a mix. A failed refresh leaves the previous
/// snapshot in place.
#[derive(Debug)]
pub struct ServiceInventory {
    lookup: Arc<dyn DiscoveryLookupClient>,
    entries: DashMap<ServiceKey, CacheEntry>,
    min_refresh_delay: Duration,
}

impl ServiceInventory {
    /// Creates an empty inventory backed by the given lookup client.
    pub fn new(lookup: Arc<dyn DiscoveryLookupClient>, min_refresh_delay: Duration) -> Self {
        Self {
            lookup,
            entries: DashMap::new(),
            min_refresh_delay,
        }
    }

    /// Descriptors for `(service_type, pool)`.
    ///
    /// Served from the cache when an entry exists, even a stale one; the
    /// first read of a key performs an uncached lookup.
    pub async fn get_descriptors(
        &self,
        service_type: &str,
        pool: &str,
    ) -> Result<Arc<ServiceDescriptors>> {
        if let Some(cached) = self.cached(service_type, pool) {
            return Ok(cached);
        }

        let fetched = Arc::new(self.lookup.get_services(service_type, pool).await?);
        self.entries.insert(
            ServiceKey::new(service_type, pool),
            CacheEntry::new(Arc::clone(&fetched)),
        );
        Ok(fetched)
    }

    /// Revalidate `(service_type, pool)` against the registry.
    ///
    /// Uses the cached snapshot's ETag when there is one. On success the
    /// entry is replaced (a `304` extends its freshness); on failure the
    /// cached snapshot keeps serving and the error is returned here only.
    pub async fn refresh(&self, service_type: &str, pool: &str) -> Result<Arc<ServiceDescriptors>> {
        let previous = self.cached(service_type, pool);

        let refreshed = match &previous {
            Some(previous) => self.lookup.refresh_services(previous).await?,
            None => self.lookup.get_services(service_type, pool).await?,
        };

        let refreshed = Arc::new(refreshed);
        self.entries.insert(
            ServiceKey::new(service_type, pool),
            CacheEntry::new(Arc::clone(&refreshed)),
        );
        debug!(
            service_type = %service_type,
            pool = %pool,
            count = refreshed.len(),
            max_age_secs = refreshed.max_age().as_secs(),
            "inventory entry refreshed"
        );
        Ok(refreshed)
    }

    /// The cached snapshot, without contacting the registry.
    pub fn cached(&self, service_type: &str, pool: &str) -> Option<Arc<ServiceDescriptors>> {
        self.entries
            .get(&ServiceKey::new(service_type, pool))
            .map(|entry| Arc::clone(&entry.descriptors))
    }

    /// Returns true if a cached snapshot exists and its max-age has not elapsed.
    pub fn is_fresh(&self, service_type: &str, pool: &str) -> bool {
        self.entries
            .get(&ServiceKey::new(service_type, pool))
            .is_some_and(|entry| entry.is_fresh())
    }

    /// Keys with a cached snapshot.
    pub fn keys(&self) -> Vec<ServiceKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of cached (type, pool) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Refresh every expired entry and return the delay until the next expiry.
    ///
    /// Failures are logged and retried after the minimum refresh delay.
    pub async fn refresh_expired(&self) -> Duration {
        let expired: Vec<ServiceKey> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_fresh())
            .map(|entry| entry.key().clone())
            .collect();

        for key in expired {
            if let Err(e) = self.refresh(&key.service_type, &key.pool).await {
                warn!(
                    service_type = %key.service_type,
                    pool = %key.pool,
                    error = %e,
                    "inventory refresh failed, serving cached descriptors"
                );
            }
        }

        self.entries
            .iter()
            .map(|entry| entry.expires_in())
            .min()
            .unwrap_or(self.min_refresh_delay)
            .max(self.min_refresh_delay)
    }

    /// Spawn a background task that keeps every cached entry fresh.
    ///
    /// The task stops when `cancel` fires or the returned handle is dropped.
    pub fn spawn_updater(self: &Arc<Self>, cancel: &CancellationToken) -> InventoryUpdater {
        let inventory = Arc::clone(self);
        let cancel = cancel.child_token();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            info!("inventory updater started");
            loop {
                let delay = inventory.refresh_expired().await;
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            info!("inventory updater stopped");
        });

        InventoryUpdater {
            cancel,
            handle: Some(handle),
        }
    }
}

/// Handle to a running inventory updater. Dropping it stops the task.
#[derive(Debug)]
pub struct InventoryUpdater {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl InventoryUpdater {
    /// Stop the updater and wait for its current pass to finish.
    ///
    /// A task that panicked is logged rather than propagated.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "inventory updater ended abnormally");
            }
        }
    }
}

impl Drop for InventoryUpdater {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
