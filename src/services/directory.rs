use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::core::{
    DispatchReport, NotificationDispatcher, PushReceiver, QueryEngine, RecordStore,
    SubscriptionInfo, SubscriptionRegistry,
};
use crate::error::{DirectoryError, Result};
use crate::models::{BoundingBox, Record, RecordHit, StatsResponse, SubscriptionId, TagFilter};

/// Result of registering a record
#[derive(Debug, Clone)]
pub struct Registration {
    pub record: Arc<Record>,
    /// True when no record with this id existed before
    pub created: bool,
    pub report: DispatchReport,
}

/// The proximity directory service
///
/// Owns the record store, the query engine, the subscription registry and the
/// dispatcher. One instance is created at startup and shared by every HTTP
/// worker; `shutdown` closes all live subscriptions.
pub struct Directory {
    store: Arc<RecordStore>,
    query: QueryEngine,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: NotificationDispatcher,
    /// Serializes commit + dispatch so pushes follow commit order
    ingest: Mutex<()>,
}

impl Directory {
    pub fn new(cell_size_deg: f64, channel_capacity: usize) -> Self {
        let store = Arc::new(RecordStore::new(cell_size_deg));
        let registry = Arc::new(SubscriptionRegistry::new(channel_capacity));

        Self {
            query: QueryEngine::new(Arc::clone(&store)),
            dispatcher: NotificationDispatcher::new(Arc::clone(&registry)),
            store,
            registry,
            ingest: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.directory.cell_size_deg,
            settings.subscriptions.channel_capacity,
        )
    }

    // --- Records ---

    /// Store a record and push it to every matching subscription
    ///
    /// Delivery failures are reported in the returned `DispatchReport`; they
    /// never fail the registration.
    pub fn register(&self, record: Record) -> Result<Registration> {
        let _ingest = self.ingest.lock();

        let outcome = self.store.put(record)?;
        let report = self.dispatcher.dispatch(&outcome.current);

        tracing::info!(
            "Registered record {} ({}), pushed to {} subscribers",
            outcome.current.id,
            if outcome.previous.is_none() { "new" } else { "updated" },
            report.delivered.len()
        );

        Ok(Registration {
            created: outcome.previous.is_none(),
            record: outcome.current,
            report,
        })
    }

    /// Remove a record; subscribers are not notified
    pub fn remove(&self, id: &str) -> bool {
        let _ingest = self.ingest.lock();
        let removed = self.store.remove(id);
        if removed {
            tracing::info!("Removed record {}", id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Result<Arc<Record>> {
        self.store
            .get(id)
            .ok_or_else(|| DirectoryError::NotFound(format!("record {}", id)))
    }

    // --- Queries ---

    pub fn search(&self, region: &BoundingBox, filter: &TagFilter) -> Result<Vec<Arc<Record>>> {
        self.query.search(region, filter)
    }

    pub fn search_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        filter: &TagFilter,
        limit: usize,
    ) -> Result<Vec<RecordHit>> {
        self.query.search_near(latitude, longitude, radius_km, filter, limit)
    }

    // --- Subscriptions ---

    pub fn subscribe(
        &self,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> Result<PushReceiver> {
        self.registry.subscribe(client_id, region, filter)
    }

    pub fn update(
        &self,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> Result<Option<PushReceiver>> {
        self.registry.update(client_id, region, filter)
    }

    pub fn retarget(
        &self,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> Result<SubscriptionId> {
        self.registry.retarget(client_id, region, filter)
    }

    pub fn unsubscribe(&self, client_id: &str) -> bool {
        self.registry.unsubscribe(client_id)
    }

    pub fn unsubscribe_if(&self, client_id: &str, id: SubscriptionId) -> bool {
        self.registry.unsubscribe_if(client_id, id)
    }

    pub fn subscription(&self, client_id: &str) -> Option<SubscriptionInfo> {
        self.registry.get(client_id)
    }

    // --- Maintenance ---

    /// Remove records registered longer than `ttl` ago
    pub fn expire_records(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let _ingest = self.ingest.lock();
        let expired = self.store.remove_expired(Utc::now() - ttl);
        if !expired.is_empty() {
            tracing::info!("Expired {} records", expired.len());
        }
        expired.len()
    }

    /// Drop subscriptions whose stream is gone or that sat idle past `idle_timeout`
    pub fn reap_subscriptions(&self, idle_timeout: Option<Duration>) -> usize {
        let cutoff = idle_timeout
            .and_then(|idle| chrono::Duration::from_std(idle).ok())
            .map(|idle| Utc::now() - idle);
        let reaped = self.registry.reap(cutoff);
        if !reaped.is_empty() {
            tracing::info!("Reaped {} stale subscriptions", reaped.len());
        }
        reaped.len()
    }

    pub fn stats(&self) -> StatsResponse {
        let store = self.store.stats();
        StatsResponse {
            records: store.records,
            occupied_cells: store.occupied_cells,
            distinct_tags: store.distinct_tags,
            subscriptions: self.registry.len(),
        }
    }

    /// Close every live subscription
    pub fn shutdown(&self) {
        let closed = self.registry.clear();
        tracing::info!("Directory shut down, closed {} subscriptions", closed);
    }
}
