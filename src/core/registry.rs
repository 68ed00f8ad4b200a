//! Registry of live client subscriptions.
//!
//! Each client holds at most one subscription: a region, a tag filter and the
//! sending half of a bounded push channel. All mutations go through the write
//! lock, which serializes subscription changes per client. The dispatcher
//! evaluates records under the read lock, so a record is matched against either
//! the old or the new subscription of a client, never both and never neither.

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::core::dispatcher::ChannelUnavailable;
use crate::core::filters::matches_region_and_tags;
use crate::error::{DirectoryError, Result};
use crate::models::{BoundingBox, PushEvent, Record, SubscriptionId, TagFilter};

/// Default number of undelivered pushes buffered per subscription
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Internal subscription state
pub(crate) struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) region: BoundingBox,
    pub(crate) filter: TagFilter,
    sender: mpsc::Sender<PushEvent>,
    last_activity: DateTime<Utc>,
}

impl Subscription {
    #[inline]
    pub(crate) fn matches(&self, record: &Record) -> bool {
        matches_region_and_tags(record, &self.region, &self.filter)
    }

    /// Push an event without waiting for channel capacity
    pub(crate) fn push(&self, event: PushEvent) -> std::result::Result<(), ChannelUnavailable> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ChannelUnavailable::Full),
            Err(TrySendError::Closed(_)) => Err(ChannelUnavailable::Closed),
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving half of a subscription's push channel
#[derive(Debug)]
pub struct PushReceiver {
    id: SubscriptionId,
    client_id: String,
    receiver: mpsc::Receiver<PushEvent>,
}

impl PushReceiver {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Wait for the next event; `None` once the subscription is gone and drained
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PushEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn into_inner(self) -> mpsc::Receiver<PushEvent> {
        self.receiver
    }
}

/// Summary of one active subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub region: BoundingBox,
    pub filter: TagFilter,
}

/// Owner of all active subscriptions
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<String, Subscription>>,
    next_id: AtomicU64,
    channel_capacity: usize,
}

impl SubscriptionRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Install a new subscription, retiring the client's previous one
    ///
    /// The previous channel receives `PushEvent::Retired` and then closes. The
    /// swap happens under one write guard.
    pub fn subscribe(
        &self,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> Result<PushReceiver> {
        region.validate()?;
        let mut subs = self.subscriptions.write();
        Ok(self.install(&mut subs, client_id, region, filter))
    }

    /// Move the client's subscription to a new region/filter
    ///
    /// Keeps the existing channel and returns `None` when the client already
    /// has a live subscription; otherwise installs a fresh one like
    /// `subscribe` and returns its receiver.
    pub fn update(
        &self,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> Result<Option<PushReceiver>> {
        region.validate()?;
        let mut subs = self.subscriptions.write();

        if let Some(sub) = subs.get_mut(client_id).filter(|sub| !sub.is_closed()) {
            sub.region = region;
            sub.filter = filter;
            sub.last_activity = Utc::now();
            tracing::debug!("Retargeted subscription {} for client {}", sub.id, client_id);
            return Ok(None);
        }

        Ok(Some(self.install(&mut subs, client_id, region, filter)))
    }

    /// Move an existing live subscription; fails if the client has none
    pub fn retarget(
        &self,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> Result<SubscriptionId> {
        region.validate()?;
        let mut subs = self.subscriptions.write();

        match subs.get_mut(client_id).filter(|sub| !sub.is_closed()) {
            Some(sub) => {
                sub.region = region;
                sub.filter = filter;
                sub.last_activity = Utc::now();
                tracing::debug!("Retargeted subscription {} for client {}", sub.id, client_id);
                Ok(sub.id)
            }
            None => Err(DirectoryError::NotSubscribed(client_id.to_string())),
        }
    }

    /// Remove the client's subscription; no-op if there is none
    pub fn unsubscribe(&self, client_id: &str) -> bool {
        let removed = self.subscriptions.write().remove(client_id);
        match removed {
            Some(sub) => {
                let _ = sub.push(PushEvent::Closed);
                tracing::debug!("Client {} unsubscribed ({})", client_id, sub.id);
                true
            }
            None => false,
        }
    }

    /// Remove the client's subscription only if it is still `id`
    ///
    /// Used when a delivery stream goes away: a stale stream must not tear down
    /// the subscription that replaced it.
    pub fn unsubscribe_if(&self, client_id: &str, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        if subs.get(client_id).map(|sub| sub.id) == Some(id) {
            subs.remove(client_id);
            tracing::debug!("Dropped subscription {} for disconnected client {}", id, client_id);
            true
        } else {
            false
        }
    }

    /// Remove subscriptions with a closed channel or idle since before `idle_cutoff`
    ///
    /// Returns the affected client ids.
    pub fn reap(&self, idle_cutoff: Option<DateTime<Utc>>) -> Vec<String> {
        let mut subs = self.subscriptions.write();
        let stale: Vec<String> = subs
            .iter()
            .filter(|(_, sub)| {
                sub.is_closed() || idle_cutoff.map_or(false, |cutoff| sub.last_activity < cutoff)
            })
            .map(|(client_id, _)| client_id.clone())
            .collect();

        for client_id in &stale {
            if let Some(sub) = subs.remove(client_id) {
                let _ = sub.push(PushEvent::Closed);
            }
        }

        stale
    }

    /// Close every subscription; used at shutdown
    pub fn clear(&self) -> usize {
        let drained: Vec<Subscription> = self.subscriptions.write().drain().map(|(_, s)| s).collect();
        for sub in &drained {
            let _ = sub.push(PushEvent::Closed);
        }
        drained.len()
    }

    pub fn get(&self, client_id: &str) -> Option<SubscriptionInfo> {
        self.subscriptions.read().get(client_id).map(|sub| SubscriptionInfo {
            id: sub.id,
            region: sub.region,
            filter: sub.filter.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access for the dispatcher
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions.read()
    }

    fn install(
        &self,
        subs: &mut HashMap<String, Subscription>,
        client_id: &str,
        region: BoundingBox,
        filter: TagFilter,
    ) -> PushReceiver {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(self.channel_capacity);

        let subscription = Subscription {
            id,
            region,
            filter,
            sender,
            last_activity: Utc::now(),
        };

        if let Some(previous) = subs.insert(client_id.to_string(), subscription) {
            // Best effort: the old stream may already be gone
            let _ = previous.push(PushEvent::Retired { replaced_by: id });
            tracing::debug!(
                "Subscription {} for client {} retired by {}",
                previous.id,
                client_id,
                id
            );
        } else {
            tracing::debug!("Subscription {} installed for client {}", id, client_id);
        }

        PushReceiver {
            id,
            client_id: client_id.to_string(),
            receiver,
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
