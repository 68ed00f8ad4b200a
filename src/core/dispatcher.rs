use std::sync::Arc;
use thiserror::Error;

use crate::core::registry::SubscriptionRegistry;
use crate::models::{PushEvent, Record, SubscriptionId};

/// A push that could not be handed to a subscription's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelUnavailable {
    /// The subscriber is not draining its channel; this push was dropped
    #[error("channel full")]
    Full,

    /// The receiving side is gone
    #[error("channel closed")]
    Closed,
}

/// A failed delivery, reported back to the writer
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub client_id: String,
    pub subscription_id: SubscriptionId,
    pub reason: ChannelUnavailable,
}

/// What happened when a record was evaluated against live subscriptions
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Number of subscriptions the record was evaluated against
    pub evaluated: usize,
    /// Clients whose channel accepted the push
    pub delivered: Vec<String>,
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn matched(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }
}

/// Pushes newly registered records to every matching subscription
///
/// Delivery is at most once per subscription per record event. Failures are
/// reported, never retried; subscriptions whose channel closed are dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Evaluate a committed record against all active subscriptions
    ///
    /// Every subscription sees the same immutable snapshot of the record.
    /// Pushes never wait on channel capacity, so a slow subscriber cannot
    /// stall the writer or other subscribers.
    pub fn dispatch(&self, record: &Arc<Record>) -> DispatchReport {
        let mut report = DispatchReport::default();

        {
            let subs = self.registry.read();
            report.evaluated = subs.len();

            for (client_id, sub) in subs.iter().filter(|(_, sub)| sub.matches(record)) {
                match sub.push(PushEvent::Record(Arc::clone(record))) {
                    Ok(()) => report.delivered.push(client_id.clone()),
                    Err(reason) => report.failures.push(DeliveryFailure {
                        client_id: client_id.clone(),
                        subscription_id: sub.id,
                        reason,
                    }),
                }
            }
        }

        for failure in &report.failures {
            tracing::warn!(
                "Push of record {} to client {} failed: {}",
                record.id,
                failure.client_id,
                failure.reason
            );
            if failure.reason == ChannelUnavailable::Closed {
                self.registry
                    .unsubscribe_if(&failure.client_id, failure.subscription_id);
            }
        }

        tracing::debug!(
            "Dispatched record {} to {} of {} subscriptions",
            record.id,
            report.delivered.len(),
            report.evaluated
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, TagFilter};

    fn area() -> BoundingBox {
        BoundingBox::new(9.0, 11.0, 9.0, 11.0).unwrap()
    }

    #[test]
    fn test_dispatch_matching_only() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let dispatcher = NotificationDispatcher::new(registry.clone());

        let mut all = registry.subscribe("all", area(), TagFilter::any()).unwrap();
        let mut clinics = registry.subscribe("clinics", area(), TagFilter::new(["clinic"])).unwrap();

        let record = Arc::new(Record::new("y", 10.0, 10.0, ["shelter"]));
        let report = dispatcher.dispatch(&record);

        assert_eq!(report.evaluated, 2);
        assert_eq!(report.delivered, vec!["all".to_string()]);
        assert!(matches!(all.try_recv(), Some(PushEvent::Record(r)) if r.id == "y"));
        assert!(all.try_recv().is_none());
        assert!(clinics.try_recv().is_none());
    }

    #[test]
    fn test_full_channel_drops_push_but_keeps_subscription() {
        let registry = Arc::new(SubscriptionRegistry::new(1));
        let dispatcher = NotificationDispatcher::new(registry.clone());
        let _slow = registry.subscribe("slow", area(), TagFilter::any()).unwrap();

        let first = dispatcher.dispatch(&Arc::new(Record::new("a", 10.0, 10.0, ["x"])));
        assert_eq!(first.delivered.len(), 1);

        let second = dispatcher.dispatch(&Arc::new(Record::new("b", 10.0, 10.0, ["x"])));
        assert_eq!(second.failures.len(), 1);
        assert_eq!(second.failures[0].reason, ChannelUnavailable::Full);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_closed_channel_is_reaped() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let dispatcher = NotificationDispatcher::new(registry.clone());
        drop(registry.subscribe("gone", area(), TagFilter::any()).unwrap());

        let report = dispatcher.dispatch(&Arc::new(Record::new("a", 10.0, 10.0, ["x"])));
        assert_eq!(report.failures[0].reason, ChannelUnavailable::Closed);
        assert!(registry.is_empty());
    }
}
