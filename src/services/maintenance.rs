use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::services::directory::Directory;

/// Background sweeper for record expiry and stale subscriptions
///
/// Runs every `every` until aborted. Record expiry only happens when a TTL is
/// configured; closed subscription channels are always reaped.
pub fn spawn_sweeper(
    directory: Arc<Directory>,
    every: Duration,
    record_ttl: Option<Duration>,
    idle_timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep(&directory, record_ttl, idle_timeout);
        }
    })
}

/// One maintenance pass; returns (expired records, reaped subscriptions)
pub fn sweep(
    directory: &Directory,
    record_ttl: Option<Duration>,
    idle_timeout: Option<Duration>,
) -> (usize, usize) {
    let expired = record_ttl.map_or(0, |ttl| directory.expire_records(ttl));
    let reaped = directory.reap_subscriptions(idle_timeout);

    tracing::debug!(
        "Maintenance sweep: {} records expired, {} subscriptions reaped",
        expired,
        reaped
    );

    (expired, reaped)
}
