//! Background tasks — liveness-based eviction of silent connections.
//!
//! The [`Sweeper`] runs once at startup and then on a fixed period. Each pass
//! drops every connection whose last heartbeat is older than the TTL and
//! asks its transport to close.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::registry::Registry;

/// Periodic eviction of stale registry entries.
#[derive(Debug, Clone)]
pub struct Sweeper {
    registry: Arc<Registry>,
    ttl: Duration,
    period: Duration,
}

impl Sweeper {
    /// Creates a sweeper evicting entries silent for longer than `ttl`,
    /// scanning every `period`.
    pub fn new(registry: Arc<Registry>, ttl: Duration, period: Duration) -> Self {
        Self {
            registry,
            ttl,
            period,
        }
    }

    /// Creates a sweeper from the relay configuration.
    pub fn from_config(registry: Arc<Registry>, config: &RelayConfig) -> Self {
        Self::new(registry, config.socket_ttl, config.evicting_period)
    }

    /// Runs one pass at `now` and returns the evicted ids.
    ///
    /// An entry is evicted when `last_heartbeat_at < now - ttl`. Each evicted
    /// channel is asked to close; a heartbeat racing with the pass keeps its
    /// entry alive because removal re-checks the timestamp under the entry lock.
    pub fn sweep(&self, now: Instant) -> Vec<String> {
        let Some(deadline) = now.checked_sub(self.ttl) else {
            // The clock has not been running for a full TTL yet.
            return Vec::new();
        };

        let mut evicted = Vec::new();
        for connection in self.registry.snapshot() {
            if !connection.is_stale(deadline) {
                continue;
            }
            if let Some(removed) = self.registry.remove_if_stale(&connection.id, deadline) {
                info!(id = %removed.id, channel = %removed.channel_id(), "evicted stale connection");
                removed.channel.close();
                evicted.push(removed.id);
            }
        }

        debug!(
            evicted = evicted.len(),
            remaining = self.registry.len(),
            "sweep finished"
        );
        evicted
    }

    /// Spawns the sweep loop on the current Tokio runtime.
    ///
    /// The first pass runs immediately, then one pass per period. A pass
    /// that falls behind delays the next one rather than bursting. The loop
    /// runs until the returned handle is aborted.
    ///
    /// # Panics
    ///
    /// Panics if the period is zero or if called outside a Tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            ttl_ms = self.ttl.as_millis() as u64,
            period_secs = self.period.as_secs(),
            "eviction sweeper started"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::channel::mock::MockChannel;

    const TTL: Duration = Duration::from_millis(120_000);
    const PERIOD: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_stale_entries() {
        let registry = Arc::new(Registry::new());
        let sweeper = Sweeper::new(Arc::clone(&registry), TTL, PERIOD);

        let old = MockChannel::new(1);
        let edge = MockChannel::new(2);
        let fresh = MockChannel::new(3);

        let start = Instant::now();
        registry.upsert("old", old.clone(), start);
        tokio::time::advance(Duration::from_secs(1)).await;
        registry.upsert("edge", edge.clone(), Instant::now());
        tokio::time::advance(Duration::from_secs(60)).await;
        registry.upsert("fresh", fresh.clone(), Instant::now());

        // deadline == edge's timestamp: edge survives, old does not.
        let now = start + Duration::from_secs(1) + TTL;
        let evicted = sweeper.sweep(now);

        assert_eq!(evicted, vec!["old".to_owned()]);
        assert!(old.is_closed());
        assert!(!edge.is_closed());
        assert!(!fresh.is_closed());
        assert!(registry.contains("edge"));
        assert!(registry.contains("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_keeps_connection_alive() {
        let registry = Arc::new(Registry::new());
        let sweeper = Sweeper::new(Arc::clone(&registry), TTL, PERIOD);
        registry.upsert("alice", MockChannel::new(1), Instant::now());

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(60)).await;
            registry.touch("alice", Instant::now());
            assert!(sweeper.sweep(Instant::now()).is_empty());
        }
        assert!(registry.contains("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_on_empty_registry_is_a_noop() {
        let registry = Arc::new(Registry::new());
        let sweeper = Sweeper::new(Arc::clone(&registry), TTL, PERIOD);
        tokio::time::advance(TTL * 2).await;
        assert!(sweeper.sweep(Instant::now()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_evicts_after_ttl() {
        let registry = Arc::new(Registry::new());
        let channel = MockChannel::new(1);
        registry.upsert("alice", channel.clone(), Instant::now());

        let handle = Sweeper::new(Arc::clone(&registry), TTL, PERIOD).spawn();

        // Just under the TTL: still present after several passes.
        tokio::time::sleep(TTL - Duration::from_secs(1)).await;
        assert!(registry.contains("alice"));

        // The first pass after the TTL elapses removes it.
        tokio::time::sleep(PERIOD + Duration::from_secs(2)).await;
        assert!(!registry.contains("alice"));
        assert!(channel.is_closed());

        handle.abort();
    }

    #[test]
    fn from_config_uses_configured_durations() {
        let config = RelayConfig::default()
            .socket_ttl(Duration::from_millis(500))
            .evicting_period(Duration::from_secs(3));
        let sweeper = Sweeper::from_config(Arc::new(Registry::new()), &config);
        assert_eq!(sweeper.ttl, Duration::from_millis(500));
        assert_eq!(sweeper.period, Duration::from_secs(3));
    }
}
