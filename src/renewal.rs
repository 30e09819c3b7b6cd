// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{sync::Arc, time::Duration};

use tokio::{
    select,
    sync::Notify,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, warn};

use crate::{millis, providers::Provider, token::LockToken};

/// Background task extending one lease record every half lease.
#[derive(Debug)]
pub(crate) struct RenewalTask {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl RenewalTask {
    pub(crate) fn period(lease: Duration) -> Duration {
        (lease / 2).max(Duration::from_millis(1))
    }

    pub(crate) fn spawn<P: Provider>(
        provider: Arc<P>,
        key: String,
        token: LockToken,
        lease: Duration,
    ) -> Self {
        let stop = Arc::new(Notify::new());
        let handle = tokio::spawn(Self::run(provider, key, token, lease, Arc::clone(&stop)));
        Self { stop, handle }
    }

    async fn run<P: Provider>(
        provider: Arc<P>,
        key: String,
        token: LockToken,
        lease: Duration,
        stop: Arc<Notify>,
    ) {
        let period = Self::period(lease);
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;
                _ = stop.notified() => break,
                _ = ticks.tick() => {}
            }

            match provider.renew(&key, &token, lease).await {
                Ok(true) => debug!(key = %key, lease_ms = millis(lease), "renewed lock"),
                Ok(false) => warn!(key = %key, "lock no longer held by this lease, not renewing"),
                Err(error) => warn!(key = %key, %error, "failed to renew lock, retrying next period"),
            }
        }
    }

    /// Stop renewing and wait until the task has exited.
    ///
    /// A renewal already in flight completes before this returns, so no
    /// renewal can reach the store afterwards.
    pub(crate) async fn stop(self) {
        self.stop.notify_one();
        if let Err(error) = self.handle.await {
            if error.is_panic() {
                warn!(%error, "lock renewal task panicked");
            }
        }
    }

    /// Stop renewing without waiting for the task.
    pub(crate) fn abort(self) {
        self.stop.notify_one();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::providers::memory::MemoryProvider;

    #[test]
    fn period_is_half_lease() {
        assert_eq!(
            RenewalTask::period(Duration::from_secs(2)),
            Duration::from_secs(1)
        );
        assert_eq!(
            RenewalTask::period(Duration::from_millis(1)),
            Duration::from_millis(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_record_alive() {
        let provider = Arc::new(MemoryProvider::new());
        let token = LockToken::new();
        let lease = Duration::from_secs(1);
        provider.try_acquire("lock:test", &token, lease).await.unwrap();

        let task = RenewalTask::spawn(Arc::clone(&provider), "lock:test".to_string(), token, lease);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(provider.value("lock:test"), Some(token));

        task.stop().await;
        sleep(lease * 2).await;
        assert_eq!(provider.value("lock:test"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_half_lease() {
        let provider = Arc::new(MemoryProvider::new());
        let token = LockToken::new();
        let lease = Duration::from_secs(2);
        provider.try_acquire("lock:test", &token, lease).await.unwrap();

        let task = RenewalTask::spawn(Arc::clone(&provider), "lock:test".to_string(), token, lease);

        sleep(Duration::from_millis(900)).await;
        assert_eq!(provider.ttl("lock:test"), Some(Duration::from_millis(1100)));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(provider.ttl("lock:test"), Some(Duration::from_millis(1900)));

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn survives_store_outage() {
        let provider = Arc::new(MemoryProvider::new());
        let token = LockToken::new();
        let lease = Duration::from_secs(4);
        provider.try_acquire("lock:test", &token, lease).await.unwrap();

        let task = RenewalTask::spawn(Arc::clone(&provider), "lock:test".to_string(), token, lease);

        provider.set_unavailable(true);
        sleep(Duration::from_millis(2500)).await;
        provider.set_unavailable(false);
        assert_eq!(provider.ttl("lock:test"), Some(Duration::from_millis(1500)));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.value("lock:test"), Some(token));

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lost_record_is_not_recreated() {
        let provider = Arc::new(MemoryProvider::new());
        let token = LockToken::new();
        let lease = Duration::from_secs(1);
        provider.try_acquire("lock:test", &token, lease).await.unwrap();

        let task = RenewalTask::spawn(Arc::clone(&provider), "lock:test".to_string(), token, lease);

        provider.release("lock:test", &token).await.unwrap();
        sleep(Duration::from_secs(3)).await;
        assert_eq!(provider.value("lock:test"), None);

        task.stop().await;
    }
}
