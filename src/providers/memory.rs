// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::time::Instant;

use crate::{error::LockError, providers::Provider, token::LockToken};

/// In-process provider with the same atomic semantics as a real store.
///
/// Expiry follows tokio's clock, so paused-time tests can drive it. The
/// provider can also be switched to "unavailable" to simulate a store that
/// cannot be reached.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<String, Record>,
    unavailable: bool,
    attempts: usize,
}

#[derive(Debug)]
struct Record {
    token: LockToken,
    expires_at: Instant,
}

impl MemoryState {
    fn live(&mut self, key: &str) -> Option<&mut Record> {
        let now = Instant::now();
        if self
            .records
            .get(key)
            .is_some_and(|record| record.expires_at < now)
        {
            self.records.remove(key);
        }
        self.records.get_mut(key)
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        self.records.retain(|_, record| record.expires_at >= now);
    }

    fn check_available(&self) -> Result<(), LockError> {
        if self.unavailable {
            return Err(LockError::transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "memory store unavailable",
            )));
        }
        Ok(())
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // The state is never left half-updated, so a poisoned lock is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent operation fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Token currently stored under `key`, if the record is live.
    pub fn value(&self, key: &str) -> Option<LockToken> {
        self.state().live(key).map(|record| record.token)
    }

    /// Remaining time to live of `key`, if the record is live.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.state()
            .live(key)
            .map(|record| record.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Number of acquisition attempts seen, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }
}

impl Provider for MemoryProvider {
    async fn try_acquire(
        &self,
        key: &str,
        token: &LockToken,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let mut state = self.state();
        state.attempts += 1;
        state.check_available()?;
        state.sweep();

        if lease.is_zero() || state.records.contains_key(key) {
            return Ok(false);
        }

        state.records.insert(
            key.to_string(),
            Record {
                token: *token,
                expires_at: Instant::now() + lease,
            },
        );
        Ok(true)
    }

    async fn renew(
        &self,
        key: &str,
        token: &LockToken,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let mut state = self.state();
        state.check_available()?;

        match state.live(key) {
            Some(record) if record.token == *token => {
                record.expires_at = Instant::now() + lease;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        let mut state = self.state();
        state.check_available()?;

        let owned = state.live(key).is_some_and(|record| record.token == *token);
        if owned {
            state.records.remove(key);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_fresh_lock() {
        let provider = MemoryProvider::new();
        let token = LockToken::new();

        let acquired = provider
            .try_acquire("lock:test", &token, Duration::from_secs(5))
            .await
            .expect("should be able to acquire lock");

        assert!(acquired);
        assert_eq!(provider.value("lock:test"), Some(token));
        assert_eq!(provider.ttl("lock:test"), Some(Duration::from_secs(5)));
        assert_eq!(provider.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reject_already_locked() {
        let provider = MemoryProvider::new();
        let first = LockToken::new();

        assert!(
            provider
                .try_acquire("lock:test", &first, Duration::from_secs(5))
                .await
                .unwrap()
        );
        assert!(
            !provider
                .try_acquire("lock:test", &LockToken::new(), Duration::from_secs(5))
                .await
                .unwrap()
        );
        assert_eq!(provider.value("lock:test"), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn record_expires() {
        let provider = MemoryProvider::new();

        provider
            .try_acquire("lock:test", &LockToken::new(), Duration::from_secs(1))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        assert!(provider.value("lock:test").is_some());

        sleep(Duration::from_millis(1)).await;
        assert_eq!(provider.value("lock:test"), None);
        assert!(
            provider
                .try_acquire("lock:test", &LockToken::new(), Duration::from_secs(1))
                .await
                .unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_drops_expired_records() {
        let provider = MemoryProvider::new();

        for key in ["lock:a", "lock:b", "lock:c"] {
            provider
                .try_acquire(key, &LockToken::new(), Duration::from_secs(1))
                .await
                .unwrap();
        }
        provider
            .try_acquire("lock:long", &LockToken::new(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(provider.state().records.len(), 4);

        sleep(Duration::from_secs(2)).await;
        provider
            .try_acquire("lock:d", &LockToken::new(), Duration::from_secs(1))
            .await
            .unwrap();

        let mut keys: Vec<_> = provider.state().records.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["lock:d", "lock:long"]);
    }

    #[tokio::test(start_paused = true)]
    async fn renew_requires_matching_token() {
        let provider = MemoryProvider::new();
        let token = LockToken::new();

        provider
            .try_acquire("lock:test", &token, Duration::from_secs(1))
            .await
            .unwrap();
        sleep(Duration::from_millis(800)).await;

        assert!(
            !provider
                .renew("lock:test", &LockToken::new(), Duration::from_secs(1))
                .await
                .unwrap()
        );
        assert!(
            provider
                .renew("lock:test", &token, Duration::from_secs(1))
                .await
                .unwrap()
        );
        assert_eq!(provider.ttl("lock:test"), Some(Duration::from_secs(1)));

        sleep(Duration::from_millis(1001)).await;
        assert!(
            !provider
                .renew("lock:test", &token, Duration::from_secs(1))
                .await
                .unwrap()
        );
        assert_eq!(provider.value("lock:test"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn release_requires_matching_token() {
        let provider = MemoryProvider::new();
        let token = LockToken::new();

        provider
            .try_acquire("lock:test", &token, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(
            !provider
                .release("lock:test", &LockToken::new())
                .await
                .unwrap()
        );
        assert!(provider.release("lock:test", &token).await.unwrap());
        assert!(!provider.release("lock:test", &token).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_store_is_a_transport_error() {
        let provider = MemoryProvider::new();
        provider.set_unavailable(true);

        let result = provider
            .try_acquire("lock:test", &LockToken::new(), Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(LockError::Transport(_))));
        assert_eq!(provider.attempts(), 1);

        provider.set_unavailable(false);
        assert!(
            provider
                .try_acquire("lock:test", &LockToken::new(), Duration::from_secs(5))
                .await
                .unwrap()
        );
    }
}
