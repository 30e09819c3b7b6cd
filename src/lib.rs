// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! A lease based distributed lock with automatic lease renewal
//!
//! Leasehold uses a shared key-value store as the arbiter of mutually
//! exclusive access to a named resource. A lock is a record `key -> token`
//! created only if absent and carrying a time to live equal to the lease
//! duration. While the lock is held a background task extends that time to
//! live every half lease, so a critical section can outlast a single lease.
//! Renewal and release are only applied while the record still holds the
//! holder's token.
//!
//! # Examples
//!
//! You can let [LockService::with] manage the lock around a closure or manage
//! the lease yourself:
//!
//! ## Automatic
//! [LockService::with] will acquire, automatically renew, and release the lease.
//! ```rust,no_run
//! use leasehold::{LockConfig, LockService, RedisProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = RedisProvider::connect("redis://127.0.0.1/").await.unwrap();
//!     let service = LockService::builder()
//!         .provider(Arc::new(provider))
//!         .config(LockConfig::load(None).unwrap())
//!         .build();
//!
//!     let result = service.with("job:42", async |token| {
//!         // do synchronized work!
//!     }).await;
//! }
//! ```
//!
//! ## Manually
//! You are responsible for acquiring and releasing the lease. Renewal still
//! happens in the background until the lease is released or dropped.
//! ```rust,no_run
//! use leasehold::{AcquireOptions, LockService, RedisProvider};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = RedisProvider::connect("redis://127.0.0.1/").await.unwrap();
//!     let service = LockService::builder()
//!         .provider(Arc::new(provider))
//!         .build();
//!
//!     let options = AcquireOptions::builder()
//!         .lease(Duration::from_secs(2))
//!         .retry_times(3)
//!         .retry_interval(Duration::from_millis(100))
//!         .build();
//!
//!     if let Some(lease) = service.acquire_with("job:42", &options).await {
//!         // do synchronized work!
//!         service.release(lease).await;
//!     }
//! }
//! ```

use std::{sync::Arc, time::Duration};
pub mod config;
pub mod error;
pub mod guard;
pub mod key;
pub mod lease;
pub mod providers;
mod renewal;
pub mod token;

use bon::Builder;
use tokio::{
    select,
    sync::watch,
    time::{Instant, sleep},
};
use tracing::{debug, error, info, warn};

use crate::{error::LockError, renewal::RenewalTask};

pub use config::{AcquireOptions, LockConfig, LockSettings};
pub use guard::OnAcquisitionFailure;
pub use key::KeyNamespace;
pub use lease::LockLease;
pub use providers::{Provider, memory::MemoryProvider};
#[cfg(feature = "redis")]
pub use providers::redis::RedisProvider;
pub use token::LockToken;

#[derive(Builder)]
pub struct LockService<P>
where
    P: Provider,
{
    provider: Arc<P>,

    #[builder(default)]
    config: LockConfig,
}

impl<P> LockService<P>
where
    P: Provider,
{
    /// Attempt to acquire a lock using the configured defaults.
    ///
    /// Upon success a lease is returned that is renewed in the background
    /// until it is handed to [LockService::release].
    pub async fn acquire(&self, name: &str) -> Option<LockLease> {
        self.acquire_with(name, &AcquireOptions::default()).await
    }

    /// Attempt to acquire a lock, overriding any of the configured defaults.
    ///
    /// Makes `1 + retry_times` attempts at most, waiting `retry_interval`
    /// between them. Store failures count as failed attempts. The lease is
    /// rounded up to whole milliseconds, the resolution stores expire at.
    ///
    /// Dropping the returned future cancels the acquisition, but an attempt
    /// in flight may already have been applied by the store. That record has
    /// no holder and blocks other callers until its lease runs out.
    pub async fn acquire_with(&self, name: &str, options: &AcquireOptions) -> Option<LockLease> {
        self.try_acquire(name, self.config.resolve(options), None)
            .await
            .ok()
    }

    /// Like [LockService::acquire_with], but gives up as soon as `interrupt`
    /// turns `true` while waiting between attempts.
    ///
    /// The receiver is only observed, the caller still sees the interruption
    /// afterwards.
    pub async fn acquire_until(
        &self,
        name: &str,
        options: &AcquireOptions,
        interrupt: &watch::Receiver<bool>,
    ) -> Option<LockLease> {
        self.try_acquire(name, self.config.resolve(options), Some(interrupt.clone()))
            .await
            .ok()
    }

    /// Release a lock.
    ///
    /// Renewal is stopped before the record is deleted. Returns `true` only
    /// if the record still held this lease's token.
    pub async fn release(&self, mut lease: LockLease) -> bool {
        if let Some(renewal) = lease.take_renewal() {
            renewal.stop().await;
        }

        let start = Instant::now();
        match self.provider.release(lease.key(), lease.token()).await {
            Ok(true) => {
                info!(
                    key = lease.key(),
                    held_ms = millis(lease.held_for()),
                    elapsed_ms = millis(start.elapsed()),
                    "released lock"
                );
                true
            }
            Ok(false) => {
                let error = LockError::ReleaseMismatch {
                    key: lease.key().to_string(),
                };
                error!(%error, elapsed_ms = millis(start.elapsed()), "failed to release lock");
                false
            }
            Err(error) => {
                error!(key = lease.key(), %error, "failed to release lock");
                false
            }
        }
    }

    pub fn key_prefix(&self) -> &str {
        self.config.key_prefix.prefix()
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub(crate) async fn try_acquire(
        &self,
        name: &str,
        settings: LockSettings,
        mut interrupt: Option<watch::Receiver<bool>>,
    ) -> Result<LockLease, LockError> {
        let key = self.config.key_prefix.key(name);
        let lease = round_up_millis(settings.lease);
        if lease.is_zero() {
            let error = LockError::InvalidLease { key };
            warn!(%error, "not acquiring lock");
            return Err(error);
        }

        let start = Instant::now();
        let max_attempts = settings.attempts();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let token = LockToken::new();

            match self.provider.try_acquire(&key, &token, lease).await {
                Ok(true) => {
                    info!(
                        key = %key,
                        attempts,
                        elapsed_ms = millis(start.elapsed()),
                        "acquired lock"
                    );
                    let renewal = RenewalTask::spawn(
                        Arc::clone(&self.provider),
                        key.clone(),
                        token,
                        lease,
                    );
                    return Ok(LockLease::new(
                        name.to_string(),
                        key,
                        token,
                        lease,
                        renewal,
                    ));
                }
                Ok(false) => debug!(
                    key = %key,
                    attempts,
                    remaining = max_attempts - attempts,
                    "lock busy"
                ),
                Err(error) => warn!(key = %key, attempts, %error, "failed to set lock"),
            }

            if attempts >= max_attempts {
                let error = LockError::Exhausted { key, attempts };
                warn!(%error, elapsed_ms = millis(start.elapsed()), "giving up on lock");
                return Err(error);
            }

            if !pause(settings.retry_interval, interrupt.as_mut()).await {
                let error = LockError::Aborted { key };
                warn!(%error, attempts, elapsed_ms = millis(start.elapsed()), "giving up on lock");
                return Err(error);
            }
        }
    }
}

/// Wait `interval` before the next attempt. Returns `false` if the wait was
/// interrupted.
async fn pause(interval: Duration, interrupt: Option<&mut watch::Receiver<bool>>) -> bool {
    let Some(interrupt) = interrupt else {
        sleep(interval).await;
        return true;
    };

    if *interrupt.borrow() {
        return false;
    }

    let wait = sleep(interval);
    tokio::pin!(wait);

    let interrupted = select! {
        biased;
        result = interrupt.wait_for(|interrupted| *interrupted) => result.is_ok(),
        _ = &mut wait => return true,
    };
    if interrupted {
        return false;
    }

    // The sender is gone, nothing can interrupt this wait any more.
    wait.await;
    true
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn round_up_millis(duration: Duration) -> Duration {
    let truncated = Duration::from_millis(millis(duration));
    if truncated < duration {
        truncated.saturating_add(Duration::from_millis(1))
    } else {
        truncated
    }
}
