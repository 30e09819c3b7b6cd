// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::{renewal::RenewalTask, token::LockToken};

/// A held lock.
///
/// Returned by a successful acquisition and consumed by
/// [LockService::release](crate::LockService::release). While the lease is
/// alive a background task keeps extending its record in the store.
///
/// Dropping a lease without releasing it stops the renewal; the record then
/// expires on its own once the lease duration elapses.
#[derive(Debug)]
pub struct LockLease {
    name: String,
    key: String,
    token: LockToken,
    duration: Duration,
    acquired_at: Instant,
    renewal: Option<RenewalTask>,
}

impl LockLease {
    pub(crate) fn new(
        name: String,
        key: String,
        token: LockToken,
        duration: Duration,
        renewal: RenewalTask,
    ) -> Self {
        Self {
            name,
            key,
            token,
            duration,
            acquired_at: Instant::now(),
            renewal: Some(renewal),
        }
    }

    /// Lock name as given by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespaced store key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time since the lock was acquired.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub(crate) fn take_renewal(&mut self) -> Option<RenewalTask> {
        self.renewal.take()
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        if let Some(renewal) = self.renewal.take() {
            warn!(key = %self.key, "lease dropped without release, letting it expire");
            renewal.abort();
        }
    }
}
