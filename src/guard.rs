// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use tracing::{debug, warn};

use crate::{
    LockService, config::AcquireOptions, error::LockError, providers::Provider, token::LockToken,
};

/// What [LockService::with_options] does when the lock is not free.
///
/// The closure is never run when the lock cannot be acquired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OnAcquisitionFailure<R> {
    /// Retry as configured, then return the acquisition error.
    #[default]
    Retry,
    /// Give up after a single attempt and return the acquisition error.
    ///
    /// The configured `retry_times` is ignored.
    Abort,
    /// Retry as configured, then return the given value.
    Fallback(R),
}

impl<R> OnAcquisitionFailure<R> {
    fn retries(&self) -> bool {
        !matches!(self, Self::Abort)
    }
}

impl<P> LockService<P>
where
    P: Provider,
{
    /// Execute a closure while holding the lock, using the configured defaults.
    ///
    /// See [LockService::with_options].
    pub async fn with<R>(
        &self,
        name: &str,
        f: impl AsyncFnOnce(&LockToken) -> R,
    ) -> Result<R, LockError> {
        self.with_options(name, &AcquireOptions::default(), OnAcquisitionFailure::Retry, f)
            .await
    }

    /// Execute a closure while holding the lock.
    ///
    /// The closure will be only called after the lock has been acquired and is
    /// given the token of the current lease. The lease is renewed in the
    /// background while the closure runs and released once it returns. A
    /// failed release is logged; the closure's result is returned regardless.
    ///
    /// <div class="warning">
    /// If the closure panics the lease is not released. Renewal stops and the
    /// record expires once the lease duration elapses.
    /// </div>
    ///
    pub async fn with_options<R>(
        &self,
        name: &str,
        options: &AcquireOptions,
        on_failure: OnAcquisitionFailure<R>,
        f: impl AsyncFnOnce(&LockToken) -> R,
    ) -> Result<R, LockError> {
        let mut settings = self.config().resolve(options);
        if !on_failure.retries() {
            settings.retry_times = 0;
        }

        let lease = match self.try_acquire(name, settings, None).await {
            Ok(lease) => lease,
            Err(error) => {
                return match on_failure {
                    OnAcquisitionFailure::Retry | OnAcquisitionFailure::Abort => Err(error),
                    OnAcquisitionFailure::Fallback(value) => {
                        debug!(%error, "lock not acquired, returning fallback");
                        Ok(value)
                    }
                };
            }
        };

        let result = f(lease.token()).await;

        let key = lease.key().to_string();
        if !self.release(lease).await {
            warn!(key = %key, "guarded call completed but its lock was not released");
        }

        Ok(result)
    }
}
