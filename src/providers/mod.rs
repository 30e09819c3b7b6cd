// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{future::Future, time::Duration};

use crate::{error::LockError, token::LockToken};

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

/// `Provider` is a trait that abstracts the backend specific details of the
/// lease record store.
///
/// Every operation must be atomic on the store side. `Ok(false)` means the
/// condition did not hold (key present on acquire, token mismatch on renew
/// and release); `Err` is reserved for transport failures.
pub trait Provider: Send + Sync + 'static {
    /// Create `key -> token` with a time to live of `lease`, only if `key` is
    /// absent.
    fn try_acquire(
        &self,
        key: &str,
        token: &LockToken,
        lease: Duration,
    ) -> impl Future<Output = Result<bool, LockError>> + Send;

    /// Reset the time to live of `key` to `lease`, only if it still holds
    /// `token`.
    fn renew(
        &self,
        key: &str,
        token: &LockToken,
        lease: Duration,
    ) -> impl Future<Output = Result<bool, LockError>> + Send;

    /// Delete `key`, only if it still holds `token`.
    fn release(
        &self,
        key: &str,
        token: &LockToken,
    ) -> impl Future<Output = Result<bool, LockError>> + Send;
}
