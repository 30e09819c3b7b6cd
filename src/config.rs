// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{path::Path, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{error::LockError, key::KeyNamespace};

/// Process wide lock defaults.
///
/// Every acquisition that does not override a value through
/// [AcquireOptions] falls back to the value configured here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LockConfig {
    /// Lease duration in milliseconds.
    pub lease_ms: u64,
    /// Retries after the first failed attempt.
    pub retry_times: u32,
    /// Wait between attempts in milliseconds.
    pub retry_interval_ms: u64,
    pub key_prefix: KeyNamespace,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: Self::DEFAULT_LEASE_MS,
            retry_times: Self::DEFAULT_RETRY_TIMES,
            retry_interval_ms: Self::DEFAULT_RETRY_INTERVAL_MS,
            key_prefix: KeyNamespace::default(),
        }
    }
}

impl LockConfig {
    pub const DEFAULT_LEASE_MS: u64 = 30_000;
    pub const DEFAULT_RETRY_TIMES: u32 = 3;
    pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 500;
    pub const ENV_PREFIX: &str = "LEASEHOLD";

    /// Load the configuration from built-in defaults, an optional file and
    /// `LEASEHOLD_*` environment variables, in increasing precedence.
    ///
    /// A missing file is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self, LockError> {
        let mut builder = config::Config::builder()
            .set_default("lease_ms", Self::DEFAULT_LEASE_MS)?
            .set_default("retry_times", Self::DEFAULT_RETRY_TIMES)?
            .set_default("retry_interval_ms", Self::DEFAULT_RETRY_INTERVAL_MS)?
            .set_default("key_prefix", KeyNamespace::DEFAULT_PREFIX)?;

        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(false));
        }

        let config: LockConfig = builder
            .add_source(config::Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if self.lease_ms == 0 {
            return Err(LockError::InvalidConfig(
                "lease_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Fill in whatever `options` leaves unset from the defaults.
    pub fn resolve(&self, options: &AcquireOptions) -> LockSettings {
        LockSettings {
            lease: options.lease.unwrap_or_else(|| self.lease()),
            retry_times: options.retry_times.unwrap_or(self.retry_times),
            retry_interval: options
                .retry_interval
                .unwrap_or_else(|| self.retry_interval()),
        }
    }
}

/// Per call overrides of the [LockConfig] defaults.
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    pub lease: Option<Duration>,
    pub retry_times: Option<u32>,
    pub retry_interval: Option<Duration>,
}

/// Fully resolved acquisition parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub lease: Duration,
    pub retry_times: u32,
    pub retry_interval: Duration,
}

impl LockSettings {
    pub fn attempts(&self) -> u32 {
        self.retry_times.saturating_add(1)
    }
}
