// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::error::Error;

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum LockError {
    #[error("failed to acquire lock {key} after {attempts} attempts")]
    Exhausted { key: String, attempts: u32 },

    #[error("acquisition of lock {key} interrupted")]
    Aborted { key: String },

    #[error("store error: {0}")]
    Transport(Box<dyn Error + Send + Sync>),

    #[error("lock {key} is no longer held by this lease")]
    ReleaseMismatch { key: String },

    #[error("lease duration for lock {key} must be positive")]
    InvalidLease { key: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LockError {
    pub fn transport(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(error))
    }
}
