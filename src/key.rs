// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Prefix applied to every lock name before it reaches the store.
///
/// The prefix is concatenated as is, so it should carry its own separator
/// (`"lock:"` rather than `"lock"`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    pub const DEFAULT_PREFIX: &str = "lock:";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store key for the given lock name.
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_names() {
        let namespace = KeyNamespace::new("app:lock:");
        assert_eq!(namespace.key("job:42"), "app:lock:job:42");
        assert_eq!(namespace.prefix(), "app:lock:");
    }

    #[test]
    fn empty_prefix_is_identity() {
        assert_eq!(KeyNamespace::new("").key("job:42"), "job:42");
    }

    #[test]
    fn default_prefix() {
        assert_eq!(KeyNamespace::default().key("a"), "lock:a");
    }
}
