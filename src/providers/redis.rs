// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{sync::LazyLock, time::Duration};

use ::redis::{Client, Script, aio::ConnectionManager};
use bon::Builder;
use tracing::debug;

use crate::{error::LockError, millis, providers::Provider, token::LockToken};

/// Extends the time to live only while the key still holds the caller's token.
static RENEW_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#,
    )
});

/// Deletes the key only while it still holds the caller's token.
static RELEASE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#,
    )
});

/// [Redis](::redis) provider for [LockService](crate::LockService) implementation
#[derive(Builder, Clone)]
pub struct RedisProvider {
    connection: ConnectionManager,
}

impl RedisProvider {
    /// Connect to the Redis server at `url`.
    ///
    /// The connection is established eagerly, an unreachable server fails
    /// here rather than on the first lock operation.
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(LockError::transport)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(LockError::transport)?;
        debug!(url, "connected to redis");
        Ok(Self { connection })
    }
}

impl std::fmt::Debug for RedisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisProvider").finish_non_exhaustive()
    }
}

impl Provider for RedisProvider {
    async fn try_acquire(
        &self,
        key: &str,
        token: &LockToken,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let mut connection = self.connection.clone();
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(key)
            .arg(token.to_string())
            .arg("NX")
            .arg("PX")
            .arg(millis(lease))
            .query_async(&mut connection)
            .await
            .map_err(LockError::transport)?;
        Ok(reply.is_some())
    }

    async fn renew(
        &self,
        key: &str,
        token: &LockToken,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let mut connection = self.connection.clone();
        let renewed: i64 = RENEW_SCRIPT
            .key(key)
            .arg(token.to_string())
            .arg(millis(lease))
            .invoke_async(&mut connection)
            .await
            .map_err(LockError::transport)?;
        Ok(renewed > 0)
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        let mut connection = self.connection.clone();
        let deleted: i64 = RELEASE_SCRIPT
            .key(key)
            .arg(token.to_string())
            .invoke_async(&mut connection)
            .await
            .map_err(LockError::transport)?;
        Ok(deleted > 0)
    }
}
