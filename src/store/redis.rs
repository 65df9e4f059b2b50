//! Redis store backend based on the redis-rs crate.
//!
//! Uses the blocking connection API; every command is issued on the
//! calling thread.

use std::time::Duration;

use ::redis::{
    Client, Connection, ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo,
    RedisError,
};
use tracing::trace;

use super::{ConnectionParams, StoreBackend, StoreConnection};
use crate::error::StoreError;

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> Self {
        if error.is_connection_refusal() || error.is_connection_dropped() || error.is_timeout() {
            StoreError::Unavailable(error.to_string())
        } else {
            StoreError::Transport(Box::new(error))
        }
    }
}

/// Builds the client connection info for the given parameters.
///
/// Fields are set directly rather than through a URL, so passwords are
/// passed through byte for byte whatever characters they contain.
pub fn connection_info(params: &ConnectionParams) -> Result<ConnectionInfo, StoreError> {
    let mut redis = RedisConnectionInfo::default().set_db(params.db);
    if let Some(password) = &params.password {
        redis = redis.set_password(password);
    }
    Ok(ConnectionAddr::Tcp(params.host.clone(), params.port)
        .into_connection_info()?
        .set_redis_settings(redis))
}

/// `PX` argument for `ttl`: at least 1 ms, saturating at `u64::MAX`.
fn px_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

// == Redis Backend ==
/// Opens blocking connections to a Redis server.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisBackend;

impl RedisBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StoreBackend for RedisBackend {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn StoreConnection>, StoreError> {
        trace!("Opening redis connection to {}:{}", params.host, params.port);
        let client = Client::open(connection_info(params)?)?;
        let connection = client.get_connection_with_timeout(params.connect_timeout)?;
        Ok(Box::new(RedisConnection { connection }))
    }
}

struct RedisConnection {
    connection: Connection,
}

impl StoreConnection for RedisConnection {
    fn ping(&mut self) -> Result<(), StoreError> {
        let reply: String = ::redis::cmd("PING").query(&mut self.connection)?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("unexpected PING reply: {}", reply)))
        }
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(::redis::cmd("GET").arg(key).query(&mut self.connection)?)
    }

    fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        Ok(::redis::cmd("MGET").arg(keys).query(&mut self.connection)?)
    }

    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(px_millis(ttl));
        }
        cmd.query::<()>(&mut self.connection)?;
        Ok(())
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(::redis::cmd("DEL").arg(keys).query(&mut self.connection)?)
    }

    fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        Ok(::redis::cmd("KEYS").arg(pattern).query(&mut self.connection)?)
    }

    fn pttl(&mut self, key: &str) -> Result<i64, StoreError> {
        Ok(::redis::cmd("PTTL").arg(key).query(&mut self.connection)?)
    }
}
