// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use rcache_store::{AtomicWrite, Error, Store};
use redis::{Client, RedisError, Script, aio::ConnectionManager};

use crate::script::{ATOMIC_WRITE_KEYS, ATOMIC_WRITE_SOURCE};

/// A [`Store`] backed by a Redis server.
///
/// The atomic write protocol runs as a Lua script registered once per store value; its
/// hash is computed at construction and reused by every write. Single writes go through
/// `EVALSHA` with an automatic `SCRIPT LOAD` fallback. Batched writes prepend `SCRIPT LOAD`
/// to the pipeline so the script is present within the same round trip.
///
/// Cloning is cheap: clones share the multiplexed connection, which reconnects on its own
/// after the server goes away.
///
/// # Examples
///
/// ```no_run
/// use rcache_redis::RedisStore;
/// use rcache_store::{AtomicWrite, Store};
/// # async fn example() -> Result<(), rcache_store::Error> {
///
/// let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
/// store.write(&AtomicWrite::new("rc:ns:a", "rc:ns:keys", b"1".to_vec()).with_limit(100)).await?;
/// assert_eq!(store.get("rc:ns:a").await?, Some(b"1".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    script: Arc<Script>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("script", &self.script.get_hash())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the url is malformed or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = Client::open(url).map_err(classify)?;
        Self::from_client(client).await
    }

    /// Opens a managed connection from an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn from_client(client: Client) -> Result<Self, Error> {
        let connection = ConnectionManager::new(client).await.map_err(classify)?;
        Ok(Self::new(connection))
    }

    /// Wraps an established connection manager.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            script: Arc::new(Script::new(ATOMIC_WRITE_SOURCE)),
        }
    }

    /// The SHA1 digest the write script is invoked by.
    #[must_use]
    pub fn script_hash(&self) -> &str {
        self.script.get_hash()
    }
}

impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut connection = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut connection)
            .await
            .map_err(classify)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        redis::cmd("MGET")
            .arg(keys)
            .query_async::<Vec<Option<Vec<u8>>>>(&mut connection)
            .await
            .map_err(classify)
    }

    async fn write(&self, write: &AtomicWrite) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        self.script
            .key(write.key())
            .key(write.tracking_key())
            .arg(write.value())
            .arg(write.ttl_millis())
            .arg(write.limit())
            .invoke_async::<()>(&mut connection)
            .await
            .map_err(classify)
    }

    async fn write_batch(&self, writes: &[AtomicWrite]) -> Result<(), Error> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.cmd("SCRIPT").arg("LOAD").arg(ATOMIC_WRITE_SOURCE).ignore();
        for write in writes {
            pipe.cmd("EVALSHA")
                .arg(self.script.get_hash())
                .arg(ATOMIC_WRITE_KEYS)
                .arg(write.key())
                .arg(write.tracking_key())
                .arg(write.value())
                .arg(write.ttl_millis())
                .arg(write.limit())
                .ignore();
        }

        let mut connection = self.connection.clone();
        pipe.query_async::<()>(&mut connection).await.map_err(classify)
    }

    async fn remove(&self, key: &str, tracking_key: Option<&str>) -> Result<(), Error> {
        let mut pipe = redis::pipe();
        pipe.cmd("DEL").arg(key).ignore();
        if let Some(tracking_key) = tracking_key {
            pipe.cmd("ZREM").arg(tracking_key).arg(key).ignore();
        }

        let mut connection = self.connection.clone();
        pipe.query_async::<()>(&mut connection).await.map_err(classify)
    }

    async fn tracked_keys(&self, tracking_key: &str) -> Result<Vec<String>, Error> {
        let mut connection = self.connection.clone();
        redis::cmd("ZRANGE")
            .arg(tracking_key)
            .arg(0)
            .arg(-1)
            .query_async::<Vec<String>>(&mut connection)
            .await
            .map_err(classify)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut connection = self.connection.clone();
        redis::cmd("DEL")
            .arg(keys)
            .query_async::<()>(&mut connection)
            .await
            .map_err(classify)
    }
}

/// Maps a Redis error onto the store error taxonomy.
///
/// Anything that means the server could not be talked to is a connection error;
/// replies the server did send, including script errors, are command errors.
pub(crate) fn classify(error: RedisError) -> Error {
    if error.is_io_error() || error.is_connection_refusal() || error.is_connection_dropped() || error.is_timeout() {
        Error::connection(error)
    } else {
        Error::command(error)
    }
}
