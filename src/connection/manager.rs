//! Connection Manager
//!
//! Owns the single live store connection, tracks its state and restores it
//! with exponential backoff.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info};

use super::BackoffPolicy;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::store::{ConnectionParams, StoreBackend, StoreConnection};

/// Blocks the calling thread for the given duration.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

// == Connection State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

struct Inner {
    state: ConnectionState,
    connection: Option<Box<dyn StoreConnection>>,
}

// == Connection Manager ==
/// Exclusive owner of the store connection handle.
///
/// Higher layers borrow the handle for one operation at a time through
/// [`ConnectionManager::with_connection`]. Reconnect loops are serialised so
/// threads sharing a manager never reconnect concurrently.
pub struct ConnectionManager {
    config: Config,
    params: ConnectionParams,
    backend: Box<dyn StoreBackend>,
    backoff: BackoffPolicy,
    sleeper: Sleeper,
    inner: Mutex<Inner>,
    reconnecting: Mutex<()>,
}

impl ConnectionManager {
    // == Constructor ==
    /// Validates the configuration and performs the initial connect.
    ///
    /// A failed initial connect is logged, not returned: the manager starts
    /// in [`ConnectionState::Failed`] and callers degrade to direct computation.
    pub fn new(config: Config, backend: impl StoreBackend + 'static) -> Result<Self> {
        let manager = Self::disconnected(config, backend)?;
        manager.connect();
        Ok(manager)
    }

    /// Builds a manager without connecting.
    pub fn disconnected(config: Config, backend: impl StoreBackend + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            params: config.connection_params(),
            backoff: BackoffPolicy::new(config.max_sleep()),
            config,
            backend: Box::new(backend),
            sleeper: Arc::new(std::thread::sleep),
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                connection: None,
            }),
            reconnecting: Mutex::new(()),
        })
    }

    /// Replaces the function used to wait between reconnect attempts.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    // == Config ==
    /// The validated configuration the manager was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Backoff ==
    /// Delay schedule used between reconnect attempts.
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    // == State ==
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// True when a handle is held and the last interaction succeeded.
    pub fn is_connected(&self) -> bool {
        let inner = self.lock();
        inner.connection.is_some() && inner.state == ConnectionState::Connected
    }

    pub fn has_connection(&self) -> bool {
        self.lock().connection.is_some()
    }

    // == Connect ==
    /// Opens a fresh connection and verifies it with a ping.
    ///
    /// On failure the handle is dropped and the state becomes `Failed`.
    pub fn connect(&self) -> bool {
        self.lock().state = ConnectionState::Connecting;

        let opened = self.open();

        let mut inner = self.lock();
        match opened {
            Ok(connection) => {
                inner.connection = Some(connection);
                inner.state = ConnectionState::Connected;
                info!(
                    "Successfully connected to store at {}:{}",
                    self.params.host, self.params.port
                );
                true
            }
            Err(err) => {
                inner.connection = None;
                inner.state = ConnectionState::Failed;
                error!(
                    "Failed to create connection to store at {}:{}: {}",
                    self.params.host, self.params.port, err
                );
                false
            }
        }
    }

    /// Fresh connection from the backend, verified with a ping.
    fn open(&self) -> std::result::Result<Box<dyn StoreConnection>, StoreError> {
        let mut connection = self.backend.connect(&self.params)?;
        connection.ping()?;
        Ok(connection)
    }

    // == Ping ==
    /// Reports connection health. Never fails; faults are logged.
    ///
    /// When the held handle no longer answers, one fresh connection is
    /// tried in its place without any backoff sleep. A dropped connection
    /// stays dead even after the store comes back, so this is how a
    /// recovered store is picked up. Without a handle (initial connect
    /// failed) the result is false until [`reconnect`](Self::reconnect).
    pub fn ping(&self) -> bool {
        let mut inner = self.lock();
        let Some(connection) = inner.connection.as_mut() else {
            debug!("No store connection to ping");
            return false;
        };

        match connection.ping() {
            Ok(()) => {
                inner.state = ConnectionState::Connected;
                debug!("Able to ping store");
                true
            }
            Err(err) => {
                info!("Unable to ping store: {}", err);
                match self.open() {
                    Ok(fresh) => {
                        inner.connection = Some(fresh);
                        inner.state = ConnectionState::Connected;
                        info!(
                            "Re-established connection to store at {}:{}",
                            self.params.host, self.params.port
                        );
                        true
                    }
                    Err(err) => {
                        inner.state = ConnectionState::Disconnected;
                        debug!("Store still unreachable: {}", err);
                        false
                    }
                }
            }
        }
    }

    // == Reconnect ==
    /// Attempts to connect up to `retries` times (default `conn_retries`),
    /// sleeping `min(3^attempt, max_sleep)` after each failed attempt.
    ///
    /// Returns false once the attempts are exhausted.
    pub fn reconnect(&self, retries: Option<u32>) -> bool {
        let retries = retries.unwrap_or(self.config.conn_retries);
        let _guard = self
            .reconnecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        info!("Connecting to store");
        for attempt in 0..retries {
            if self.connect() {
                info!("Connected to store after {} attempt(s)", attempt + 1);
                return true;
            }
            self.wait(attempt);
        }
        error!("Giving up on store connection after {} attempt(s)", retries);
        false
    }

    // == Safe Reconnect ==
    /// Same schedule as [`reconnect`](Self::reconnect) but never gives up.
    pub fn safe_reconnect(&self) {
        let _guard = self
            .reconnecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        info!("Connecting to store");
        let mut attempt: u32 = 0;
        while !self.connect() {
            self.wait(attempt);
            attempt = attempt.saturating_add(1);
        }
        info!("Connected to store after {} attempt(s)", attempt + 1);
    }

    fn wait(&self, attempt: u32) {
        let delay = self.backoff.delay(attempt);
        info!("Connecting failed, retrying in {} seconds", delay.as_secs());
        (self.sleeper)(delay);
    }

    // == With Connection ==
    /// Runs one operation on the live handle.
    ///
    /// A failed operation marks the connection `Disconnected`; the next
    /// ping decides whether it has recovered.
    pub fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut dyn StoreConnection) -> std::result::Result<T, StoreError>,
    ) -> std::result::Result<T, StoreError> {
        let mut inner = self.lock();
        let connection = inner.connection.as_mut().ok_or(StoreError::NotConnected)?;
        let result = op(&mut **connection);
        if result.is_err() {
            inner.state = ConnectionState::Disconnected;
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("params", &self.params)
            .field("backoff", &self.backoff)
            .field("state", &self.state())
            .finish()
    }
}
