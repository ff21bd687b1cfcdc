//! Connection pool implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use easysql_core::{Connection, ConnectionSettings, DatabaseDriver, EasySqlError, Result};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Shortest interval between two idle sweeps of the reaper task
const MIN_REAPER_PERIOD: Duration = Duration::from_millis(50);

/// A source of reusable connections
///
/// Every connection returned by [`Pool::acquire`] is handed back exactly once
/// through [`Pool::release`]. `Ok(None)` means the pool reported no error but
/// had no connection to give; callers treat that as an acquisition failure.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Check a connection out of the pool
    async fn acquire(&self) -> Result<Option<Arc<dyn Connection>>>;

    /// Give a connection back to the pool
    fn release(&self, connection: Arc<dyn Connection>);
}

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Validate that a connection is still usable
    ///
    /// Default implementation only checks that it has not been closed.
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}

/// Opens pool connections through a database driver
pub struct DriverConnectionFactory {
    driver: Arc<dyn DatabaseDriver>,
    settings: ConnectionSettings,
}

impl DriverConnectionFactory {
    pub fn new(driver: Arc<dyn DatabaseDriver>, settings: ConnectionSettings) -> Self {
        Self { driver, settings }
    }
}

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        self.driver.connect(&self.settings).await
    }
}

/// An idle connection and the moment it was last handed back
struct IdleConnection {
    connection: Arc<dyn Connection>,
    returned_at: Instant,
}

impl IdleConnection {
    fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            returned_at: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.returned_at.elapsed() > idle_timeout
    }
}

/// A connection pool that manages a set of database connections
///
/// At most `max_size` connections are checked out at once. Released
/// connections wait in an idle queue and are reused oldest first; idle
/// connections past the idle timeout are closed instead of reused.
pub struct ConnectionPool {
    /// Human readable name used in log fields
    name: String,
    /// Pool configuration
    config: PoolConfig,
    /// Connection factory
    factory: Arc<dyn ConnectionFactory>,
    /// Available idle connections
    idle: Mutex<VecDeque<IdleConnection>>,
    /// One permit per connection that may still be checked out
    semaphore: Semaphore,
    /// Number of active connections (borrowed from pool)
    active_count: AtomicUsize,
    /// Number of requests waiting for a connection
    waiting_count: AtomicUsize,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(name: impl Into<String>, config: PoolConfig, factory: F) -> Self {
        let name = name.into();
        tracing::debug!(pool = %name, max_size = config.max_size(), "creating connection pool");
        Self {
            name,
            semaphore: Semaphore::new(config.max_size()),
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Wait (up to the acquire timeout) until fewer than `max_size`
    ///    connections are checked out
    /// 2. Reuse the oldest idle connection that is still fresh and valid
    /// 3. Otherwise open a new connection through the factory
    async fn checkout(&self) -> Result<Arc<dyn Connection>> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);

        let result = tokio::time::timeout(self.config.acquire_timeout(), async {
            let permit = self.semaphore.acquire().await.map_err(|_| {
                EasySqlError::Acquisition(format!("Pool '{}' is closed", self.name))
            })?;

            let connection = match self.try_get_idle().await {
                Some(conn) => conn,
                // A failed create drops the permit, so the slot stays free
                None => self
                    .factory
                    .create()
                    .await
                    .map_err(EasySqlError::acquisition)?,
            };

            // The slot now belongs to the caller until `release`
            permit.forget();
            self.active_count.fetch_add(1, Ordering::SeqCst);
            Ok(connection)
        })
        .await;

        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(conn) => conn,
            Err(_) => Err(EasySqlError::Acquisition(format!(
                "Timed out waiting for connection from pool '{}' (timeout: {:?})",
                self.name,
                self.config.acquire_timeout()
            ))),
        }
    }

    /// Try to get an idle connection, skipping stale or invalid ones
    async fn try_get_idle(&self) -> Option<Arc<dyn Connection>> {
        loop {
            let pooled = { self.idle.lock().pop_front() };
            let inner = pooled?;

            if inner.is_expired(self.config.idle_timeout()) {
                tracing::debug!(pool = %self.name, "discarding expired idle connection");
                self.discard(inner.connection).await;
                continue;
            }

            if !self.factory.validate(&*inner.connection).await {
                tracing::debug!(pool = %self.name, "discarding invalid idle connection");
                self.discard(inner.connection).await;
                continue;
            }

            return Some(inner.connection);
        }
    }

    /// Return a connection to the pool
    fn return_connection(&self, connection: Arc<dyn Connection>) {
        let outstanding = self
            .active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if outstanding.is_err() {
            tracing::warn!(pool = %self.name, "ignoring release of a connection that was not checked out");
            return;
        }

        if self.closed.load(Ordering::SeqCst) {
            close_detached(connection);
            return;
        }

        // Closed connections only give their slot back
        if !connection.is_closed() {
            self.idle.lock().push_back(IdleConnection::new(connection));
        }
        self.semaphore.add_permits(1);
    }

    /// Close idle connections that have outlived the idle timeout
    ///
    /// Returns the number of connections closed.
    pub async fn evict_idle(&self) -> usize {
        let expired: Vec<_> = {
            let mut idle = self.idle.lock();
            let (expired, fresh): (VecDeque<_>, VecDeque<_>) = idle
                .drain(..)
                .partition(|inner| inner.is_expired(self.config.idle_timeout()));
            *idle = fresh;
            expired.into_iter().collect()
        };

        let count = expired.len();
        for inner in expired {
            self.discard(inner.connection).await;
        }
        if count > 0 {
            tracing::debug!(pool = %self.name, evicted = count, "evicted idle connections");
        }
        count
    }

    /// Periodically evict idle connections on the current tokio runtime
    ///
    /// The task holds only a weak reference and stops once the pool is
    /// dropped or closed. Returns `None` when called outside a runtime.
    pub fn spawn_reaper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let pool: Weak<Self> = Arc::downgrade(self);
        let period = self.config.idle_timeout().max(MIN_REAPER_PERIOD);

        Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                if pool.is_closed() {
                    break;
                }
                pool.evict_idle().await;
            }
        }))
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let active = self.active_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(idle + active, idle, active, waiting)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close all idle connections in the pool
    pub async fn close_idle(&self) {
        let connections: Vec<_> = {
            let mut idle = self.idle.lock();
            idle.drain(..).collect()
        };

        for inner in connections {
            self.discard(inner.connection).await;
        }
    }

    /// Close a connection that is leaving the pool
    async fn discard(&self, connection: Arc<dyn Connection>) {
        if let Err(e) = connection.close().await {
            tracing::warn!(pool = %self.name, error = %e, "failed to close connection");
        }
    }

    /// Stop handing out connections and close the idle ones
    ///
    /// Pending and future acquisitions fail; connections still checked out
    /// are closed when they are released.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(pool = %self.name, "closing connection pool");
        self.semaphore.close();
        self.close_idle().await;
    }
}

#[async_trait]
impl Pool for ConnectionPool {
    #[tracing::instrument(skip(self), fields(pool = %self.name))]
    async fn acquire(&self) -> Result<Option<Arc<dyn Connection>>> {
        let connection = self.checkout().await?;
        tracing::debug!("acquired pooled connection");
        Ok(Some(connection))
    }

    fn release(&self, connection: Arc<dyn Connection>) {
        tracing::debug!(pool = %self.name, "releasing pooled connection");
        self.return_connection(connection);
    }
}

/// Close a connection from synchronous code
///
/// Outside a tokio runtime the connection is simply dropped, which lets the
/// driver tear it down.
pub(crate) fn close_detached(connection: Arc<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(e) = connection.close().await {
                    tracing::warn!(error = %e, "failed to close connection");
                }
            });
        }
        Err(_) => drop(connection),
    }
}
