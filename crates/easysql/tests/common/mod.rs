//! Shared helpers for the facade integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use easysql::{
    Connection, ConnectionSettings, DatabaseDriver, DriverRegistry, EasySqlError, Pool,
    PoolRegistry, QueryError, QueryResult, Result, Value,
};
use tempfile::TempDir;

/// Install a test-friendly tracing subscriber once per test binary
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A SQLite database file that lives as long as the returned directory
pub fn sqlite_settings() -> (TempDir, ConnectionSettings) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("widgets.db");
    let settings = ConnectionSettings::sqlite(path.to_str().expect("utf-8 temp path")).with_user("u");
    (dir, settings)
}

pub const CREATE_WIDGETS: &str =
    "CREATE TABLE IF NOT EXISTS widgets (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)";

/// Connection that records closes and fails statements starting with `BOGUS`
pub struct MockConnection {
    closed: AtomicBool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        if sql.starts_with("BOGUS") {
            return Err(QueryError::new("You have an error in your SQL syntax")
                .with_code(1064)
                .with_sql_state("42000")
                .into());
        }
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Driver that counts the connections it opens and closes
#[derive(Default)]
pub struct MockDriver {
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl MockDriver {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, _settings: &ConnectionSettings) -> Result<Arc<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            closed: AtomicBool::new(false),
            closes: self.closes.clone(),
        }))
    }

    fn build_connection_string(&self, _settings: &ConnectionSettings) -> String {
        "mock://".into()
    }
}

pub fn mock_registry() -> (PoolRegistry, Arc<MockDriver>) {
    let driver = Arc::new(MockDriver::default());
    let mut drivers = DriverRegistry::new();
    drivers.register(driver.clone());
    (PoolRegistry::new(Arc::new(drivers)), driver)
}

pub fn mock_settings() -> ConnectionSettings {
    ConnectionSettings::new("mock")
        .with_user("u")
        .with_database("d")
}

/// Caller-supplied pool that counts acquisitions and releases
pub struct CountingPool {
    hand_out: bool,
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl CountingPool {
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// A pool that answers without error but also without a connection
    pub fn empty() -> Arc<Self> {
        Self::build(false)
    }

    fn build(hand_out: bool) -> Arc<Self> {
        Arc::new(Self {
            hand_out,
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pool for CountingPool {
    async fn acquire(&self) -> Result<Option<Arc<dyn Connection>>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if !self.hand_out {
            return Ok(None);
        }
        Ok(Some(Arc::new(MockConnection {
            closed: AtomicBool::new(false),
            closes: self.closes.clone(),
        })))
    }

    fn release(&self, _connection: Arc<dyn Connection>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pool whose acquisitions always fail
pub struct ExhaustedPool;

#[async_trait]
impl Pool for ExhaustedPool {
    async fn acquire(&self) -> Result<Option<Arc<dyn Connection>>> {
        Err(EasySqlError::acquisition("Timed out waiting for connection"))
    }

    fn release(&self, _connection: Arc<dyn Connection>) {}
}
