//! Tests for connection pool functionality

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use easysql_core::{Connection, ConnectionSettings, EasySqlError, QueryResult, Result, Value};
use pretty_assertions::assert_eq;

use super::config::PoolConfig;
use super::pool::{ConnectionFactory, ConnectionPool, Pool};
use super::stats::PoolStats;

/// Statement that makes a mock connection lose its session
const LOSE_SESSION: &str = "lose session";

/// Mock connection for testing
struct MockConnection {
    id: usize,
    closed: AtomicBool,
    close_fails: bool,
}

impl MockConnection {
    fn new(id: usize) -> Self {
        Self {
            id,
            closed: AtomicBool::new(false),
            close_fails: false,
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        if sql == LOSE_SESSION {
            self.closed.store(true, Ordering::SeqCst);
            return Err(EasySqlError::Connection("server has gone away".into()));
        }
        let mut result = QueryResult::empty();
        result.affected_rows = self.id as u64;
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            return Err(EasySqlError::Connection("close timed out".into()));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock factory that counts connections created
struct MockConnectionFactory {
    counter: AtomicUsize,
    failing: AtomicBool,
    close_fails: bool,
}

impl MockConnectionFactory {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            close_fails: false,
        }
    }

    /// Factory whose connections report an error when closed
    fn with_failing_close() -> Self {
        Self {
            close_fails: true,
            ..Self::new()
        }
    }

    fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EasySqlError::Connection("connection refused".into()));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            close_fails: self.close_fails,
            ..MockConnection::new(id)
        }))
    }
}

async fn acquire(pool: &ConnectionPool) -> Arc<dyn Connection> {
    pool.acquire()
        .await
        .expect("acquire connection")
        .expect("pool hands out a connection")
}

// =============================================================================
// PoolConfig tests
// =============================================================================

#[test]
fn test_pool_config_creation() {
    let config = PoolConfig::new(10);
    assert_eq!(config.max_size(), 10);
    assert_eq!(config.acquire_timeout(), Duration::from_millis(30_000));
    assert_eq!(config.idle_timeout(), Duration::from_millis(5_000));
}

#[test]
fn test_pool_config_with_timeouts() {
    let config = PoolConfig::new(5)
        .with_acquire_timeout_ms(5000)
        .with_idle_timeout_ms(60000);

    assert_eq!(config.acquire_timeout(), Duration::from_millis(5000));
    assert_eq!(config.idle_timeout(), Duration::from_millis(60000));
}

#[test]
fn test_pool_config_default() {
    assert_eq!(PoolConfig::default(), PoolConfig::new(10));
}

#[test]
#[should_panic(expected = "max_size must be greater than 0")]
fn test_pool_config_invalid_max_size() {
    PoolConfig::new(0);
}

#[test]
fn test_pool_config_from_settings() {
    let settings = ConnectionSettings::mysql()
        .with_user("u")
        .with_database("d")
        .with_pool_size(3)
        .with_idle_timeout_ms(250)
        .with_acquire_timeout_ms(1000);

    let config = PoolConfig::from_settings(&settings).expect("valid settings");
    assert_eq!(config.max_size(), 3);
    assert_eq!(config.idle_timeout(), Duration::from_millis(250));
    assert_eq!(config.acquire_timeout(), Duration::from_millis(1000));

    let err = PoolConfig::from_settings(&settings.with_pool_size(0)).unwrap_err();
    assert!(matches!(err, EasySqlError::Configuration(_)));
}

#[test]
fn test_pool_config_serialization() {
    let config = PoolConfig::new(4).with_acquire_timeout_ms(5000);

    let json = serde_json::to_string(&config).expect("serialize");
    let deserialized: PoolConfig = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(deserialized, config);
}

// =============================================================================
// PoolStats tests
// =============================================================================

#[test]
fn test_pool_stats_utilization() {
    let stats = PoolStats::new(10, 5, 5, 0);
    assert!((stats.utilization() - 0.5).abs() < 0.001);

    let empty_stats = PoolStats::default();
    assert!((empty_stats.utilization() - 0.0).abs() < 0.001);
}

// =============================================================================
// ConnectionPool tests
// =============================================================================

#[tokio::test]
async fn test_pool_acquire_connection() {
    let pool = ConnectionPool::new("mock_d", PoolConfig::new(5), MockConnectionFactory::new());

    let conn = acquire(&pool).await;
    assert_eq!(conn.driver_name(), "mock");

    let stats = pool.stats();
    assert_eq!(stats.active(), 1);
    assert_eq!(stats.idle(), 0);
    assert_eq!(stats.total(), 1);
    assert_eq!(pool.name(), "mock_d");
}

#[tokio::test]
async fn test_pool_release_reuses_connection() {
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = ConnectionPool::new("mock_d", PoolConfig::new(5), factory.clone());

    let conn = acquire(&pool).await;
    pool.release(conn);
    assert_eq!(pool.stats().active(), 0);
    assert_eq!(pool.stats().idle(), 1);

    let _conn = acquire(&pool).await;
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn test_pool_reuses_idle_connections_oldest_first() {
    let pool = ConnectionPool::new("mock_d", PoolConfig::new(5), MockConnectionFactory::new());

    let first = acquire(&pool).await;
    let second = acquire(&pool).await;
    pool.release(first.clone());
    pool.release(second);

    let reused = acquire(&pool).await;
    assert!(Arc::ptr_eq(&reused, &first));
}

#[tokio::test]
async fn test_pool_max_size_limit() {
    let config = PoolConfig::new(2).with_acquire_timeout_ms(100);
    let pool = ConnectionPool::new("mock_d", config, MockConnectionFactory::new());

    let conn1 = acquire(&pool).await;
    let conn2 = acquire(&pool).await;
    assert_eq!(pool.stats().active(), 2);

    let err = pool.acquire().await.err().expect("pool exhausted");
    assert!(err.is_acquisition());
    assert!(err.to_string().contains("Timed out"));
    assert_eq!(pool.stats().waiting(), 0);

    pool.release(conn1);
    pool.release(conn2);
}

#[tokio::test]
async fn test_pool_waiter_receives_released_connection() {
    let config = PoolConfig::new(1).with_acquire_timeout_ms(5_000);
    let pool = Arc::new(ConnectionPool::new(
        "mock_d",
        config,
        MockConnectionFactory::new(),
    ));

    let held = acquire(&pool).await;
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.stats().waiting(), 1);
    pool.release(held.clone());

    let handed_over = waiter
        .await
        .expect("waiter task")
        .expect("acquire")
        .expect("connection");
    assert!(Arc::ptr_eq(&handed_over, &held));
}

#[tokio::test]
async fn test_pool_factory_failure_does_not_leak_slots() {
    let factory = Arc::new(MockConnectionFactory::new());
    let config = PoolConfig::new(1).with_acquire_timeout_ms(100);
    let pool = ConnectionPool::new("mock_d", config, factory.clone());

    factory.set_failing(true);
    let err = pool.acquire().await.err().expect("factory fails");
    assert!(matches!(err, EasySqlError::Acquisition(_)));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(pool.stats().active(), 0);

    factory.set_failing(false);
    let _conn = acquire(&pool).await;
}

#[tokio::test]
async fn test_pool_release_of_closed_connection_frees_slot() {
    let factory = Arc::new(MockConnectionFactory::new());
    let config = PoolConfig::new(1).with_acquire_timeout_ms(100);
    let pool = ConnectionPool::new("mock_d", config, factory.clone());

    let conn = acquire(&pool).await;
    conn.close().await.expect("close");
    pool.release(conn);

    assert_eq!(pool.stats().idle(), 0);
    let _conn = acquire(&pool).await;
    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn test_pool_drops_connection_that_lost_its_session() {
    let factory = Arc::new(MockConnectionFactory::new());
    let config = PoolConfig::new(1).with_acquire_timeout_ms(100);
    let pool = ConnectionPool::new("mock_d", config, factory.clone());

    let conn = acquire(&pool).await;
    let err = conn.query(LOSE_SESSION, &[]).await.unwrap_err();
    assert!(matches!(err, EasySqlError::Connection(_)));
    pool.release(conn);
    assert_eq!(pool.stats().idle(), 0);

    let fresh = acquire(&pool).await;
    assert!(!fresh.is_closed());
    assert_eq!(factory.count(), 2);
    fresh.query("select 1", &[]).await.expect("fresh session works");
}

#[tokio::test]
async fn test_pool_ignores_release_without_acquire() {
    let config = PoolConfig::new(1).with_acquire_timeout_ms(100);
    let pool = ConnectionPool::new("mock_d", config, MockConnectionFactory::new());

    pool.release(Arc::new(MockConnection::new(99)));
    assert_eq!(pool.stats(), PoolStats::default());

    // Capacity is still one connection
    let _conn = acquire(&pool).await;
    assert!(pool.acquire().await.is_err());
}

#[tokio::test]
async fn test_pool_skips_expired_idle_connections() {
    let factory = Arc::new(MockConnectionFactory::new());
    let config = PoolConfig::new(2).with_idle_timeout_ms(20);
    let pool = ConnectionPool::new("mock_d", config, factory.clone());

    let stale = acquire(&pool).await;
    pool.release(stale.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;

    let fresh = acquire(&pool).await;
    assert!(!Arc::ptr_eq(&fresh, &stale));
    assert!(stale.is_closed());
    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn test_pool_evict_idle() {
    let config = PoolConfig::new(3).with_idle_timeout_ms(20);
    let pool = ConnectionPool::new("mock_d", config, MockConnectionFactory::new());

    let a = acquire(&pool).await;
    let b = acquire(&pool).await;
    pool.release(a.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;
    pool.release(b.clone());

    assert_eq!(pool.evict_idle().await, 1);
    assert!(a.is_closed());
    assert!(!b.is_closed());
    assert_eq!(pool.stats().idle(), 1);
}

#[tokio::test]
async fn test_pool_reaper_closes_idle_connections() {
    let config = PoolConfig::new(2).with_idle_timeout_ms(50);
    let pool = Arc::new(ConnectionPool::new(
        "mock_d",
        config,
        MockConnectionFactory::new(),
    ));
    let reaper = pool.spawn_reaper().expect("inside a runtime");

    let conn = acquire(&pool).await;
    pool.release(conn.clone());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(conn.is_closed());
    assert_eq!(pool.stats().idle(), 0);

    drop(pool);
    tokio::time::timeout(Duration::from_secs(1), reaper)
        .await
        .expect("reaper stops once the pool is gone")
        .expect("reaper task");
}

#[tokio::test]
async fn test_pool_close_idle() {
    let pool = ConnectionPool::new("mock_d", PoolConfig::new(5), MockConnectionFactory::new());

    let conn1 = acquire(&pool).await;
    let conn2 = acquire(&pool).await;
    pool.release(conn1.clone());
    pool.release(conn2);
    assert_eq!(pool.stats().idle(), 2);

    pool.close_idle().await;
    assert_eq!(pool.stats().idle(), 0);
    assert!(conn1.is_closed());
}

/// Counts WARN events
#[derive(Clone, Default)]
struct Warnings(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Warnings {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_pool_logs_failed_closes() {
    use tracing_subscriber::layer::SubscriberExt;

    let warnings = Warnings::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(warnings.clone()));

    let config = PoolConfig::new(2).with_idle_timeout_ms(10);
    let pool = ConnectionPool::new("mock_d", config, MockConnectionFactory::with_failing_close());

    let first = acquire(&pool).await;
    let second = acquire(&pool).await;
    pool.release(first);
    tokio::time::sleep(Duration::from_millis(30)).await;
    pool.release(second);

    assert_eq!(pool.evict_idle().await, 1);
    pool.close_idle().await;

    assert_eq!(pool.stats().idle(), 0);
    assert_eq!(warnings.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_closed_pool_rejects_acquire_and_closes_returns() {
    let pool = ConnectionPool::new("mock_d", PoolConfig::new(5), MockConnectionFactory::new());

    let checked_out = acquire(&pool).await;
    pool.close().await;
    assert!(pool.is_closed());

    let err = pool.acquire().await.err().expect("closed pool");
    assert!(err.is_acquisition());
    assert!(err.to_string().contains("closed"));

    pool.release(checked_out.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(checked_out.is_closed());
    assert_eq!(pool.stats().total(), 0);
}
