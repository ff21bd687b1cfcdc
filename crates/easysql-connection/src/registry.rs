//! Registry of internally managed pools, keyed by connection configuration


use std::collections::HashMap;
use std::sync::Arc;

use easysql_core::{ConnectionSettings, Result};
use easysql_drivers::DriverRegistry;
use parking_lot::Mutex;

use crate::pool::{ConnectionPool, DriverConnectionFactory, PoolConfig};

/// Owns one [`ConnectionPool`] per distinct connection configuration
///
/// Settings with equal [`ConnectionSettings::canonical_key`] share a pool for
/// as long as the registry lives. The registry is an ordinary value: create
/// one per application (or per test) and pass it where facades are built.
pub struct PoolRegistry {
    drivers: Arc<DriverRegistry>,
    pools: Mutex<HashMap<String, Arc<ConnectionPool>>>,
}

impl PoolRegistry {
    /// Create a registry that opens connections through the given drivers
    pub fn new(drivers: Arc<DriverRegistry>) -> Self {
        Self {
            drivers,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry backed by every built-in driver
    pub fn with_default_drivers() -> Self {
        Self::new(Arc::new(DriverRegistry::with_defaults()))
    }

    /// Get the driver registry
    pub fn drivers(&self) -> &Arc<DriverRegistry> {
        &self.drivers
    }

    /// Return the pool for these settings, creating it on first use
    ///
    /// Concurrent first calls for the same configuration build exactly one
    /// pool. Creating a pool does not open any connection.
    #[tracing::instrument(skip(self, settings), fields(pool = %settings.pool_name()))]
    pub fn get_or_create(&self, settings: &ConnectionSettings) -> Result<Arc<ConnectionPool>> {
        settings.validate()?;
        let key = settings.canonical_key()?;

        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let driver = self.drivers.resolve(settings)?;
        let config = PoolConfig::from_settings(settings)?;
        let pool = Arc::new(ConnectionPool::new(
            settings.pool_name(),
            config,
            DriverConnectionFactory::new(driver, settings.clone()),
        ));
        pool.spawn_reaper();

        tracing::debug!(
            max_size = pool.config().max_size(),
            pools = pools.len() + 1,
            "registered managed pool"
        );
        pools.insert(key, pool.clone());
        Ok(pool)
    }

    /// Number of pools created so far
    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.lock().is_empty()
    }

    /// Whether a pool exists for these settings
    pub fn contains(&self, settings: &ConnectionSettings) -> bool {
        match settings.canonical_key() {
            Ok(key) => self.pools.lock().contains_key(&key),
            Err(_) => false,
        }
    }

    /// Close every pool and forget them
    ///
    /// Facades still holding a pool get acquisition errors afterwards; the
    /// next `get_or_create` starts a fresh pool.
    pub async fn shutdown(&self) {
        let pools: Vec<_> = {
            let mut pools = self.pools.lock();
            pools.drain().map(|(_, pool)| pool).collect()
        };

        tracing::debug!(pools = pools.len(), "shutting down pool registry");
        for pool in pools {
            pool.close().await;
        }
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::with_default_drivers()
    }
}
