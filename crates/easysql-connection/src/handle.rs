//! Connection handles and the sources they are fetched from


use std::fmt;
use std::sync::Arc;

use easysql_core::{
    Connection, ConnectionSettings, DatabaseDriver, EasySqlError, QueryResult, Result, Value,
};

use crate::PoolRegistry;
use crate::pool::{ConnectionPool, Pool, close_detached};

/// How a facade obtains its connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    /// A fresh driver connection per operation, closed afterwards
    Direct,
    /// A caller supplied pool
    ExternalPool,
    /// A pool owned by a [`PoolRegistry`]
    ManagedPool,
}

/// Where connections come from
#[derive(Clone)]
pub enum ConnectionSource {
    Direct {
        driver: Arc<dyn DatabaseDriver>,
        settings: ConnectionSettings,
    },
    ExternalPool(Arc<dyn Pool>),
    ManagedPool(Arc<ConnectionPool>),
}

impl ConnectionSource {
    /// Pick the source described by the settings
    ///
    /// Settings asking for an internal pool resolve to the registry's shared
    /// pool for that configuration; all others connect directly.
    pub fn resolve(settings: &ConnectionSettings, registry: &PoolRegistry) -> Result<Self> {
        settings.validate()?;

        if settings.use_internal_pool() {
            return Ok(Self::ManagedPool(registry.get_or_create(settings)?));
        }

        Ok(Self::Direct {
            driver: registry.drivers().resolve(settings)?,
            settings: settings.clone(),
        })
    }

    pub fn mode(&self) -> ConnectionMode {
        match self {
            Self::Direct { .. } => ConnectionMode::Direct,
            Self::ExternalPool(_) => ConnectionMode::ExternalPool,
            Self::ManagedPool(_) => ConnectionMode::ManagedPool,
        }
    }

    /// The pool connections are borrowed from, if any
    pub fn pool(&self) -> Option<Arc<dyn Pool>> {
        match self {
            Self::Direct { .. } => None,
            Self::ExternalPool(pool) => Some(pool.clone()),
            Self::ManagedPool(pool) => Some(pool.clone()),
        }
    }
}

impl fmt::Debug for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { driver, settings } => f
                .debug_struct("Direct")
                .field("driver", &driver.name())
                .field("settings", settings)
                .finish(),
            Self::ExternalPool(_) => f.write_str("ExternalPool"),
            Self::ManagedPool(pool) => f.debug_tuple("ManagedPool").field(&pool.name()).finish(),
        }
    }
}

/// One acquired connection
///
/// A handle must be [released](ConnectionHandle::release) once the caller is
/// done with it: pooled connections go back to their pool and direct
/// connections are closed. Dropping an unreleased handle does the same
/// without waiting for a direct connection to finish closing.
pub struct ConnectionHandle {
    connection: Option<Arc<dyn Connection>>,
    /// Pool to return the connection to; `None` for direct connections
    pool: Option<Arc<dyn Pool>>,
}

impl ConnectionHandle {
    /// Obtain a connection from the source
    ///
    /// Every failure to produce a connection surfaces as an acquisition
    /// error; a pool that succeeds without a connection yields
    /// [`EasySqlError::NoConnection`].
    #[tracing::instrument(skip(source), fields(mode = ?source.mode()))]
    pub async fn fetch(source: &ConnectionSource) -> Result<Self> {
        match source {
            ConnectionSource::Direct { driver, settings } => {
                let connection = driver.connect(settings).await.map_err(|e| {
                    tracing::error!(error = %e, "failed to open direct connection");
                    into_acquisition(e)
                })?;
                Ok(Self {
                    connection: Some(connection),
                    pool: None,
                })
            }
            ConnectionSource::ExternalPool(pool) => Self::from_pool(pool.clone()).await,
            ConnectionSource::ManagedPool(pool) => Self::from_pool(pool.clone()).await,
        }
    }

    async fn from_pool(pool: Arc<dyn Pool>) -> Result<Self> {
        match pool.acquire().await {
            Ok(Some(connection)) => Ok(Self {
                connection: Some(connection),
                pool: Some(pool),
            }),
            Ok(None) => {
                tracing::error!("pool returned neither an error nor a connection");
                Err(EasySqlError::NoConnection)
            }
            Err(e) => Err(into_acquisition(e)),
        }
    }

    /// Run one statement on the held connection
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let connection = self
            .connection
            .as_ref()
            .ok_or(EasySqlError::HandleReleased)?;
        connection.query(sql, params).await
    }

    /// Give the connection back to where it came from
    ///
    /// Calling this again is a no-op (and a debug assertion failure).
    pub async fn release(&mut self) {
        debug_assert!(self.connection.is_some(), "connection handle released twice");
        let Some(connection) = self.connection.take() else {
            tracing::warn!("connection handle released twice; ignoring");
            return;
        };

        match &self.pool {
            Some(pool) => pool.release(connection),
            None => {
                if let Err(e) = connection.close().await {
                    tracing::warn!(error = %e, "failed to close direct connection");
                }
            }
        }
    }

    /// Whether the connection is borrowed from a pool
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.connection.is_none()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        tracing::debug!("releasing connection from dropped handle");
        match &self.pool {
            Some(pool) => pool.release(connection),
            None => close_detached(connection),
        }
    }
}

fn into_acquisition(err: EasySqlError) -> EasySqlError {
    if err.is_acquisition() {
        err
    } else {
        EasySqlError::acquisition(err)
    }
}
