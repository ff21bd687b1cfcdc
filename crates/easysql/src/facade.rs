//! The query facade

use std::sync::Arc;

use easysql_connection::{
    ConnectionHandle, ConnectionMode, ConnectionPool, ConnectionSource, Pool, PoolRegistry,
};
use easysql_core::{ConnectionSettings, QueryLogging, QueryResult, Result, Row};

use crate::Params;

/// Runs statements with connections from one source
///
/// Each call fetches its own connection and gives it back before returning,
/// on success and on failure alike. Instances are cheap to clone; clones
/// share the same source.
#[derive(Debug, Clone)]
pub struct EasySql {
    source: ConnectionSource,
    logging: Option<QueryLogging>,
}

impl EasySql {
    /// Build a facade from settings
    ///
    /// Settings with `use_internal_pool` borrow connections from the
    /// registry's shared pool for that configuration; all others open and
    /// close one connection per call.
    pub fn connect(registry: &PoolRegistry, settings: &ConnectionSettings) -> Result<Self> {
        let source = ConnectionSource::resolve(settings, registry)?;
        tracing::debug!(mode = ?source.mode(), "created query facade");
        Ok(Self {
            source,
            logging: settings.logging().copied(),
        })
    }

    /// Build a facade over a caller-supplied pool
    pub fn connect_with_pool(pool: Arc<dyn Pool>) -> Self {
        Self::from_source(ConnectionSource::ExternalPool(pool))
    }

    /// Build a facade over the registry's managed pool for these settings
    ///
    /// The caller's settings are left untouched.
    pub fn connect_with_internal_pool(
        registry: &PoolRegistry,
        settings: &ConnectionSettings,
    ) -> Result<Self> {
        Self::connect(registry, &settings.clone().with_internal_pool(true))
    }

    pub fn from_source(source: ConnectionSource) -> Self {
        Self {
            source,
            logging: None,
        }
    }

    /// Log every failed query at the given level
    pub fn with_logging(mut self, logging: QueryLogging) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn mode(&self) -> ConnectionMode {
        self.source.mode()
    }

    /// The managed pool, when connections come from a [`PoolRegistry`]
    pub fn pool(&self) -> Option<&Arc<ConnectionPool>> {
        match &self.source {
            ConnectionSource::ManagedPool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn source(&self) -> &ConnectionSource {
        &self.source
    }

    /// Run a statement and return its full result
    ///
    /// Database errors are returned as they came from the driver.
    #[tracing::instrument(skip(self, sql, params), fields(mode = ?self.mode(), sql_preview = %sql.chars().take(100).collect::<String>()))]
    pub async fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<QueryResult> {
        let params = params.into();
        let mut handle = ConnectionHandle::fetch(&self.source).await?;

        let result = handle.query(sql, params.as_slice()).await;
        handle.release().await;

        if let Err(e) = &result
            && let Some(logging) = &self.logging
        {
            logging.log_failure(sql, e);
        }
        result
    }

    /// First row of the result, or `None` when there are no rows
    #[doc(alias = "getOne")]
    pub async fn get_one(&self, sql: &str, params: impl Into<Params>) -> Result<Option<Row>> {
        let result = self.execute(sql, params).await?;
        Ok(result.into_rows().into_iter().next())
    }

    /// All rows in the order the database returned them
    #[doc(alias = "getAll")]
    pub async fn get_all(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        Ok(self.execute(sql, params).await?.into_rows())
    }
}
