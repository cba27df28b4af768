//! PostgreSQL and MySQL providers.
//!
//! Queries are sent to the database unchanged through a
//! `datafusion-table-providers` connection pool, so the database's own SQL
//! dialect applies. Results arrive as Arrow batches and keep the database's
//! column order.

#![cfg(any(feature = "postgres", feature = "mysql"))]

use super::engine::batches_to_rows;
use super::{DataProvider, Row};
use crate::error::{AqueductError, Result};
use crate::security::SecureString;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::physical_plan::SendableRecordBatchStream;
use datafusion_table_providers::sql::db_connection_pool::DbConnectionPool;
use datafusion_table_providers::util::secrets::to_secret_map;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(feature = "postgres")]
use datafusion_table_providers::sql::db_connection_pool::postgrespool::PostgresConnectionPool;

#[cfg(feature = "mysql")]
use datafusion_table_providers::sql::db_connection_pool::mysqlpool::MySQLConnectionPool;

fn query_failed(provider_type: &str, query: &str, e: impl fmt::Display) -> AqueductError {
    AqueductError::ProviderQuery {
        provider_type: provider_type.to_string(),
        query: query.to_string(),
        message: e.to_string(),
        source: None,
    }
}

fn pool_failed(provider_type: &str, e: impl fmt::Display) -> AqueductError {
    AqueductError::connection(
        provider_type,
        format!("Failed to create connection pool: {e}"),
    )
}

async fn collect_rows(
    provider_type: &str,
    query: &str,
    stream: SendableRecordBatchStream,
) -> Result<Vec<Row>> {
    let batches: Vec<RecordBatch> = stream
        .try_collect()
        .await
        .map_err(|e| AqueductError::query(provider_type, query, e))?;
    batches_to_rows(&batches).map_err(|e| AqueductError::query(provider_type, query, e))
}

/// Checks out a pooled connection and streams the query result.
///
/// Expands in place because each pool's connection and parameter types differ.
macro_rules! query_pool {
    ($pool:expr, $provider_type:expr, $query:expr) => {{
        let connection = $pool
            .connect()
            .await
            .map_err(|e| query_failed($provider_type, $query, e))?;
        let connection = connection.as_async().ok_or_else(|| {
            query_failed($provider_type, $query, "connection does not support async queries")
        })?;
        let stream = connection
            .query_arrow($query, &[], None)
            .await
            .map_err(|e| query_failed($provider_type, $query, e))?;
        collect_rows($provider_type, $query, stream).await
    }};
}

/// Settings for the `postgres` provider type.
#[cfg(feature = "postgres")]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: SecureString,
    #[serde(default)]
    pub sslmode: Option<String>,
}

#[cfg(feature = "postgres")]
fn default_postgres_port() -> u16 {
    5432
}

/// Provider running queries on a PostgreSQL database.
#[cfg(feature = "postgres")]
pub struct PostgresProvider {
    pool: Arc<PostgresConnectionPool>,
    host: String,
    database: String,
}

#[cfg(feature = "postgres")]
impl fmt::Debug for PostgresProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresProvider")
            .field("host", &self.host)
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(feature = "postgres")]
impl PostgresProvider {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "postgres";

    /// Opens a connection pool.
    #[instrument(skip(config), fields(host = %config.host, database = %config.database))]
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        let mut params = HashMap::new();
        params.insert("host".to_string(), config.host.clone());
        params.insert("port".to_string(), config.port.to_string());
        params.insert("db".to_string(), config.database.clone());
        params.insert("user".to_string(), config.user.clone());
        params.insert("pass".to_string(), config.password.expose().to_string());
        if let Some(ssl) = &config.sslmode {
            params.insert("sslmode".to_string(), ssl.clone());
        }

        let pool = PostgresConnectionPool::new(to_secret_map(params))
            .await
            .map_err(|e| pool_failed(Self::TYPE_NAME, e))?;
        debug!("Opened PostgreSQL connection pool");

        Ok(Self {
            pool: Arc::new(pool),
            host: config.host,
            database: config.database,
        })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl DataProvider for PostgresProvider {
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>> {
        query_pool!(self.pool, Self::TYPE_NAME, query)
    }

    fn provider_type(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> String {
        format!("PostgreSQL database '{}' on {}", self.database, self.host)
    }
}

/// Settings for the `mysql` provider type.
#[cfg(feature = "mysql")]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MySqlConfig {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: SecureString,
}

#[cfg(feature = "mysql")]
fn default_mysql_port() -> u16 {
    3306
}

/// Provider running queries on a MySQL database.
#[cfg(feature = "mysql")]
pub struct MySqlProvider {
    pool: Arc<MySQLConnectionPool>,
    host: String,
    database: String,
}

#[cfg(feature = "mysql")]
impl fmt::Debug for MySqlProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlProvider")
            .field("host", &self.host)
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(feature = "mysql")]
impl MySqlProvider {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "mysql";

    /// Opens a connection pool.
    #[instrument(skip(config), fields(host = %config.host, database = %config.database))]
    pub async fn connect(config: MySqlConfig) -> Result<Self> {
        let connection_string = format!(
            "mysql://{}:{}@{}:{}/{}",
            config.user,
            config.password.expose(),
            config.host,
            config.port,
            config.database
        );
        let mut params = HashMap::new();
        params.insert("connection_string".to_string(), connection_string);
        params.insert("sslmode".to_string(), "disabled".to_string());

        let pool = MySQLConnectionPool::new(to_secret_map(params))
            .await
            .map_err(|e| pool_failed(Self::TYPE_NAME, e))?;
        debug!("Opened MySQL connection pool");

        Ok(Self {
            pool: Arc::new(pool),
            host: config.host,
            database: config.database,
        })
    }
}

#[cfg(feature = "mysql")]
#[async_trait]
impl DataProvider for MySqlProvider {
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>> {
        query_pool!(self.pool, Self::TYPE_NAME, query)
    }

    fn provider_type(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> String {
        format!("MySQL database '{}' on {}", self.database, self.host)
    }
}
