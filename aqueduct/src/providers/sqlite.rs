//! SQLite provider backed by a single `rusqlite` connection.

use super::{DataProvider, Row};
use crate::error::{AqueductError, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::sync::Mutex;
use tracing::{debug, instrument};

const IN_MEMORY: &str = ":memory:";

/// Settings for the `sqlite` provider type.
///
/// ```yaml
/// providers:
///   - name: local
///     type: sqlite
///     config:
///       path: ":memory:"
///       init: |
///         CREATE TABLE users (id INTEGER, email TEXT);
///         INSERT INTO users VALUES (1, 'a@example.com');
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteConfig {
    /// Database file path, or `:memory:`
    #[serde(default = "default_path")]
    pub path: String,
    /// SQL batch executed once right after the connection opens
    #[serde(default)]
    pub init: Option<String>,
}

fn default_path() -> String {
    IN_MEMORY.to_string()
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            init: None,
        }
    }
}

/// A provider holding one SQLite connection.
#[derive(Debug)]
pub struct SqliteProvider {
    path: String,
    conn: Mutex<Connection>,
}

impl SqliteProvider {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "sqlite";

    /// Opens the database and runs the optional `init` batch.
    #[instrument(skip(config), fields(path = %config.path))]
    pub fn open(config: SqliteConfig) -> Result<Self> {
        let conn = if config.path == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(|e| AqueductError::connection_with_source(Self::TYPE_NAME, e))?;

        if let Some(init) = &config.init {
            conn.execute_batch(init).map_err(|e| AqueductError::ProviderConnection {
                provider_type: Self::TYPE_NAME.to_string(),
                message: format!("init script failed: {e}"),
                source: Some(Box::new(e)),
            })?;
            debug!("Executed init script");
        }

        Ok(Self {
            path: config.path,
            conn: Mutex::new(conn),
        })
    }

    fn query_rows(conn: &Connection, query: &str) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = conn.prepare(query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                record.insert(column.clone(), to_json(row.get_ref(idx)?));
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl DataProvider for SqliteProvider {
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>> {
        let conn = self.conn.lock().map_err(|e| AqueductError::ProviderQuery {
            provider_type: Self::TYPE_NAME.to_string(),
            query: query.to_string(),
            message: format!("Failed to acquire connection lock: {e}"),
            source: None,
        })?;

        Self::query_rows(&conn, query).map_err(|e| AqueductError::query(Self::TYPE_NAME, query, e))
    }

    fn provider_type(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> String {
        format!("SQLite database at {}", self.path)
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}
