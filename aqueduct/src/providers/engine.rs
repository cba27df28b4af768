//! DataFusion provider: SQL over local CSV, Parquet and NDJSON files.

use super::{DataProvider, Row};
use crate::error::{AqueductError, Result};
use arrow::error::ArrowError;
use arrow::json::writer::{JsonArray, WriterBuilder};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::{CsvReadOptions, NdJsonReadOptions, ParquetReadOptions, SessionContext};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

/// Settings for the `datafusion` provider type.
///
/// ```yaml
/// providers:
///   - name: lake
///     type: datafusion
///     config:
///       tables:
///         orders: data/orders.parquet
///         customers: data/customers.csv
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataFusionConfig {
    /// Table name to file path; the format follows the file extension
    #[serde(default)]
    pub tables: BTreeMap<String, String>,
}

/// A provider running SQL in one DataFusion session.
pub struct DataFusionProvider {
    ctx: SessionContext,
    tables: Vec<String>,
}

impl fmt::Debug for DataFusionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionProvider")
            .field("tables", &self.tables)
            .finish()
    }
}

impl DataFusionProvider {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "datafusion";

    /// Creates a session and registers every configured file as a table.
    #[instrument(skip(config), fields(tables = config.tables.len()))]
    pub async fn open(config: DataFusionConfig) -> Result<Self> {
        let ctx = SessionContext::new();
        for (name, path) in &config.tables {
            register_file(&ctx, name, path).await?;
            debug!(table = %name, path = %path, "Registered table");
        }

        Ok(Self {
            ctx,
            tables: config.tables.into_keys().collect(),
        })
    }
}

async fn register_file(ctx: &SessionContext, name: &str, path: &str) -> Result<()> {
    let lower = path.to_lowercase();
    let registered = if lower.ends_with(".parquet") {
        ctx.register_parquet(name, path, ParquetReadOptions::default())
            .await
    } else if lower.ends_with(".csv") {
        ctx.register_csv(name, path, CsvReadOptions::default()).await
    } else if lower.ends_with(".ndjson") {
        ctx.register_json(
            name,
            path,
            NdJsonReadOptions::default().file_extension(".ndjson"),
        )
        .await
    } else if lower.ends_with(".json") {
        ctx.register_json(name, path, NdJsonReadOptions::default())
            .await
    } else {
        return Err(AqueductError::connection(
            DataFusionProvider::TYPE_NAME,
            format!("unsupported file type for table '{name}': {path}"),
        ));
    };

    registered.map_err(|e| AqueductError::ProviderConnection {
        provider_type: DataFusionProvider::TYPE_NAME.to_string(),
        message: format!("Failed to register table '{name}' from {path}: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl DataProvider for DataFusionProvider {
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>> {
        let frame = self
            .ctx
            .sql(query)
            .await
            .map_err(|e| AqueductError::query(Self::TYPE_NAME, query, e))?;
        let batches = frame
            .collect()
            .await
            .map_err(|e| AqueductError::query(Self::TYPE_NAME, query, e))?;

        batches_to_rows(&batches).map_err(|e| AqueductError::query(Self::TYPE_NAME, query, e))
    }

    fn provider_type(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> String {
        format!("DataFusion session with tables {:?}", self.tables)
    }
}

/// Converts Arrow batches to rows, keeping schema column order and nulls.
pub(crate) fn batches_to_rows(batches: &[RecordBatch]) -> std::result::Result<Vec<Row>, ArrowError> {
    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&refs)?;
    writer.finish()?;

    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buffer).map_err(|e| ArrowError::JsonError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn users_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("email", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![Some("a@x.io"), None, Some("c@x.io")])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_batches_to_rows_keeps_nulls_and_order() {
        let rows = batches_to_rows(&[users_batch()]).unwrap();
        assert_eq!(rows.len(), 3);
        let columns: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["id", "email"]);
        assert_eq!(rows[1]["email"], Value::Null);
        assert_eq!(rows[2]["id"], json!(3));
    }

    #[test]
    fn test_no_batches_is_no_rows() {
        assert!(batches_to_rows(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_registered_batch() {
        let ctx = SessionContext::new();
        ctx.register_batch("users", users_batch()).unwrap();
        let provider = DataFusionProvider {
            ctx,
            tables: vec!["users".into()],
        };

        let rows = provider
            .execute_query("SELECT COUNT(email) AS with_email FROM users")
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({"with_email": 2}).as_object().unwrap().clone()]);
    }

    #[tokio::test]
    async fn test_csv_table_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        std::fs::write(&path, "id,amount\n1,10\n2,20\n").unwrap();

        let mut tables = BTreeMap::new();
        tables.insert("orders".to_string(), path.to_string_lossy().into_owned());
        let provider = DataFusionProvider::open(DataFusionConfig { tables })
            .await
            .unwrap();

        let rows = provider
            .execute_query("SELECT SUM(amount) AS total FROM orders")
            .await
            .unwrap();
        assert_eq!(rows[0]["total"], json!(30));
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let mut tables = BTreeMap::new();
        tables.insert("t".to_string(), "data.xlsx".to_string());
        let err = DataFusionProvider::open(DataFusionConfig { tables })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[tokio::test]
    async fn test_sql_error_is_query_error() {
        let provider = DataFusionProvider::open(DataFusionConfig::default())
            .await
            .unwrap();
        let err = provider.execute_query("SELECT * FROM nowhere").await.unwrap_err();
        assert!(matches!(err, AqueductError::ProviderQuery { .. }));
    }
}
