//! Amazon Athena provider.
//!
//! A query is started in the configured work group, polled until it settles,
//! then read page by page. Athena returns every cell as text; cells are
//! converted back using the column types of the result metadata.

use super::{DataProvider, Row};
use crate::error::{AqueductError, Result};
use crate::security::SecureString;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_athena::config::{Credentials, Region};
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionState, StatementType};
use aws_sdk_athena::Client;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Settings for the `athena` provider type.
///
/// ```yaml
/// providers:
///   - name: lake
///     type: athena
///     config:
///       region: eu-west-1
///       aws_access_key_id: ${AWS_ACCESS_KEY_ID}
///       aws_secret_access_key: ${AWS_SECRET_ACCESS_KEY}
///       work_group: primary
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AthenaConfig {
    pub region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: SecureString,
    pub work_group: String,
}

/// Provider running queries on Amazon Athena.
pub struct AthenaProvider {
    client: Client,
    region: String,
    work_group: String,
}

impl fmt::Debug for AthenaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AthenaProvider")
            .field("region", &self.region)
            .field("work_group", &self.work_group)
            .finish()
    }
}

/// A result column: name and Athena type.
type Column = (String, String);

impl AthenaProvider {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "athena";

    /// Builds a client from static credentials.
    #[instrument(skip(config), fields(region = %config.region, work_group = %config.work_group))]
    pub async fn connect(config: AthenaConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            config.aws_secret_access_key.expose(),
            None,
            None,
            "aqueduct",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        debug!("Created Athena client");

        Ok(Self {
            client: Client::new(&sdk_config),
            region: config.region,
            work_group: config.work_group,
        })
    }

    fn failed(&self, query: &str, message: impl fmt::Display) -> AqueductError {
        AqueductError::ProviderQuery {
            provider_type: Self::TYPE_NAME.to_string(),
            query: query.to_string(),
            message: message.to_string(),
            source: None,
        }
    }

    /// Polls until the execution settles; returns whether the result carries
    /// a header row.
    async fn wait(&self, execution_id: &str, query: &str) -> Result<bool> {
        loop {
            let output = self
                .client
                .get_query_execution()
                .query_execution_id(execution_id)
                .send()
                .await
                .map_err(|e| self.failed(query, DisplayErrorContext(&e)))?;
            let execution = output.query_execution();
            let status = execution.and_then(|e| e.status());

            match status.and_then(|s| s.state()) {
                Some(QueryExecutionState::Succeeded) => {
                    let statement = execution.and_then(|e| e.statement_type());
                    return Ok(matches!(statement, Some(StatementType::Dml)));
                }
                Some(QueryExecutionState::Failed) | Some(QueryExecutionState::Cancelled) => {
                    let reason = status
                        .and_then(|s| s.state_change_reason())
                        .unwrap_or("query did not complete");
                    return Err(self.failed(query, reason));
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn fetch_rows(&self, execution_id: &str, query: &str, header: bool) -> Result<Vec<Row>> {
        let mut columns: Vec<Column> = Vec::new();
        let mut rows = Vec::new();
        let mut skip_header = header;
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .client
                .get_query_results()
                .query_execution_id(execution_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| self.failed(query, DisplayErrorContext(&e)))?;

            if let Some(result_set) = page.result_set() {
                if columns.is_empty() {
                    if let Some(metadata) = result_set.result_set_metadata() {
                        columns = metadata
                            .column_info()
                            .iter()
                            .map(|c| (c.name().to_string(), c.r#type().to_string()))
                            .collect();
                    }
                }
                for row in result_set.rows() {
                    if skip_header {
                        skip_header = false;
                        continue;
                    }
                    let cells: Vec<Option<&str>> =
                        row.data().iter().map(|d| d.var_char_value()).collect();
                    rows.push(to_row(&columns, &cells));
                }
            }

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl DataProvider for AthenaProvider {
    #[instrument(skip(self, query))]
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>> {
        let started = self
            .client
            .start_query_execution()
            .query_string(query)
            .work_group(&self.work_group)
            .send()
            .await
            .map_err(|e| self.failed(query, DisplayErrorContext(&e)))?;
        let execution_id = started
            .query_execution_id()
            .ok_or_else(|| self.failed(query, "no query execution id returned"))?
            .to_string();
        debug!(execution_id = %execution_id, "Started Athena query");

        let header = self.wait(&execution_id, query).await?;
        self.fetch_rows(&execution_id, query, header).await
    }

    fn provider_type(&self) -> &str {
        Self::TYPE_NAME
    }

    fn description(&self) -> String {
        format!("Athena work group '{}' in {}", self.work_group, self.region)
    }
}

fn to_row(columns: &[Column], cells: &[Option<&str>]) -> Row {
    columns
        .iter()
        .zip(cells)
        .map(|((name, data_type), cell)| (name.clone(), convert(data_type, *cell)))
        .collect()
}

/// Converts one text cell according to its Athena column type.
fn convert(data_type: &str, cell: Option<&str>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    match data_type {
        "boolean" => Value::Bool(text.eq_ignore_ascii_case("true")),
        "tinyint" | "smallint" | "integer" | "int" | "bigint" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "float" | "real" | "double" | "decimal" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        "json" => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}
