//! Cross-source comparison.

use super::{values_equal, Check, CheckContext, CheckOutcome};
use crate::error::{AqueductError, Result};
use crate::providers::{DataProvider, Row};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

const MAX_MISMATCHES: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SameAsConfig {
    provider: String,
    query: String,
    #[serde(default)]
    ignore_order: bool,
}

/// `same_as`: the test's rows equal the rows of a reference query run on
/// another declared provider.
///
/// ```yaml
/// same_as:
///   provider: warehouse
///   query: SELECT id, email FROM users ORDER BY id
///   ignore_order: false
/// ```
///
/// Rows are equal when they have the same columns with equal values; numbers
/// compare by value, so `1` from one engine equals `1.0` from another.
pub struct SameAsCheck {
    config: SameAsConfig,
    reference: Arc<dyn DataProvider>,
    rows: Arc<Vec<Row>>,
}

impl SameAsCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        let config: SameAsConfig = ctx.parse_config()?;
        let reference = ctx.providers.get(&config.provider).cloned().ok_or_else(|| {
            AqueductError::ConfigReference {
                test: ctx.test_name.clone(),
                provider: config.provider.clone(),
            }
        })?;
        Ok(Box::new(Self {
            config,
            reference,
            rows: ctx.rows,
        }))
    }
}

fn rows_equal(left: &Row, right: &Row) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|(column, value)| right.get(column).is_some_and(|v| values_equal(value, v)))
}

fn ordered_mismatches(expected: &[Row], actual: &[Row]) -> Vec<Value> {
    expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (e, a))| !rows_equal(e, a))
        .map(|(index, (e, a))| json!({"index": index, "expected": e, "actual": a}))
        .collect()
}

/// Pairs rows regardless of position; returns the expected rows left unmatched.
fn unordered_mismatches(expected: &[Row], actual: &[Row]) -> Vec<Value> {
    let mut unmatched: Vec<&Row> = actual.iter().collect();
    let mut missing = Vec::new();
    for row in expected {
        match unmatched.iter().position(|candidate| rows_equal(row, candidate)) {
            Some(index) => {
                unmatched.swap_remove(index);
            }
            None => missing.push(json!({"expected": row})),
        }
    }
    missing
}

#[async_trait]
impl Check for SameAsCheck {
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    async fn run(&self) -> Result<CheckOutcome> {
        let expected = self.reference.execute_query(&self.config.query).await?;
        debug!(
            expected_rows = expected.len(),
            actual_rows = self.rows.len(),
            "Comparing result sets"
        );

        let mismatches = if self.config.ignore_order {
            unordered_mismatches(&expected, &self.rows)
        } else {
            ordered_mismatches(&expected, &self.rows)
        };
        let passed = expected.len() == self.rows.len() && mismatches.is_empty();

        let mut outcome = CheckOutcome::from_bool(passed)
            .with_detail("provider", self.config.provider.as_str())
            .with_detail("expected_rows", expected.len())
            .with_detail("actual_rows", self.rows.len());
        if !mismatches.is_empty() {
            outcome = outcome.with_detail(
                "mismatches",
                mismatches
                    .into_iter()
                    .take(MAX_MISMATCHES)
                    .collect::<Vec<_>>(),
            );
        }
        Ok(outcome)
    }
}
