//! Null-value checks.

use super::{Check, CheckContext, CheckOutcome};
use crate::error::Result;
use crate::providers::Row;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

fn is_null(row: &Row, column: &str) -> bool {
    row.get(column).map_or(true, Value::is_null)
}

fn missing_columns(rows: &[Row], columns: &[String]) -> Vec<String> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    columns
        .iter()
        .filter(|column| !first.contains_key(column.as_str()))
        .cloned()
        .collect()
}

/// `not_null`: none of the listed columns contains a null.
pub struct NotNullCheck {
    columns: Vec<String>,
    rows: Arc<Vec<Row>>,
}

impl NotNullCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        Ok(Box::new(Self {
            columns: ctx.columns()?,
            rows: ctx.rows,
        }))
    }
}

#[async_trait]
impl Check for NotNullCheck {
    async fn run(&self) -> Result<CheckOutcome> {
        let missing = missing_columns(&self.rows, &self.columns);
        if !missing.is_empty() {
            return Ok(CheckOutcome::fail().with_detail("missing_columns", missing));
        }

        let mut null_counts = Map::new();
        for column in &self.columns {
            let nulls = self.rows.iter().filter(|row| is_null(row, column)).count();
            if nulls > 0 {
                null_counts.insert(column.clone(), nulls.into());
            }
        }

        Ok(CheckOutcome::from_bool(null_counts.is_empty())
            .with_detail("null_counts", null_counts))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NullRatioConfig {
    column: String,
    max: f64,
}

/// `null_ratio`: the fraction of nulls in a column does not exceed `max`.
///
/// An empty result has a ratio of zero.
pub struct NullRatioCheck {
    config: NullRatioConfig,
    rows: Arc<Vec<Row>>,
}

impl NullRatioCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        let config: NullRatioConfig = ctx.parse_config()?;
        if !(0.0..=1.0).contains(&config.max) {
            return Err(ctx.invalid_config("max must be between 0 and 1"));
        }
        Ok(Box::new(Self {
            config,
            rows: ctx.rows,
        }))
    }
}

#[async_trait]
impl Check for NullRatioCheck {
    async fn run(&self) -> Result<CheckOutcome> {
        let column = &self.config.column;
        let missing = missing_columns(&self.rows, std::slice::from_ref(column));
        if !missing.is_empty() {
            return Ok(CheckOutcome::fail().with_detail("missing_columns", missing));
        }

        let nulls = self.rows.iter().filter(|row| is_null(row, column)).count();
        let ratio = if self.rows.is_empty() {
            0.0
        } else {
            nulls as f64 / self.rows.len() as f64
        };

        Ok(CheckOutcome::from_bool(ratio <= self.config.max)
            .with_detail("column", column.as_str())
            .with_detail("null_ratio", ratio)
            .with_detail("max", self.config.max))
    }
}
