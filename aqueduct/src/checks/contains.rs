use super::{values_equal, Check, CheckContext, CheckOutcome};
use crate::error::Result;
use crate::providers::Row;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// `contains`: every listed partial row matches at least one result row.
///
/// A result row matches when it has every listed column with an equal value;
/// columns not listed are ignored.
pub struct ContainsCheck {
    expected: Vec<Row>,
    rows: Arc<Vec<Row>>,
}

impl ContainsCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        let expected = match &ctx.config {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_object()
                        .cloned()
                        .ok_or_else(|| ctx.invalid_config("each entry must be a mapping"))
                })
                .collect::<Result<Vec<_>>>()?,
            Value::Object(row) => vec![row.clone()],
            _ => return Err(ctx.invalid_config("expected a list of rows")),
        };
        Ok(Box::new(Self {
            expected,
            rows: ctx.rows,
        }))
    }
}

fn matches(row: &Row, partial: &Row) -> bool {
    partial
        .iter()
        .all(|(column, value)| row.get(column).is_some_and(|v| values_equal(v, value)))
}

#[async_trait]
impl Check for ContainsCheck {
    async fn run(&self) -> Result<CheckOutcome> {
        let missing: Vec<Value> = self
            .expected
            .iter()
            .filter(|partial| !self.rows.iter().any(|row| matches(row, partial)))
            .map(|partial| Value::Object(partial.clone()))
            .collect();

        let mut outcome = CheckOutcome::from_bool(missing.is_empty());
        if !missing.is_empty() {
            outcome = outcome.with_detail("missing", missing);
        }
        Ok(outcome)
    }
}
