use super::{normalized, Check, CheckContext, CheckOutcome};
use crate::error::Result;
use crate::providers::Row;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const SAMPLE_SIZE: usize = 5;

/// `unique`: no two rows share a value in the column, or in the combination
/// of columns when a list is given.
pub struct UniqueCheck {
    columns: Vec<String>,
    rows: Arc<Vec<Row>>,
}

impl UniqueCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        Ok(Box::new(Self {
            columns: ctx.columns()?,
            rows: ctx.rows,
        }))
    }

    fn key(&self, row: &Row) -> Value {
        match self.columns.as_slice() {
            [column] => row.get(column).cloned().unwrap_or(Value::Null),
            columns => Value::Array(
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl Check for UniqueCheck {
    async fn run(&self) -> Result<CheckOutcome> {
        // Keyed by the serialized normalized value, so `1` and `1.0` collide;
        // first-seen order is kept for the sample.
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<(String, Value)> = Vec::new();
        for row in self.rows.iter() {
            let key = self.key(row);
            let encoded = normalized(&key).to_string();
            let count = counts.entry(encoded.clone()).or_insert(0);
            if *count == 0 {
                order.push((encoded, key));
            }
            *count += 1;
        }

        let duplicated: Vec<Value> = order
            .into_iter()
            .filter(|(encoded, _)| counts.get(encoded).copied().unwrap_or(0) > 1)
            .map(|(_, key)| key)
            .collect();
        let duplicates = duplicated.len();

        let mut outcome =
            CheckOutcome::from_bool(duplicates == 0).with_detail("duplicates", duplicates);
        if duplicates > 0 {
            outcome = outcome.with_detail(
                "sample",
                duplicated.into_iter().take(SAMPLE_SIZE).collect::<Vec<_>>(),
            );
        }
        Ok(outcome)
    }
}
