//! Row count checks.

use super::{Assertion, Check, CheckContext, CheckOutcome};
use crate::error::Result;
use async_trait::async_trait;

/// `row_count`: the number of returned rows satisfies an assertion.
#[derive(Debug, Clone)]
pub struct RowCountCheck {
    assertion: Assertion,
    actual: usize,
}

impl RowCountCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        let assertion = Assertion::from_config(&ctx.config).map_err(|e| ctx.invalid_config(e))?;
        Ok(Box::new(Self {
            assertion,
            actual: ctx.rows.len(),
        }))
    }
}

#[async_trait]
impl Check for RowCountCheck {
    async fn run(&self) -> Result<CheckOutcome> {
        Ok(
            CheckOutcome::from_bool(self.assertion.evaluate(self.actual as f64))
                .with_detail("expected", self.assertion.description())
                .with_detail("actual", self.actual),
        )
    }
}

/// `not_empty`: `true` requires at least one row, `false` requires none.
#[derive(Debug, Clone)]
pub struct NotEmptyCheck {
    expect_rows: bool,
    actual: usize,
}

impl NotEmptyCheck {
    pub fn build(ctx: CheckContext) -> Result<Box<dyn Check>> {
        let expect_rows = ctx
            .config
            .as_bool()
            .ok_or_else(|| ctx.invalid_config("expected true or false"))?;
        Ok(Box::new(Self {
            expect_rows,
            actual: ctx.rows.len(),
        }))
    }
}

#[async_trait]
impl Check for NotEmptyCheck {
    async fn run(&self) -> Result<CheckOutcome> {
        let has_rows = self.actual > 0;
        Ok(CheckOutcome::from_bool(has_rows == self.expect_rows).with_detail("actual", self.actual))
    }
}
