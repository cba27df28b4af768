//! Numeric assertions used by count and ratio checks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An assertion that can be evaluated against a numeric value.
///
/// In a test definition an assertion is written as a single-key mapping, or as
/// a bare number meaning `equals`:
///
/// ```yaml
/// row_count: {equals: 1}
/// row_count: {between: [10, 20]}
/// row_count: 5
/// ```
///
/// # Examples
///
/// ```rust
/// use aqueduct::checks::Assertion;
///
/// let assertion = Assertion::Between(10.0, 20.0);
/// assert!(assertion.evaluate(15.0));
/// assert!(!assertion.evaluate(21.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assertion {
    /// Value must equal the specified value (with epsilon tolerance)
    Equals(f64),
    /// Value must not equal the specified value
    NotEquals(f64),
    /// Value must be greater than the specified value
    GreaterThan(f64),
    /// Value must be greater than or equal to the specified value
    GreaterThanOrEqual(f64),
    /// Value must be less than the specified value
    LessThan(f64),
    /// Value must be less than or equal to the specified value
    LessThanOrEqual(f64),
    /// Value must be between the specified range (inclusive)
    Between(f64, f64),
    /// Value must not be between the specified range
    NotBetween(f64, f64),
}

impl Assertion {
    /// Reads an assertion from check configuration.
    pub fn from_config(config: &Value) -> Result<Self, String> {
        if let Some(expected) = config.as_f64() {
            return Ok(Assertion::Equals(expected));
        }
        serde_json::from_value(config.clone()).map_err(|e| {
            format!(
                "expected a number or one of equals, not_equals, greater_than, \
                 greater_than_or_equal, less_than, less_than_or_equal, between, not_between ({e})"
            )
        })
    }

    /// Evaluates the assertion against a value.
    pub fn evaluate(&self, value: f64) -> bool {
        const EPSILON: f64 = 1e-10;

        match self {
            Assertion::Equals(expected) => (value - expected).abs() < EPSILON,
            Assertion::NotEquals(expected) => (value - expected).abs() >= EPSILON,
            Assertion::GreaterThan(threshold) => value > *threshold,
            Assertion::GreaterThanOrEqual(threshold) => value >= *threshold,
            Assertion::LessThan(threshold) => value < *threshold,
            Assertion::LessThanOrEqual(threshold) => value <= *threshold,
            Assertion::Between(min, max) => value >= *min && value <= *max,
            Assertion::NotBetween(min, max) => value < *min || value > *max,
        }
    }

    /// Returns a human-readable description of the assertion.
    pub fn description(&self) -> String {
        match self {
            Assertion::Equals(v) => format!("equals {v}"),
            Assertion::NotEquals(v) => format!("not equals {v}"),
            Assertion::GreaterThan(v) => format!("greater than {v}"),
            Assertion::GreaterThanOrEqual(v) => format!("greater than or equal to {v}"),
            Assertion::LessThan(v) => format!("less than {v}"),
            Assertion::LessThanOrEqual(v) => format!("less than or equal to {v}"),
            Assertion::Between(min, max) => format!("between {min} and {max}"),
            Assertion::NotBetween(min, max) => format!("not between {min} and {max}"),
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
