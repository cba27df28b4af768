//! Checks: named assertions evaluated against one test's query result.
//!
//! A check is built fresh for every test execution from a [`CheckContext`]
//! (its configuration, the rows of the test's query and every provider of the
//! run) and produces a single [`CheckOutcome`].
//!
//! ## Built-in checks
//!
//! | Type         | Configuration                              |
//! |--------------|--------------------------------------------|
//! | `row_count`  | assertion, e.g. `{equals: 1}` or `{between: [1, 10]}` |
//! | `not_empty`  | `true` (rows expected) or `false` (no rows expected) |
//! | `not_null`   | column name or list of column names        |
//! | `null_ratio` | `{column, max}`                            |
//! | `unique`     | column name or list (composite key)        |
//! | `contains`   | list of partial rows that must be present  |
//! | `same_as`    | `{provider, query, ignore_order}`          |
//!
//! Custom checks implement [`Check`] and are added with
//! [`CheckRegistry::register`].

use crate::error::{AqueductError, Result};
use crate::providers::{ProviderMap, Row};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

mod assertion;
mod completeness;
mod contains;
mod parity;
mod size;
mod uniqueness;

pub use assertion::Assertion;
pub use completeness::{NotNullCheck, NullRatioCheck};
pub use contains::ContainsCheck;
pub use parity::SameAsCheck;
pub use size::{NotEmptyCheck, RowCountCheck};
pub use uniqueness::UniqueCheck;

/// The outcome of one check: a pass/fail flag plus free-form diagnostics.
///
/// Serializes as a flat object whose first key is `passed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub passed: bool,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl CheckOutcome {
    /// A passing outcome without details.
    pub fn pass() -> Self {
        Self {
            passed: true,
            details: Map::new(),
        }
    }

    /// A failing outcome without details.
    pub fn fail() -> Self {
        Self {
            passed: false,
            details: Map::new(),
        }
    }

    /// A passing or failing outcome.
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Self::pass()
        } else {
            Self::fail()
        }
    }

    /// A failing outcome describing an error raised while checking.
    pub fn error(err: &AqueductError) -> Self {
        Self::fail().with_detail("error", err.to_string())
    }

    /// Adds a diagnostic entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Everything a check is constructed from.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Name of the test the check belongs to
    pub test_name: String,
    /// Registered check type
    pub check_type: String,
    /// The check's own configuration from the test definition
    pub config: Value,
    /// Rows returned by the test's query, shared by every check of the test
    pub rows: Arc<Vec<Row>>,
    /// Every provider of the run, for cross-source comparisons
    pub providers: Arc<ProviderMap>,
}

impl CheckContext {
    /// Builds an [`AqueductError::InvalidCheckConfig`] for this check.
    pub fn invalid_config(&self, message: impl Into<String>) -> AqueductError {
        AqueductError::invalid_check_config(&self.check_type, message)
    }

    /// Deserializes the configuration into `T`.
    pub fn parse_config<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.config.clone()).map_err(|e| self.invalid_config(e.to_string()))
    }

    /// Reads a column name or a list of column names.
    pub fn columns(&self) -> Result<Vec<String>> {
        match &self.config {
            Value::String(column) => Ok(vec![column.clone()]),
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid_config("column names must be strings"))
                })
                .collect(),
            _ => Err(self.invalid_config("expected a column name or a list of column names")),
        }
    }
}

/// A single assertion over a test's rows.
#[async_trait]
pub trait Check: Send + Sync {
    /// Evaluates the check.
    ///
    /// Returning an error is equivalent to a failing outcome carrying the
    /// error message.
    async fn run(&self) -> Result<CheckOutcome>;
}

/// Constructs a check from its context.
pub type CheckConstructor = Arc<dyn Fn(CheckContext) -> Result<Box<dyn Check>> + Send + Sync>;

/// Name-keyed registry of check constructors.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    constructors: BTreeMap<String, CheckConstructor>,
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.available())
            .finish()
    }
}

impl CheckRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in checks.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert_builtin("row_count", RowCountCheck::build);
        registry.insert_builtin("not_empty", NotEmptyCheck::build);
        registry.insert_builtin("not_null", NotNullCheck::build);
        registry.insert_builtin("null_ratio", NullRatioCheck::build);
        registry.insert_builtin("unique", UniqueCheck::build);
        registry.insert_builtin("contains", ContainsCheck::build);
        registry.insert_builtin("same_as", SameAsCheck::build);
        registry
    }

    fn insert_builtin<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(CheckContext) -> Result<Box<dyn Check>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
    }

    /// Registers a check type.
    ///
    /// Fails with [`AqueductError::InvalidRegistration`] if `name` is empty or
    /// already registered.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn(CheckContext) -> Result<Box<dyn Check>> + Send + Sync + 'static,
    {
        self.register_constructor(name, Arc::new(constructor))
    }

    /// Registers an already boxed constructor.
    pub fn register_constructor(
        &mut self,
        name: impl Into<String>,
        constructor: CheckConstructor,
    ) -> Result<()> {
        let name = name.into();
        crate::providers::check_registration(
            "check",
            &name,
            self.constructors.contains_key(&name),
        )?;
        debug!(check.type = %name, "Registered check type");
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Returns the constructor registered under `name`.
    pub fn constructor(&self, name: &str) -> Option<CheckConstructor> {
        self.constructors.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns the registered check types, sorted.
    pub fn available(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Constructs the check named by `ctx.check_type`.
    pub fn create(&self, ctx: CheckContext) -> Result<Box<dyn Check>> {
        let constructor = self.constructor(&ctx.check_type).ok_or_else(|| {
            AqueductError::UnknownCheckType {
                test: ctx.test_name.clone(),
                name: ctx.check_type.clone(),
                available: self.available(),
            }
        })?;
        constructor(ctx)
    }
}

/// Compares two cell values, treating numbers of different JSON
/// representations (e.g. `1` and `1.0`) as equal.
///
/// Two integers are compared exactly; only a float on either side falls back
/// to an approximate comparison.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (integer(a), integer(b)) {
            (Some(a), Some(b)) => a == b,
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() < 1e-9,
                _ => a == b,
            },
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

fn integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

/// Rewrites integral floats as integers so that values [`values_equal`]
/// treats as equal also hash and serialize the same.
pub(crate) fn normalized(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT)
            .map(|f| Value::from(f as i64))
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalized).collect()),
        _ => value.clone(),
    }
}

// 2^53: beyond this an f64 no longer holds every integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serializes_flat_with_passed_first() {
        let outcome = CheckOutcome::fail()
            .with_detail("expected", "equals 2")
            .with_detail("actual", 1);
        assert_eq!(
            serde_json::to_string(&outcome).unwrap(),
            r#"{"passed":false,"expected":"equals 2","actual":1}"#
        );
    }

    #[test]
    fn test_builtins_registered() {
        let registry = CheckRegistry::with_builtins();
        assert_eq!(
            registry.available(),
            vec![
                "contains",
                "not_empty",
                "not_null",
                "null_ratio",
                "row_count",
                "same_as",
                "unique"
            ]
        );
    }

    #[test]
    fn test_unknown_check_type() {
        let registry = CheckRegistry::with_builtins();
        let err = registry
            .create(context("freshness", json!({}), json!([])))
            .err()
            .unwrap();
        assert!(matches!(err, AqueductError::UnknownCheckType { ref name, .. } if name == "freshness"));
    }

    #[tokio::test]
    async fn test_register_custom_check() {
        struct Always(bool);

        #[async_trait]
        impl Check for Always {
            async fn run(&self) -> Result<CheckOutcome> {
                Ok(CheckOutcome::from_bool(self.0))
            }
        }

        let mut registry = CheckRegistry::with_builtins();
        registry
            .register("always", |ctx: CheckContext| {
                let flag = ctx
                    .config
                    .as_bool()
                    .ok_or_else(|| ctx.invalid_config("expected a boolean"))?;
                Ok(Box::new(Always(flag)) as Box<dyn Check>)
            })
            .unwrap();

        let check = registry
            .create(context("always", json!(false), json!([])))
            .unwrap();
        assert!(!check.run().await.unwrap().passed);

        let err = registry
            .register("always", |_ctx: CheckContext| {
                Ok(Box::new(Always(true)) as Box<dyn Check>)
            })
            .unwrap_err();
        assert!(matches!(err, AqueductError::InvalidRegistration { .. }));
    }

    #[test]
    fn test_columns_config() {
        let ctx = context("not_null", json!("id"), json!([]));
        assert_eq!(ctx.columns().unwrap(), vec!["id"]);

        let ctx = context("not_null", json!(["id", "email"]), json!([]));
        assert_eq!(ctx.columns().unwrap(), vec!["id", "email"]);

        let ctx = context("not_null", json!([1]), json!([]));
        assert!(ctx.columns().is_err());

        let ctx = context("not_null", json!([]), json!([]));
        assert!(ctx.columns().is_err());
    }

    #[test]
    fn test_values_equal_across_number_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!(2)));
        assert!(values_equal(&json!("a"), &json!("a")));
        assert!(!values_equal(&json!(null), &json!(0)));
    }

    #[test]
    fn test_values_equal_keeps_large_integers_distinct() {
        let a = json!(9_007_199_254_740_993_i64);
        let b = json!(9_007_199_254_740_992_i64);
        assert!(!values_equal(&a, &b));
        assert!(values_equal(&a, &json!(9_007_199_254_740_993_u64)));
        assert!(!values_equal(&json!(u64::MAX), &json!(-1)));
    }

    #[test]
    fn test_normalized_merges_integral_floats() {
        assert_eq!(normalized(&json!(1.0)), json!(1));
        assert_eq!(normalized(&json!([2.0, "x", 2.5])), json!([2, "x", 2.5]));
        assert_eq!(normalized(&json!(-0.0)), json!(0));
    }
}
