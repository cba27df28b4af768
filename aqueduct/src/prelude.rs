//! Prelude for commonly used types and traits in aqueduct.

pub use crate::checks::{Check, CheckContext, CheckOutcome, CheckRegistry};
pub use crate::config::{ConfigLoader, PlaceholderTable, RunConfig, Templater};
pub use crate::error::{AqueductError, Result};
pub use crate::logging::LoggingConfig;
pub use crate::providers::{DataProvider, ProviderRegistry, Row};
pub use crate::registry::Registries;
pub use crate::reporters::{Reporter, ReporterOptions, ReporterRegistry};
pub use crate::results::{CheckResult, ResultTree, TestResult};
pub use crate::runner::{RunnerOptions, TestRunner};
