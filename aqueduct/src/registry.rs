//! The three registries a run consults, owned together by the entry point.

use crate::checks::CheckRegistry;
use crate::providers::ProviderRegistry;
use crate::reporters::ReporterRegistry;

/// Provider, check and reporter registries of one process.
///
/// # Examples
///
/// ```rust
/// use aqueduct::registry::Registries;
///
/// let registries = Registries::with_builtins();
/// assert!(registries.providers.contains("sqlite"));
/// assert!(registries.checks.contains("row_count"));
/// assert!(registries.reporters.contains("console"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub providers: ProviderRegistry,
    pub checks: CheckRegistry,
    pub reporters: ReporterRegistry,
}

impl Registries {
    /// Empty registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registries holding every built-in provider, check and reporter.
    pub fn with_builtins() -> Self {
        Self {
            providers: ProviderRegistry::with_builtins(),
            checks: CheckRegistry::with_builtins(),
            reporters: ReporterRegistry::with_builtins(),
        }
    }
}
