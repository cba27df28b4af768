//! Orchestration of one run: providers, tests, results.

use crate::checks::CheckRegistry;
use crate::config::{ConfigLoader, PlaceholderTable, RunConfig, Templater, PLACEHOLDERS_FILE};
use crate::error::Result;
use crate::extensions::EXTENSIONS_FILE;
use crate::providers::ProviderMap;
use crate::registry::Registries;
use crate::results::ResultTree;
use crate::test::Test;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Locations of the optional files read at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Placeholder table file
    pub placeholders_file: PathBuf,
    /// Extension alias file
    pub extensions_file: PathBuf,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            placeholders_file: PathBuf::from(PLACEHOLDERS_FILE),
            extensions_file: PathBuf::from(EXTENSIONS_FILE),
        }
    }
}

impl RunnerOptions {
    /// Resolves both files against `dir` instead of the working directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            placeholders_file: dir.join(PLACEHOLDERS_FILE),
            extensions_file: dir.join(EXTENSIONS_FILE),
        }
    }

    pub fn with_placeholders_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.placeholders_file = path.into();
        self
    }

    pub fn with_extensions_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.extensions_file = path.into();
        self
    }
}

/// Owns the live providers and tests of a run and executes them in order.
///
/// # Examples
///
/// ```rust
/// use aqueduct::config::RunConfig;
/// use aqueduct::registry::Registries;
/// use aqueduct::runner::TestRunner;
///
/// # async fn example() -> aqueduct::Result<()> {
/// let config: RunConfig = serde_yaml::from_str(r#"
/// providers:
///   - name: local
///     type: sqlite
///     config: {path: ":memory:"}
/// tests:
///   - name: one row
///     provider: local
///     query: SELECT 1 AS x
///     row_count: {equals: 1}
/// "#).unwrap();
///
/// let registries = Registries::with_builtins();
/// let runner = TestRunner::new(config, &registries).await?;
/// assert!(runner.run_all().await.all_passed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TestRunner {
    providers: Arc<ProviderMap>,
    tests: Vec<Test>,
    checks: CheckRegistry,
}

impl TestRunner {
    /// Builds every provider in declaration order, then every test.
    ///
    /// Provider construction failures abort. A test naming an undeclared
    /// provider or an unregistered check type fails the whole construction.
    /// No query runs here.
    #[instrument(skip_all, fields(providers = config.providers.len(), tests = config.tests.len()))]
    pub async fn new(config: RunConfig, registries: &Registries) -> Result<Self> {
        let mut providers = ProviderMap::new();
        for spec in config.providers {
            let provider = registries
                .providers
                .create(&spec.provider_type, spec.config)
                .await?;
            debug!(
                provider = %spec.name,
                source = %provider.description(),
                "Provider ready"
            );
            providers.insert(spec.name, provider);
        }
        let providers = Arc::new(providers);

        let tests = config
            .tests
            .into_iter()
            .map(|spec| Test::new(spec, Arc::clone(&providers), &registries.checks))
            .collect::<Result<Vec<_>>>()?;

        info!(
            providers = providers.len(),
            tests = tests.len(),
            "Runner initialized"
        );
        Ok(Self {
            providers,
            tests,
            checks: registries.checks.clone(),
        })
    }

    /// Loads `paths` through the templating pipeline and builds the runner.
    pub async fn from_files<P: AsRef<Path>>(
        paths: &[P],
        registries: &Registries,
        placeholders: PlaceholderTable,
    ) -> Result<Self> {
        let config = ConfigLoader::new(Templater::new(placeholders)).load(paths)?;
        Self::new(config, registries).await
    }

    /// Runs every test sequentially, in declaration order.
    #[instrument(skip(self), fields(tests = self.tests.len()))]
    pub async fn run_all(&self) -> ResultTree {
        let mut results = Vec::with_capacity(self.tests.len());
        for test in &self.tests {
            results.push(test.run(&self.checks).await);
        }

        let tree = ResultTree::new(results);
        let (total, failed) = tree.totals();
        info!(checks = total, failed, "Run finished");
        tree
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn providers(&self) -> &ProviderMap {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AqueductError;

    fn config(yaml: &str) -> RunConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const PROVIDERS: &str = r#"
providers:
  - name: local
    type: sqlite
    config:
      init: "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);"
"#;

    #[tokio::test]
    async fn test_results_follow_declaration_order() {
        let yaml = format!(
            "{PROVIDERS}
tests:
  - name: first
    provider: local
    query: SELECT x FROM t
    row_count: {{equals: 1}}
    not_null: x
  - name: second
    provider: local
    query: SELECT x FROM missing
    row_count: {{equals: 1}}
    not_empty: true
"
        );
        let runner = TestRunner::new(config(&yaml), &Registries::with_builtins())
            .await
            .unwrap();
        let tree = runner.run_all().await;

        let names: Vec<_> = tree.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(tree.tests()[0].results.len(), 2);
        assert_eq!(tree.tests()[1].results.len(), 2);
        assert!(tree.tests()[0].passed());
        assert!(!tree.tests()[1].passed());
    }

    #[tokio::test]
    async fn test_dangling_provider() {
        let yaml = format!(
            "{PROVIDERS}
tests:
  - name: orphan
    provider: warehouse
    query: SELECT 1
    not_empty: true
"
        );
        let err = TestRunner::new(config(&yaml), &Registries::with_builtins())
            .await
            .unwrap_err();
        assert!(matches!(err, AqueductError::ConfigReference { ref provider, .. } if provider == "warehouse"));
    }

    #[tokio::test]
    async fn test_unknown_provider_type() {
        let yaml = "providers:\n  - {name: p, type: oracle}\n";
        let err = TestRunner::new(config(yaml), &Registries::with_builtins())
            .await
            .unwrap_err();
        assert!(matches!(err, AqueductError::UnknownProviderType { ref name, .. } if name == "oracle"));
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_rerun_is_stable() {
        let yaml = format!(
            "{PROVIDERS}
tests:
  - name: t
    provider: local
    query: SELECT x FROM t
    row_count: {{equals: 2}}
"
        );
        let runner = TestRunner::new(config(&yaml), &Registries::with_builtins())
            .await
            .unwrap();
        assert_eq!(runner.run_all().await, runner.run_all().await);
    }

    #[test]
    fn test_options() {
        let options = RunnerOptions::in_dir("/srv/checks");
        assert_eq!(
            options.placeholders_file,
            PathBuf::from("/srv/checks/environment.yml")
        );
        let options = RunnerOptions::default().with_extensions_file("ext.yml");
        assert_eq!(options.extensions_file, PathBuf::from("ext.yml"));
        assert_eq!(options.placeholders_file, PathBuf::from("environment.yml"));
    }
}
