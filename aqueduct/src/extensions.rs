//! Declarative aliases over registered providers, checks and reporters.
//!
//! An optional `extensions.yml` in the working directory can define new names
//! on top of existing ones:
//!
//! ```yaml
//! providers:
//!   - name: fixtures
//!     base: sqlite
//!     defaults:
//!       path: fixtures.db
//! checks:
//!   - name: has_rows
//!     base: row_count
//!     defaults:
//!       greater_than: 0
//! reporters:
//!   - name: ci_json
//!     base: json
//!     output: build/aqueduct.json
//! ```
//!
//! Provider and check aliases merge their `defaults` under the configuration a
//! test supplies; keys from the test win. Reporter aliases write to `output`.
//! Entries are applied in order, so an alias may build on an earlier one.

use crate::checks::{CheckConstructor, CheckContext};
use crate::error::{AqueductError, Result};
use crate::providers::ProviderConstructor;
use crate::registry::Registries;
use crate::reporters::{ReporterConstructor, ReporterOptions};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default extension file name, looked up in the working directory.
pub const EXTENSIONS_FILE: &str = "extensions.yml";

/// A provider or check alias.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigAlias {
    pub name: String,
    pub base: String,
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

/// A reporter alias.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReporterAlias {
    pub name: String,
    pub base: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// Parsed contents of an extension file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Extensions {
    #[serde(default)]
    pub providers: Vec<ConfigAlias>,
    #[serde(default)]
    pub checks: Vec<ConfigAlias>,
    #[serde(default)]
    pub reporters: Vec<ReporterAlias>,
}

impl Extensions {
    /// Reads an extension file. A missing file yields no extensions.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No extension file");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let parsed: Option<Self> =
            serde_yaml::from_str(&text).map_err(|source| AqueductError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parsed.unwrap_or_default())
    }

    /// Number of aliases declared.
    pub fn len(&self) -> usize {
        self.providers.len() + self.checks.len() + self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers every alias, in order.
    pub fn apply(&self, registries: &mut Registries) -> Result<()> {
        for alias in &self.providers {
            let base = registries.providers.constructor(&alias.base).ok_or_else(|| {
                unknown_base(&alias.name, "provider type", &alias.base, registries.providers.available())
            })?;
            let defaults = alias.defaults.clone();
            let constructor: ProviderConstructor =
                Arc::new(move |config: Value| base(merge_defaults(&defaults, config)));
            registries
                .providers
                .register_constructor(alias.name.as_str(), constructor)
                .map_err(|e| registration_failed(&alias.name, e))?;
            debug!(alias = %alias.name, base = %alias.base, "Registered provider alias");
        }

        for alias in &self.checks {
            let base = registries.checks.constructor(&alias.base).ok_or_else(|| {
                unknown_base(&alias.name, "check type", &alias.base, registries.checks.available())
            })?;
            let defaults = alias.defaults.clone();
            let constructor: CheckConstructor = Arc::new(move |mut ctx: CheckContext| {
                ctx.config = merge_defaults(&defaults, std::mem::take(&mut ctx.config));
                base(ctx)
            });
            registries
                .checks
                .register_constructor(alias.name.as_str(), constructor)
                .map_err(|e| registration_failed(&alias.name, e))?;
            debug!(alias = %alias.name, base = %alias.base, "Registered check alias");
        }

        for alias in &self.reporters {
            let base = registries.reporters.constructor(&alias.base).ok_or_else(|| {
                unknown_base(&alias.name, "reporter format", &alias.base, registries.reporters.available())
            })?;
            let output = alias.output.clone();
            let constructor: ReporterConstructor = Arc::new(move |options: &ReporterOptions| {
                let mut options = options.clone();
                if options.output.is_none() {
                    options.output = output.clone();
                }
                base(&options)
            });
            registries
                .reporters
                .register_constructor(alias.name.as_str(), constructor)
                .map_err(|e| registration_failed(&alias.name, e))?;
            debug!(alias = %alias.name, base = %alias.base, "Registered reporter alias");
        }

        Ok(())
    }
}

/// Loads `path` (if present) and registers its aliases.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path, registries: &mut Registries) -> Result<Extensions> {
    let extensions = Extensions::load(path)?;
    extensions.apply(registries)?;
    if !extensions.is_empty() {
        info!(aliases = extensions.len(), "Loaded extensions");
    }
    Ok(extensions)
}

/// Overlays `config` on `defaults`. A configuration that is not a mapping
/// replaces the defaults; a missing one takes them as is.
fn merge_defaults(defaults: &Map<String, Value>, config: Value) -> Value {
    match config {
        Value::Null => Value::Object(defaults.clone()),
        Value::Object(overrides) => {
            let mut merged = defaults.clone();
            merged.extend(overrides);
            Value::Object(merged)
        }
        other => other,
    }
}

fn unknown_base(name: &str, kind: &str, base: &str, available: Vec<String>) -> AqueductError {
    AqueductError::Extension {
        name: name.to_string(),
        message: format!("unknown base {kind} '{base}' (available: {available:?})"),
    }
}

fn registration_failed(name: &str, err: AqueductError) -> AqueductError {
    AqueductError::Extension {
        name: name.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{context, users};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn extensions(yaml: &str) -> Extensions {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_merge_defaults() {
        let defaults = json!({"path": "a.db", "init": "x"});
        let defaults = defaults.as_object().unwrap();
        assert_eq!(
            merge_defaults(defaults, json!({"path": "b.db"})),
            json!({"path": "b.db", "init": "x"})
        );
        assert_eq!(merge_defaults(defaults, Value::Null), json!({"path": "a.db", "init": "x"}));
        assert_eq!(merge_defaults(defaults, json!("id")), json!("id"));
    }

    #[tokio::test]
    async fn test_provider_alias_applies_defaults() {
        let mut registries = Registries::with_builtins();
        extensions(
            r#"
providers:
  - name: seeded
    base: sqlite
    defaults:
      init: "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);"
"#,
        )
        .apply(&mut registries)
        .unwrap();

        let provider = registries.providers.create("seeded", Value::Null).await.unwrap();
        let rows = provider.execute_query("SELECT x FROM t").await.unwrap();
        assert_eq!(rows[0]["x"], 7);
    }

    #[tokio::test]
    async fn test_check_alias_applies_defaults() {
        let mut registries = Registries::with_builtins();
        extensions("checks:\n  - name: has_rows\n    base: row_count\n    defaults: {greater_than: 0}\n")
            .apply(&mut registries)
            .unwrap();

        let check = registries
            .checks
            .create(context("has_rows", Value::Null, users()))
            .unwrap();
        assert!(check.run().await.unwrap().passed);

        let check = registries
            .checks
            .create(context("has_rows", Value::Null, json!([])))
            .unwrap();
        assert!(!check.run().await.unwrap().passed);
    }

    #[test]
    fn test_reporter_alias_writes_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ci.md");
        let mut registries = Registries::with_builtins();
        Extensions {
            reporters: vec![ReporterAlias {
                name: "ci_markdown".to_string(),
                base: "markdown".to_string(),
                output: Some(output.clone()),
            }],
            ..Default::default()
        }
        .apply(&mut registries)
        .unwrap();

        let reporter = registries.reporters.create("ci_markdown").unwrap();
        reporter
            .generate_report(&crate::results::ResultTree::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(output).unwrap(), "# Test Results\n\n");
    }

    #[test]
    fn test_unknown_base_and_taken_name() {
        let mut registries = Registries::with_builtins();
        let err = extensions("checks:\n  - {name: fresh, base: freshness}\n")
            .apply(&mut registries)
            .unwrap_err();
        assert!(matches!(err, AqueductError::Extension { ref name, .. } if name == "fresh"));

        let err = extensions("reporters:\n  - {name: json, base: console}\n")
            .apply(&mut registries)
            .unwrap_err();
        assert!(matches!(err, AqueductError::Extension { ref name, .. } if name == "json"));
    }

    #[test]
    fn test_load_file() {
        let mut registries = Registries::with_builtins();
        let missing = load(Path::new("does/not/exist.yml"), &mut registries).unwrap();
        assert!(missing.is_empty());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reporters:\n  - {{name: plain, base: console}}").unwrap();
        let loaded = load(file.path(), &mut registries).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(registries.reporters.contains("plain"));

        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "widgets: []").unwrap();
        let err = load(bad.path(), &mut registries).unwrap_err();
        assert!(matches!(err, AqueductError::ConfigParse { .. }));
    }
}
