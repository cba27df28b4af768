//! Loading and merging of YAML test definitions.

use super::template::Templater;
use crate::error::{AqueductError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A provider declaration: a name bound to a provider type and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Name tests use to refer to this provider
    pub name: String,
    /// Registered provider type (e.g. `sqlite`)
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Type-specific settings handed to the provider constructor
    #[serde(default)]
    pub config: Value,
}

/// A test declaration.
///
/// Every key other than `name`, `provider`, `query` and `description` is a
/// check type mapped to that check's configuration, kept in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,
    pub provider: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub checks: Map<String, Value>,
}

/// The merged configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

impl RunConfig {
    /// Appends another document's entries after this one's.
    pub fn merge(&mut self, other: RunConfig) {
        self.providers.extend(other.providers);
        self.tests.extend(other.tests);
    }
}

/// Reads configuration files through the templating pipeline and merges them.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    templater: Templater,
}

impl ConfigLoader {
    /// Creates a loader using the given templater.
    pub fn new(templater: Templater) -> Self {
        Self { templater }
    }

    /// Loads and merges `paths` in order.
    ///
    /// Every path must exist before any file is read. Later files' providers
    /// and tests follow earlier files' entries; nothing is de-duplicated.
    #[instrument(skip(self, paths))]
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<RunConfig> {
        for path in paths {
            ensure_exists(path.as_ref())?;
        }

        let mut merged = RunConfig::default();
        for path in paths {
            merged.merge(self.load_file(path.as_ref())?);
        }

        info!(
            files = paths.len(),
            providers = merged.providers.len(),
            tests = merged.tests.len(),
            "Loaded configuration"
        );
        Ok(merged)
    }

    /// Loads a single file.
    pub fn load_file(&self, path: &Path) -> Result<RunConfig> {
        ensure_exists(path)?;
        let raw = std::fs::read_to_string(path)?;
        let text = self.templater.render(&raw)?;
        let config = parse_document(&text, path)?;

        debug!(
            path = %path.display(),
            providers = config.providers.len(),
            tests = config.tests.len(),
            "Parsed configuration file"
        );
        Ok(config)
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AqueductError::ConfigNotFound {
            path: path.to_path_buf(),
        })
    }
}

fn parse_document(text: &str, path: &Path) -> Result<RunConfig> {
    let document: Option<RunConfig> =
        serde_yaml::from_str(text).map_err(|source| AqueductError::ConfigParse {
            path: PathBuf::from(path),
            source,
        })?;
    Ok(document.unwrap_or_default())
}
