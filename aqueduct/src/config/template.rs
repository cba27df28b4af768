//! Two-pass text templating applied to configuration files before parsing.
//!
//! Pass one replaces `${NAME}` and `$NAME` with environment variables, pass two
//! replaces `{{name}}` with values from the [`PlaceholderTable`]. Each pass runs
//! exactly once over the text, so substituted values are never expanded again.

use crate::error::{AqueductError, ReferenceKind, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default placeholder file, resolved against the working directory.
pub const PLACEHOLDERS_FILE: &str = "environment.yml";

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{([^}]+)\}|\$(\S+)").expect("Hard-coded regex pattern should be valid")
});

static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{\{(.+?)\}\}").expect("Hard-coded regex pattern should be valid")
});

/// Named substitution values for `{{name}}` references.
///
/// Loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTable {
    values: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PlaceholderFile {
    #[serde(default)]
    placeholders: HashMap<String, serde_yaml::Value>,
}

impl PlaceholderTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the table from a YAML file with a top-level `placeholders` mapping.
    ///
    /// A missing file yields an empty table. Scalar values are converted to
    /// their string form; `null` entries are treated as unset.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "No placeholder file found");
            return Ok(Self::new());
        }

        let text = std::fs::read_to_string(path)?;
        let file: Option<PlaceholderFile> =
            serde_yaml::from_str(&text).map_err(|source| AqueductError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut values = HashMap::new();
        for (name, value) in file.map(|f| f.placeholders).unwrap_or_default() {
            let value = match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                other => serde_json::to_string(&other)?,
            };
            values.insert(name, value);
        }

        debug!(count = values.len(), "Loaded placeholders");
        Ok(Self { values })
    }

    /// Adds or replaces a placeholder value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the value for a placeholder name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns the number of placeholders.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no placeholders are defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PlaceholderTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Lookup function used to resolve environment references.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves environment and placeholder references in raw configuration text.
#[derive(Clone)]
pub struct Templater {
    placeholders: PlaceholderTable,
    env: EnvLookup,
}

impl fmt::Debug for Templater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templater")
            .field("placeholders", &self.placeholders.len())
            .finish_non_exhaustive()
    }
}

impl Templater {
    /// Creates a templater reading the process environment.
    pub fn new(placeholders: PlaceholderTable) -> Self {
        Self {
            placeholders,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replaces the environment lookup.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// Runs both passes over `text`, failing on the first unresolved reference.
    pub fn render(&self, text: &str) -> Result<String> {
        let text = self.substitute_env(text)?;
        self.substitute_placeholders(&text)
    }

    /// Pass one: `${NAME}` and `$NAME`.
    pub fn substitute_env(&self, text: &str) -> Result<String> {
        substitute(text, &ENV_VAR_PATTERN, |caps| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            (self.env)(name).ok_or_else(|| AqueductError::UnresolvedReference {
                kind: ReferenceKind::Environment,
                name: name.to_string(),
            })
        })
    }

    /// Pass two: `{{name}}`.
    pub fn substitute_placeholders(&self, text: &str) -> Result<String> {
        substitute(text, &PLACEHOLDER_PATTERN, |caps| {
            let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            self.placeholders
                .get(name)
                .map(str::to_string)
                .ok_or_else(|| AqueductError::UnresolvedReference {
                    kind: ReferenceKind::Placeholder,
                    name: name.to_string(),
                })
        })
    }
}

impl Default for Templater {
    fn default() -> Self {
        Self::new(PlaceholderTable::new())
    }
}

fn substitute<F>(text: &str, pattern: &Regex, mut resolve: F) -> Result<String>
where
    F: FnMut(&Captures<'_>) -> Result<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        output.push_str(&text[last..whole.start()]);
        output.push_str(&resolve(&caps)?);
        last = whole.end();
    }

    output.push_str(&text[last..]);
    Ok(output)
}
