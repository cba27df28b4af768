//! Reporters: named renderers of a [`ResultTree`].
//!
//! Built-in formats are `console` (stdout), `json` (`report.json`), `markdown`
//! (`report.md`) and `junit` (`junit.xml`). File-based reporters write into the
//! working directory unless [`ReporterOptions::output`] says otherwise, and
//! overwrite any previous report.
//!
//! # Examples
//!
//! ```rust
//! use aqueduct::reporters::ReporterRegistry;
//!
//! let registry = ReporterRegistry::with_builtins();
//! assert_eq!(registry.available(), vec!["console", "json", "junit", "markdown"]);
//! assert!(registry.create("yaml").is_err());
//! ```

use crate::error::{AqueductError, Result};
use crate::results::ResultTree;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

mod console;
mod json;
mod junit;
mod markdown;

pub use console::ConsoleReporter;
pub use json::JsonReporter;
pub use junit::JUnitReporter;
pub use markdown::MarkdownReporter;

/// Renders a result tree to its destination.
///
/// Reporters only read the tree.
pub trait Reporter: Send + Sync {
    /// Registered format name.
    fn name(&self) -> &str;

    /// Writes the report.
    fn generate_report(&self, results: &ResultTree) -> Result<()>;
}

/// Options shared by the built-in reporters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReporterOptions {
    /// Destination overriding the reporter's default file (or stdout for `console`)
    pub output: Option<PathBuf>,
}

impl ReporterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output path.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// The configured output path, or `default` when none is set.
    pub fn output_or<'a>(&'a self, default: &'a str) -> &'a Path {
        self.output.as_deref().unwrap_or(Path::new(default))
    }
}

/// Writes a rendered report to `path`, replacing any previous file.
pub(crate) fn write_report(format: &str, path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)?;
    info!(format, path = %path.display(), "Report written");
    Ok(())
}

/// Constructs a reporter from its options.
pub type ReporterConstructor = Arc<dyn Fn(&ReporterOptions) -> Box<dyn Reporter> + Send + Sync>;

/// Name-keyed registry of reporter constructors.
#[derive(Clone, Default)]
pub struct ReporterRegistry {
    constructors: BTreeMap<String, ReporterConstructor>,
}

impl fmt::Debug for ReporterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterRegistry")
            .field("formats", &self.available())
            .finish()
    }
}

impl ReporterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in formats.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert_builtin(ConsoleReporter::NAME, |opts| {
            Box::new(ConsoleReporter::new(opts.clone()))
        });
        registry.insert_builtin(JsonReporter::NAME, |opts| {
            Box::new(JsonReporter::new(opts.clone()))
        });
        registry.insert_builtin(MarkdownReporter::NAME, |opts| {
            Box::new(MarkdownReporter::new(opts.clone()))
        });
        registry.insert_builtin(JUnitReporter::NAME, |opts| {
            Box::new(JUnitReporter::new(opts.clone()))
        });
        registry
    }

    fn insert_builtin<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&ReporterOptions) -> Box<dyn Reporter> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
    }

    /// Registers a reporter format.
    ///
    /// Fails with [`AqueductError::InvalidRegistration`] if `name` is empty or
    /// already registered.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn(&ReporterOptions) -> Box<dyn Reporter> + Send + Sync + 'static,
    {
        self.register_constructor(name, Arc::new(constructor))
    }

    /// Registers an already boxed constructor.
    pub fn register_constructor(
        &mut self,
        name: impl Into<String>,
        constructor: ReporterConstructor,
    ) -> Result<()> {
        let name = name.into();
        crate::providers::check_registration(
            "reporter",
            &name,
            self.constructors.contains_key(&name),
        )?;
        debug!(reporter.format = %name, "Registered reporter format");
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Returns the constructor registered under `name`.
    pub fn constructor(&self, name: &str) -> Option<ReporterConstructor> {
        self.constructors.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns the registered format names, sorted.
    pub fn available(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Constructs the reporter `name` with default options.
    pub fn create(&self, name: &str) -> Result<Box<dyn Reporter>> {
        self.create_with(name, &ReporterOptions::default())
    }

    /// Constructs the reporter `name` with explicit options.
    pub fn create_with(&self, name: &str, options: &ReporterOptions) -> Result<Box<dyn Reporter>> {
        let constructor =
            self.constructor(name)
                .ok_or_else(|| AqueductError::UnknownReporterFormat {
                    name: name.to_string(),
                    available: self.available(),
                })?;
        Ok(constructor(options))
    }
}
