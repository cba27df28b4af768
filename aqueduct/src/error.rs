//! Error types for the Aqueduct test runner.
//!
//! All fallible operations in the library return [`AqueductError`]. The variants
//! fall into two groups: configuration-stage errors, which abort a run before any
//! test executes, and execution-stage errors (query and check failures), which the
//! runner captures as failing outcomes instead of propagating.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The kind of reference the templating pipeline failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A `${NAME}` or `$NAME` environment variable reference
    Environment,
    /// A `{{name}}` placeholder reference
    Placeholder,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Environment => write!(f, "Environment variable"),
            ReferenceKind::Placeholder => write!(f, "Placeholder variable"),
        }
    }
}

/// The main error type for the Aqueduct library.
#[derive(Error, Debug)]
pub enum AqueductError {
    /// A configuration file path does not exist.
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// A configuration (or placeholder/extension) file is not valid YAML
    /// or does not have the expected structure.
    #[error("Failed to parse '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment variable or placeholder referenced in a configuration
    /// file has no value.
    #[error("{kind} '{name}' is not set")]
    UnresolvedReference { kind: ReferenceKind, name: String },

    /// No provider constructor is registered under the requested type name.
    #[error("Unknown provider type: {name}. Available providers: {available:?}")]
    UnknownProviderType { name: String, available: Vec<String> },

    /// A constructor could not be registered (empty or duplicate name).
    #[error("Cannot register {registry} '{name}': {reason}")]
    InvalidRegistration {
        registry: &'static str,
        name: String,
        reason: String,
    },

    /// A provider could not be constructed (e.g. the data source is unreachable).
    #[error("Failed to connect to {provider_type}: {message}")]
    ProviderConnection {
        provider_type: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A query failed on a live provider.
    #[error("Failed to execute {provider_type} query: {message}\nQuery: {query}")]
    ProviderQuery {
        provider_type: String,
        query: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A test refers to a provider name that no configuration declares.
    #[error("Test '{test}' references undeclared provider '{provider}'")]
    ConfigReference { test: String, provider: String },

    /// A test configures a check type that is not registered.
    #[error("Unknown check type '{name}' in test '{test}'. Available checks: {available:?}")]
    UnknownCheckType {
        test: String,
        name: String,
        available: Vec<String>,
    },

    /// A check's configuration cannot be interpreted by its constructor.
    #[error("Invalid configuration for check '{check_type}': {message}")]
    InvalidCheckConfig { check_type: String, message: String },

    /// No reporter is registered under the requested format name.
    #[error("Unknown reporter format: {name}. Available formats: {available:?}")]
    UnknownReporterFormat { name: String, available: Vec<String> },

    /// The extension file declares an alias that cannot be registered.
    #[error("Invalid extension '{name}': {message}")]
    Extension { name: String, message: String },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A type alias for `Result<T, AqueductError>`.
pub type Result<T> = std::result::Result<T, AqueductError>;

impl AqueductError {
    /// Creates a provider connection error without an underlying source.
    pub fn connection(provider_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderConnection {
            provider_type: provider_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a provider connection error wrapping the underlying cause.
    pub fn connection_with_source(
        provider_type: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ProviderConnection {
            provider_type: provider_type.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a query error wrapping the underlying cause and the offending query.
    pub fn query(
        provider_type: impl Into<String>,
        query: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ProviderQuery {
            provider_type: provider_type.into(),
            query: query.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid check configuration error.
    pub fn invalid_check_config(check_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCheckConfig {
            check_type: check_type.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors raised while loading configuration or building
    /// the run, before any test executes.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(
            self,
            AqueductError::ProviderQuery { .. }
                | AqueductError::InvalidCheckConfig { .. }
                | AqueductError::Io(_)
                | AqueductError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for AqueductError {
    fn from(err: serde_json::Error) -> Self {
        AqueductError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_unresolved_reference_message() {
        let err = AqueductError::UnresolvedReference {
            kind: ReferenceKind::Environment,
            name: "DB_PASSWORD".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Environment variable 'DB_PASSWORD' is not set"
        );

        let err = AqueductError::UnresolvedReference {
            kind: ReferenceKind::Placeholder,
            name: "schema".to_string(),
        };
        assert_eq!(err.to_string(), "Placeholder variable 'schema' is not set");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let err = AqueductError::UnknownProviderType {
            name: "athena".to_string(),
            available: vec!["datafusion".to_string(), "sqlite".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown provider type: athena. Available providers: [\"datafusion\", \"sqlite\"]"
        );
    }

    #[test]
    fn test_query_error_keeps_source_and_query() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "no such table: users");
        let err = AqueductError::query("sqlite", "SELECT * FROM users", cause);

        assert!(err.source().is_some());
        let message = err.to_string();
        assert!(message.contains("no such table: users"));
        assert!(message.ends_with("Query: SELECT * FROM users"));
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(AqueductError::ConfigNotFound {
            path: PathBuf::from("missing.yml")
        }
        .is_configuration_error());
        assert!(AqueductError::ConfigReference {
            test: "t1".to_string(),
            provider: "nope".to_string()
        }
        .is_configuration_error());
        assert!(AqueductError::connection("sqlite", "unable to open").is_configuration_error());
        assert!(!AqueductError::invalid_check_config("row_count", "bad").is_configuration_error());
    }
}
