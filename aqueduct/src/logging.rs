//! Logging configuration for Aqueduct.
//!
//! The library only emits `tracing` events and spans; installing a subscriber is
//! left to the binary (or to the embedding application). Log output goes to
//! stderr so that the console reporter owns stdout.

use tracing::Level;

/// Configuration for Aqueduct's logging setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for everything outside this crate
    pub level: Level,
    /// Log level for Aqueduct components specifically
    pub aqueduct_level: Level,
    /// Whether to use JSON output format
    pub json_format: bool,
    /// Environment filter override
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            aqueduct_level: Level::WARN,
            json_format: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration for CI pipelines: structured JSON, informational.
    pub fn ci() -> Self {
        Self {
            level: Level::WARN,
            aqueduct_level: Level::INFO,
            json_format: true,
            env_filter: None,
        }
    }

    /// Creates a configuration for debugging test definitions.
    pub fn development() -> Self {
        Self {
            level: Level::INFO,
            aqueduct_level: Level::DEBUG,
            json_format: false,
            env_filter: None,
        }
    }

    /// Sets the log level for Aqueduct components.
    pub fn with_aqueduct_level(mut self, level: Level) -> Self {
        self.aqueduct_level = level;
        self
    }

    /// Sets whether to use JSON output format.
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Sets a custom environment filter.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Builds the environment filter string.
    pub fn env_filter(&self) -> String {
        if let Some(ref filter) = self.env_filter {
            filter.clone()
        } else {
            format!(
                "{},aqueduct={}",
                self.level.as_str().to_lowercase(),
                self.aqueduct_level.as_str().to_lowercase()
            )
        }
    }
}

/// Installs a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG`, when set, takes precedence over the configured levels.
///
/// # Examples
///
/// ```rust,no_run
/// use aqueduct::logging::{init_logging, LoggingConfig};
///
/// init_logging(&LoggingConfig::development().with_json_format(true)).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.chars().count() <= max_length {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(max_length).collect();
        format!("{truncated}...(truncated)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.json_format);
        assert_eq!(config.env_filter(), "warn,aqueduct=warn");
    }

    #[test]
    fn test_logging_config_presets() {
        let ci = LoggingConfig::ci();
        assert!(ci.json_format);
        assert_eq!(ci.env_filter(), "warn,aqueduct=info");

        let dev = LoggingConfig::development().with_aqueduct_level(Level::TRACE);
        assert_eq!(dev.env_filter(), "info,aqueduct=trace");
    }

    #[test]
    fn test_env_filter_override() {
        let config = LoggingConfig::default().with_env_filter("aqueduct::providers=debug");
        assert_eq!(config.env_filter(), "aqueduct::providers=debug");
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");

        let long_text = "this is a very long text that should be truncated";
        assert_eq!(truncate_field(long_text, 10), "this is a ...(truncated)");

        // Multi-byte characters are never split
        assert_eq!(truncate_field("✅✅✅", 2), "✅✅...(truncated)");
    }
}
