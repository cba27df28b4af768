//! Data providers: named adapters that run a query and return rows.
//!
//! Provider types are looked up by name in a [`ProviderRegistry`]. Each entry is
//! a constructor taking the provider's `config` mapping from the test definition
//! file. Built-in adapters are registered by [`ProviderRegistry::with_builtins`];
//! applications add their own with [`ProviderRegistry::register`].
//!
//! # Examples
//!
//! ```rust
//! use aqueduct::providers::{DataProvider, ProviderRegistry};
//! use serde_json::json;
//!
//! # async fn example() -> aqueduct::Result<()> {
//! let registry = ProviderRegistry::with_builtins();
//! let provider = registry
//!     .create("sqlite", json!({"path": ":memory:"}))
//!     .await?;
//! let rows = provider.execute_query("SELECT 1 AS x").await?;
//! assert_eq!(rows[0]["x"], 1);
//! # Ok(())
//! # }
//! ```

use crate::error::{AqueductError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(feature = "athena")]
mod athena;
#[cfg(feature = "database")]
mod database;
mod engine;
mod sqlite;

#[cfg(feature = "athena")]
pub use athena::{AthenaConfig, AthenaProvider};
#[cfg(feature = "mysql")]
pub use database::{MySqlConfig, MySqlProvider};
#[cfg(feature = "postgres")]
pub use database::{PostgresConfig, PostgresProvider};
pub use engine::{DataFusionConfig, DataFusionProvider};
pub use sqlite::{SqliteConfig, SqliteProvider};

/// One result row: column name to value, in result-schema order.
pub type Row = Map<String, Value>;

/// A live connection or session bound to one data source.
#[async_trait]
pub trait DataProvider: Debug + Send + Sync {
    /// Runs `query` and returns every row of its result.
    ///
    /// Failures are reported as [`AqueductError::ProviderQuery`] carrying the
    /// query text.
    async fn execute_query(&self, query: &str) -> Result<Vec<Row>>;

    /// The registered type name of this provider (e.g. `sqlite`).
    fn provider_type(&self) -> &str;

    /// Returns a human-readable description of the data source.
    fn description(&self) -> String;
}

/// Constructs a provider from its configuration.
pub type ProviderConstructor =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Arc<dyn DataProvider>>> + Send + Sync>;

/// Name-keyed registry of provider constructors.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available())
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in adapter enabled at compile time.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        self.insert_builtin(SqliteProvider::TYPE_NAME, |config| async move {
            let config: SqliteConfig = parse_config(SqliteProvider::TYPE_NAME, config)?;
            let provider: Arc<dyn DataProvider> = Arc::new(SqliteProvider::open(config)?);
            Ok(provider)
        });
        self.insert_builtin(DataFusionProvider::TYPE_NAME, |config| async move {
            let config: DataFusionConfig = parse_config(DataFusionProvider::TYPE_NAME, config)?;
            let provider: Arc<dyn DataProvider> =
                Arc::new(DataFusionProvider::open(config).await?);
            Ok(provider)
        });
        #[cfg(feature = "postgres")]
        self.insert_builtin(PostgresProvider::TYPE_NAME, |config| async move {
            let config: PostgresConfig = parse_config(PostgresProvider::TYPE_NAME, config)?;
            let provider: Arc<dyn DataProvider> =
                Arc::new(PostgresProvider::connect(config).await?);
            Ok(provider)
        });
        #[cfg(feature = "mysql")]
        self.insert_builtin(MySqlProvider::TYPE_NAME, |config| async move {
            let config: MySqlConfig = parse_config(MySqlProvider::TYPE_NAME, config)?;
            let provider: Arc<dyn DataProvider> = Arc::new(MySqlProvider::connect(config).await?);
            Ok(provider)
        });
        #[cfg(feature = "athena")]
        self.insert_builtin(AthenaProvider::TYPE_NAME, |config| async move {
            let config: AthenaConfig = parse_config(AthenaProvider::TYPE_NAME, config)?;
            let provider: Arc<dyn DataProvider> =
                Arc::new(AthenaProvider::connect(config).await?);
            Ok(provider)
        });
    }

    fn insert_builtin<F, Fut>(&mut self, name: &str, constructor: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn DataProvider>>> + Send + 'static,
    {
        self.constructors
            .insert(name.to_string(), boxed_constructor(constructor));
    }

    /// Registers a provider type.
    ///
    /// Fails with [`AqueductError::InvalidRegistration`] if `name` is empty or
    /// already registered.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn DataProvider>>> + Send + 'static,
    {
        self.register_constructor(name, boxed_constructor(constructor))
    }

    /// Registers an already boxed constructor.
    pub fn register_constructor(
        &mut self,
        name: impl Into<String>,
        constructor: ProviderConstructor,
    ) -> Result<()> {
        let name = name.into();
        check_registration("provider", &name, self.constructors.contains_key(&name))?;
        debug!(provider.type = %name, "Registered provider type");
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Returns the constructor registered under `name`.
    pub fn constructor(&self, name: &str) -> Option<ProviderConstructor> {
        self.constructors.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns the registered type names, sorted.
    pub fn available(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Constructs a live provider of type `name`.
    ///
    /// Any constructor failure is reported as
    /// [`AqueductError::ProviderConnection`].
    #[instrument(skip(self, config))]
    pub async fn create(&self, name: &str, config: Value) -> Result<Arc<dyn DataProvider>> {
        let constructor =
            self.constructor(name)
                .ok_or_else(|| AqueductError::UnknownProviderType {
                    name: name.to_string(),
                    available: self.available(),
                })?;

        constructor(config).await.map_err(|e| match e {
            e @ AqueductError::ProviderConnection { .. } => e,
            other => AqueductError::ProviderConnection {
                provider_type: name.to_string(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        })
    }
}

/// The live providers of one run, keyed by their declared names.
#[derive(Debug, Clone, Default)]
pub struct ProviderMap {
    providers: HashMap<String, Arc<dyn DataProvider>>,
}

impl ProviderMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider. A later provider with the same name replaces the earlier one.
    pub fn insert(&mut self, name: impl Into<String>, provider: Arc<dyn DataProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Looks up a provider by declared name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn DataProvider>> {
        self.providers.get(name)
    }

    /// Returns the declared names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no providers are declared.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn boxed_constructor<F, Fut>(constructor: F) -> ProviderConstructor
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn DataProvider>>> + Send + 'static,
{
    Arc::new(
        move |config: Value| -> BoxFuture<'static, Result<Arc<dyn DataProvider>>> {
            Box::pin(constructor(config))
        },
    )
}

/// Deserializes a provider `config` mapping; a missing mapping counts as empty.
pub fn parse_config<T: DeserializeOwned>(provider_type: &str, config: Value) -> Result<T> {
    let config = match config {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(config).map_err(|e| {
        AqueductError::connection(provider_type, format!("invalid configuration: {e}"))
    })
}

pub(crate) fn check_registration(registry: &'static str, name: &str, taken: bool) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AqueductError::InvalidRegistration {
            registry,
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if taken {
        return Err(AqueductError::InvalidRegistration {
            registry,
            name: name.to_string(),
            reason: "name is already registered".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct StaticProvider {
        rows: Vec<Row>,
    }

    #[async_trait]
    impl DataProvider for StaticProvider {
        async fn execute_query(&self, _query: &str) -> Result<Vec<Row>> {
            Ok(self.rows.clone())
        }

        fn provider_type(&self) -> &str {
            "static"
        }

        fn description(&self) -> String {
            format!("{} static rows", self.rows.len())
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.contains("sqlite"));
        assert!(registry.contains("datafusion"));
        assert!(!registry.contains("athena"));
    }

    #[tokio::test]
    async fn test_register_custom_provider() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("static", |config: Value| async move {
                let count = config["rows"].as_u64().unwrap_or(0);
                let rows = (0..count)
                    .map(|i| {
                        let mut row = Row::new();
                        row.insert("i".to_string(), json!(i));
                        row
                    })
                    .collect();
                let provider: Arc<dyn DataProvider> = Arc::new(StaticProvider { rows });
                Ok(provider)
            })
            .unwrap();

        let provider = registry.create("static", json!({"rows": 3})).await.unwrap();
        let rows = provider.execute_query("ignored").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(provider.description(), "3 static rows");
    }

    #[test]
    fn test_duplicate_and_empty_names_rejected() {
        let mut registry = ProviderRegistry::with_builtins();
        let constructor = registry.constructor("sqlite").unwrap();

        let err = registry
            .register_constructor("sqlite", constructor.clone())
            .unwrap_err();
        assert!(matches!(err, AqueductError::InvalidRegistration { .. }));

        let err = registry.register_constructor("  ", constructor).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_unknown_provider_lists_registered_names() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry.create("athena", Value::Null).await.unwrap_err();
        match err {
            AqueductError::UnknownProviderType { name, available } => {
                assert_eq!(name, "athena");
                assert!(available.contains(&"sqlite".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_connection_error() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry
            .create("sqlite", json!({"path": ":memory:", "bogus": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, AqueductError::ProviderConnection { .. }));
    }

    #[test]
    fn test_provider_map_replaces_duplicate_names() {
        let mut map = ProviderMap::new();
        map.insert("a", Arc::new(StaticProvider { rows: vec![] }));
        map.insert("a", Arc::new(StaticProvider { rows: vec![Row::new()] }));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").unwrap().description(), "1 static rows");
    }
}
