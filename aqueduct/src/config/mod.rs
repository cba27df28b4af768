//! Configuration loading: templating and multi-file merging.
//!
//! ```text
//! raw text ──► Templater (env, then placeholders) ──► YAML ──► RunConfig
//! ```

mod loader;
mod template;

pub use loader::{ConfigLoader, ProviderSpec, RunConfig, TestSpec};
pub use template::{EnvLookup, PlaceholderTable, Templater, PLACEHOLDERS_FILE};
