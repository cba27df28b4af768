//! # Aqueduct - declarative data tests
//!
//! Aqueduct runs data-quality tests described in YAML against SQL-capable data
//! sources and reports the outcome in several formats.
//!
//! A test binds one named provider, one query and any number of checks. The
//! query runs once per test; every check then evaluates the returned rows and
//! produces a pass/fail outcome with diagnostics.
//!
//! ## Quick Start
//!
//! ```yaml
//! providers:
//!   - name: local
//!     type: sqlite
//!     config:
//!       path: ":memory:"
//!       init: |
//!         CREATE TABLE users (id INTEGER, email TEXT);
//!         INSERT INTO users VALUES (1, 'a@example.com');
//! tests:
//!   - name: users are present
//!     provider: local
//!     query: SELECT * FROM users
//!     row_count: {equals: 1}
//!     not_null: [id, email]
//! ```
//!
//! ```rust
//! use aqueduct::prelude::*;
//! use std::io::Write;
//!
//! # async fn example() -> aqueduct::Result<()> {
//! # let mut file = tempfile::NamedTempFile::new()?;
//! # writeln!(file, "providers: []")?;
//! # let path = file.path();
//! let registries = Registries::with_builtins();
//! let runner = TestRunner::from_files(&[path], &registries, PlaceholderTable::new()).await?;
//! let results = runner.run_all().await;
//!
//! registries.reporters.create("console")?.generate_report(&results)?;
//! assert!(results.all_passed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration files
//!
//! Files are run through a two-pass templating pipeline before parsing:
//! `${VAR}` and `$VAR` are replaced from the environment, then `{{name}}` from
//! the `placeholders:` mapping of `environment.yml`. Several files can be given;
//! their providers and tests are concatenated in order.
//!
//! ## Architecture
//!
//! - **`config`**: templating, placeholder table and configuration loading
//! - **`providers`**: the [`providers::DataProvider`] trait, the built-in
//!   `sqlite` and `datafusion` adapters and, behind features, `postgres` and
//!   `mysql`
//! - **`checks`**: the [`checks::Check`] trait and the built-in checks
//! - **`test`** and **`runner`**: test execution and orchestration
//! - **`reporters`**: `console`, `json`, `markdown` and `junit` output
//! - **`extensions`**: declarative aliases read from `extensions.yml`
//! - **`registry`**: the provider, check and reporter registries of a process

pub mod checks;
pub mod config;
pub mod error;
pub mod extensions;
pub mod logging;
pub mod prelude;
pub mod providers;
pub mod registry;
pub mod reporters;
pub mod results;
pub mod runner;
pub mod security;

pub use error::{AqueductError, Result};
