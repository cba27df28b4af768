//! End-to-end runs through the library API: files on disk, templating,
//! providers, checks and reporters.

use aqueduct::config::{ConfigLoader, PlaceholderTable, Templater};
use aqueduct::error::{AqueductError, ReferenceKind};
use aqueduct::extensions;
use aqueduct::registry::Registries;
use aqueduct::runner::TestRunner;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

const LOCAL_PROVIDER: &str = r#"
providers:
  - name: local
    type: sqlite
    config:
      path: ":memory:"
      init: |
        CREATE TABLE users (id INTEGER, email TEXT, country TEXT);
        INSERT INTO users VALUES (1, 'a@example.com', 'PT');
"#;

#[tokio::test]
async fn test_single_row_scenario() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "tests.yml",
        &format!(
            "{LOCAL_PROVIDER}
tests:
  - name: one row
    provider: local
    query: SELECT 1 AS x
    row_count: {{equals: 1}}
  - name: two rows
    provider: local
    query: SELECT 1 AS x
    row_count: {{equals: 2}}
"
        ),
    );

    let registries = Registries::with_builtins();
    let runner = TestRunner::from_files(&[config], &registries, PlaceholderTable::new())
        .await
        .unwrap();
    let results = runner.run_all().await;

    assert_eq!(results.len(), 2);
    let first = &results.tests()[0];
    assert_eq!(first.name, "one row");
    assert_eq!(first.results.len(), 1);
    assert_eq!(first.results[0].test_type, "row_count");
    assert!(first.results[0].result.passed);

    let second = &results.tests()[1];
    assert!(!second.results[0].result.passed);
    assert_eq!(second.results[0].result.details["actual"], 1);
    assert!(!results.all_passed());
}

#[tokio::test]
async fn test_files_merge_in_order() {
    let dir = TempDir::new().unwrap();
    let a = write(
        dir.path(),
        "a.yml",
        "providers:\n  - {name: p1, type: sqlite}\ntests:\n  - {name: t1, provider: p2, query: SELECT 1, not_empty: true}\n",
    );
    let b = write(
        dir.path(),
        "b.yml",
        "providers:\n  - {name: p2, type: sqlite}\ntests:\n  - {name: t2, provider: p1, query: SELECT 2, not_empty: true}\n",
    );

    let config = ConfigLoader::default().load(&[&a, &b]).unwrap();
    let providers: Vec<_> = config.providers.iter().map(|p| p.name.as_str()).collect();
    let tests: Vec<_> = config.tests.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(providers, vec!["p1", "p2"]);
    assert_eq!(tests, vec!["t1", "t2"]);

    // Tests may reference providers declared in another file.
    let registries = Registries::with_builtins();
    let runner = TestRunner::new(config, &registries).await.unwrap();
    assert!(runner.run_all().await.all_passed());
}

#[tokio::test]
async fn test_query_failure_keeps_shape() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "tests.yml",
        &format!(
            "{LOCAL_PROVIDER}
tests:
  - name: broken
    provider: local
    query: SELECT * FROM nowhere
    row_count: {{equals: 1}}
    not_null: id
    unique: id
  - name: fine
    provider: local
    query: SELECT * FROM users
    row_count: {{equals: 1}}
    not_null: [id, email]
    unique: id
"
        ),
    );

    let registries = Registries::with_builtins();
    let runner = TestRunner::from_files(&[config], &registries, PlaceholderTable::new())
        .await
        .unwrap();
    let results = runner.run_all().await;

    assert_eq!(results.len(), 2);
    for test in &results {
        assert_eq!(test.results.len(), 3);
    }
    assert!(results.tests()[0].results.iter().all(|r| !r.passed()));
    assert!(results.tests()[1].passed());
    assert_eq!(
        results.tests()[0].results[1].result.details["query"],
        "SELECT * FROM nowhere"
    );
}

#[tokio::test]
async fn test_dangling_provider_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "tests.yml",
        &format!(
            "{LOCAL_PROVIDER}
tests:
  - name: orphan
    provider: warehouse
    query: SELECT 1
    not_empty: true
"
        ),
    );

    let err = TestRunner::from_files(&[config], &Registries::with_builtins(), PlaceholderTable::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AqueductError::ConfigReference { ref test, ref provider }
        if test == "orphan" && provider == "warehouse"));
    assert!(err.is_configuration_error());
}

#[test]
fn test_templating_before_parse() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "tests.yml",
        "providers:\n  - name: local\n    type: ${DB_KIND}\n    config: {path: \"{{db_path}}\"}\n",
    );

    let placeholders: PlaceholderTable = [("db_path", ":memory:")].into_iter().collect();
    let templater = Templater::new(placeholders.clone())
        .with_env(|name| (name == "DB_KIND").then(|| "sqlite".to_string()));
    let loaded = ConfigLoader::new(templater).load(&[&config]).unwrap();
    assert_eq!(loaded.providers[0].provider_type, "sqlite");
    assert_eq!(loaded.providers[0].config["path"], ":memory:");

    let unset = Templater::new(placeholders).with_env(|_| None);
    let err = ConfigLoader::new(unset).load(&[&config]).unwrap_err();
    assert!(matches!(err, AqueductError::UnresolvedReference { kind: ReferenceKind::Environment, ref name }
        if name == "DB_KIND"));
}

#[tokio::test]
async fn test_placeholder_file() {
    let dir = TempDir::new().unwrap();
    let env_file = write(
        dir.path(),
        "environment.yml",
        "placeholders:\n  expected_rows: 1\n  users_table: users\n",
    );
    let config = write(
        dir.path(),
        "tests.yml",
        &format!(
            "{LOCAL_PROVIDER}
tests:
  - name: templated
    provider: local
    query: SELECT * FROM {{{{users_table}}}}
    row_count: {{{{expected_rows}}}}
"
        ),
    );

    let placeholders = PlaceholderTable::load(&env_file).unwrap();
    let runner = TestRunner::from_files(&[config], &Registries::with_builtins(), placeholders)
        .await
        .unwrap();
    let results = runner.run_all().await;
    assert_eq!(results.tests()[0].query, "SELECT * FROM users");
    assert!(results.all_passed());
}

#[tokio::test]
async fn test_cross_provider_comparison() {
    let dir = TempDir::new().unwrap();
    let csv = write(dir.path(), "users.csv", "id,country\n1,PT\n");
    let config = write(
        dir.path(),
        "tests.yml",
        &format!(
            "{LOCAL_PROVIDER}
  - name: files
    type: datafusion
    config:
      tables:
        users: {}
tests:
  - name: sqlite matches csv
    provider: local
    query: SELECT id, country FROM users ORDER BY id
    same_as:
      provider: files
      query: SELECT id, country FROM users ORDER BY id
",
            csv.display()
        ),
    );

    let runner = TestRunner::from_files(&[config], &Registries::with_builtins(), PlaceholderTable::new())
        .await
        .unwrap();
    let results = runner.run_all().await;
    let outcome = &results.tests()[0].results[0].result;
    assert!(outcome.passed, "unexpected outcome: {outcome:?}");
}

#[tokio::test]
async fn test_extension_aliases() {
    let dir = TempDir::new().unwrap();
    let ext = write(
        dir.path(),
        "extensions.yml",
        r#"
providers:
  - name: seeded
    base: sqlite
    defaults:
      init: "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2);"
checks:
  - name: has_rows
    base: row_count
    defaults: {greater_than: 0}
"#,
    );
    let config = write(
        dir.path(),
        "tests.yml",
        "providers:\n  - {name: db, type: seeded}\ntests:\n  - name: seeded rows\n    provider: db\n    query: SELECT x FROM t\n    has_rows:\n",
    );

    let mut registries = Registries::with_builtins();
    extensions::load(&ext, &mut registries).unwrap();

    let runner = TestRunner::from_files(&[config], &registries, PlaceholderTable::new())
        .await
        .unwrap();
    let results = runner.run_all().await;
    assert_eq!(results.tests()[0].results[0].test_type, "has_rows");
    assert!(results.all_passed());
}
