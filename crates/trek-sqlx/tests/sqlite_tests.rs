//! SQLite backend integration tests.
//!
//! Each test gets a fresh database file and revision directory from
//! `tempfile`. The PostgreSQL test at the bottom needs `DATABASE_URL` and is
//! ignored by default.

use std::path::Path;
use tempfile::TempDir;
use trek_core::{Direction, Migrator, Target, TrekError};
use trek_sqlx::sqlx::{self, PgConnection, SqliteConnection};
use trek_sqlx::{collect_migrations, BackendConfig, PgBackend, SqliteBackend};

/// Edge-convention revisions; `rev4bad` fails halfway through.
const EDGE_FILES: &[(&str, &str)] = &[
    ("0001_initial_up_rev1.sql", "CREATE TABLE people (name TEXT);"),
    ("0001_rev1_down_initial.sql", "DROP TABLE people;"),
    (
        "0002_rev1_up_rev2.sql",
        "CREATE INDEX name_idx ON people(name);\nINSERT INTO people(name) VALUES ('Anakin');",
    ),
    (
        "0002_rev2_down_rev1.sql",
        "DELETE FROM people;\nDROP INDEX name_idx;",
    ),
    ("0003_rev2_up_rev3.sql", "DELETE FROM people;"),
    (
        "0004_rev3_up_rev4bad.sql",
        "INSERT INTO people(name) VALUES ('Luke');\nINSERT INTO missing_table VALUES (1);",
    ),
];

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, body) in files {
        std::fs::write(dir.join(name), body).unwrap();
    }
}

struct Fixture {
    _tmp: TempDir,
    backend: SqliteBackend,
    migrator: Migrator<SqliteBackend>,
}

async fn fixture(files: &[(&str, &str)], use_transactions: bool) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let revisions = tmp.path().join("revisions");
    std::fs::create_dir(&revisions).unwrap();
    write_files(&revisions, files);

    let config = BackendConfig::builder()
        .database_url(format!("sqlite://{}", tmp.path().join("trek.db").display()))
        .use_transactions(use_transactions)
        .build()
        .unwrap();
    let backend = SqliteBackend::new(config).await.unwrap();
    let migrations = collect_migrations::<SqliteConnection>(&revisions).unwrap();
    let migrator = Migrator::new(backend.clone(), migrations);
    Fixture {
        _tmp: tmp,
        backend,
        migrator,
    }
}

async fn first_name(backend: &SqliteBackend) -> Option<String> {
    sqlx::query_scalar("SELECT name FROM people LIMIT 1")
        .fetch_optional(backend.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_run_migrations() {
    let f = fixture(EDGE_FILES, true).await;

    let plan = f
        .migrator
        .plan(&Target::parse("rev1"), Direction::Up)
        .await
        .unwrap();
    f.migrator.execute(&plan).await.unwrap();
    assert_eq!(first_name(&f.backend).await, None);

    let plan = f
        .migrator
        .plan(&Target::parse("rev2"), Direction::Up)
        .await
        .unwrap();
    assert_eq!(plan.to_string(), "rev1 -> rev2");
    f.migrator.execute(&plan).await.unwrap();
    assert_eq!(first_name(&f.backend).await.as_deref(), Some("Anakin"));
    assert_eq!(f.migrator.current_revision().await.unwrap().as_str(), "rev2");
}

#[tokio::test]
async fn test_failed_migration_is_rolled_back() {
    let f = fixture(EDGE_FILES, true).await;
    f.migrator
        .migrate(&Target::parse("rev2"), Direction::Up)
        .await
        .unwrap();
    assert_eq!(first_name(&f.backend).await.as_deref(), Some("Anakin"));

    f.migrator
        .migrate(&Target::parse("rev3"), Direction::Up)
        .await
        .unwrap();
    assert_eq!(first_name(&f.backend).await, None);

    let err = f
        .migrator
        .migrate(&Target::parse("rev4bad"), Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::Execution { .. }));

    assert_eq!(first_name(&f.backend).await, None);
    assert_eq!(f.migrator.current_revision().await.unwrap().as_str(), "rev3");
    assert_eq!(f.migrator.history().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_multi_edge_failure_rolls_back_earlier_edges() {
    let f = fixture(EDGE_FILES, true).await;
    f.migrator
        .migrate(&Target::parse("rev2"), Direction::Up)
        .await
        .unwrap();

    let err = f
        .migrator
        .migrate(&Target::parse("rev4bad"), Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::Execution { .. }));

    // rev2 -> rev3 ran in the same transaction and went down with rev4bad.
    assert_eq!(first_name(&f.backend).await.as_deref(), Some("Anakin"));
    assert_eq!(f.migrator.current_revision().await.unwrap().as_str(), "rev2");
}

#[tokio::test]
async fn test_non_transactional_failure_keeps_earlier_edges() {
    let f = fixture(EDGE_FILES, false).await;
    f.migrator
        .migrate(&Target::parse("rev2"), Direction::Up)
        .await
        .unwrap();

    let err = f
        .migrator
        .migrate(&Target::parse("rev4bad"), Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrekError::Execution {
            operation_applied: false,
            ..
        }
    ));

    // rev3 stuck; the first statement of rev4bad did too.
    assert_eq!(f.migrator.current_revision().await.unwrap().as_str(), "rev3");
    assert_eq!(first_name(&f.backend).await.as_deref(), Some("Luke"));
}

#[tokio::test]
async fn test_downgrade_to_initial() {
    let f = fixture(EDGE_FILES, true).await;
    f.migrator
        .migrate(&Target::parse("rev2"), Direction::Up)
        .await
        .unwrap();

    let plan = f
        .migrator
        .migrate(&Target::Initial, Direction::Down)
        .await
        .unwrap();
    assert_eq!(plan.to_string(), "rev2 -> rev1 -> initial");
    assert!(f.migrator.current_revision().await.unwrap().is_initial());

    let missing = sqlx::query("SELECT name FROM people")
        .fetch_all(f.backend.pool())
        .await;
    assert!(missing.is_err());

    let history = f.migrator.history().await.unwrap();
    let moves: Vec<_> = history
        .iter()
        .map(|r| format!("{}>{}", r.from_revision, r.to_revision))
        .collect();
    assert_eq!(
        moves,
        ["initial>rev1", "rev1>rev2", "rev2>rev1", "rev1>initial"]
    );
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn test_downgrade_without_edge_is_no_path() {
    let f = fixture(EDGE_FILES, true).await;
    f.migrator
        .migrate(&Target::parse("rev3"), Direction::Up)
        .await
        .unwrap();

    let err = f
        .migrator
        .plan(&Target::parse("rev2"), Direction::Down)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::NoPath { .. }));
}

#[tokio::test]
async fn test_linear_revisions() {
    let files = [
        (
            "2022_04_10_12_34_00_mig1.sql",
            "CREATE TABLE people (name TEXT);",
        ),
        (
            "2022_04_11_12_34_00_mig2.up.sql",
            "INSERT INTO people(name) VALUES ('Anakin');",
        ),
        ("2022_04_11_12_34_00_mig2.down.sql", "DELETE FROM people;"),
        ("README.md", "not a migration"),
    ];
    let f = fixture(&files, true).await;

    let plan = f
        .migrator
        .migrate(&Target::Head, Direction::Up)
        .await
        .unwrap();
    assert_eq!(
        plan.to_string(),
        "initial -> 2022_04_10_12_34_00_mig1 -> 2022_04_11_12_34_00_mig2"
    );
    assert_eq!(first_name(&f.backend).await.as_deref(), Some("Anakin"));

    f.migrator
        .migrate(&Target::parse("2022_04_10_12_34_00_mig1"), Direction::Down)
        .await
        .unwrap();
    assert_eq!(first_name(&f.backend).await, None);

    // mig1 has no downgrade body.
    let err = f
        .migrator
        .plan(&Target::Initial, Direction::Down)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::NoOperation { .. }));
}

#[test]
fn test_collect_rejects_mixed_conventions() {
    let tmp = tempfile::tempdir().unwrap();
    write_files(
        tmp.path(),
        &[
            ("0001_initial_up_rev1.sql", "SELECT 1;"),
            ("2022_04_10_12_34_00_mig1.sql", "SELECT 1;"),
        ],
    );
    let err = collect_migrations::<SqliteConnection>(tmp.path()).unwrap_err();
    assert!(matches!(err, TrekError::Discovery(_)));
}

#[test]
fn test_collect_rejects_unknown_sql_names() {
    let tmp = tempfile::tempdir().unwrap();
    write_files(tmp.path(), &[("create_people.sql", "SELECT 1;")]);
    let err = collect_migrations::<SqliteConnection>(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("create_people.sql"));
}

#[test]
fn test_collect_missing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let err = collect_migrations::<SqliteConnection>(tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, TrekError::Io(_)));
}

#[test]
fn test_collect_orders_edges_by_file_name() {
    let tmp = tempfile::tempdir().unwrap();
    write_files(tmp.path(), EDGE_FILES);
    let migrations = collect_migrations::<SqliteConnection>(tmp.path()).unwrap();
    assert_eq!(migrations.len(), EDGE_FILES.len());
    assert_eq!(migrations.head().map(|r| r.as_str()), Some("rev4bad"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_postgres_custom_schema() {
    let url = std::env::var("DATABASE_URL").unwrap();
    let schema = format!("trek_test_{}", std::process::id());
    let config = BackendConfig::builder()
        .database_url(url)
        .schema(&schema)
        .build()
        .unwrap();
    let backend = PgBackend::new(config).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    write_files(tmp.path(), EDGE_FILES);
    let migrations = collect_migrations::<PgConnection>(tmp.path()).unwrap();
    let migrator = Migrator::new(backend.clone(), migrations);

    migrator
        .migrate(&Target::parse("rev2"), Direction::Up)
        .await
        .unwrap();
    let err = migrator
        .migrate(&Target::parse("rev4bad"), Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::Execution { .. }));
    assert_eq!(migrator.current_revision().await.unwrap().as_str(), "rev2");

    migrator
        .migrate(&Target::Initial, Direction::Down)
        .await
        .unwrap();
    let recorded: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {schema}.migrations"))
        .fetch_one(backend.pool())
        .await
        .unwrap();
    assert_eq!(recorded, 4);

    sqlx::raw_sql(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(backend.pool())
        .await
        .unwrap();
}
