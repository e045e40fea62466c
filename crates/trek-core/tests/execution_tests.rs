//! Plan execution against the in-memory backend.
//!
//! Covers the rollback contract in both scope modes, record failures, and
//! resolution determinism across separate migrator instances.

use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;
use trek_core::{
    BoxError, Direction, ExecutionPhase, FnOperation, MemoryBackend, MemoryConnection,
    MemoryStatement, Migration, Migrations, Migrator, Operation, Revision, RevisionSpec, Target,
    TrekError,
};

/// Operation that applies a statement and then fails.
struct Failing(&'static str);

#[async_trait]
impl Operation<MemoryConnection> for Failing {
    async fn run(&self, conn: &mut MemoryConnection) -> Result<(), BoxError> {
        conn.execute(self.0);
        Err(format!("{} failed", self.0).into())
    }
}

fn two_edges_second_failing() -> Migrations<MemoryConnection> {
    Migrations::from_linear(vec![
        RevisionSpec::new("1").with_upgrade(MemoryStatement::shared("CREATE TABLE people")),
        RevisionSpec::new("2").with_upgrade(Arc::new(Failing("CREATE TABLE pets"))),
    ])
}

#[tokio::test]
async fn test_failure_in_transactional_scope_rolls_back_everything() {
    let backend = MemoryBackend::new();
    let migrator = Migrator::new(backend.clone(), two_edges_second_failing());

    let err = migrator
        .migrate(&Target::Head, Direction::Up)
        .await
        .unwrap_err();

    match err {
        TrekError::Execution {
            ref from,
            ref to,
            phase,
            operation_applied,
            ..
        } => {
            assert_eq!(from.as_str(), "1");
            assert_eq!(to.as_str(), "2");
            assert_eq!(phase, ExecutionPhase::Operation);
            assert!(!operation_applied);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(backend.records().is_empty());
    assert!(backend.statements().is_empty());
    assert!(migrator.current_revision().await.unwrap().is_initial());
}

#[tokio::test]
async fn test_failure_in_non_transactional_scope_keeps_first_edge() {
    let backend = MemoryBackend::non_transactional();
    let migrator = Migrator::new(backend.clone(), two_edges_second_failing());

    let err = migrator
        .migrate(&Target::Head, Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::Execution { .. }));

    let records = backend.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_revision.as_str(), "1");
    // The failed statement ran before the error; nothing can take it back.
    assert_eq!(
        backend.statements(),
        vec!["CREATE TABLE people", "CREATE TABLE pets"]
    );
    assert_eq!(migrator.current_revision().await.unwrap().as_str(), "1");
}

#[tokio::test]
async fn test_rejected_record_stops_step_before_operation() {
    let backend = MemoryBackend::new().reject_records_to("2");
    let migrator = Migrator::new(
        backend.clone(),
        Migrations::from_linear(vec![
            RevisionSpec::new("1").with_upgrade(MemoryStatement::shared("CREATE TABLE people")),
            RevisionSpec::new("2").with_upgrade(MemoryStatement::shared("CREATE TABLE pets")),
        ]),
    );

    let err = migrator
        .migrate(&Target::Head, Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrekError::Execution {
            phase: ExecutionPhase::Record,
            operation_applied: false,
            ..
        }
    ));
    assert!(backend.statements().is_empty());
    assert!(backend.records().is_empty());
}

#[tokio::test]
async fn test_rejected_record_after_operation_is_flagged() {
    let backend = MemoryBackend::non_transactional().reject_records_to("1");
    let migrator = Migrator::new(
        backend.clone(),
        Migrations::new().with(Migration::up(
            Revision::initial(),
            "1",
            MemoryStatement::shared("CREATE TABLE people"),
        )),
    );

    let err = migrator
        .migrate(&Target::Head, Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrekError::Execution {
            phase: ExecutionPhase::Record,
            operation_applied: true,
            ..
        }
    ));
    assert!(err.to_string().contains("record it manually"));
    assert_eq!(backend.statements(), vec!["CREATE TABLE people"]);
}

#[tokio::test]
async fn test_closure_operations_see_the_scoped_connection() {
    let backend = MemoryBackend::new();
    let migrations = Migrations::new()
        .with(Migration::up(
            Revision::initial(),
            "a",
            Arc::new(FnOperation::new("seed", |conn: &mut MemoryConnection| {
                async move {
                    conn.execute("INSERT INTO people VALUES (1)");
                    Ok::<(), BoxError>(())
                }
                .boxed()
            })),
        ))
        .with(Migration::down(
            "a",
            Revision::initial(),
            MemoryStatement::shared("DELETE FROM people"),
        ));
    let migrator = Migrator::new(backend.clone(), migrations);

    migrator.migrate(&Target::Head, Direction::Up).await.unwrap();
    migrator
        .migrate(&Target::Initial, Direction::Down)
        .await
        .unwrap();

    assert_eq!(
        backend.statements(),
        vec!["INSERT INTO people VALUES (1)", "DELETE FROM people"]
    );
    assert_eq!(backend.records().len(), 2);
}

#[tokio::test]
async fn test_branching_history_resolves_identically() {
    fn branching() -> Migrations<MemoryConnection> {
        let op = || MemoryStatement::shared("SELECT 1");
        Migrations::new()
            .with(Migration::up(Revision::initial(), "a", op()))
            .with(Migration::up("a", "b", op()))
            .with(Migration::up("a", "c", op()))
            .with(Migration::up("b", "d", op()))
            .with(Migration::up("c", "d", op()))
    }

    let first = Migrator::new(MemoryBackend::new(), branching());
    let second = Migrator::new(MemoryBackend::new(), branching());

    let a = first.plan(&Target::Head, Direction::Up).await.unwrap();
    let b = second.plan(&Target::Head, Direction::Up).await.unwrap();
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(a.to_string(), "initial -> a -> b -> d");
}

#[tokio::test]
async fn test_head_without_revisions_is_distinct_from_unreachable() {
    let empty = Migrator::new(MemoryBackend::new(), Migrations::new());
    let err = empty
        .plan(&Target::Head, Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::NoRevisions { .. }));

    let island = Migrator::new(
        MemoryBackend::new(),
        Migrations::new().with(Migration::up("x", "y", MemoryStatement::shared("SELECT 1"))),
    );
    let err = island
        .plan(&Target::Head, Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, TrekError::NoPath { .. }));
}
