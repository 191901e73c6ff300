//! End-to-end lifecycle tests over the in-memory seams.

use std::sync::Arc;

use lakerun_flow::artifacts::memory::InMemoryArtifactStore;
use lakerun_flow::artifacts::{ArtifactStore, KpiSlot};
use lakerun_flow::client::memory::InMemoryPipelineClient;
use lakerun_flow::client::PipelineClient;
use lakerun_flow::events::{EventKind, EventLog, InMemoryEventLog};
use lakerun_flow::lock::memory::InMemoryRunLock;
use lakerun_flow::lock::{LockHolder, RunLock};
use lakerun_flow::orchestrator::{Advance, RunOrchestrator};
use lakerun_flow::registry::memory::InMemoryRunRegistry;
use lakerun_flow::registry::RunRegistry;
use lakerun_flow::restore::{InMemoryRestoreLog, RestoreCoordinator, RestoreLog};
use lakerun_flow::run::RunState;
use lakerun_flow::error::{Error, Result};
use lakerun_core::RunId;

struct World {
    lock: Arc<InMemoryRunLock>,
    registry: Arc<InMemoryRunRegistry>,
    events: Arc<InMemoryEventLog>,
    client: Arc<InMemoryPipelineClient>,
    artifacts: Arc<InMemoryArtifactStore>,
    restores: Arc<InMemoryRestoreLog>,
    orchestrator: Arc<RunOrchestrator>,
    coordinator: RestoreCoordinator,
}

fn world() -> World {
    world_with_lock(Arc::new(InMemoryRunLock::new()))
}

fn world_with_lock(lock: Arc<InMemoryRunLock>) -> World {
    let registry = Arc::new(InMemoryRunRegistry::new());
    let events = Arc::new(InMemoryEventLog::new());
    let client = Arc::new(InMemoryPipelineClient::new());
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let restores = Arc::new(InMemoryRestoreLog::new());
    let orchestrator = Arc::new(RunOrchestrator::new(
        Arc::clone(&lock) as Arc<dyn RunLock>,
        Arc::clone(&registry) as Arc<dyn RunRegistry>,
        Arc::clone(&events) as Arc<dyn EventLog>,
        Arc::clone(&client) as Arc<dyn PipelineClient>,
        Arc::clone(&artifacts) as Arc<dyn ArtifactStore>,
    ));
    let coordinator = RestoreCoordinator::new(
        Arc::clone(&orchestrator),
        Arc::clone(&restores) as Arc<dyn RestoreLog>,
    );
    World {
        lock,
        registry,
        events,
        client,
        artifacts,
        restores,
        orchestrator,
        coordinator,
    }
}

#[tokio::test]
async fn simultaneous_starts_admit_exactly_one_trigger() -> Result<()> {
    let w = world();

    let (alice, bob) = tokio::join!(
        w.orchestrator.start("import/r1.csv", "alice"),
        w.orchestrator.start("import/r2.csv", "bob"),
    );

    let winners = usize::from(alice.is_ok()) + usize::from(bob.is_ok());
    assert_eq!(winners, 1);

    // The losing caller's trigger attempt was never made.
    assert_eq!(w.client.trigger_count(), 1);

    let loser = if alice.is_ok() { bob } else { alice };
    assert!(matches!(loser, Err(Error::LockHeld { .. })));

    Ok(())
}

#[tokio::test]
async fn many_concurrent_starts_still_admit_one() -> Result<()> {
    let w = world();

    let mut handles = Vec::new();
    for i in 0..16 {
        let orchestrator = Arc::clone(&w.orchestrator);
        handles.push(tokio::spawn(async move {
            orchestrator
                .start(&format!("import/file-{i}.csv"), &format!("caller-{i}"))
                .await
                .is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("join") {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(w.client.trigger_count(), 1);
    assert_eq!(w.registry.run_count()?, 1);

    Ok(())
}

#[tokio::test]
async fn full_lifecycle_submitted_to_succeeded() -> Result<()> {
    let w = world();

    // R1 created with state Submitted.
    let run = w.orchestrator.start("import/r1.csv", "alice").await?;
    assert_eq!(run.state, RunState::Submitted);

    // An unmapped status string lands on Running.
    w.client.push_poll_status("SomeNewStatus");
    let outcome = w.orchestrator.advance(run.id).await?;
    assert_eq!(outcome.state(), RunState::Running);
    let status_changes = w
        .events
        .list(run.id)
        .await?
        .into_iter()
        .filter(|e| e.kind == EventKind::StatusChange)
        .count();
    assert_eq!(status_changes, 2); // submitted + one transition

    // "Completed" closes the run out.
    let kpis = serde_json::json!({"total_revenue": 123.45, "orders": 7});
    w.artifacts.put_kpis(&KpiSlot::Run(run.id), kpis.clone());
    w.client.push_poll_status("Completed");
    let outcome = w.orchestrator.advance(run.id).await?;
    assert_eq!(outcome.state(), RunState::Succeeded);

    let row = w.registry.get(run.id).await?.expect("run");
    assert!(row.finished_at.is_some());
    assert_eq!(row.kpis, Some(kpis));
    assert!(!w.lock.is_locked().await?);

    // The registry now reports it as the latest success, and nothing active.
    assert_eq!(
        w.registry.latest_succeeded().await?.map(|r| r.id),
        Some(run.id)
    );
    assert!(w.registry.get_active().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn repeated_terminal_polls_keep_side_effects_single() -> Result<()> {
    let w = world();
    let run = w.orchestrator.start("import/r1.csv", "alice").await?;

    w.client.push_poll_status("Completed");
    w.orchestrator.advance(run.id).await?;

    let events_after_settle = w.events.list(run.id).await?.len();
    let released_events = w
        .events
        .list(run.id)
        .await?
        .into_iter()
        .filter(|e| e.message.contains("lock released"))
        .count();
    assert_eq!(released_events, 1);

    // Infrastructure-level retries of the same poll are absorbed.
    for _ in 0..3 {
        let outcome = w.orchestrator.advance(run.id).await?;
        assert!(matches!(outcome, Advance::AlreadyTerminal { .. }));
    }
    assert_eq!(w.events.list(run.id).await?.len(), events_after_settle);

    Ok(())
}

#[tokio::test]
async fn lock_survives_process_restart() -> Result<()> {
    // A pre-claimed slot models the state after a crash with an in-flight
    // run: the new process must not second-trigger the pipeline.
    let survivor = RunId::generate();
    let lock = Arc::new(InMemoryRunLock::with_holder(LockHolder {
        run_id: survivor,
        locked_by: "alice".to_string(),
        locked_at: chrono::Utc::now(),
    }));
    let w = world_with_lock(lock);

    let result = w.orchestrator.start("import/r2.csv", "bob").await;
    assert!(matches!(result, Err(Error::LockHeld { .. })));
    assert_eq!(w.client.trigger_count(), 0);

    // The administrative override is the only way out.
    w.orchestrator.force_release_lock().await?;
    assert!(w.orchestrator.start("import/r2.csv", "bob").await.is_ok());

    Ok(())
}

#[tokio::test]
async fn failed_lifecycle_records_error_and_frees_lock() -> Result<()> {
    let w = world();
    let run = w.orchestrator.start("import/r1.csv", "alice").await?;

    w.client.push_poll_status("InProgress");
    w.orchestrator.advance(run.id).await?;

    w.client.push_poll_status("Cancelled");
    let outcome = w.orchestrator.advance(run.id).await?;
    assert_eq!(outcome.state(), RunState::Failed);

    let row = w.registry.get(run.id).await?.expect("run");
    assert!(row.error_message.is_some());
    assert!(row.kpis.is_none());
    assert!(!w.lock.is_locked().await?);

    // A new run can start immediately.
    assert!(w.orchestrator.start("import/r2.csv", "bob").await.is_ok());

    Ok(())
}

#[tokio::test]
async fn restore_after_success_starts_promotion_run() -> Result<()> {
    let w = world();
    let run = w.orchestrator.start("import/r1.csv", "alice").await?;
    w.client.push_poll_status("Completed");
    w.orchestrator.advance(run.id).await?;

    let record = w.coordinator.restore(run.id, "bob").await?;
    assert!(record.started());

    let promotion_id = record.resulting_run_id.expect("promotion run");
    let promotion = w.registry.get(promotion_id).await?.expect("run");
    assert!(promotion.input_ref.starts_with("restore::"));
    assert_eq!(promotion.state, RunState::Submitted);

    // Drive the promotion run to completion like any other run.
    w.client.push_poll_status("Completed");
    let outcome = w.orchestrator.advance(promotion_id).await?;
    assert_eq!(outcome.state(), RunState::Succeeded);
    assert!(!w.lock.is_locked().await?);

    assert_eq!(w.restores.list(10).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn poll_outage_then_recovery() -> Result<()> {
    let w = world();
    let run = w.orchestrator.start("import/r1.csv", "alice").await?;

    w.client.set_fail_polls(true);
    for _ in 0..3 {
        let result = w.orchestrator.advance(run.id).await;
        assert!(matches!(result, Err(Error::PollUnavailable { .. })));
    }

    // The run is exactly where it was; the next successful poll advances it.
    assert_eq!(
        w.registry.get(run.id).await?.expect("run").state,
        RunState::Submitted
    );

    w.client.set_fail_polls(false);
    w.client.push_poll_status("InProgress");
    let outcome = w.orchestrator.advance(run.id).await?;
    assert_eq!(outcome.state(), RunState::Running);

    Ok(())
}
