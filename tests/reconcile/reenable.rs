use super::agent_harness::{self, AgentHarness, worker_command_line};
use chrono::Duration;
use patch_agent::config::Operation;
use patch_agent::reconcile::EnableOutcome;
use patch_agent::status::OperationStatus;

#[tokio::test]
async fn completed_reenable_is_idempotent() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, true, vec![100]);
    let before = harness.core_state().read().unwrap();

    for _ in 0..2 {
        let outcome = harness.enable(5, Operation::Install).await;
        assert_eq!(outcome, EnableOutcome::AlreadyCompleted);
    }

    assert!(harness.table.launches().is_empty());
    assert_eq!(harness.core_state().read().unwrap(), before);
}

#[tokio::test]
async fn running_worker_is_left_alone() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert(100, &worker_command_line(5));
    harness
        .status_handler(5)
        .write_new(Operation::Install, OperationStatus::Transitioning)
        .unwrap();
    let status_before = std::fs::read_to_string(harness.status_handler(5).path()).unwrap();

    let outcome = harness.enable(5, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::InProgress { pids: vec![100] });
    assert!(harness.table.launches().is_empty());
    assert!(harness.table.signals().is_empty());
    assert!(harness.core_state().read().unwrap().is_some());
    let status_after = std::fs::read_to_string(harness.status_handler(5).path()).unwrap();
    assert_eq!(status_before, status_after);
}

#[tokio::test]
async fn abandoned_worker_is_relaunched_keeping_status_history() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100, 101]);
    let settings = harness.settings(5, Operation::Install);
    harness
        .status_handler(5)
        .set_operation_status(
            Operation::Install,
            &settings.activity_id,
            settings.start_time,
            OperationStatus::Error,
        )
        .unwrap();

    let outcome = harness.enable(5, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Relaunched { pid: 4000 });
    assert_eq!(harness.core_state().read().unwrap(), None);
    let document = harness.status(5);
    assert_eq!(document.status.status, OperationStatus::Transitioning);
    assert_eq!(document.status.substatus.len(), 1);
    assert_eq!(document.status.substatus[0].name, "PatchInstallationSummary");
}

#[tokio::test]
async fn reused_pid_with_foreign_command_line_counts_as_gone() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert(100, "/usr/sbin/sshd -D");

    let outcome = harness.enable(5, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Relaunched { pid: 4000 });
    assert!(harness.table.is_running(100));
    assert!(harness.table.signals().is_empty());
}

#[tokio::test]
async fn abandoned_past_deadline_is_relaunched_by_default() {
    let harness = AgentHarness::new();
    harness
        .ext_state()
        .create(5, Operation::Install, agent_harness::start() - Duration::minutes(1))
        .unwrap();
    harness.seed_core_state(5, false, vec![100]);

    let outcome = harness.enable(5, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Relaunched { pid: 4000 });
}

#[tokio::test]
async fn abandoned_past_deadline_expires_when_relaunch_disabled() {
    let mut harness = AgentHarness::new();
    harness.config.runtime.relaunch_after_deadline = false;
    let deadline = agent_harness::start() - Duration::minutes(1);
    harness
        .ext_state()
        .create(5, Operation::Install, deadline)
        .unwrap();
    harness.seed_core_state(5, false, vec![100]);

    let outcome = harness.enable(5, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Expired { deadline });
    assert!(harness.table.launches().is_empty());
    assert!(harness.core_state().read().unwrap().unwrap().completed);
    assert_eq!(harness.status(5).status.status, OperationStatus::Error);

    // The deadline carries over, so later re-enables see a finished request.
    let again = harness.enable(5, Operation::Install).await;
    assert_eq!(again, EnableOutcome::AlreadyCompleted);
    assert_eq!(harness.ext_state().read().unwrap().unwrap().achieve_enable_by, deadline);
}

#[tokio::test]
async fn malformed_extension_state_does_not_expire_abandoned_request() {
    let mut harness = AgentHarness::new();
    harness.config.runtime.relaunch_after_deadline = false;
    harness.seed_core_state(5, false, vec![100]);
    std::fs::write(harness.ext_state().path(), "not json").unwrap();

    let outcome = harness.enable(5, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Relaunched { pid: 4000 });
    assert_eq!(
        harness.ext_state().read().unwrap().unwrap().achieve_enable_by,
        agent_harness::start() + Duration::minutes(3)
    );
}
