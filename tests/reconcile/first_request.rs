use super::agent_harness::{self, AgentHarness, WORKER_PROGRAM};
use patch_agent::config::Operation;
use patch_agent::reconcile::EnableOutcome;
use patch_agent::status::OperationStatus;

#[tokio::test]
async fn first_request_writes_transitioning_status_and_launches_worker() {
    let harness = AgentHarness::new();

    let outcome = harness.enable(1, Operation::Assess).await;

    assert_eq!(outcome, EnableOutcome::Launched { pid: 4000 });
    let document = harness.status(1);
    assert_eq!(document.status.operation, Operation::Assess);
    assert_eq!(document.status.status, OperationStatus::Transitioning);
    assert!(document.status.substatus.is_empty());

    let launches = harness.table.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].program.to_str(), Some(WORKER_PROGRAM));
    assert_eq!(&launches[0].args[..3], ["core", "--sequence-number", "1"]);

    // The worker host owns the core state file once it runs.
    assert_eq!(harness.core_state().read().unwrap(), None);
}

#[tokio::test]
async fn extension_state_records_deadline_for_later_invocations() {
    let harness = AgentHarness::new();

    harness.enable(1, Operation::Install).await;

    let record = harness.ext_state().read().unwrap().unwrap();
    assert_eq!(record.number, 1);
    assert_eq!(record.operation, Operation::Install);
    assert_eq!(
        record.achieve_enable_by,
        agent_harness::start() + chrono::Duration::minutes(3)
    );
}

#[tokio::test]
async fn unreadable_core_state_is_fatal() {
    let harness = AgentHarness::new();
    std::fs::create_dir_all(harness.config.state_folder()).unwrap();
    std::fs::write(harness.core_state().path(), "{\"coreSequence\":").unwrap();

    let err = harness
        .reconciler(1)
        .enable(&harness.settings(1, Operation::Install))
        .await
        .unwrap_err();

    assert_eq!(
        patch_agent::ExitCode::from(&err),
        patch_agent::ExitCode::StateUnreadable
    );
    assert!(harness.table.launches().is_empty());
}

#[tokio::test]
async fn failed_launch_surfaces_as_launch_error() {
    let harness = AgentHarness::new();
    harness.table.fail_next_spawns(3);

    let err = harness
        .reconciler(1)
        .enable(&harness.settings(1, Operation::Install))
        .await
        .unwrap_err();

    assert_eq!(
        patch_agent::ExitCode::from(&err),
        patch_agent::ExitCode::LaunchFailed
    );
}

#[tokio::test]
async fn malformed_extension_state_is_replaced_with_a_fresh_deadline() {
    let harness = AgentHarness::new();
    std::fs::create_dir_all(harness.config.state_folder()).unwrap();
    std::fs::write(harness.ext_state().path(), "{\"extensionSequence\":").unwrap();

    let outcome = harness.enable(1, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Launched { pid: 4000 });
    let record = harness.ext_state().read().unwrap().unwrap();
    assert_eq!(record.number, 1);
    assert_eq!(
        record.achieve_enable_by,
        agent_harness::start() + chrono::Duration::minutes(3)
    );
}
