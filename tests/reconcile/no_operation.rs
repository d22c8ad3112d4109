use super::agent_harness::{self, AgentHarness, worker_command_line};
use chrono::Duration;
use patch_agent::config::Operation;
use patch_agent::platform::process::{Clock, Signal};
use patch_agent::reconcile::EnableOutcome;
use patch_agent::status::{ErrorCode, NO_OPERATION_SUMMARY, OperationStatus};

#[tokio::test]
async fn no_operation_with_dead_workers_cleans_up_and_succeeds() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100, 101]);

    let outcome = harness.enable(6, Operation::NoOperation).await;

    assert_eq!(
        outcome,
        EnableOutcome::Cancelled {
            status: OperationStatus::Success
        }
    );
    assert!(!harness.core_state().path().exists());

    let document = harness.status(6);
    assert_eq!(document.status.operation, Operation::NoOperation);
    assert_eq!(document.status.status, OperationStatus::Success);
    assert_eq!(document.status.substatus.len(), 1);
    assert_eq!(document.status.substatus[0].name, NO_OPERATION_SUMMARY);
    assert_eq!(document.status.substatus[0].status, OperationStatus::Success);

    let summary = agent_harness::summary(&document);
    assert_eq!(summary.activity_id, "activity-6");
    assert_eq!(summary.errors.code, 0);
    assert!(summary.errors.details.is_empty());
    assert!(harness.table.launches().is_empty());
}

#[tokio::test]
async fn no_operation_terminates_running_workers_immediately() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert(100, &worker_command_line(5));

    let outcome = harness.enable(6, Operation::NoOperation).await;

    assert_eq!(
        outcome,
        EnableOutcome::Cancelled {
            status: OperationStatus::Success
        }
    );
    assert_eq!(harness.table.signals(), vec![(100, Signal::Terminate)]);
    assert!(harness.clock.now() - agent_harness::start() <= Duration::seconds(10));
    assert_eq!(harness.core_state().read().unwrap(), None);
}

#[tokio::test]
async fn no_operation_without_core_state_succeeds() {
    let harness = AgentHarness::new();

    let outcome = harness.enable(1, Operation::NoOperation).await;

    assert_eq!(
        outcome,
        EnableOutcome::Cancelled {
            status: OperationStatus::Success
        }
    );
    assert_eq!(harness.status(1).status.status, OperationStatus::Success);
}

#[tokio::test]
async fn no_operation_failure_is_recorded_once() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert_unkillable(100, &worker_command_line(5));

    let outcome = harness.enable(6, Operation::NoOperation).await;

    assert_eq!(
        outcome,
        EnableOutcome::Cancelled {
            status: OperationStatus::Error
        }
    );
    // Survivors keep the core state; the worker may still write to it.
    assert!(harness.core_state().read().unwrap().is_some());

    let document = harness.status(6);
    assert_eq!(document.status.status, OperationStatus::Error);
    assert_eq!(document.status.substatus[0].status, OperationStatus::Error);

    let summary = agent_harness::summary(&document);
    assert_eq!(summary.errors.code, 1);
    assert_eq!(summary.errors.details.len(), 2);
    assert_eq!(
        summary.errors.details[0].message,
        "Error executing NoOperation due to last reported error."
    );
    assert!(summary.errors.details[1].message.contains("[100]"));
    assert!(
        summary
            .errors
            .details
            .iter()
            .all(|detail| detail.code == ErrorCode::OperationFailed)
    );
}

#[tokio::test]
async fn no_operation_with_unwritable_status_folder_still_exits_cleanly() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    std::fs::write(harness.config.status_folder(), "not a folder").unwrap();

    let outcome = harness
        .reconciler(6)
        .enable(&harness.settings(6, Operation::NoOperation))
        .await;

    assert_eq!(
        outcome.unwrap(),
        EnableOutcome::Cancelled {
            status: OperationStatus::Error
        }
    );
    assert!(harness.status_handler(6).read().is_err());
}
