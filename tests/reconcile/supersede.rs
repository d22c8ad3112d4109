use super::agent_harness::{self, AgentHarness, core_command_line, worker_command_line};
use chrono::Duration;
use patch_agent::config::Operation;
use patch_agent::platform::process::{Clock, Signal};
use patch_agent::reconcile::EnableOutcome;
use patch_agent::status::{ErrorCode, OperationStatus};

#[tokio::test]
async fn new_request_force_terminates_previous_worker_after_its_deadline() {
    let harness = AgentHarness::new();
    let previous_deadline = agent_harness::start() + Duration::minutes(3);
    harness
        .ext_state()
        .create(5, Operation::Install, previous_deadline)
        .unwrap();
    harness.seed_core_state(5, false, vec![100, 101]);
    harness.table.insert_stubborn(100, &worker_command_line(5));
    harness.table.insert(101, &core_command_line());
    harness.clock.set(agent_harness::start() + Duration::minutes(1));

    let outcome = harness.enable(6, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Launched { pid: 4000 });
    assert!(!harness.table.is_running(100));
    assert!(!harness.table.is_running(101));
    assert!(harness.table.signals().contains(&(100, Signal::Kill)));

    // Bounded by the previous deadline plus one grace period and the launch check.
    let overrun = harness.clock.now() - previous_deadline;
    assert!(overrun >= Duration::zero());
    assert!(overrun <= Duration::milliseconds(10_500));

    assert_eq!(harness.core_state().read().unwrap(), None);
    let document = harness.status(6);
    assert_eq!(document.status.status, OperationStatus::Transitioning);
    let launches = harness.table.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(&launches[0].args[..3], ["core", "--sequence-number", "6"]);
}

#[tokio::test]
async fn previous_worker_finishing_in_time_is_not_signalled() {
    let harness = AgentHarness::new();
    let previous_deadline = agent_harness::start() + Duration::minutes(3);
    harness
        .ext_state()
        .create(5, Operation::Install, previous_deadline)
        .unwrap();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert_exiting_at(
        100,
        &worker_command_line(5),
        agent_harness::start() + Duration::seconds(30),
    );

    let outcome = harness.enable(6, Operation::Assess).await;

    assert_eq!(outcome, EnableOutcome::Launched { pid: 4000 });
    assert!(harness.table.signals().is_empty());
    assert!(harness.clock.now() < previous_deadline);
}

#[tokio::test]
async fn missing_previous_deadline_falls_back_to_own_deadline() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert(100, &worker_command_line(5));

    let outcome = harness.enable(6, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Launched { pid: 4000 });
    assert!(harness.clock.now() >= agent_harness::start() + Duration::minutes(3));
    assert_eq!(harness.table.signals(), vec![(100, Signal::Terminate)]);
}

#[tokio::test]
async fn completed_previous_operation_is_replaced_without_waiting() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, true, vec![100]);

    let outcome = harness.enable(6, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Launched { pid: 4000 });
    assert!(harness.clock.now() - agent_harness::start() < Duration::seconds(1));
}

#[tokio::test]
async fn surviving_workers_block_the_new_request() {
    let harness = AgentHarness::new();
    harness.seed_core_state(5, false, vec![100]);
    harness.table.insert_unkillable(100, &worker_command_line(5));
    harness.clock.set(agent_harness::start());
    harness
        .ext_state()
        .create(5, Operation::Install, agent_harness::start())
        .unwrap();

    let outcome = harness.enable(6, Operation::Install).await;

    assert_eq!(outcome, EnableOutcome::Blocked { survivors: vec![100] });
    assert!(harness.table.launches().is_empty());
    assert_eq!(harness.core_state().read().unwrap().unwrap().number, 5);

    let document = harness.status(6);
    assert_eq!(document.status.status, OperationStatus::Error);
    let summary = agent_harness::summary(&document);
    assert_eq!(summary.errors.code, 1);
    assert_eq!(summary.errors.details[0].code, ErrorCode::OperationFailed);
}
