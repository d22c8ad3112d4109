#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use patch_agent::config::{AgentConfig, ConfigSettings, Operation};
use patch_agent::platform::process::testing::{FakeClock, FakeProcessTable};
use patch_agent::platform::process::{
    ProcessSignature, ProcessSupervisor, SupervisorSettings, WorkerCommand,
};
use patch_agent::reconcile::{EnableOutcome, RequestReconciler};
use patch_agent::state::{CoreStateRecord, CoreStateStore, ExtensionStateStore};
use patch_agent::status::{OperationSummary, StatusDocument, StatusHandler};

pub const WORKER_PROGRAM: &str = "/opt/patch-agent/bin/patch-agent";
pub const CORE_PROGRAM: &str = "/usr/lib/patch-core/patch-core";

pub type FakeReconciler = RequestReconciler<Arc<FakeProcessTable>, Arc<FakeClock>>;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 8, 11, 3, 0, 0).unwrap()
}

pub fn worker_command_line(sequence_number: u64) -> String {
    format!(
        "{WORKER_PROGRAM} core --sequence-number {sequence_number} --operation Installation"
    )
}

pub fn core_command_line() -> String {
    format!("{CORE_PROGRAM} --install")
}

pub fn summary(document: &StatusDocument) -> OperationSummary {
    serde_json::from_str(&document.status.substatus[0].formatted_message.message).unwrap()
}

/// Agent folders in a temp dir wired to a fake process table and clock.
pub struct AgentHarness {
    pub tmp: TempDir,
    pub config: AgentConfig,
    pub clock: Arc<FakeClock>,
    pub table: Arc<FakeProcessTable>,
}

impl AgentHarness {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = AgentConfig {
            config_path: tmp.path().join("agent.toml"),
            ..AgentConfig::default()
        };
        let clock = Arc::new(FakeClock::new(start()));
        let table = Arc::new(FakeProcessTable::new(Arc::clone(&clock)));
        Self {
            tmp,
            config,
            clock,
            table,
        }
    }

    pub fn settings(&self, sequence_number: u64, operation: Operation) -> ConfigSettings {
        ConfigSettings {
            sequence_number,
            operation,
            activity_id: format!("activity-{sequence_number}"),
            start_time: start(),
        }
    }

    pub fn reconciler(&self, sequence_number: u64) -> FakeReconciler {
        let worker = WorkerCommand {
            program: PathBuf::from(WORKER_PROGRAM),
            global_args: vec![
                "--config".into(),
                self.config.config_path.display().to_string(),
            ],
        };
        let supervisor = ProcessSupervisor::new(
            Arc::clone(&self.table),
            Arc::clone(&self.clock),
            SupervisorSettings::from_runtime(&self.config.runtime),
            worker,
        )
        .with_signatures(ProcessSignature::parse(CORE_PROGRAM));
        RequestReconciler::new(&self.config, sequence_number, supervisor)
    }

    pub async fn enable(&self, sequence_number: u64, operation: Operation) -> EnableOutcome {
        self.reconciler(sequence_number)
            .enable(&self.settings(sequence_number, operation))
            .await
            .unwrap()
    }

    pub fn core_state(&self) -> CoreStateStore {
        CoreStateStore::new(&self.config.state_folder())
    }

    pub fn ext_state(&self) -> ExtensionStateStore {
        ExtensionStateStore::new(&self.config.state_folder())
    }

    pub fn status_handler(&self, sequence_number: u64) -> StatusHandler {
        StatusHandler::new(
            &self.config.status_folder(),
            sequence_number,
            &self.config.status,
        )
    }

    pub fn status(&self, sequence_number: u64) -> StatusDocument {
        self.status_handler(sequence_number).read().unwrap()
    }

    /// Core state as the worker host of `sequence_number` leaves it.
    pub fn seed_core_state(&self, sequence_number: u64, completed: bool, process_ids: Vec<u32>) {
        let record = CoreStateRecord {
            completed,
            ..CoreStateRecord::started(sequence_number, Operation::Install, process_ids)
        };
        self.core_state().write(&record).unwrap();
    }
}
