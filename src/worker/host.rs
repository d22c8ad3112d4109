use crate::config::{AgentConfig, ConfigSettings, CoreConfig};
use crate::error::Result;
use crate::state::{CoreStateRecord, CoreStateStore};
use crate::status::{ErrorCode, OperationStatus, StatusHandler};
use chrono::Utc;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{Instant, interval_at};

pub const SEQUENCE_NUMBER_ENV: &str = "PATCH_AGENT_SEQUENCE_NUMBER";
pub const OPERATION_ENV: &str = "PATCH_AGENT_OPERATION";
pub const ACTIVITY_ID_ENV: &str = "PATCH_AGENT_ACTIVITY_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Succeeded,
    /// The patch core could not be started or exited unsuccessfully.
    Failed { exit_code: Option<i32> },
    NotConfigured,
}

impl WorkerOutcome {
    fn status(&self) -> OperationStatus {
        match self {
            Self::Succeeded => OperationStatus::Success,
            Self::Failed { .. } | Self::NotConfigured => OperationStatus::Error,
        }
    }
}

pub struct WorkerHost {
    core: CoreConfig,
    settings: ConfigSettings,
    status: StatusHandler,
    core_state: CoreStateStore,
}

impl WorkerHost {
    pub fn new(config: &AgentConfig, settings: ConfigSettings) -> Self {
        Self {
            core: config.core.clone(),
            status: StatusHandler::new(
                &config.status_folder(),
                settings.sequence_number,
                &config.status,
            ),
            core_state: CoreStateStore::new(&config.state_folder()),
            settings,
        }
    }

    #[must_use]
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.status = self.status.with_log_file(log_file);
        self
    }

    pub async fn run(mut self) -> Result<WorkerOutcome> {
        let mut record = CoreStateRecord::started(
            self.settings.sequence_number,
            self.settings.operation,
            vec![std::process::id()],
        );
        self.core_state.write(&record)?;
        self.report(OperationStatus::Transitioning)?;

        let command = self.core.command.clone();
        let outcome = match command.split_first() {
            None => {
                tracing::error!("core.command is empty, nothing to run");
                self.status.add_error(
                    Some("No patch core command is configured."),
                    ErrorCode::Default,
                );
                WorkerOutcome::NotConfigured
            }
            Some((program, args)) => self.run_core(program, args, &mut record).await,
        };

        self.report(outcome.status())?;
        record.completed = true;
        record.last_heartbeat = Some(Utc::now());
        self.core_state.write(&record)?;
        tracing::info!(?outcome, "patch operation finished");
        Ok(outcome)
    }

    async fn run_core(
        &mut self,
        program: &str,
        args: &[String],
        record: &mut CoreStateRecord,
    ) -> WorkerOutcome {
        let mut child = match Command::new(program)
            .args(args)
            .env(SEQUENCE_NUMBER_ENV, self.settings.sequence_number.to_string())
            .env(OPERATION_ENV, self.settings.operation.to_string())
            .env(ACTIVITY_ID_ENV, &self.settings.activity_id)
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                tracing::error!(program, %error, "failed to start patch core");
                let message = format!("Failed to start patch core {program}: {error}");
                self.status
                    .add_error(Some(&message), ErrorCode::OperationFailed);
                return WorkerOutcome::Failed { exit_code: None };
            }
        };

        if let Some(pid) = child.id() {
            record.process_ids.push(pid);
            self.write_heartbeat(record);
            tracing::info!(pid, program, "patch core started");
        }

        let period = Duration::from_secs(self.core.heartbeat_secs.max(1));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        let exit = loop {
            tokio::select! {
                exit = child.wait() => break exit,
                _ = heartbeat.tick() => self.write_heartbeat(record),
            }
        };

        match exit {
            Ok(status) if status.success() => WorkerOutcome::Succeeded,
            Ok(status) => {
                let message = format!("Patch core {program} {}", describe_exit(status));
                self.status
                    .add_error(Some(&message), ErrorCode::OperationFailed);
                WorkerOutcome::Failed {
                    exit_code: status.code(),
                }
            }
            Err(error) => {
                let message = format!("Lost track of patch core {program}: {error}");
                self.status
                    .add_error(Some(&message), ErrorCode::OperationFailed);
                WorkerOutcome::Failed { exit_code: None }
            }
        }
    }

    fn write_heartbeat(&self, record: &mut CoreStateRecord) {
        record.last_heartbeat = Some(Utc::now());
        if let Err(error) = self.core_state.write(record) {
            tracing::warn!(%error, "failed to refresh core state heartbeat");
        }
    }

    fn report(&self, status: OperationStatus) -> Result<()> {
        self.status.set_operation_status(
            self.settings.operation,
            &self.settings.activity_id,
            self.settings.start_time,
            status,
        )?;
        Ok(())
    }
}

fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("was killed by signal {signal}");
        }
    }
    "exited abnormally".to_string()
}
