use super::request::{RequestKind, classify};
use crate::config::{AgentConfig, ConfigSettings, Operation, RuntimeConfig};
use crate::error::{AgentError, OperationError, Result};
use crate::platform::process::{Clock, ProcessSupervisor, ProcessTable};
use crate::state::{CoreStateRecord, CoreStateStore, ExtensionStateRecord, ExtensionStateStore};
use crate::status::{ErrorCode, OperationStatus, StatusHandler};
use chrono::{DateTime, TimeDelta, Utc};
use std::path::PathBuf;

const NO_OPERATION_PRIOR_ERROR: &str = "Error executing NoOperation due to last reported error.";

/// What an enable invocation decided. Every variant maps to a successful
/// exit; failures of the patch operation itself live in the status file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableOutcome {
    /// A worker was started for a new request.
    Launched { pid: u32 },
    /// An abandoned worker for the same request was started again.
    Relaunched { pid: u32 },
    /// The worker for this request is still running.
    InProgress { pids: Vec<u32> },
    AlreadyCompleted,
    /// The previous operation was cancelled by a no-operation request.
    Cancelled { status: OperationStatus },
    /// Previous workers survived termination; nothing was launched.
    Blocked { survivors: Vec<u32> },
    /// The request was abandoned past its deadline and not relaunched.
    Expired { deadline: DateTime<Utc> },
}

/// Drives one enable invocation from the durable state on disk.
pub struct RequestReconciler<P, C> {
    runtime: RuntimeConfig,
    status_folder: PathBuf,
    status: StatusHandler,
    core_state: CoreStateStore,
    ext_state: ExtensionStateStore,
    supervisor: ProcessSupervisor<P, C>,
}

impl<P: ProcessTable, C: Clock> RequestReconciler<P, C> {
    pub fn new(
        config: &AgentConfig,
        sequence_number: u64,
        supervisor: ProcessSupervisor<P, C>,
    ) -> Self {
        let status_folder = config.status_folder();
        let state_folder = config.state_folder();
        Self {
            runtime: config.runtime.clone(),
            status: StatusHandler::new(&status_folder, sequence_number, &config.status),
            status_folder,
            core_state: CoreStateStore::new(&state_folder),
            ext_state: ExtensionStateStore::new(&state_folder),
            supervisor,
        }
    }

    #[must_use]
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.status = self.status.with_log_file(log_file);
        self
    }

    pub fn status(&self) -> &StatusHandler {
        &self.status
    }

    pub fn sequence_number(&self) -> u64 {
        self.status.sequence_number()
    }

    pub async fn enable(&mut self, settings: &ConfigSettings) -> Result<EnableOutcome> {
        let sequence_number = self.sequence_number();
        let now = self.supervisor.clock().now();

        let previous_ext = match self.ext_state.read() {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "ignoring unreadable extension state");
                None
            }
        };
        let deadline = match &previous_ext {
            Some(previous) if previous.number == sequence_number => previous.achieve_enable_by,
            _ => enable_deadline(now, self.runtime.enable_max_runtime_minutes),
        };
        self.ext_state
            .create(sequence_number, settings.operation, deadline)?;

        let core_state = self.core_state.read()?;
        let kind = classify(settings.operation, sequence_number, core_state.as_ref());
        tracing::info!(
            sequence_number,
            operation = %settings.operation,
            ?kind,
            %deadline,
            "enable request classified"
        );

        match (kind, core_state) {
            (RequestKind::NoOperation, core_state) => {
                self.cancel(settings, core_state.as_ref()).await
            }
            (RequestKind::First, _) => {
                tracing::info!("no previous patch operation tracked, launching a new one");
                self.launch_new(settings).await
            }
            (RequestKind::Supersedes { .. }, Some(record)) => {
                self.supersede(settings, &record, previous_ext.as_ref(), now)
                    .await
            }
            (RequestKind::Reenable { .. }, Some(record)) => {
                self.reenable(settings, &record, deadline, now).await
            }
            (RequestKind::Supersedes { .. } | RequestKind::Reenable { .. }, None) => {
                self.launch_new(settings).await
            }
        }
    }

    async fn launch_new(&mut self, settings: &ConfigSettings) -> Result<EnableOutcome> {
        self.status
            .write_new(settings.operation, OperationStatus::Transitioning)?;
        let pid = self.supervisor.spawn_daemon(settings).await?;
        Ok(EnableOutcome::Launched { pid })
    }

    async fn supersede(
        &mut self,
        settings: &ConfigSettings,
        record: &CoreStateRecord,
        previous_ext: Option<&ExtensionStateRecord>,
        now: DateTime<Utc>,
    ) -> Result<EnableOutcome> {
        let deadline = match previous_ext {
            Some(previous) if previous.number == record.number => previous.achieve_enable_by,
            _ => {
                tracing::warn!(
                    previous_sequence = record.number,
                    "no deadline recorded for previous operation, using this request's deadline"
                );
                enable_deadline(now, self.runtime.enable_max_runtime_minutes)
            }
        };
        tracing::info!(
            previous_sequence = record.number,
            pids = ?record.process_ids,
            %deadline,
            "waiting for previous patch operation before starting the new one"
        );

        let report = self
            .supervisor
            .wait_or_terminate(&record.process_ids, deadline)
            .await;
        if !report.is_clean() {
            return self.block(settings, report.survivors);
        }

        self.core_state.delete(false)?;
        self.launch_new(settings).await
    }

    async fn reenable(
        &mut self,
        settings: &ConfigSettings,
        record: &CoreStateRecord,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<EnableOutcome> {
        if record.completed {
            tracing::info!(operation = %settings.operation, "patch operation already completed");
            return Ok(EnableOutcome::AlreadyCompleted);
        }

        let running = self.supervisor.list_running_of(&record.process_ids);
        if !running.is_empty() {
            tracing::info!(pids = ?running, "patch operation still in progress");
            return Ok(EnableOutcome::InProgress { pids: running });
        }

        if now >= deadline {
            if !self.runtime.relaunch_after_deadline {
                return self.expire(settings, record, deadline);
            }
            tracing::warn!(%deadline, "relaunching abandoned patch operation past its deadline");
        }

        tracing::info!("previous worker is gone without completing, relaunching");
        self.core_state.delete(false)?;
        let sequence_number = self.sequence_number();
        if !self.status.update(sequence_number, &self.status_folder)? {
            tracing::warn!(sequence_number, "no status file to mark as transitioning");
        }
        let pid = self.supervisor.spawn_daemon(settings).await?;
        Ok(EnableOutcome::Relaunched { pid })
    }

    fn expire(
        &mut self,
        settings: &ConfigSettings,
        record: &CoreStateRecord,
        deadline: DateTime<Utc>,
    ) -> Result<EnableOutcome> {
        tracing::warn!(%deadline, "abandoned patch operation is past its deadline, not relaunching");
        self.core_state.write(&CoreStateRecord {
            completed: true,
            ..record.clone()
        })?;
        let message = format!("Operation was not restarted because its deadline {deadline} passed.");
        self.status
            .add_error(Some(&message), ErrorCode::OperationFailed);
        self.status.set_operation_status(
            settings.operation,
            &settings.activity_id,
            settings.start_time,
            OperationStatus::Error,
        )?;
        Ok(EnableOutcome::Expired { deadline })
    }

    fn block(
        &mut self,
        settings: &ConfigSettings,
        survivors: Vec<u32>,
    ) -> Result<EnableOutcome> {
        let message = format!(
            "Previous patch operation processes {survivors:?} could not be terminated."
        );
        tracing::error!(pids = ?survivors, "not launching while previous workers are alive");
        self.status
            .add_error(Some(&message), ErrorCode::OperationFailed);
        self.status.set_operation_status(
            settings.operation,
            &settings.activity_id,
            settings.start_time,
            OperationStatus::Error,
        )?;
        Ok(EnableOutcome::Blocked { survivors })
    }

    async fn cancel(
        &mut self,
        settings: &ConfigSettings,
        core_state: Option<&CoreStateRecord>,
    ) -> Result<EnableOutcome> {
        tracing::info!("no operation requested, terminating previous patch operation if running");
        match self.try_cancel(settings, core_state).await {
            Ok(()) => Ok(EnableOutcome::Cancelled {
                status: OperationStatus::Success,
            }),
            Err(error) => {
                let message = format!("Error executing NoOperation: {error}");
                tracing::error!("{message}");
                let already_reported =
                    matches!(&error, AgentError::Operation(inner) if inner.is_reported());
                let recorded = if already_reported {
                    NO_OPERATION_PRIOR_ERROR
                } else {
                    message.as_str()
                };
                self.status
                    .add_error(Some(recorded), ErrorCode::OperationFailed);
                // A no-operation request always exits 0.
                if let Err(error) = self.set_no_operation(settings, OperationStatus::Error) {
                    tracing::error!(%error, "failed to record no-operation failure in status file");
                }
                Ok(EnableOutcome::Cancelled {
                    status: OperationStatus::Error,
                })
            }
        }
    }

    async fn try_cancel(
        &mut self,
        settings: &ConfigSettings,
        core_state: Option<&CoreStateRecord>,
    ) -> Result<()> {
        self.set_no_operation(settings, OperationStatus::Transitioning)?;

        let pids = core_state.map(|record| record.process_ids.as_slice()).unwrap_or_default();
        let now = self.supervisor.clock().now();
        let report = self.supervisor.wait_or_terminate(pids, now).await;
        if !report.is_clean() {
            let message = format!(
                "Processes {:?} from the previous operation could not be terminated.",
                report.survivors
            );
            self.status
                .add_error(Some(&message), ErrorCode::OperationFailed);
            return Err(OperationError::reported(message).into());
        }

        self.core_state.delete(true)?;
        self.set_no_operation(settings, OperationStatus::Success)?;
        Ok(())
    }

    fn set_no_operation(
        &self,
        settings: &ConfigSettings,
        status: OperationStatus,
    ) -> Result<()> {
        self.status.set_no_operation_substatus(
            Operation::NoOperation,
            &settings.activity_id,
            settings.start_time,
            status,
        )?;
        Ok(())
    }
}

fn enable_deadline(now: DateTime<Utc>, max_runtime_minutes: u64) -> DateTime<Utc> {
    let runtime = i64::try_from(max_runtime_minutes)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(runtime)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
