use super::{Clock, LaunchSpec, ProcessTable, Signal};
use crate::config::{ConfigSettings, MAX_TERMINATE_ATTEMPTS, RuntimeConfig};
use crate::error::ProcessError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LAUNCH_ATTEMPTS: u32 = 3;
const LAUNCH_CHECK: Duration = Duration::from_millis(500);

/// Timing knobs for waiting on and terminating workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub termination_grace: Duration,
    pub terminate_attempts: u32,
    pub launch_check: Duration,
}

impl SupervisorSettings {
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(runtime.poll_interval_secs.max(1)),
            termination_grace: Duration::from_secs(runtime.termination_grace_secs),
            terminate_attempts: runtime.terminate_attempts.clamp(1, MAX_TERMINATE_ATTEMPTS),
            launch_check: LAUNCH_CHECK,
        }
    }
}

/// How to start the worker host: the agent binary plus global arguments
/// appended after the `core` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub global_args: Vec<String>,
}

impl WorkerCommand {
    pub fn current_exe(config_path: Option<&Path>) -> io::Result<Self> {
        let program = std::env::current_exe()?;
        let global_args = config_path
            .map(|path| vec!["--config".to_string(), path.display().to_string()])
            .unwrap_or_default();
        Ok(Self {
            program,
            global_args,
        })
    }

    fn launch_spec(&self, settings: &ConfigSettings) -> LaunchSpec {
        let mut args = vec![
            "core".to_string(),
            "--sequence-number".to_string(),
            settings.sequence_number.to_string(),
            "--operation".to_string(),
            settings.operation.to_string(),
            "--activity-id".to_string(),
            settings.activity_id.clone(),
            "--start-time".to_string(),
            settings
                .start_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ];
        args.extend(self.global_args.iter().cloned());
        LaunchSpec {
            program: self.program.clone(),
            args,
        }
    }

    /// Leading arguments of every worker host we start.
    fn signature(&self) -> ProcessSignature {
        ProcessSignature {
            tokens: vec![self.program.display().to_string(), "core".to_string()],
        }
    }
}

/// Leading argv tokens that identify one of our processes. The program token
/// compares by file name, the rest must be equal token for token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSignature {
    tokens: Vec<String>,
}

impl ProcessSignature {
    /// `None` when `tokens` is empty or starts with a blank program.
    pub fn new<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let program = tokens.first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self { tokens })
    }

    /// Whitespace-separated form used in config files.
    pub fn parse(text: &str) -> Option<Self> {
        Self::new(text.split_whitespace())
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn matches(&self, argv: &[String]) -> bool {
        let Some((program, rest)) = self.tokens.split_first() else {
            return false;
        };
        let Some((argv0, args)) = argv.split_first() else {
            return false;
        };
        program_name(program) == program_name(argv0)
            && args.len() >= rest.len()
            && rest.iter().zip(args).all(|(want, got)| want == got)
    }
}

fn program_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(program)
}

/// Outcome of [`ProcessSupervisor::wait_or_terminate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// Finished on their own before the deadline.
    pub exited: Vec<u32>,
    /// Ended after being signalled.
    pub terminated: Vec<u32>,
    /// Still running after SIGKILL.
    pub survivors: Vec<u32>,
}

impl TerminationReport {
    pub fn is_clean(&self) -> bool {
        self.survivors.is_empty()
    }
}

pub struct ProcessSupervisor<P, C> {
    table: P,
    clock: C,
    settings: SupervisorSettings,
    worker: WorkerCommand,
    signatures: Vec<ProcessSignature>,
}

impl<P: ProcessTable, C: Clock> ProcessSupervisor<P, C> {
    pub fn new(table: P, clock: C, settings: SupervisorSettings, worker: WorkerCommand) -> Self {
        let signatures = vec![worker.signature()];
        Self {
            table,
            clock,
            settings,
            worker,
            signatures,
        }
    }

    /// Adds signatures that also identify our processes, such as the patch
    /// core command.
    #[must_use]
    pub fn with_signatures<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = ProcessSignature>,
    {
        for signature in extra {
            if !self.signatures.contains(&signature) {
                self.signatures.push(signature);
            }
        }
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn signatures(&self) -> &[ProcessSignature] {
        &self.signatures
    }

    /// Starts the worker host for `settings` detached from this process.
    pub async fn spawn_daemon(&self, settings: &ConfigSettings) -> Result<u32, ProcessError> {
        let spec = self.worker.launch_spec(settings);
        let command_line = spec.command_line();
        let mut last_error = None;

        for attempt in 1..=LAUNCH_ATTEMPTS {
            match self.table.spawn_detached(&spec) {
                Ok(pid) => {
                    tracing::info!(pid, attempt, command = %command_line, "worker launched");
                    self.clock.sleep(self.settings.launch_check).await;
                    if self.table.argv(pid).is_none() {
                        tracing::warn!(pid, "worker is no longer running after launch check");
                    }
                    return Ok(pid);
                }
                Err(error) => {
                    tracing::warn!(attempt, %error, command = %command_line, "worker launch failed");
                    last_error = Some(error);
                }
            }
        }

        Err(ProcessError::Launch {
            program: spec.program.display().to_string(),
            source: last_error.unwrap_or_else(|| io::Error::other("no launch attempted")),
        })
    }

    /// Pids from `candidates` that are alive and belong to us.
    pub fn list_running_of(&self, candidates: &[u32]) -> Vec<u32> {
        candidates
            .iter()
            .copied()
            .filter(|pid| {
                self.table.argv(*pid).is_some_and(|argv| {
                    self.signatures
                        .iter()
                        .any(|signature| signature.matches(&argv))
                })
            })
            .collect()
    }

    /// Waits for `candidates` to finish until `deadline`, then terminates
    /// whatever is left. Never runs longer than one grace period past the
    /// deadline.
    pub async fn wait_or_terminate(
        &self,
        candidates: &[u32],
        deadline: DateTime<Utc>,
    ) -> TerminationReport {
        let initial = self.list_running_of(candidates);
        let mut running = initial.clone();

        while !running.is_empty() {
            let remaining = (deadline - self.clock.now()).to_std().unwrap_or_default();
            if remaining.is_zero() {
                break;
            }
            self.clock.sleep(self.settings.poll_interval.min(remaining)).await;
            running = self.list_running_of(&running);
        }

        let mut report = TerminationReport {
            exited: initial
                .iter()
                .copied()
                .filter(|pid| !running.contains(pid))
                .collect(),
            ..TerminationReport::default()
        };
        if running.is_empty() {
            return report;
        }

        tracing::warn!(pids = ?running, %deadline, "deadline reached, terminating previous workers");
        let to_terminate = running.clone();
        let rounds = self.settings.terminate_attempts.saturating_add(1);
        let slice = self.settings.termination_grace / rounds;

        for _ in 0..self.settings.terminate_attempts {
            self.signal_all(&running, Signal::Terminate);
            self.clock.sleep(slice).await;
            running = self.list_running_of(&running);
            if running.is_empty() {
                break;
            }
        }

        if !running.is_empty() {
            self.signal_all(&running, Signal::Kill);
            self.clock.sleep(slice).await;
            running = self.list_running_of(&running);
        }

        report.terminated = to_terminate
            .into_iter()
            .filter(|pid| !running.contains(pid))
            .collect();
        if !running.is_empty() {
            tracing::error!(pids = ?running, "workers survived SIGKILL");
        }
        report.survivors = running;
        report
    }

    fn signal_all(&self, pids: &[u32], signal: Signal) {
        for &pid in pids {
            if let Err(source) = self.table.signal(pid, signal) {
                let error = ProcessError::Signal { pid, source };
                tracing::warn!(%error, %signal, "signal not delivered");
            }
        }
    }
}
