use crate::app::status::print_status;
use crate::cli::commands::{Cli, Commands};
use chrono::{DateTime, Utc};
use patch_agent::config::{CoreConfig, resolve_sequence_number};
use patch_agent::error::{ConfigError, ProcessError, Result};
use patch_agent::logging::{self, Role};
use patch_agent::platform::process::{
    NativeProcessTable, ProcessSignature, ProcessSupervisor, SupervisorSettings, SystemClock,
    WorkerCommand,
};
use patch_agent::{AgentConfig, ConfigSettings, Operation, RequestReconciler, WorkerHost};
use tracing::{Level, info};

pub async fn dispatch(cli: Cli, config: AgentConfig) -> Result<()> {
    match cli.command {
        Commands::Enable { seq_no } => run_enable(&config, seq_no).await,
        Commands::Core {
            sequence_number,
            operation,
            activity_id,
            start_time,
        } => run_core(&config, sequence_number, operation, activity_id, &start_time).await,
        Commands::Status { seq_no } => {
            logging::init_stderr_logging(Level::WARN);
            let sequence_number = resolve_sequence_number(seq_no, &config.config_folder())?;
            print_status(std::io::stdout().lock(), &config, sequence_number)
        }
    }
}

async fn run_enable(config: &AgentConfig, seq_no: Option<u64>) -> Result<()> {
    let config_folder = config.config_folder();
    let sequence_number = resolve_sequence_number(seq_no, &config_folder)?;
    let log_file = logging::init_file_logging(
        &config.logging,
        &config.log_folder(),
        sequence_number,
        Role::Enable,
    );
    info!(sequence_number, config = %config.config_path.display(), "enable invoked");

    let settings = ConfigSettings::read(&config_folder, sequence_number)?;
    let worker = WorkerCommand::current_exe(Some(&config.config_path)).map_err(|source| {
        ProcessError::Launch {
            program: env!("CARGO_PKG_NAME").to_string(),
            source,
        }
    })?;
    let supervisor = ProcessSupervisor::new(
        NativeProcessTable,
        SystemClock,
        SupervisorSettings::from_runtime(&config.runtime),
        worker,
    )
    .with_signatures(core_signatures(&config.core));

    let mut reconciler =
        RequestReconciler::new(config, sequence_number, supervisor).with_log_file(log_file);
    let outcome = reconciler.enable(&settings).await?;
    info!(?outcome, "exiting enable handler");
    Ok(())
}

async fn run_core(
    config: &AgentConfig,
    sequence_number: u64,
    operation: Operation,
    activity_id: String,
    start_time: &str,
) -> Result<()> {
    let log_file = logging::init_file_logging(
        &config.logging,
        &config.log_folder(),
        sequence_number,
        Role::Core,
    );
    let start_time = DateTime::parse_from_rfc3339(start_time)
        .map_err(|error| {
            ConfigError::Validation(format!("--start-time '{start_time}' is invalid: {error}"))
        })?
        .with_timezone(&Utc);
    let settings = ConfigSettings {
        sequence_number,
        operation,
        activity_id,
        start_time,
    };
    info!(sequence_number, %operation, pid = std::process::id(), "worker host started");

    WorkerHost::new(config, settings)
        .with_log_file(log_file)
        .run()
        .await?;
    Ok(())
}

/// Signatures identifying patch core processes: the configured command as
/// spawned, plus any extra configured argv prefixes.
fn core_signatures(core: &CoreConfig) -> Vec<ProcessSignature> {
    ProcessSignature::new(core.command.iter().cloned())
        .into_iter()
        .chain(
            core.process_signatures
                .iter()
                .map(String::as_str)
                .filter_map(ProcessSignature::parse),
        )
        .collect()
}
