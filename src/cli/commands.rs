use clap::{Parser, Subcommand};
use patch_agent::Operation;
use patch_agent::config::schema::CONFIG_PATH_ENV;
use std::path::PathBuf;

/// `patch-agent` - guest-side patch management agent.
#[derive(Parser, Debug)]
#[command(name = "patch-agent")]
#[command(version)]
#[command(about = "Reconciles patch requests, supervises the patch worker and reports status.", long_about = None)]
pub struct Cli {
    /// Agent configuration file
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Handle an enable request from the host
    Enable {
        /// Sequence number of the request (default: newest settings file)
        #[arg(long = "seq-no", env = "ConfigSequenceNumber")]
        seq_no: Option<u64>,
    },

    /// Run a patch operation as the detached worker host
    #[command(hide = true)]
    Core {
        #[arg(long)]
        sequence_number: u64,

        #[arg(long)]
        operation: Operation,

        #[arg(long)]
        activity_id: String,

        /// RFC 3339 start time of the request
        #[arg(long)]
        start_time: String,
    },

    /// Print the status document for a sequence number
    Status {
        /// Sequence number (default: newest settings file)
        #[arg(long = "seq-no")]
        seq_no: Option<u64>,
    },
}
