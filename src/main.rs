#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use clap::Parser;
use patch_agent::AgentConfig;

mod app;
mod cli;

use cli::commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match AgentConfig::load_or_init(cli.config.as_deref()) {
        Ok(config) => app::dispatch::dispatch(cli, config).await,
        Err(error) => Err(error.into()),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            let code = patch_agent::ExitCode::from(&error);
            tracing::error!(%error, %code, "patch agent failed");
            eprintln!("Error: {error}");
            std::process::ExitCode::from(code.as_u8())
        }
    }
}
