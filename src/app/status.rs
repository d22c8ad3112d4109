use anyhow::Context;
use patch_agent::AgentConfig;
use patch_agent::error::{Result, StatusError};
use patch_agent::status::StatusHandler;
use std::io::Write;

/// Status document of `sequence_number` as pretty-printed JSON, in the same
/// single-element array shape the host polls.
pub fn render_status(config: &AgentConfig, sequence_number: u64) -> Result<String> {
    let handler = StatusHandler::new(&config.status_folder(), sequence_number, &config.status);
    let document = handler.read()?;
    let rendered = serde_json::to_string_pretty(&[document]).map_err(StatusError::from)?;
    Ok(rendered)
}

/// Writes the rendered status of `sequence_number` to `out`.
pub fn print_status(
    mut out: impl Write,
    config: &AgentConfig,
    sequence_number: u64,
) -> Result<()> {
    let rendered = render_status(config, sequence_number)?;
    writeln!(out, "{rendered}")
        .and_then(|()| out.flush())
        .context("failed to write status document to stdout")?;
    Ok(())
}
