use anyhow::Result;
use clap::ValueEnum;
use dmsweep_core_types::DeletionState;
use dmsweep_event_bus::SurfaceMessage;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Serialize `value` for machine formats, or use `human` for the terminal.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    human: impl FnOnce(&T) -> String,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Human => human(value),
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
    })
}

pub fn describe_state(state: &DeletionState) -> String {
    let text = if state.status_text.is_empty() {
        "-"
    } else {
        state.status_text.as_str()
    };
    format!(
        "[{}] {}/{} {}",
        state.status, state.deleted, state.total, text
    )
}

pub fn describe_event(message: &SurfaceMessage) -> String {
    match (message.implied_status(), message.progress()) {
        (Some(status), Some(progress)) => {
            describe_state(&DeletionState::from_progress(status, progress))
        }
        _ => message.name().to_string(),
    }
}
