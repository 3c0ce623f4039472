use std::path::PathBuf;

use anyhow::Result;
use dmsweep_core_types::{Command, DeletionState};
use dmsweep_state_center::PersistedState;
use serde::Serialize;
use stealth::SpeedProfileName;

use super::context::CliContext;
use super::output::{describe_state, render, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub deletion_state: DeletionState,
    pub pending_command: Option<Command>,
    pub speed_profile: SpeedProfileName,
    pub state_file: PathBuf,
}

impl StatusReport {
    pub async fn collect(state: &PersistedState, state_file: PathBuf) -> Result<Self> {
        let raw_speed = state.speed_profile().await?;
        Ok(Self {
            deletion_state: state.deletion_state().await?,
            pending_command: state.pending_command().await?,
            speed_profile: SpeedProfileName::parse_or_default(raw_speed.as_deref()),
            state_file,
        })
    }

    fn human(&self) -> String {
        let command = self
            .pending_command
            .map(|command| command.as_str())
            .unwrap_or("none");
        format!(
            "{}\nspeed: {}  pending: {}\nstate: {}",
            describe_state(&self.deletion_state),
            self.speed_profile,
            command,
            self.state_file.display()
        )
    }
}

pub async fn cmd_status(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let state = ctx.open_state()?;
    let report = StatusReport::collect(&state, ctx.config().state_file.clone()).await?;
    println!("{}", render(&report, output, StatusReport::human)?);
    Ok(())
}
