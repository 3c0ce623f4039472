use anyhow::Result;
use dmsweep_core_types::DeletionState;
use dmsweep_state_center::PersistedState;
use tracing::info;

use super::context::CliContext;
use super::output::{describe_state, render, OutputFormat};

/// Offline counterpart of `close_delete`: no worker is touched, the record
/// goes back to idle and any pending command is dropped.
pub async fn reset_state(state: &PersistedState) -> Result<DeletionState> {
    let idle = DeletionState::idle();
    state.set_deletion_state(&idle).await?;
    state.clear_pending_command().await?;
    info!("Run state reset to idle");
    Ok(idle)
}

pub async fn cmd_reset(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let state = ctx.open_state()?;
    let previous = state.deletion_state().await?;
    if previous.status.is_active() {
        info!(status = %previous.status, "Discarding a run that was still marked active");
    }
    let idle = reset_state(&state).await?;
    println!("{}", render(&idle, output, describe_state)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmsweep_core_types::{Command, DeletionStatus, Progress};

    #[tokio::test]
    async fn reset_clears_counters_and_command() {
        let state = PersistedState::in_memory();
        state
            .set_deletion_state(&DeletionState::from_progress(
                DeletionStatus::Paused,
                &Progress::new(4, 9, "Paused (4/9)"),
            ))
            .await
            .unwrap();
        state.set_pending_command(Command::Pause).await.unwrap();
        state.set_speed_profile("slow").await.unwrap();

        reset_state(&state).await.unwrap();

        assert_eq!(state.deletion_state().await.unwrap(), DeletionState::idle());
        assert_eq!(state.pending_command().await.unwrap(), None);
        assert_eq!(state.speed_profile().await.unwrap().as_deref(), Some("slow"));
    }
}
