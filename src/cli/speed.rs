use anyhow::Result;
use clap::Args;
use dmsweep_state_center::PersistedState;
use serde::Serialize;
use stealth::{SpeedProfile, SpeedProfileName};
use tracing::{info, warn};

use super::context::CliContext;
use super::output::{render, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SpeedArgs {
    /// Profile to store (slow, normal, fast); omit to show the current one
    pub profile: Option<SpeedProfileName>,
}

#[derive(Debug, Serialize)]
pub struct SpeedReport {
    pub profile: SpeedProfile,
    pub warning: Option<String>,
}

impl SpeedReport {
    fn human(&self) -> String {
        let p = &self.profile;
        let mut out = format!(
            "speed: {}\n  click delay {}-{} ms, after delete {}-{} ms, pause every {} for {}-{} ms",
            p.name,
            p.click_delay.min_ms,
            p.click_delay.max_ms,
            p.after_delete.min_ms,
            p.after_delete.max_ms,
            p.pause_every,
            p.pause_duration.min_ms,
            p.pause_duration.max_ms
        );
        if let Some(warning) = &self.warning {
            out.push_str("\n  ");
            out.push_str(warning);
        }
        out
    }
}

pub const FAST_WARNING: &str =
    "Fast mode increases the chance of the account being rate limited or flagged.";

/// Store `name` as the preference read at the start of the next run.
pub async fn store_speed(state: &PersistedState, name: SpeedProfileName) -> Result<()> {
    state.set_speed_profile(name.as_str()).await?;
    if name.is_risky() {
        warn!(profile = %name, "{}", FAST_WARNING);
    }
    info!(profile = %name, "Speed profile stored");
    Ok(())
}

pub async fn cmd_speed(args: SpeedArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let state = ctx.open_state()?;
    let name = match args.profile {
        Some(name) => {
            store_speed(&state, name).await?;
            name
        }
        None => {
            let raw = state.speed_profile().await?;
            SpeedProfileName::parse_or_default(raw.as_deref())
        }
    };
    let catalog = ctx.load_catalog()?;
    let report = SpeedReport {
        profile: catalog.resolve(name),
        warning: name.is_risky().then(|| FAST_WARNING.to_string()),
    };
    println!("{}", render(&report, output, SpeedReport::human)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_choice_survives_reads() {
        let state = PersistedState::in_memory();
        store_speed(&state, SpeedProfileName::Fast).await.unwrap();
        assert_eq!(state.speed_profile().await.unwrap().as_deref(), Some("fast"));

        store_speed(&state, SpeedProfileName::Slow).await.unwrap();
        let raw = state.speed_profile().await.unwrap();
        assert_eq!(
            SpeedProfileName::parse_or_default(raw.as_deref()),
            SpeedProfileName::Slow
        );
    }
}
