use clap::Subcommand;

use super::run::RunArgs;
use super::speed::SpeedArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Open a worker window and delete conversations until the inbox is empty
    Run(RunArgs),

    /// Show the persisted run state
    Status,

    /// Forget the current run and return to idle
    Reset,

    /// Show or change the speed profile
    Speed(SpeedArgs),
}
