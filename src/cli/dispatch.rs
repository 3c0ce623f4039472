use super::env::CliArgs;
use super::reset::cmd_reset;
use super::run::cmd_run;
use super::speed::cmd_speed;
use super::status::cmd_status;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx, cli.output).await,
        Commands::Status => cmd_status(ctx, cli.output).await,
        Commands::Reset => cmd_reset(ctx, cli.output).await,
        Commands::Speed(args) => cmd_speed(args, ctx, cli.output).await,
    }
}
