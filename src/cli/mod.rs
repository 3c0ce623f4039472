pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod reset;
pub mod run;
pub mod runtime;
pub mod speed;
pub mod status;

pub use env::CliArgs;
pub use reset::cmd_reset;
pub use run::{cmd_run, RunArgs};
pub use speed::{cmd_speed, SpeedArgs};
pub use status::cmd_status;
