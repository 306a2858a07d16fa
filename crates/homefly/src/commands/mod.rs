//! Command dispatch: bridges CLI args → core operations → output
//! formatting.

pub mod config_cmd;
pub mod entities;
pub mod guard;
pub mod schedule;
pub mod serve;
pub mod util;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Dispatch a parsed invocation to the appropriate handler.
pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Entities(args) => entities::handle(args, &cli.global).await,
        Command::Schedule(args) => schedule::handle(args, &cli.global).await,
        Command::Guard(args) => guard::handle(args, &cli.global).await,
        Command::Serve => serve::handle(&cli.global).await,
        Command::Config(args) => config_cmd::handle(args, &cli.global),
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
