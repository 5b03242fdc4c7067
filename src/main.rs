mod agents;
mod cli;
mod config;
mod git;
mod health;
mod logging;
mod model;
mod providers;
mod webhook;
mod workflow;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Run(args)) => cli::handle_run(args.target()?).await,
        Some(Command::Webhook { port }) => cli::handle_webhook(port).await,
        Some(Command::Health(args)) => {
            if !cli::handle_health(args).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        None => match cli.legacy_target() {
            Some(target) => cli::handle_run(target).await,
            None => {
                Cli::command().print_help()?;
                std::process::exit(1);
            }
        },
    }
}
