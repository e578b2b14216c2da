use clap::{ArgAction, Parser, Subcommand};

use crate::cli::{auth::AuthCommand, ranking::RankingCommand, request::RequestCommand};

pub(crate) fn get_args() -> CliOpts {
    CliOpts::parse()
}

#[derive(Debug, Parser)]
#[command(version = clap::crate_version!(), about = "Booth sales dashboard client")]
pub(crate) struct CliOpts {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    subcmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Login and stored session operations.
    Auth(AuthCommand),

    /// Send authenticated requests to the admin API.
    Request(RequestCommand),

    /// Follow the live booth sales leaderboard.
    Ranking(RankingCommand),
}

impl CliOpts {
    pub(crate) fn verbose(&self) -> u8 {
        self.verbose
    }

    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            Command::Auth(cmd) => cmd.run().await,
            Command::Request(cmd) => cmd.run().await,
            Command::Ranking(cmd) => cmd.run().await,
        }
    }
}
