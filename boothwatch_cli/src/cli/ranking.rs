use std::{sync::Arc, time::Duration};

use anyhow::Context;
use boothwatch_api::{LiveRankingClient, RankingConfig, TungsteniteConnector};
use clap::{Args, Subcommand};

use crate::cli::common::{build_client, hint_if_login_required, load_api_config, print_leaderboard};

#[derive(Debug, Args)]
pub(crate) struct RankingCommand {
    #[command(subcommand)]
    subcmd: RankingSubcommand,
}

#[derive(Debug, Subcommand)]
enum RankingSubcommand {
    /// Print the leaderboard on every change until Ctrl+C.
    Watch(WatchCommand),
}

impl RankingCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            RankingSubcommand::Watch(cmd) => cmd.run().await,
        }
    }
}

#[derive(Debug, Args)]
struct WatchCommand {
    /// Number of booths to print.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Consecutive reconnects before the feed gives up.
    #[arg(long, default_value_t = RankingConfig::default().max_reconnect_attempts)]
    max_reconnect_attempts: u32,
}

impl WatchCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let config = load_api_config("boothwatch-cli-ranking/0.1")?;
        let client = build_client(&config)?;
        let ranking_config = RankingConfig {
            max_reconnect_attempts: self.max_reconnect_attempts,
            ..RankingConfig::default()
        };

        let ranking =
            LiveRankingClient::new(Arc::new(TungsteniteConnector), config, ranking_config);
        if let Err(err) = ranking.start(&client).await {
            hint_if_login_required(&client);
            return Err(err).context("failed to load ranking snapshot");
        }

        let mut board_rx = ranking.subscribe_leaderboard();
        let mut state_rx = ranking.subscribe_state();
        print_leaderboard(board_rx.borrow_and_update().top(self.top));
        println!("Listening for sales updates. Press Ctrl+C to stop.");

        loop {
            tokio::select! {
                changed = board_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!();
                    print_leaderboard(board_rx.borrow_and_update().top(self.top));
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *state_rx.borrow_and_update();
                    eprintln!("feed {state:?}");
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping ranking watch...");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if !ranking.is_running() {
                        anyhow::bail!(
                            "ranking feed gave up after {} reconnect attempts",
                            ranking.reconnect_attempts()
                        );
                    }
                }
            }
        }

        ranking.disconnect().await;
        Ok(())
    }
}
