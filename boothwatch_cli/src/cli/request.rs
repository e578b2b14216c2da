use clap::{Args, Subcommand};

use crate::cli::common::{build_client, hint_if_login_required, load_api_config};

#[derive(Debug, Args)]
pub(crate) struct RequestCommand {
    #[command(subcommand)]
    subcmd: RequestSubcommand,
}

#[derive(Debug, Subcommand)]
enum RequestSubcommand {
    /// GET a path and pretty-print the JSON response.
    Get(GetCommand),
}

impl RequestCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            RequestSubcommand::Get(cmd) => cmd.run().await,
        }
    }
}

#[derive(Debug, Args)]
struct GetCommand {
    /// Path relative to BOOTHWATCH_API_URL, e.g. `/booths/ranking`.
    path: String,
}

impl GetCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let config = load_api_config("boothwatch-cli-request/0.1")?;
        let client = build_client(&config)?;

        let body = match client.get_json::<serde_json::Value>(&self.path).await {
            Ok(body) => body,
            Err(err) => {
                hint_if_login_required(&client);
                return Err(err.into());
            }
        };

        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    }
}
