use boothwatch_api::{LoginCredentials, SessionStatus};
use clap::{Args, Subcommand};

use crate::cli::common::{build_client, load_api_config, open_vault, required_env};

#[derive(Debug, Args)]
pub(crate) struct AuthCommand {
    #[command(subcommand)]
    subcmd: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Log in and persist the token pair in keyring.
    Login(LoginCommand),

    /// Show whether a session is stored.
    Status(StatusCommand),

    /// Remove the stored session from keyring.
    Logout(LogoutCommand),
}

impl AuthCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            AuthSubcommand::Login(cmd) => cmd.run().await,
            AuthSubcommand::Status(cmd) => cmd.run().await,
            AuthSubcommand::Logout(cmd) => cmd.run().await,
        }
    }
}

#[derive(Debug, Args)]
struct LoginCommand {
    /// Defaults to BOOTHWATCH_LOGIN_ID. The password is read from BOOTHWATCH_PASSWORD.
    #[arg(long)]
    login_id: Option<String>,
}

impl LoginCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let config = load_api_config("boothwatch-cli-auth/0.1")?;
        let login_id = match &self.login_id {
            Some(login_id) => login_id.clone(),
            None => required_env("BOOTHWATCH_LOGIN_ID")?,
        };
        let password = required_env("BOOTHWATCH_PASSWORD")?;

        let client = build_client(&config)?;
        client
            .auth()
            .login(&LoginCredentials::new(login_id.as_str(), password))
            .await?;

        println!("Logged in as {login_id}; session stored in keyring.");
        Ok(())
    }
}

#[derive(Debug, Args)]
struct StatusCommand {}

impl StatusCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let vault = open_vault()?;

        match vault.status() {
            SessionStatus::Active => println!("Session stored in keyring."),
            SessionStatus::LoginRequired { reason } => {
                println!("No usable session ({reason}). Run `boothwatch auth login`.")
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
struct LogoutCommand {}

impl LogoutCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let config = load_api_config("boothwatch-cli-auth/0.1")?;
        let client = build_client(&config)?;

        client.auth().logout()?;
        println!("Cleared stored session from keyring.");
        Ok(())
    }
}
