use std::{env, sync::Arc};

use anyhow::Context;
use boothwatch_api::{
    ApiConfig, AuthenticatedHttpClient, KeyringTokenStore, ReqwestTransport, SessionStatus,
    SessionVault,
};
use boothwatch_core::RankingEntry;

const KEYRING_SERVICE: &str = "boothwatch";

pub(crate) type Client = AuthenticatedHttpClient<ReqwestTransport, KeyringTokenStore>;

pub(crate) fn load_api_config(default_user_agent: &'static str) -> anyhow::Result<ApiConfig> {
    let config = ApiConfig::new(
        required_env("BOOTHWATCH_API_URL")?,
        env::var("BOOTHWATCH_USER_AGENT").unwrap_or_else(|_| default_user_agent.into()),
    );
    config.validate().context("invalid API configuration")?;
    Ok(config)
}

pub(crate) fn open_vault() -> anyhow::Result<Arc<SessionVault<KeyringTokenStore>>> {
    let vault = SessionVault::open(KeyringTokenStore::new(KEYRING_SERVICE))
        .context("failed to load stored session from keyring")?;
    Ok(Arc::new(vault))
}

pub(crate) fn build_client(config: &ApiConfig) -> anyhow::Result<Client> {
    let vault = open_vault()?;
    AuthenticatedHttpClient::from_config(config, vault).context("failed to create HTTP client")
}

pub(crate) fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("missing required env var `{name}`"))
}

pub(crate) fn hint_if_login_required(client: &Client) {
    if let SessionStatus::LoginRequired { reason } = client.session_status() {
        eprintln!("Session is no longer valid ({reason}). Run `boothwatch auth login`.");
    }
}

pub(crate) fn print_leaderboard(entries: &[RankingEntry]) {
    if entries.is_empty() {
        println!("(no booths)");
        return;
    }

    let name_width = entries
        .iter()
        .map(|entry| entry.name.chars().count())
        .max()
        .unwrap_or(0);
    for entry in entries {
        println!(
            "{:>3}. {:<name_width$}  {:>10}  (booth {})",
            entry.rank, entry.name, entry.total_sales, entry.id
        );
    }
}
