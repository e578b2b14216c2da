pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod ranking;
pub mod session;
pub mod token_store;
pub mod transport;

pub use auth::{AuthService, LoginCredentials};
pub use client::AuthenticatedHttpClient;
pub use config::{ApiConfig, RankingConfig};
pub use errors::{ApiError, ApiResult};
pub use ranking::{
    ConnectionState, LiveRankingClient, RankingSnapshotSource, TungsteniteConnector,
};
pub use session::{SessionStatus, SessionVault};
pub use token_store::{KeyringTokenStore, MemoryTokenStore, TokenPair, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
