mod refresh;
mod service;
mod types;

pub(crate) use refresh::{RefreshGate, RefreshTurn};
pub use service::{AuthService, LOGIN_PATH, REFRESH_PATH};
pub use types::LoginCredentials;
