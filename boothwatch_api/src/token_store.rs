use std::{fmt, sync::Mutex};

use keyring::Entry;
use serde::{Deserialize, Serialize};

use crate::ApiResult;

/// Storage key the session is persisted under.
pub const SESSION_STORAGE_KEY: &str = "boothwatch.session";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

pub trait TokenStore {
    fn load_tokens(&self) -> ApiResult<Option<TokenPair>>;
    fn save_tokens(&self, tokens: &TokenPair) -> ApiResult<()>;
    fn clear_tokens(&self) -> ApiResult<()>;
}

#[derive(Clone, Debug)]
pub struct KeyringTokenStore {
    service: String,
    storage_key: String,
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self::with_storage_key(service, SESSION_STORAGE_KEY)
    }

    pub fn with_storage_key(service: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            storage_key: storage_key.into(),
        }
    }

    fn entry(&self) -> ApiResult<Entry> {
        Ok(Entry::new(&self.service, &self.storage_key)?)
    }
}

impl TokenStore for KeyringTokenStore {
    fn load_tokens(&self) -> ApiResult<Option<TokenPair>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save_tokens(&self, tokens: &TokenPair) -> ApiResult<()> {
        let entry = self.entry()?;
        let raw = serde_json::to_string(tokens)?;
        entry.set_password(&raw)?;
        Ok(())
    }

    fn clear_tokens(&self) -> ApiResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<TokenPair>> {
        match self.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load_tokens(&self) -> ApiResult<Option<TokenPair>> {
        Ok(self.slot().clone())
    }

    fn save_tokens(&self, tokens: &TokenPair) -> ApiResult<()> {
        *self.slot() = Some(tokens.clone());
        Ok(())
    }

    fn clear_tokens(&self) -> ApiResult<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryTokenStore, TokenPair, TokenStore};

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::default();
        assert_eq!(store.load_tokens().expect("load"), None);

        let tokens = TokenPair::new("access", "refresh");
        store.save_tokens(&tokens).expect("save");
        assert_eq!(store.load_tokens().expect("load"), Some(tokens));

        store.clear_tokens().expect("clear");
        assert_eq!(store.load_tokens().expect("load"), None);
    }

    #[test]
    fn token_pair_uses_camel_case_and_hides_secrets_in_debug() {
        let tokens = TokenPair::new("a-secret", "r-secret");

        let raw = serde_json::to_string(&tokens).expect("serialize");
        assert_eq!(raw, r#"{"accessToken":"a-secret","refreshToken":"r-secret"}"#);

        let debug = format!("{tokens:?}");
        assert!(!debug.contains("secret"));
    }
}
