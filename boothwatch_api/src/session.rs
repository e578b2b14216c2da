use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

use crate::{
    ApiResult,
    auth::RefreshGate,
    token_store::{TokenPair, TokenStore},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    LoginRequired { reason: String },
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Owner of the current token pair for one application instance.
///
/// Opened once at startup from a [`TokenStore`] and shared through an `Arc`
/// with every collaborator that needs credentials. A new pair is persisted
/// before requests can see it; a cleared pair disappears from memory first.
/// Only the auth flow writes.
///
/// The vault also owns the refresh gate: every request sharing this session
/// queues behind the same in-flight refresh, whichever client sent it.
pub struct SessionVault<S>
where
    S: TokenStore,
{
    store: S,
    tokens: Mutex<Option<TokenPair>>,
    status: watch::Sender<SessionStatus>,
    refresh_gate: RefreshGate,
}

impl<S> SessionVault<S>
where
    S: TokenStore,
{
    pub fn open(store: S) -> ApiResult<Self> {
        let tokens = store.load_tokens()?;
        let status = match tokens {
            Some(_) => SessionStatus::Active,
            None => SessionStatus::LoginRequired {
                reason: "no stored session".to_owned(),
            },
        };
        log::debug!(
            "session vault opened ({})",
            if tokens.is_some() {
                "restored stored session"
            } else {
                "no stored session"
            }
        );

        Ok(Self {
            store,
            tokens: Mutex::new(tokens),
            status: watch::channel(status).0,
            refresh_gate: RefreshGate::default(),
        })
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.slot().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.slot().as_ref().map(|tokens| tokens.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.slot().as_ref().map(|tokens| tokens.refresh_token.clone())
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn refresh_gate(&self) -> &RefreshGate {
        &self.refresh_gate
    }

    pub(crate) fn replace_tokens(&self, tokens: TokenPair) -> ApiResult<()> {
        self.store.save_tokens(&tokens)?;
        *self.slot() = Some(tokens);
        self.status.send_replace(SessionStatus::Active);
        Ok(())
    }

    /// Drops the pair from memory before touching the store, so no request
    /// picks up a token that is being revoked even if the store fails.
    pub(crate) fn clear(&self, reason: impl Into<String>) -> ApiResult<()> {
        let reason = reason.into();
        self.slot().take();
        self.status
            .send_replace(SessionStatus::LoginRequired { reason });
        self.store.clear_tokens()
    }

    fn slot(&self) -> MutexGuard<'_, Option<TokenPair>> {
        match self.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionStatus, SessionVault};
    use crate::token_store::{MemoryTokenStore, TokenPair, TokenStore};

    #[test]
    fn open_restores_persisted_pair() {
        let store = MemoryTokenStore::with_tokens(TokenPair::new("access", "refresh"));
        let vault = SessionVault::open(store).expect("open");

        assert_eq!(vault.access_token().as_deref(), Some("access"));
        assert_eq!(vault.refresh_token().as_deref(), Some("refresh"));
        assert!(vault.status().is_active());
    }

    #[test]
    fn open_without_stored_pair_requires_login() {
        let vault = SessionVault::open(MemoryTokenStore::default()).expect("open");

        assert!(vault.tokens().is_none());
        assert!(matches!(
            vault.status(),
            SessionStatus::LoginRequired { .. }
        ));
    }

    #[test]
    fn replace_and_clear_write_through_to_store() {
        let vault = SessionVault::open(MemoryTokenStore::default()).expect("open");
        let mut status_rx = vault.subscribe();

        vault
            .replace_tokens(TokenPair::new("a1", "r1"))
            .expect("replace");
        assert_eq!(
            vault.store().load_tokens().expect("load"),
            Some(TokenPair::new("a1", "r1"))
        );
        assert!(status_rx.has_changed().expect("sender alive"));
        assert!(status_rx.borrow_and_update().is_active());

        vault.clear("logged out").expect("clear");
        assert!(vault.tokens().is_none());
        assert_eq!(vault.store().load_tokens().expect("load"), None);
        assert_eq!(
            *status_rx.borrow_and_update(),
            SessionStatus::LoginRequired {
                reason: "logged out".to_owned()
            }
        );
    }
}
