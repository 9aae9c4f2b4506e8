//! Session bridge between the identity provider's redirect flow and the rest
//! of the app.
//!
//! The bridge owns the in-memory identity and publishes [`AuthState`] on a
//! watch channel. Restores and callback captures are serialised by one async
//! lock, so a callback delivered during startup is applied after the startup
//! restore instead of racing it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::callback::{is_auth_callback, login_url, parse_callback};
use super::DelegatedIdentity;
use crate::config::{OpendConfig, SessionTimeout};
use crate::error::{OpendError, Result};
use crate::platform::Platform;
use crate::principal::Principal;
use crate::rest::HttpClient;
use crate::storage::credentials::StoredCredential;
use crate::storage::CredentialStore;

const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Uninitialized,
    Restoring,
    Authenticated { principal: Principal },
    Unauthenticated { error: Option<String> },
    AwaitingCallback,
}

impl AuthState {
    /// False until the first restore has finished.
    pub fn is_known(&self) -> bool {
        !matches!(self, AuthState::Uninitialized | AuthState::Restoring)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::Authenticated { principal } => Some(principal),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AuthState::Unauthenticated { error } => error.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Authenticated(Principal),
    /// This exact URL was seen before; nothing was done.
    Duplicate,
    /// Not an auth callback for our scheme.
    Ignored,
}

pub struct SessionBridge {
    provider: String,
    assets_canister_id: String,
    scheme: String,
    logout_url: Option<String>,
    timeout: SessionTimeout,
    platform: Platform,
    credentials: CredentialStore,
    state: watch::Sender<AuthState>,
    identity: Mutex<Option<Arc<DelegatedIdentity>>>,
    processed: Mutex<HashSet<String>>,
    op_lock: tokio::sync::Mutex<()>,
}

impl SessionBridge {
    pub fn new(config: &OpendConfig, platform: Platform) -> Self {
        let (state, _) = watch::channel(AuthState::Uninitialized);
        Self {
            provider: config.identity_provider().to_string(),
            assets_canister_id: config.assets_canister_id.clone(),
            scheme: config.app_scheme.clone(),
            logout_url: config.logout_url.clone(),
            timeout: config.session_timeout,
            credentials: CredentialStore::new(platform.store.clone()),
            platform,
            state,
            identity: Mutex::new(None),
            processed: Mutex::new(HashSet::new()),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<Arc<DelegatedIdentity>> {
        self.identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state().principal().cloned()
    }

    /// Rehydrate the identity from storage.
    pub async fn restore(&self) -> Result<AuthState> {
        let _guard = self.op_lock.lock().await;
        self.restore_locked().await
    }

    /// Start a login at the identity provider.
    ///
    /// Returns once the URL is handed to the opener; the credential arrives
    /// later through [`capture_callback`](Self::capture_callback).
    pub async fn login(&self) -> Result<Url> {
        let url = login_url(&self.provider, &self.assets_canister_id)?;
        if let Err(e) = self.platform.opener.open(url.as_str()).await {
            self.set_state(AuthState::Unauthenticated {
                error: Some(e.to_string()),
            });
            return Err(e);
        }
        info!(%url, "login started");
        self.set_state(AuthState::AwaitingCallback);
        Ok(url)
    }

    /// Apply a redirect from the identity provider.
    ///
    /// Each distinct URL is processed at most once. The payload is fully
    /// validated before anything is persisted.
    pub async fn capture_callback(&self, url: &str) -> Result<CaptureOutcome> {
        if !is_auth_callback(url, &self.scheme) {
            return Ok(CaptureOutcome::Ignored);
        }
        if !self.mark_processed(url) {
            debug!("ignoring duplicate auth callback");
            return Ok(CaptureOutcome::Duplicate);
        }

        let _guard = self.op_lock.lock().await;
        let identity = match self.validate_callback(url) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "rejected auth callback");
                if self.state() == AuthState::AwaitingCallback {
                    self.set_state(AuthState::Unauthenticated {
                        error: Some(e.to_string()),
                    });
                }
                return Err(e);
            }
        };

        self.credentials
            .save(&identity.0, Utc::now())
            .await?;
        info!(principal = %identity.1, "credential stored");

        match self.restore_locked().await? {
            AuthState::Authenticated { principal } => Ok(CaptureOutcome::Authenticated(principal)),
            other => Err(OpendError::Callback(format!(
                "credential stored but session not restored: {other:?}"
            ))),
        }
    }

    /// App returned to the foreground, possibly with a pending redirect.
    pub async fn on_foreground(&self, pending_url: Option<&str>) -> Result<AuthState> {
        if let Some(url) = pending_url.filter(|u| is_auth_callback(u, &self.scheme)) {
            self.capture_callback(url).await?;
            return Ok(self.state());
        }
        self.restore().await
    }

    /// Log out when the session window or the delegation has lapsed.
    ///
    /// Returns true when a logout happened.
    pub async fn check_session_timeout(&self) -> Result<bool> {
        let _guard = self.op_lock.lock().await;
        if !self.state().is_authenticated() {
            return Ok(false);
        }
        let expired_identity = self
            .identity()
            .map(|i| !i.is_valid_at(Utc::now()))
            .unwrap_or(false);
        if expired_identity || self.window_elapsed().await? {
            self.expire().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Invalidate the remote session if possible, then forget it locally.
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        if let Some(url) = &self.logout_url {
            let principal = self.principal().map(|p| p.to_text());
            let body = serde_json::json!({ "principal": principal });
            if let Err(e) = HttpClient::new(url).post_json_unit("", &[], &body).await {
                warn!(error = %e, "remote logout failed");
            }
        }
        let cleared = self.credentials.clear().await;
        self.clear_identity();
        self.set_state(AuthState::Unauthenticated { error: None });
        info!("logged out");
        cleared
    }

    /// Run [`check_session_timeout`](Self::check_session_timeout) every
    /// `interval` until `cancel` fires.
    pub fn spawn_session_watchdog(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("session watchdog stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match bridge.check_session_timeout().await {
                            Ok(true) => info!("session timed out"),
                            Ok(false) => {}
                            Err(e) => warn!(error = %e, "session check failed"),
                        }
                    }
                }
            }
        })
    }

    async fn restore_locked(&self) -> Result<AuthState> {
        let previous = self.state();
        if !previous.is_known() {
            self.set_state(AuthState::Restoring);
        }

        let stored = match self.credentials.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "failed to read stored credential");
                self.clear_identity();
                let next = AuthState::Unauthenticated {
                    error: Some(e.to_string()),
                };
                self.set_state(next.clone());
                return Ok(next);
            }
        };
        let Some(stored) = stored else {
            self.clear_identity();
            let next = if previous == AuthState::AwaitingCallback {
                AuthState::AwaitingCallback
            } else {
                AuthState::Unauthenticated { error: None }
            };
            self.set_state(next.clone());
            return Ok(next);
        };

        if self.window_elapsed().await? {
            return self.expire().await;
        }

        let identity = match DelegatedIdentity::from_stored(&stored.key, &stored.delegation) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "stored credential unusable");
                self.clear_identity();
                let next = AuthState::Unauthenticated { error: None };
                self.set_state(next.clone());
                return Ok(next);
            }
        };

        if !identity.is_valid_at(Utc::now()) {
            info!("stored delegation expired");
            return self.expire().await;
        }

        let principal = identity.principal().clone();
        *self
            .identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(identity));
        let next = AuthState::Authenticated {
            principal: principal.clone(),
        };
        self.set_state(next.clone());
        debug!(%principal, "session restored");
        Ok(next)
    }

    /// True when a fixed window applies and has run out.
    async fn window_elapsed(&self) -> Result<bool> {
        let SessionTimeout::Fixed(window) = self.timeout else {
            return Ok(false);
        };
        let Some(logged_in_at) = self.credentials.login_timestamp().await? else {
            return Ok(true);
        };
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Ok(Utc::now() - logged_in_at > window)
    }

    async fn expire(&self) -> Result<AuthState> {
        self.credentials.clear().await?;
        self.clear_identity();
        let next = AuthState::Unauthenticated {
            error: Some(SESSION_EXPIRED.to_string()),
        };
        self.set_state(next.clone());
        Ok(next)
    }

    fn validate_callback(&self, url: &str) -> Result<(StoredCredential, Principal)> {
        let payload = parse_callback(url, &self.scheme)?;
        let identity = DelegatedIdentity::from_stored(&payload.key, &payload.delegation)?;
        if !identity.is_valid_at(Utc::now()) {
            return Err(OpendError::Callback("delegation already expired".into()));
        }
        Ok((
            StoredCredential {
                key: payload.key,
                delegation: payload.delegation,
            },
            identity.principal().clone(),
        ))
    }

    /// Returns false if `url` was already processed.
    fn mark_processed(&self, url: &str) -> bool {
        self.processed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.to_string())
    }

    fn clear_identity(&self) {
        *self
            .identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn set_state(&self, next: AuthState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = ?current, to = ?next, "auth state");
            *current = next;
            true
        });
    }
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("state", &self.state())
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::callback::encode_callback;
    use crate::identity::{issue_delegation, SessionKey};
    use crate::platform::{MemoryClipboard, RecordingUrlOpener};
    use crate::storage::credentials::{DELEGATION_KEY, IDENTITY_KEY, LOGIN_TIMESTAMP_KEY};
    use crate::storage::{KeyValueStore, MemoryStore};
    use ed25519_dalek::SigningKey;

    struct Fixture {
        bridge: SessionBridge,
        store: Arc<MemoryStore>,
        opener: Arc<RecordingUrlOpener>,
    }

    fn fixture(timeout: SessionTimeout) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let opener = Arc::new(RecordingUrlOpener::default());
        let platform = Platform::new(
            store.clone(),
            opener.clone(),
            Arc::new(MemoryClipboard::default()),
        );
        let config = OpendConfig {
            session_timeout: timeout,
            ..OpendConfig::default()
        };
        Fixture {
            bridge: SessionBridge::new(&config, platform),
            store,
            opener,
        }
    }

    fn credential(valid_for: chrono::Duration) -> (String, String, Principal) {
        let session = SessionKey::generate();
        let root = SigningKey::from_bytes(&[9u8; 32]);
        let chain = issue_delegation(&root, &session, Utc::now() + valid_for);
        let delegation = serde_json::to_string(&chain).unwrap();
        let principal = DelegatedIdentity::new(session.clone(), chain)
            .unwrap()
            .principal()
            .clone();
        (session.to_json(), delegation, principal)
    }

    #[tokio::test]
    async fn test_restore_without_credential_is_unauthenticated() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        assert!(!f.bridge.state().is_known());
        let state = f.bridge.restore().await.unwrap();
        assert_eq!(state, AuthState::Unauthenticated { error: None });
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_login_opens_provider_and_awaits_callback() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        f.bridge.restore().await.unwrap();
        let url = f.bridge.login().await.unwrap();
        assert!(url.as_str().contains("canisterId=ulvla-h7777-77774-qaacq-cai"));
        assert!(url.as_str().ends_with("mobile=1"));
        assert_eq!(f.opener.opened(), vec![url.to_string()]);
        assert_eq!(f.bridge.state(), AuthState::AwaitingCallback);
    }

    #[tokio::test]
    async fn test_capture_authenticates() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        f.bridge.restore().await.unwrap();
        let (key, delegation, principal) = credential(chrono::Duration::hours(1));
        let url = encode_callback("opend", &key, &delegation);

        let outcome = f.bridge.capture_callback(&url).await.unwrap();
        assert_eq!(outcome, CaptureOutcome::Authenticated(principal.clone()));
        assert_eq!(f.bridge.principal(), Some(principal));
        assert!(f.bridge.identity().is_some());
        assert_eq!(f.store.get(IDENTITY_KEY).await.unwrap(), Some(key));
        assert!(f.store.get(LOGIN_TIMESTAMP_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_foreign_url_ignored() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        let outcome = f.bridge.capture_callback("https://example.com/#x").await.unwrap();
        assert_eq!(outcome, CaptureOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_expired_delegation_in_callback_rejected() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        f.bridge.restore().await.unwrap();
        f.bridge.login().await.unwrap();
        let (key, delegation, _) = credential(chrono::Duration::hours(-1));
        let url = encode_callback("opend", &key, &delegation);

        assert!(f.bridge.capture_callback(&url).await.is_err());
        assert!(f.bridge.state().error().is_some());
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_stored_delegation_is_cleared() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        let (key, delegation, _) = credential(chrono::Duration::hours(-1));
        f.store
            .set_many(&[(IDENTITY_KEY, key.as_str()), (DELEGATION_KEY, delegation.as_str())])
            .await
            .unwrap();

        let state = f.bridge.restore().await.unwrap();
        assert_eq!(state.error(), Some(SESSION_EXPIRED));
        assert!(f.store.get(IDENTITY_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparsable_stored_credential_left_in_place() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        f.store
            .set_many(&[(IDENTITY_KEY, "nope"), (DELEGATION_KEY, "{}")])
            .await
            .unwrap();
        let state = f.bridge.restore().await.unwrap();
        assert_eq!(state, AuthState::Unauthenticated { error: None });
        assert_eq!(f.store.get(IDENTITY_KEY).await.unwrap().as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn test_fixed_window_logs_out_old_session() {
        let f = fixture(SessionTimeout::DAY);
        let (key, delegation, _) = credential(chrono::Duration::days(30));
        let two_days_ago = (Utc::now() - chrono::Duration::days(2))
            .timestamp_millis()
            .to_string();
        f.store
            .set_many(&[
                (IDENTITY_KEY, key.as_str()),
                (DELEGATION_KEY, delegation.as_str()),
                (LOGIN_TIMESTAMP_KEY, two_days_ago.as_str()),
            ])
            .await
            .unwrap();

        let state = f.bridge.restore().await.unwrap();
        assert!(!state.is_authenticated());
        assert!(f.store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_check_session_timeout_keeps_fresh_session() {
        let f = fixture(SessionTimeout::DAY);
        f.bridge.restore().await.unwrap();
        let (key, delegation, _) = credential(chrono::Duration::hours(1));
        f.bridge
            .capture_callback(&encode_callback("opend", &key, &delegation))
            .await
            .unwrap();
        assert!(!f.bridge.check_session_timeout().await.unwrap());
        assert!(f.bridge.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        f.bridge.restore().await.unwrap();
        let (key, delegation, _) = credential(chrono::Duration::hours(1));
        f.bridge
            .capture_callback(&encode_callback("opend", &key, &delegation))
            .await
            .unwrap();

        f.bridge.logout().await.unwrap();
        assert_eq!(f.bridge.state(), AuthState::Unauthenticated { error: None });
        assert!(f.bridge.identity().is_none());
        assert!(f.store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let f = fixture(SessionTimeout::ProviderExpiry);
        let mut rx = f.bridge.subscribe();
        f.bridge.restore().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_known());
    }

    struct UnreadableStore;

    #[async_trait::async_trait]
    impl KeyValueStore for UnreadableStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(OpendError::Storage("unreadable".into()))
        }

        async fn set_many(&self, _entries: &[(&str, &str)]) -> Result<()> {
            Ok(())
        }

        async fn remove_many(&self, _keys: &[&str]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_store_restores_to_unauthenticated() {
        let platform = Platform::new(
            Arc::new(UnreadableStore),
            Arc::new(RecordingUrlOpener::default()),
            Arc::new(MemoryClipboard::default()),
        );
        let bridge = SessionBridge::new(&OpendConfig::default(), platform);

        let state = bridge.restore().await.unwrap();
        assert!(matches!(state, AuthState::Unauthenticated { error: Some(_) }));
        assert_eq!(bridge.state(), state);
        assert!(bridge.identity().is_none());
    }
}
