use std::time::Duration;

/// How long a login stays valid on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTimeout {
    /// Only the delegation chain's own expiry applies.
    ProviderExpiry,
    /// Log out once this much wall-clock time has passed since login.
    Fixed(Duration),
}

impl SessionTimeout {
    /// 24 hours since login.
    pub const DAY: SessionTimeout = SessionTimeout::Fixed(Duration::from_secs(24 * 60 * 60));
}

/// Configuration for the OpenD client.
#[derive(Debug, Clone)]
pub struct OpendConfig {
    /// Canister gateway base URL (e.g. `http://127.0.0.1:8000`).
    pub ic_host: String,
    /// Marketplace canister.
    pub opend_canister_id: String,
    /// Token ledger canister.
    pub token_canister_id: String,
    /// Frontend assets canister; the identity bridge is served from it.
    pub assets_canister_id: String,
    /// Identity provider base URL; defaults to `ic_host` when unset.
    pub identity_provider: Option<String>,
    /// URL scheme the provider redirects back to.
    pub app_scheme: String,
    /// Originality / metadata / quiz service base URL.
    pub quiz_api_url: String,
    /// Hosted upvote table base URL.
    pub upvote_url: String,
    /// Public API key for the upvote table.
    pub upvote_key: String,
    /// Provider endpoint that invalidates a session; skipped when unset.
    pub logout_url: Option<String>,
    pub session_timeout: SessionTimeout,
}

impl OpendConfig {
    pub fn identity_provider(&self) -> &str {
        self.identity_provider.as_deref().unwrap_or(&self.ic_host)
    }
}

impl Default for OpendConfig {
    fn default() -> Self {
        Self {
            ic_host: "http://127.0.0.1:8000".into(),
            opend_canister_id: "umunu-kh777-77774-qaaca-cai".into(),
            token_canister_id: "uzt4z-lp777-77774-qaabq-cai".into(),
            assets_canister_id: "ulvla-h7777-77774-qaacq-cai".into(),
            identity_provider: None,
            app_scheme: "opend".into(),
            quiz_api_url: "http://127.0.0.1:3000".into(),
            upvote_url: "http://127.0.0.1:54321".into(),
            upvote_key: String::new(),
            logout_url: None,
            session_timeout: SessionTimeout::ProviderExpiry,
        }
    }
}
