//! Composition root: env configuration, host capabilities and the session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opend::platform::LogUrlOpener;
use opend::storage::FileStore;
use opend::{
    AuthState, CanisterAgent, Marketplace, NftListStore, OpendConfig, OriginalityClient,
    Platform, QuizClient, SessionBridge, SessionTimeout, UpvoteClient,
};
use tracing::{debug, info};

use crate::clipboard::Osc52Clipboard;
use crate::error::{AppError, Result};
use crate::screens::ScreenContext;

const STORE_FILE: &str = "store.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub opend: OpendConfig,
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from `lookup`; unset or empty keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut opend = OpendConfig::default();

        if let Some(v) = get("OPEND_IC_HOST") {
            opend.ic_host = v;
        }
        if let Some(v) = get("OPEND_CANISTER_ID") {
            opend.opend_canister_id = v;
        }
        if let Some(v) = get("OPEND_TOKEN_CANISTER_ID") {
            opend.token_canister_id = v;
        }
        if let Some(v) = get("OPEND_ASSETS_CANISTER_ID") {
            opend.assets_canister_id = v;
        }
        if let Some(v) = get("OPEND_APP_SCHEME") {
            opend.app_scheme = v;
        }
        if let Some(v) = get("MINTVAULT_QUIZ_API_URL") {
            opend.quiz_api_url = v;
        }
        if let Some(v) = get("MINTVAULT_UPVOTE_URL") {
            opend.upvote_url = v;
        }
        if let Some(v) = get("MINTVAULT_UPVOTE_KEY") {
            opend.upvote_key = v;
        }
        opend.identity_provider = get("OPEND_IDENTITY_PROVIDER");
        opend.logout_url = get("OPEND_LOGOUT_URL");

        if let Some(hours) = get("MINTVAULT_SESSION_TIMEOUT_HOURS") {
            let hours: u64 = hours.trim().parse().map_err(|_| {
                AppError::Config(format!(
                    "MINTVAULT_SESSION_TIMEOUT_HOURS must be a whole number, got {hours:?}"
                ))
            })?;
            opend.session_timeout = if hours == 0 {
                SessionTimeout::ProviderExpiry
            } else {
                SessionTimeout::Fixed(Duration::from_secs(hours * 60 * 60))
            };
        }

        let data_dir = match get("MINTVAULT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join("mintvault"))
                .ok_or_else(|| {
                    AppError::Config("no data directory; set MINTVAULT_DATA_DIR".into())
                })?,
        };

        Ok(Self { opend, data_dir })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }
}

/// Long-lived application state for one process.
pub struct App {
    pub config: AppConfig,
    pub platform: Platform,
    pub bridge: Arc<SessionBridge>,
}

impl App {
    pub fn new(config: AppConfig, platform: Platform) -> Self {
        let bridge = Arc::new(SessionBridge::new(&config.opend, platform.clone()));
        Self {
            config,
            platform,
            bridge,
        }
    }

    /// File-backed store, terminal opener and OSC 52 clipboard.
    pub fn terminal(config: AppConfig) -> Self {
        let store = Arc::new(FileStore::new(config.store_path()));
        let platform = Platform::new(
            store,
            Arc::new(LogUrlOpener),
            Arc::new(Osc52Clipboard),
        );
        Self::new(config, platform)
    }

    /// Restore any stored session and apply the timeout policy.
    pub async fn start(&self) -> Result<AuthState> {
        let state = self.bridge.restore().await?;
        if self.bridge.check_session_timeout().await? {
            info!("stored session expired");
        }
        let state = if state.is_authenticated() {
            self.bridge.state()
        } else {
            state
        };
        debug!(?state, "session restored");
        Ok(state)
    }

    /// Clients for the authenticated viewer.
    pub fn context(&self) -> Result<ScreenContext> {
        let (Some(viewer), Some(identity)) = (self.bridge.principal(), self.bridge.identity())
        else {
            return Err(AppError::NotLoggedIn);
        };
        let opend = &self.config.opend;
        let agent = CanisterAgent::new(&opend.ic_host).with_identity(Some(identity));
        let store = self.platform.store.clone();

        Ok(ScreenContext {
            viewer,
            market: Marketplace::new(agent, opend)?,
            upvotes: UpvoteClient::new(&opend.upvote_url, &opend.upvote_key)?,
            originality: OriginalityClient::new(&opend.quiz_api_url),
            quiz: QuizClient::new(&opend.quiz_api_url),
            saved: NftListStore::saved(store.clone()),
            upvoted: NftListStore::upvoted(store),
            platform: self.platform.clone(),
        })
    }
}
