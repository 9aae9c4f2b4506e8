use std::sync::Arc;

use opend::identity::callback::login_url;
use opend::{AuthState, OpendConfig, SessionBridge};
use serde::Serialize;

use super::{BusyFlag, Mounted};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginView {
    pub provider_url: String,
    pub awaiting_callback: bool,
    pub error: Option<String>,
}

pub struct LoginScreen {
    bridge: Arc<SessionBridge>,
    view: Mounted<LoginView>,
    busy: BusyFlag,
}

impl LoginScreen {
    pub fn new(bridge: Arc<SessionBridge>, config: &OpendConfig) -> Self {
        let provider_url = login_url(config.identity_provider(), &config.assets_canister_id)
            .map(|u| u.to_string())
            .unwrap_or_default();
        let screen = Self {
            bridge,
            view: Mounted::new(LoginView {
                provider_url,
                ..LoginView::default()
            }),
            busy: BusyFlag::default(),
        };
        screen.sync();
        screen
    }

    pub fn view(&self) -> LoginView {
        self.sync();
        self.view.get()
    }

    /// Open the identity provider; the session arrives with the callback.
    pub async fn login(&self) -> Result<LoginView> {
        let _guard = self.busy.acquire()?;
        let url = self.bridge.login().await;
        self.sync();
        let url = url?;
        self.view.update(|v| v.provider_url = url.to_string());
        Ok(self.view.get())
    }

    fn sync(&self) {
        let state = self.bridge.state();
        self.view.update(|v| {
            v.awaiting_callback = state == AuthState::AwaitingCallback;
            v.error = state.error().map(str::to_string);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opend::platform::RecordingUrlOpener;
    use opend::storage::MemoryStore;
    use opend::Platform;

    #[tokio::test]
    async fn test_login_marks_awaiting() {
        let opener = Arc::new(RecordingUrlOpener::default());
        let platform = Platform::new(
            Arc::new(MemoryStore::new()),
            opener.clone(),
            Arc::new(opend::platform::MemoryClipboard::default()),
        );
        let config = OpendConfig::default();
        let bridge = Arc::new(SessionBridge::new(&config, platform));
        bridge.restore().await.unwrap();

        let screen = LoginScreen::new(bridge, &config);
        assert!(!screen.view().awaiting_callback);
        let view = screen.login().await.unwrap();
        assert!(view.awaiting_callback);
        assert_eq!(opener.opened(), vec![view.provider_url]);
    }
}
