use opend::types::OriginalityLayers;
use opend::{MetadataRecord, OriginalityProgress, OriginalityRequest, OriginalityVerdict, Principal};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{BusyFlag, Mounted, ScreenContext};
use crate::error::{AppError, Result};

const BLOCKED_DEFAULT: &str = "Duplicate or derivative detected. Minting blocked.";
const CHECK_UNAVAILABLE: &str = "Originality check unavailable. Proceeding with mint.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct MintView {
    /// Stage currently running, while the check is in flight.
    pub checking_stage: Option<u8>,
    pub layers: Option<OriginalityLayers>,
    pub notice: Option<String>,
    pub minted: Option<Principal>,
    pub error: Option<String>,
}

pub struct MintScreen {
    ctx: ScreenContext,
    view: Mounted<MintView>,
    busy: BusyFlag,
}

impl MintScreen {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: Mounted::new(MintView::default()),
            busy: BusyFlag::default(),
        }
    }

    pub fn view(&self) -> MintView {
        self.view.get()
    }

    /// Check originality, then mint. Returns the new NFT id.
    pub async fn mint(&self, name: &str, image: Vec<u8>, mime_type: Option<String>) -> Result<Principal> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.fail(AppError::InvalidInput(
                "Please enter a name and select an image".into(),
            )));
        }
        if image.is_empty() {
            return Err(self.fail(AppError::InvalidInput("Please select an image".into())));
        }
        let _guard = self.busy.acquire()?;
        self.view.set(MintView::default());

        let request = OriginalityRequest {
            image,
            mime_type,
            principal_id: self.ctx.viewer.to_text(),
            name: name.to_string(),
        };
        let verdict = self.check(&request).await;

        match &verdict {
            OriginalityVerdict::Rejected { stage, response } => {
                let message = response
                    .message
                    .clone()
                    .or_else(|| response.reason.clone())
                    .unwrap_or_else(|| BLOCKED_DEFAULT.to_string());
                info!(stage, name, "mint blocked by originality check");
                return Err(self.fail(AppError::Blocked(message)));
            }
            OriginalityVerdict::Inconclusive { .. } => {
                self.view.update(|v| v.notice = Some(CHECK_UNAVAILABLE.to_string()));
            }
            OriginalityVerdict::Passed(_) => {}
        }

        let id = match self.ctx.market.mint(&request.image, name).await {
            Ok(id) => id,
            Err(e) => return Err(self.fail(e.into())),
        };

        let record = MetadataRecord::new(
            &id.to_text(),
            &self.ctx.viewer.to_text(),
            name,
            &request.image,
            verdict.response(),
        );
        self.ctx.originality.store_metadata(&record).await;

        self.view.update(|v| v.minted = Some(id.clone()));
        Ok(id)
    }

    async fn check(&self, request: &OriginalityRequest) -> OriginalityVerdict {
        let (tx, mut rx) = mpsc::channel(8);
        let view = self.view.clone();
        let progress = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                view.update(|v| match event {
                    OriginalityProgress::StageStarted(stage) => v.checking_stage = Some(stage),
                    OriginalityProgress::StageFinished { layers, .. } => v.layers = layers,
                });
            }
        });

        let verdict = self.ctx.originality.run(request, Some(tx)).await;
        if let Err(e) = progress.await {
            warn!(error = %e, "progress task failed");
        }
        self.view.update(|v| v.checking_stage = None);
        verdict
    }

    fn fail(&self, error: AppError) -> AppError {
        self.view.update(|v| v.error = Some(error.to_string()));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::testing::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_mint(server: &MockServer, opend: &str, id: &Principal, calls: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/api/v2/canister/{opend}/call")))
            .and(body_partial_json(json!({ "content": { "method_name": "mint" } })))
            .respond_with(replied(json!(id.to_text())))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_stage_one_rejection_never_mints() {
        let server = MockServer::start().await;
        let h = harness(&server, principal(1));
        Mock::given(method("POST"))
            .and(path("/api/nft/check-originality"))
            .and(body_string_contains("name=\"stage\"\r\n\r\n1\r\n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "approved": false,
                "message": "Exact copy of an existing NFT",
            })))
            .expect(1)
            .mount(&server)
            .await;
        mock_mint(&server, &h.config.opend_canister_id, &principal(9), 0).await;

        let screen = MintScreen::new(h.ctx);
        let err = screen.mint("Dunk", vec![1, 2, 3], None).await.unwrap_err();
        assert!(matches!(err, AppError::Blocked(ref m) if m == "Exact copy of an existing NFT"));
        assert_eq!(screen.view().error.as_deref(), Some("Exact copy of an existing NFT"));

        let stages: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/api/nft/check-originality")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect();
        assert_eq!(stages.len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_default() {
        let server = MockServer::start().await;
        let h = harness(&server, principal(1));
        Mock::given(method("POST"))
            .and(path("/api/nft/check-originality"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"approved": false})))
            .mount(&server)
            .await;

        let err = MintScreen::new(h.ctx)
            .mint("Dunk", vec![1], None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), BLOCKED_DEFAULT);
    }

    #[tokio::test]
    async fn test_network_error_still_mints() {
        let server = MockServer::start().await;
        let h = harness(&server, principal(1));
        let new_id = Principal::from_slice(&[30, 2, 2]).unwrap();
        Mock::given(method("POST"))
            .and(path("/api/nft/check-originality"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        mock_mint(&server, &h.config.opend_canister_id, &new_id, 1).await;
        Mock::given(method("POST"))
            .and(path("/api/nft/store-metadata"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let screen = MintScreen::new(h.ctx);
        let id = screen.mint("Dunk", vec![1, 2, 3], Some("image/png".into())).await.unwrap();
        assert_eq!(id, new_id);
        let view = screen.view();
        assert_eq!(view.notice.as_deref(), Some(CHECK_UNAVAILABLE));
        assert_eq!(view.minted, Some(new_id));
    }

    #[tokio::test]
    async fn test_missing_name_rejected_locally() {
        let server = MockServer::start().await;
        let h = harness(&server, principal(1));
        let err = MintScreen::new(h.ctx).mint("   ", vec![1], None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
