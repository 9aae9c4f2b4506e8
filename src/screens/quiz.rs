use opend::error::expect_success;
use opend::OpendError;
use serde::Serialize;
use tracing::{info, warn};

use super::{BusyFlag, Mounted, ScreenContext, TOKEN_SYMBOL};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuizView {
    pub points: u64,
    pub can_start: bool,
    pub loaded: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

pub struct QuizScreen {
    ctx: ScreenContext,
    view: Mounted<QuizView>,
    busy: BusyFlag,
}

impl QuizScreen {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: Mounted::new(QuizView::default()),
            busy: BusyFlag::default(),
        }
    }

    pub fn view(&self) -> QuizView {
        self.view.get()
    }

    pub async fn load(&self) -> QuizView {
        let viewer = &self.ctx.viewer;
        let (points, can_start) =
            tokio::join!(self.ctx.quiz.points(viewer), self.ctx.quiz.eligibility(viewer));
        self.view.update(|v| {
            match points {
                Ok(points) => {
                    v.points = points;
                    v.error = None;
                }
                Err(e) => {
                    warn!(error = %e, "failed to load quiz points");
                    v.error = Some(format!("Failed to load points: {e}"));
                }
            }
            v.can_start = can_start;
            v.loaded = true;
        });
        self.view()
    }

    /// Pay out unclaimed points as tokens, then reset them at the service.
    ///
    /// Returns the amount claimed; 0 means there was nothing to claim.
    pub async fn claim(&self) -> Result<u64> {
        let _guard = self.busy.acquire()?;
        let viewer = &self.ctx.viewer;
        let points = self.ctx.quiz.points(viewer).await?;
        if points == 0 {
            self.view.update(|v| v.points = 0);
            return Ok(0);
        }

        let rewarded = self.ctx.market.token().reward_quiz(points).await?;
        if let Err(e) = expect_success(rewarded) {
            self.view.update(|v| v.error = Some(format!("Failed to claim: {e}")));
            return Err(e.into());
        }
        if let Err(e) = self.ctx.quiz.claim(viewer, points).await {
            warn!(error = %e, points, "tokens paid but points not reset");
            let err = OpendError::ActionFailed("Failed to reset points".into());
            self.view.update(|v| v.error = Some(format!("Failed to claim: {err}")));
            return Err(err.into());
        }

        info!(points, "quiz points claimed");
        self.view.update(|v| {
            v.points = 0;
            v.error = None;
            v.message = Some(format!("Claimed {points} {TOKEN_SYMBOL} tokens!"));
        });
        Ok(points)
    }

    /// Hand the quiz page to the URL opener.
    pub async fn open_quiz(&self) -> Result<String> {
        let url = self.ctx.quiz.quiz_url(&self.ctx.viewer)?;
        self.ctx.platform.opener.open(url.as_str()).await?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::testing::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_points(server: &MockServer, points: u64) {
        Mock::given(method("GET"))
            .and(path("/api/quiz/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "points": points })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_claim_zero_points_is_noop() {
        let server = MockServer::start().await;
        mock_points(&server, 0).await;
        let h = harness(&server, principal(1));
        assert_eq!(QuizScreen::new(h.ctx).claim().await.unwrap(), 0);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_rewards_then_resets() {
        let server = MockServer::start().await;
        mock_points(&server, 40).await;
        let h = harness(&server, principal(1));
        mock_call(
            &server,
            &h.config.token_canister_id,
            "call",
            "rewardQuiz",
            replied(json!("Success")),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/api/quiz/claim"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let screen = QuizScreen::new(h.ctx);
        assert_eq!(screen.claim().await.unwrap(), 40);
        assert_eq!(screen.view().message.as_deref(), Some("Claimed 40 DANG tokens!"));
    }

    #[tokio::test]
    async fn test_reset_failure_surfaces() {
        let server = MockServer::start().await;
        mock_points(&server, 40).await;
        let h = harness(&server, principal(1));
        mock_call(
            &server,
            &h.config.token_canister_id,
            "call",
            "rewardQuiz",
            replied(json!("Success")),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/api/quiz/claim"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = QuizScreen::new(h.ctx).claim().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to reset points");
    }

    #[tokio::test]
    async fn test_open_quiz_uses_opener() {
        let server = MockServer::start().await;
        let viewer = principal(1);
        let h = harness(&server, viewer.clone());
        let url = QuizScreen::new(h.ctx).open_quiz().await.unwrap();
        assert_eq!(url, format!("{}/quiz?principal={}", server.uri(), viewer));
        assert_eq!(h.opener.opened(), vec![url]);
    }
}
