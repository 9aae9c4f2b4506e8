use tracing::warn;
use url::Url;

use crate::error::{OpendError, Result};
use crate::principal::Principal;
use crate::rest::HttpClient;
use crate::types::{ClaimRequest, EligibilityRequest, EligibilityResponse, PointsResponse};

/// Client for the quiz points service.
#[derive(Debug, Clone)]
pub struct QuizClient {
    http: HttpClient,
}

impl QuizClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClient::new(base_url),
        }
    }

    /// Unclaimed points for `principal`.
    pub async fn points(&self, principal: &Principal) -> Result<u64> {
        let principal_id = principal.to_text();
        let resp: PointsResponse = self
            .http
            .get("/api/quiz/points", &[("principalId", &principal_id)])
            .await?;
        Ok(resp.points)
    }

    /// Tell the service `amount` points were paid out so it resets them.
    pub async fn claim(&self, principal: &Principal, amount: u64) -> Result<()> {
        let body = ClaimRequest {
            principal_id: principal.to_text(),
            amount,
        };
        self.http.post_json_unit("/api/quiz/claim", &[], &body).await
    }

    /// Whether the user may start a quiz; false on any failure.
    pub async fn eligibility(&self, principal: &Principal) -> bool {
        let body = EligibilityRequest {
            principal_id: principal.to_text(),
        };
        match self
            .http
            .post_json::<_, EligibilityResponse>("/api/quiz/eligibility", &body)
            .await
        {
            Ok(resp) => resp.can_start,
            Err(e) => {
                warn!(error = %e, "quiz eligibility check failed");
                false
            }
        }
    }

    /// Web page where the quiz runs.
    pub fn quiz_url(&self, principal: &Principal) -> Result<Url> {
        let mut url = Url::parse(&self.http.url("/quiz"))
            .map_err(|e| OpendError::Validation(format!("quiz url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("principal", &principal.to_text());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_url() {
        let client = QuizClient::new("http://127.0.0.1:3000/");
        let url = client.quiz_url(&Principal::anonymous()).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/quiz?principal=2vxsx-fae");
    }
}
