//! Client for the three-stage originality check and the post-mint metadata
//! record.

use reqwest::multipart::{Form, Part};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::rest::HttpClient;
use crate::types::{MetadataRecord, OriginalityProgress, OriginalityResponse, OriginalityVerdict};

const CHECK_PATH: &str = "/api/nft/check-originality";
const METADATA_PATH: &str = "/api/nft/store-metadata";
const STAGES: u8 = 3;

/// Image and context submitted for checking.
#[derive(Debug, Clone)]
pub struct OriginalityRequest {
    pub image: Vec<u8>,
    /// MIME type; `image/jpeg` when unknown.
    pub mime_type: Option<String>,
    pub principal_id: String,
    pub name: String,
}

impl OriginalityRequest {
    fn mime(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("image/jpeg")
    }

    fn file_name(&self) -> &'static str {
        if self.mime().contains("png") {
            "image.png"
        } else {
            "image.jpg"
        }
    }

    fn form(&self, stage: u8) -> Result<Form> {
        let image = Part::bytes(self.image.clone())
            .file_name(self.file_name())
            .mime_str(self.mime())?;
        Ok(Form::new()
            .part("image", image)
            .text("principalId", self.principal_id.clone())
            .text("name", self.name.trim().to_string())
            .text("stage", stage.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct OriginalityClient {
    http: HttpClient,
}

impl OriginalityClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClient::new(base_url),
        }
    }

    /// Run a single stage.
    pub async fn check_stage(
        &self,
        request: &OriginalityRequest,
        stage: u8,
    ) -> Result<OriginalityResponse> {
        let form = request.form(stage)?;
        self.http.post_multipart(CHECK_PATH, form).await
    }

    /// Run all stages in order.
    ///
    /// Only an explicit stage-1 rejection stops early; stage 3 decides
    /// otherwise. Any transport or decode failure yields
    /// [`OriginalityVerdict::Inconclusive`].
    pub async fn run(
        &self,
        request: &OriginalityRequest,
        progress: Option<mpsc::Sender<OriginalityProgress>>,
    ) -> OriginalityVerdict {
        let notify = |event: OriginalityProgress| {
            let progress = progress.clone();
            async move {
                if let Some(tx) = progress {
                    // A dropped receiver only means nobody is watching.
                    let _ = tx.send(event).await;
                }
            }
        };

        let mut last = OriginalityResponse::default();
        for stage in 1..=STAGES {
            notify(OriginalityProgress::StageStarted(stage)).await;
            let response = match self.check_stage(request, stage).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(stage, error = %e, "originality check unavailable, proceeding");
                    return OriginalityVerdict::Inconclusive {
                        stage,
                        error: e.to_string(),
                    };
                }
            };
            debug!(stage, approved = ?response.approved, "originality stage finished");
            notify(OriginalityProgress::StageFinished {
                stage,
                layers: response.layers.clone(),
            })
            .await;

            if stage == 1 && response.is_rejected() {
                info!(name = %request.name, "rejected at exact-match stage");
                return OriginalityVerdict::Rejected { stage, response };
            }
            last = response;
        }

        if last.is_rejected() {
            info!(name = %request.name, "rejected by originality check");
            OriginalityVerdict::Rejected {
                stage: STAGES,
                response: last,
            }
        } else {
            OriginalityVerdict::Passed(last)
        }
    }

    /// Record provenance for a minted NFT. Failures are logged only.
    pub async fn store_metadata(&self, record: &MetadataRecord) {
        match self.http.post_json_unit(METADATA_PATH, &[], record).await {
            Ok(()) => debug!(nft = %record.nft_principal_id, "metadata stored"),
            Err(e) => warn!(nft = %record.nft_principal_id, error = %e, "failed to store NFT metadata"),
        }
    }
}
