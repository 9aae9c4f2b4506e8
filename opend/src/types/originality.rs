use serde::{Deserialize, Serialize};

/// Scores arrive as numbers from some service builds and strings from others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Number(n) => write!(f, "{n}"),
            Score::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalityLayer {
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub score_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OriginalityLayers {
    #[serde(default)]
    pub layer1: Option<OriginalityLayer>,
    #[serde(default)]
    pub layer2: Option<OriginalityLayer>,
    #[serde(default)]
    pub layer3: Option<OriginalityLayer>,
}

/// Reference to an existing NFT the service compared against.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NftReference {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nft_principal_id: Option<String>,
}

/// Response of one originality-check stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalityResponse {
    /// `Some(false)` is an explicit rejection; `None` means undecided.
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub layers: Option<OriginalityLayers>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub originality_score: Option<Score>,
    #[serde(default)]
    pub similarity_score: Option<Score>,
    #[serde(default)]
    pub existing_nft: Option<NftReference>,
    #[serde(default)]
    pub most_similar_nft: Option<NftReference>,
    #[serde(default)]
    pub image_hash: Option<String>,
    #[serde(default)]
    pub phash: Option<String>,
    #[serde(default)]
    pub embedding: Option<serde_json::Value>,
    #[serde(default, rename = "embedding_model")]
    pub embedding_model: Option<String>,
}

impl OriginalityResponse {
    pub fn is_rejected(&self) -> bool {
        self.approved == Some(false)
    }
}

/// Outcome of the three-stage check.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginalityVerdict {
    /// The final stage did not reject.
    Passed(OriginalityResponse),
    /// A stage rejected explicitly; minting must not proceed.
    Rejected { stage: u8, response: OriginalityResponse },
    /// The service could not be reached or answered garbage; minting proceeds.
    Inconclusive { stage: u8, error: String },
}

impl OriginalityVerdict {
    pub fn allows_mint(&self) -> bool {
        !matches!(self, OriginalityVerdict::Rejected { .. })
    }

    pub fn response(&self) -> Option<&OriginalityResponse> {
        match self {
            OriginalityVerdict::Passed(r) => Some(r),
            OriginalityVerdict::Rejected { response, .. } => Some(response),
            OriginalityVerdict::Inconclusive { .. } => None,
        }
    }
}

/// Progress of a running check, for live display.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginalityProgress {
    StageStarted(u8),
    StageFinished {
        stage: u8,
        layers: Option<OriginalityLayers>,
    },
}

/// Provenance record posted after a successful mint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub nft_principal_id: String,
    pub minted_by_principal: String,
    pub name: String,
    /// Base64 image bytes.
    pub image_data: String,
    pub image_hash: Option<String>,
    pub phash: Option<String>,
    pub embedding: Option<serde_json::Value>,
    #[serde(rename = "embedding_model")]
    pub embedding_model: String,
    pub originality_score: Option<Score>,
    pub similarity_score: Option<Score>,
    pub most_similar_nft_principal_id: Option<String>,
}

impl MetadataRecord {
    /// Build the record for a freshly minted NFT from the last stage's response.
    pub fn new(
        nft_principal_id: &str,
        minted_by_principal: &str,
        name: &str,
        image: &[u8],
        check: Option<&OriginalityResponse>,
    ) -> Self {
        Self {
            nft_principal_id: nft_principal_id.to_string(),
            minted_by_principal: minted_by_principal.to_string(),
            name: name.to_string(),
            image_data: super::blob::encode(image),
            image_hash: check.and_then(|c| c.image_hash.clone()),
            phash: check.and_then(|c| c.phash.clone()),
            embedding: check.and_then(|c| c.embedding.clone()),
            embedding_model: check
                .and_then(|c| c.embedding_model.clone())
                .unwrap_or_else(|| "simple".to_string()),
            originality_score: check.and_then(|c| c.originality_score.clone()),
            similarity_score: check.and_then(|c| c.similarity_score.clone()),
            most_similar_nft_principal_id: check
                .and_then(|c| c.most_similar_nft.as_ref())
                .and_then(|n| n.nft_principal_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_mixed_score_types() {
        let json = r#"{
            "approved": false,
            "message": "Duplicate of an existing NFT",
            "layers": {"layer1": {"passed": false, "name": "Exact hash", "scorePercent": 100.0}},
            "originalityScore": "0.00",
            "similarityScore": 99.5,
            "existingNft": {"name": "Dunk", "nft_principal_id": "aaaaa-aa"},
            "embedding_model": "clip"
        }"#;
        let resp: OriginalityResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_rejected());
        assert_eq!(resp.originality_score, Some(Score::Text("0.00".into())));
        assert_eq!(resp.similarity_score, Some(Score::Number(99.5)));
        let layer1 = resp.layers.unwrap().layer1.unwrap();
        assert_eq!(layer1.passed, Some(false));
        assert_eq!(layer1.score_percent, Some(100.0));
        assert_eq!(resp.existing_nft.unwrap().name.as_deref(), Some("Dunk"));
        assert_eq!(resp.embedding_model.as_deref(), Some("clip"));
    }

    #[test]
    fn test_null_approved_is_not_rejection() {
        let resp: OriginalityResponse = serde_json::from_str(r#"{"approved": null}"#).unwrap();
        assert!(!resp.is_rejected());
        assert!(OriginalityVerdict::Passed(resp).allows_mint());
    }

    #[test]
    fn test_metadata_defaults_without_check() {
        let record = MetadataRecord::new("id", "me", "n", &[0], None);
        assert_eq!(record.image_data, "AA==");
        assert_eq!(record.embedding_model, "simple");
        assert!(record.image_hash.is_none());
    }

    #[test]
    fn test_metadata_field_names() {
        let check = OriginalityResponse {
            phash: Some("ff00".into()),
            most_similar_nft: Some(NftReference {
                name: None,
                nft_principal_id: Some("aaaaa-aa".into()),
            }),
            ..Default::default()
        };
        let record = MetadataRecord::new("id", "me", "n", &[0], Some(&check));
        assert_eq!(record.most_similar_nft_principal_id.as_deref(), Some("aaaaa-aa"));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("nftPrincipalId").is_some());
        assert!(json.get("mintedByPrincipal").is_some());
        assert!(json.get("embedding_model").is_some());
        assert!(json.get("mostSimilarNftPrincipalId").is_some());
    }
}
