use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::rest::HttpClient;
use crate::types::{ToggleOutcome, UpvoteInfo, UpvoteRow};

const TABLE: &str = "/rest/v1/nft_upvotes";

#[derive(Deserialize)]
struct NftIdRow {
    nft_id: String,
}

#[derive(Deserialize)]
struct OwnerRow {
    #[serde(default)]
    owner_principal: Option<String>,
}

/// Client for the hosted `nft_upvotes` table.
///
/// Reads degrade to empty/zero/false on failure; `toggle` propagates.
#[derive(Debug, Clone)]
pub struct UpvoteClient {
    http: HttpClient,
}

impl UpvoteClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = HttpClient::new(base_url)
            .with_header("apikey", api_key)?
            .with_header("authorization", &format!("Bearer {api_key}"))?;
        Ok(Self { http })
    }

    /// Upvote counts for `ids`; every id is present, defaulting to 0.
    pub async fn counts(&self, ids: &[String]) -> HashMap<String, u64> {
        let mut counts: HashMap<String, u64> = ids.iter().map(|id| (id.clone(), 0)).collect();
        if ids.is_empty() {
            return counts;
        }

        let filter = format!("in.({})", ids.join(","));
        match self
            .http
            .get::<Vec<NftIdRow>>(TABLE, &[("select", "nft_id"), ("nft_id", &filter)])
            .await
        {
            Ok(rows) => {
                for row in rows {
                    *counts.entry(row.nft_id).or_insert(0) += 1;
                }
            }
            Err(e) => warn!(error = %e, "failed to load upvote counts"),
        }
        counts
    }

    pub async fn count(&self, nft_id: &str) -> u64 {
        let filter = format!("eq.{nft_id}");
        match self
            .http
            .get::<Vec<NftIdRow>>(TABLE, &[("select", "nft_id"), ("nft_id", &filter)])
            .await
        {
            Ok(rows) => rows.len() as u64,
            Err(e) => {
                warn!(nft_id, error = %e, "failed to load upvote count");
                0
            }
        }
    }

    pub async fn has_upvoted(&self, nft_id: &str, user: &str) -> bool {
        self.try_has_upvoted(nft_id, user).await.unwrap_or_else(|e| {
            warn!(nft_id, error = %e, "failed to check upvote");
            false
        })
    }

    pub async fn info(&self, nft_id: &str, user: &str) -> UpvoteInfo {
        let (count, has_upvoted) = tokio::join!(self.count(nft_id), self.has_upvoted(nft_id, user));
        UpvoteInfo { count, has_upvoted }
    }

    /// Remove the user's upvote if present, add it otherwise.
    pub async fn toggle(
        &self,
        nft_id: &str,
        user: &str,
        owner: Option<&str>,
    ) -> Result<ToggleOutcome> {
        if self.try_has_upvoted(nft_id, user).await? {
            let nft_filter = format!("eq.{nft_id}");
            let user_filter = format!("eq.{user}");
            self.http
                .delete(TABLE, &[("nft_id", &nft_filter), ("user_principal", &user_filter)])
                .await?;
            info!(nft_id, user, "upvote removed");
            Ok(ToggleOutcome::Removed)
        } else {
            let row = UpvoteRow {
                nft_id: nft_id.to_string(),
                user_principal: user.to_string(),
                owner_principal: owner.map(str::to_string),
                created_at: None,
            };
            self.http
                .post_json_unit(TABLE, &[("prefer", "return=minimal")], &row)
                .await?;
            info!(nft_id, user, "upvoted");
            Ok(ToggleOutcome::Upvoted)
        }
    }

    /// Ids the user upvoted, newest first.
    pub async fn user_upvoted_ids(&self, user: &str) -> Vec<String> {
        let filter = format!("eq.{user}");
        match self
            .http
            .get::<Vec<NftIdRow>>(
                TABLE,
                &[
                    ("select", "nft_id"),
                    ("user_principal", &filter),
                    ("order", "created_at.desc"),
                ],
            )
            .await
        {
            Ok(rows) => rows.into_iter().map(|r| r.nft_id).collect(),
            Err(e) => {
                warn!(user, error = %e, "failed to load upvoted ids");
                Vec::new()
            }
        }
    }

    /// Owners of the NFTs the user upvoted.
    pub async fn upvoted_owner_ids(&self, user: &str) -> HashSet<String> {
        let filter = format!("eq.{user}");
        match self
            .http
            .get::<Vec<OwnerRow>>(
                TABLE,
                &[
                    ("select", "owner_principal"),
                    ("user_principal", &filter),
                    ("owner_principal", "not.is.null"),
                ],
            )
            .await
        {
            Ok(rows) => rows.into_iter().filter_map(|r| r.owner_principal).collect(),
            Err(e) => {
                warn!(user, error = %e, "failed to load upvoted owners");
                HashSet::new()
            }
        }
    }

    async fn try_has_upvoted(&self, nft_id: &str, user: &str) -> Result<bool> {
        let nft_filter = format!("eq.{nft_id}");
        let user_filter = format!("eq.{user}");
        let rows: Vec<NftIdRow> = self
            .http
            .get(
                TABLE,
                &[
                    ("select", "nft_id"),
                    ("nft_id", &nft_filter),
                    ("user_principal", &user_filter),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}
