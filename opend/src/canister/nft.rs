use serde::Deserialize;
use serde_json::json;

use crate::canister::CanisterAgent;
use crate::error::Result;
use crate::principal::Principal;
use crate::types::blob;

#[derive(Deserialize)]
#[serde(transparent)]
struct Asset(#[serde(with = "blob")] Vec<u8>);

/// Typed wrapper over one NFT canister.
#[derive(Debug, Clone)]
pub struct NftCanister {
    agent: CanisterAgent,
    canister_id: Principal,
}

impl NftCanister {
    pub fn new(agent: CanisterAgent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }

    pub fn id(&self) -> &Principal {
        &self.canister_id
    }

    pub async fn get_name(&self) -> Result<String> {
        self.agent
            .query(&self.canister_id, "getName", json!([]))
            .await
    }

    pub async fn get_owner(&self) -> Result<Principal> {
        self.agent
            .query(&self.canister_id, "getOwner", json!([]))
            .await
    }

    pub async fn get_asset(&self) -> Result<Vec<u8>> {
        let asset: Asset = self
            .agent
            .query(&self.canister_id, "getAsset", json!([]))
            .await?;
        Ok(asset.0)
    }

    pub async fn get_canister_id(&self) -> Result<Principal> {
        self.agent
            .query(&self.canister_id, "getCanisterId", json!([]))
            .await
    }

    pub async fn transfer_ownership(&self, new_owner: &Principal) -> Result<String> {
        self.agent
            .update(&self.canister_id, "transferOwnership", json!([new_owner]))
            .await
    }
}
