use serde_json::json;

use crate::canister::CanisterAgent;
use crate::error::Result;
use crate::principal::Principal;
use crate::types::blob;

/// Typed wrapper over the marketplace canister.
#[derive(Debug, Clone)]
pub struct OpendCanister {
    agent: CanisterAgent,
    canister_id: Principal,
}

impl OpendCanister {
    pub fn new(agent: CanisterAgent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }

    pub fn canister_id(&self) -> &Principal {
        &self.canister_id
    }

    pub async fn get_listed_nfts(&self) -> Result<Vec<Principal>> {
        self.agent
            .query(&self.canister_id, "getListedNFTs", json!([]))
            .await
    }

    pub async fn get_owned_nfts(&self, owner: &Principal) -> Result<Vec<Principal>> {
        self.agent
            .query(&self.canister_id, "getOwnedNFTs", json!([owner]))
            .await
    }

    pub async fn get_original_owner(&self, nft: &Principal) -> Result<Principal> {
        self.agent
            .query(&self.canister_id, "getOriginalOwner", json!([nft]))
            .await
    }

    pub async fn get_listed_nft_price(&self, nft: &Principal) -> Result<u64> {
        self.agent
            .query(&self.canister_id, "getListedNFTPrice", json!([nft]))
            .await
    }

    pub async fn is_listed(&self, nft: &Principal) -> Result<bool> {
        self.agent
            .query(&self.canister_id, "isListed", json!([nft]))
            .await
    }

    pub async fn list_item(&self, nft: &Principal, price: u64) -> Result<String> {
        self.agent
            .update(&self.canister_id, "listItem", json!([nft, price]))
            .await
    }

    pub async fn complete_purchase(
        &self,
        nft: &Principal,
        seller: &Principal,
        buyer: &Principal,
    ) -> Result<String> {
        self.agent
            .update(
                &self.canister_id,
                "completePurchase",
                json!([nft, seller, buyer]),
            )
            .await
    }

    /// Returns the new NFT id, or the management principal when cycles ran out.
    pub async fn mint(&self, image: &[u8], name: &str) -> Result<Principal> {
        self.agent
            .update(
                &self.canister_id,
                "mint",
                json!([blob::encode(image), name]),
            )
            .await
    }

    pub async fn can_mint(&self) -> Result<bool> {
        self.agent
            .query(&self.canister_id, "canMint", json!([]))
            .await
    }

    pub async fn get_cycles_balance(&self) -> Result<u64> {
        self.agent
            .query(&self.canister_id, "getCyclesBalance", json!([]))
            .await
    }

    pub async fn get_required_cycles_for_mint(&self) -> Result<u64> {
        self.agent
            .query(&self.canister_id, "getRequiredCyclesForMint", json!([]))
            .await
    }

    pub async fn get_opend_canister_id(&self) -> Result<Principal> {
        self.agent
            .query(&self.canister_id, "getOpenDCanisterID", json!([]))
            .await
    }
}
