use serde::{Deserialize, Serialize};

use crate::principal::Principal;

/// Client-side projection of an NFT, fetched fresh on every view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    pub id: Principal,
    pub name: String,
    #[serde(with = "super::blob")]
    pub image: Vec<u8>,
    pub owner: Principal,
    /// Listed price; 0 when not listed.
    pub price: u64,
}

impl Nft {
    pub fn is_listed(&self) -> bool {
        self.price > 0
    }

    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        &self.owner == principal
    }
}

/// Marketplace canister cycles, as reported by its status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclesStatus {
    pub balance: u64,
    pub required_for_mint: u64,
    pub can_mint: bool,
}
