//! Marketplace facade: projects canister state into [`Nft`] records and runs
//! the multi-call buy/sell/mint flows.

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::canister::{CanisterAgent, NftCanister, OpendCanister, TokenCanister};
use crate::config::OpendConfig;
use crate::error::{expect_success, OpendError, Result};
use crate::principal::Principal;
use crate::types::{CyclesStatus, Nft};

#[derive(Debug, Clone)]
pub struct Marketplace {
    agent: CanisterAgent,
    opend: OpendCanister,
    token: TokenCanister,
}

impl Marketplace {
    pub fn new(agent: CanisterAgent, config: &OpendConfig) -> Result<Self> {
        let opend_id = Principal::from_text(&config.opend_canister_id)?;
        let token_id = Principal::from_text(&config.token_canister_id)?;
        Ok(Self {
            opend: OpendCanister::new(agent.clone(), opend_id),
            token: TokenCanister::new(agent.clone(), token_id),
            agent,
        })
    }

    pub fn opend(&self) -> &OpendCanister {
        &self.opend
    }

    pub fn token(&self) -> &TokenCanister {
        &self.token
    }

    pub fn nft(&self, id: &Principal) -> NftCanister {
        NftCanister::new(self.agent.clone(), id.clone())
    }

    /// Caller principal (anonymous when no identity is bound).
    pub fn caller(&self) -> Principal {
        self.agent.sender()
    }

    /// All listed NFTs. Projections that fail are logged and skipped.
    pub async fn listed_nfts(&self) -> Result<Vec<Nft>> {
        let ids = self.opend.get_listed_nfts().await?;
        let projections = join_all(ids.iter().map(|id| self.project_listed(id))).await;
        Ok(collect_projections(&ids, projections))
    }

    /// NFTs owned by `owner`, priced at their listing or 0.
    pub async fn owned_nfts(&self, owner: &Principal) -> Result<Vec<Nft>> {
        let ids = self.opend.get_owned_nfts(owner).await?;
        let projections = join_all(ids.iter().map(|id| self.project_owned(id))).await;
        Ok(collect_projections(&ids, projections))
    }

    /// Resolve one NFT; `None` when any call fails.
    pub async fn nft_by_id(&self, id: &Principal) -> Option<Nft> {
        let result = async {
            if self.opend.is_listed(id).await? {
                self.project_listed(id).await
            } else {
                let nft = self.nft(id);
                let (name, owner, image) =
                    tokio::try_join!(nft.get_name(), nft.get_owner(), nft.get_asset())?;
                Ok::<_, OpendError>(Nft {
                    id: id.clone(),
                    name,
                    image,
                    owner,
                    price: 0,
                })
            }
        }
        .await;

        match result {
            Ok(nft) => Some(nft),
            Err(e) => {
                warn!(nft = %id, error = %e, "failed to resolve NFT");
                None
            }
        }
    }

    /// Pay the seller, then ask the marketplace to hand the NFT over.
    ///
    /// A failed completion after a successful payment is surfaced as-is.
    pub async fn buy(
        &self,
        nft: &Principal,
        seller: &Principal,
        price: u64,
        buyer: &Principal,
    ) -> Result<()> {
        let description = format!("NFT purchase from {seller}");
        let paid = self
            .token
            .transfer_with_description(seller, price, &description)
            .await?;
        expect_success(paid)?;
        info!(%nft, %seller, price, "payment sent");

        let completed = self.opend.complete_purchase(nft, seller, buyer).await?;
        if let Err(e) = expect_success(completed) {
            warn!(%nft, error = %e, "payment sent but purchase not completed");
            return Err(e);
        }
        info!(%nft, %buyer, "purchase completed");
        Ok(())
    }

    /// List `nft` at `price` and move custody to the marketplace canister.
    pub async fn sell(&self, nft: &Principal, price: u64) -> Result<()> {
        if price == 0 {
            return Err(OpendError::Validation("price must be greater than 0".into()));
        }
        expect_success(self.opend.list_item(nft, price).await?)?;
        let custodian = self.opend.get_opend_canister_id().await?;
        expect_success(self.nft(nft).transfer_ownership(&custodian).await?)?;
        info!(%nft, price, "listed for sale");
        Ok(())
    }

    /// Mint a new NFT and return its id.
    pub async fn mint(&self, image: &[u8], name: &str) -> Result<Principal> {
        let id = self.opend.mint(image, name).await?;
        if id == Principal::management() {
            return Err(OpendError::InsufficientCycles);
        }
        info!(nft = %id, name, "minted");
        Ok(id)
    }

    pub async fn can_mint(&self) -> Result<bool> {
        self.opend.can_mint().await
    }

    pub async fn cycles_status(&self) -> Result<CyclesStatus> {
        let (balance, required_for_mint, can_mint) = tokio::try_join!(
            self.opend.get_cycles_balance(),
            self.opend.get_required_cycles_for_mint(),
            self.opend.can_mint(),
        )?;
        Ok(CyclesStatus {
            balance,
            required_for_mint,
            can_mint,
        })
    }

    async fn project_listed(&self, id: &Principal) -> Result<Nft> {
        let nft = self.nft(id);
        let (name, owner, image, price) = tokio::try_join!(
            nft.get_name(),
            self.opend.get_original_owner(id),
            nft.get_asset(),
            self.opend.get_listed_nft_price(id),
        )?;
        Ok(Nft {
            id: id.clone(),
            name,
            image,
            owner,
            price,
        })
    }

    async fn project_owned(&self, id: &Principal) -> Result<Nft> {
        let nft = self.nft(id);
        let (name, owner, image, listed) = tokio::try_join!(
            nft.get_name(),
            nft.get_owner(),
            nft.get_asset(),
            self.opend.is_listed(id),
        )?;
        let price = if listed {
            self.opend.get_listed_nft_price(id).await?
        } else {
            0
        };
        Ok(Nft {
            id: id.clone(),
            name,
            image,
            owner,
            price,
        })
    }
}

fn collect_projections(ids: &[Principal], projections: Vec<Result<Nft>>) -> Vec<Nft> {
    ids.iter()
        .zip(projections)
        .filter_map(|(id, projection)| match projection {
            Ok(nft) => Some(nft),
            Err(e) => {
                warn!(nft = %id, error = %e, "skipping NFT");
                None
            }
        })
        .collect()
}
