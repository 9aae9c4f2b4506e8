use opend::Principal;
use serde::Serialize;
use tracing::{info, warn};

use super::{BusyFlag, Mounted, NftCard, ScreenContext};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionView {
    pub cards: Vec<NftCard>,
    pub loaded: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// NFTs the viewer owns.
pub struct CollectionScreen {
    ctx: ScreenContext,
    view: Mounted<CollectionView>,
    busy: BusyFlag,
}

impl CollectionScreen {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: Mounted::new(CollectionView::default()),
            busy: BusyFlag::default(),
        }
    }

    pub fn view(&self) -> CollectionView {
        self.view.get()
    }

    pub async fn load(&self) -> CollectionView {
        let viewer = &self.ctx.viewer;
        let (cards, error) = match self.ctx.market.owned_nfts(viewer).await {
            Ok(nfts) => (
                nfts.iter()
                    .map(|nft| NftCard::new(nft, viewer, false, 0))
                    .collect(),
                None,
            ),
            Err(e) => {
                warn!(error = %e, "failed to load collection");
                (Vec::new(), Some(format!("Failed to load collection: {e}")))
            }
        };
        self.view.update(|v| {
            v.cards = cards;
            v.loaded = true;
            v.error = error;
        });
        self.view()
    }

    /// List an owned NFT for sale.
    pub async fn sell(&self, id: &Principal, price: u64) -> Result<()> {
        if price == 0 {
            return Err(AppError::InvalidInput("Price must be greater than 0".into()));
        }
        let _guard = self.busy.acquire()?;

        if let Err(e) = self.ctx.market.sell(id, price).await {
            self.view.update(|v| v.error = Some(format!("Listing failed: {e}")));
            return Err(e.into());
        }
        info!(nft = %id, price, "listed");
        self.load().await;
        self.view.update(|v| v.message = Some(format!("Listed for {price} {}", super::TOKEN_SYMBOL)));
        Ok(())
    }
}
