use opend::Principal;
use serde::Serialize;

use super::{resolve_nfts, BusyFlag, Mounted, NftCard, ScreenContext};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SavedView {
    pub cards: Vec<NftCard>,
    pub loaded: bool,
}

/// Saved NFTs that are still for sale by someone else.
pub struct SavedScreen {
    ctx: ScreenContext,
    view: Mounted<SavedView>,
    busy: BusyFlag,
}

impl SavedScreen {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: Mounted::new(SavedView::default()),
            busy: BusyFlag::default(),
        }
    }

    pub fn view(&self) -> SavedView {
        self.view.get()
    }

    pub async fn load(&self) -> SavedView {
        let viewer = &self.ctx.viewer;
        let ids = self.ctx.saved.ids(viewer).await;
        let cards = resolve_nfts(&self.ctx.market, &ids)
            .await
            .iter()
            .filter(|nft| nft.is_listed() && !nft.is_owned_by(viewer))
            .map(|nft| NftCard::new(nft, viewer, true, 0))
            .collect();
        self.view.update(|v| {
            v.cards = cards;
            v.loaded = true;
        });
        self.view()
    }

    /// Drop an NFT from the saved list.
    pub async fn unsave(&self, id: &Principal) -> Result<()> {
        let _guard = self.busy.acquire()?;
        self.ctx.saved.remove(&self.ctx.viewer, &id.to_text()).await?;
        self.view.update(|v| v.cards.retain(|c| &c.id != id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::testing::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn test_keeps_listed_nfts_of_others() {
        let server = MockServer::start().await;
        let viewer = principal(1);
        let seller = principal(2);
        let h = harness(&server, viewer.clone());
        let opend = h.config.opend_canister_id.clone();

        let for_sale = Principal::from_slice(&[40, 2, 2]).unwrap();
        let unlisted = Principal::from_slice(&[41, 2, 2]).unwrap();
        for (id, listed) in [(&for_sale, true), (&unlisted, false)] {
            Mock::given(method("POST"))
                .and(path(format!("/api/v2/canister/{opend}/query")))
                .and(body_partial_json(json!({
                    "content": { "method_name": "isListed", "arg": [id.to_text()] }
                })))
                .respond_with(replied(json!(listed)))
                .mount(&server)
                .await;
            mock_nft(&server, id, "n", &seller).await;
        }
        mock_call(&server, &opend, "query", "getOriginalOwner", replied(json!(seller.to_text()))).await;
        mock_call(&server, &opend, "query", "getListedNFTPrice", replied(json!(15))).await;

        for id in [&for_sale, &unlisted] {
            h.ctx.saved.insert(&viewer, &id.to_text(), &seller.to_text()).await.unwrap();
        }
        h.ctx.saved.insert(&viewer, "not-a-principal", "").await.unwrap();

        let screen = SavedScreen::new(h.ctx.clone());
        let view = screen.load().await;
        assert_eq!(view.cards.len(), 1);
        assert_eq!(view.cards[0].id, for_sale);
        assert!(view.cards[0].saved);

        screen.unsave(&for_sale).await.unwrap();
        assert!(screen.view().cards.is_empty());
        assert_eq!(h.ctx.saved.ids(&viewer).await.len(), 2);
    }
}
