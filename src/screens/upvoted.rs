use serde::Serialize;

use super::{resolve_nfts, Mounted, NftCard, ScreenContext};

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpvotedView {
    /// Most recently upvoted first.
    pub cards: Vec<NftCard>,
    pub loaded: bool,
}

pub struct UpvotedScreen {
    ctx: ScreenContext,
    view: Mounted<UpvotedView>,
}

impl UpvotedScreen {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: Mounted::new(UpvotedView::default()),
        }
    }

    pub fn view(&self) -> UpvotedView {
        self.view.get()
    }

    pub async fn load(&self) -> UpvotedView {
        let viewer = &self.ctx.viewer;
        let ids = self.ctx.upvotes.user_upvoted_ids(&viewer.to_text()).await;
        let (nfts, saved) = tokio::join!(
            resolve_nfts(&self.ctx.market, &ids),
            self.ctx.saved.ids(viewer)
        );
        let counts = self.ctx.upvotes.counts(&ids).await;
        let cards = nfts
            .iter()
            .map(|nft| {
                let id = nft.id.to_text();
                let count = counts.get(&id).copied().unwrap_or(0);
                NftCard::new(nft, viewer, saved.contains(&id), count)
            })
            .collect();
        self.view.update(|v| {
            v.cards = cards;
            v.loaded = true;
        });
        self.view()
    }
}
