use std::cmp::Reverse;

use opend::{Principal, ToggleOutcome};
use serde::Serialize;
use tracing::{info, warn};

use super::{BusyFlag, Mounted, NftCard, ScreenContext};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    SavedAndUpvoted,
    Saved,
    Upvoted,
    Neither,
    Own,
}

impl Tier {
    pub fn of(card: &NftCard) -> Tier {
        match (card.is_owner, card.saved, card.upvotes > 0) {
            (true, _, _) => Tier::Own,
            (false, true, true) => Tier::SavedAndUpvoted,
            (false, true, false) => Tier::Saved,
            (false, false, true) => Tier::Upvoted,
            (false, false, false) => Tier::Neither,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverFilter {
    #[default]
    All,
    Recommended,
}

/// Order in which tiers are shown and how many count as recommended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingPolicy {
    pub tiers: Vec<Tier>,
    /// Leading tiers shown under [`DiscoverFilter::Recommended`].
    pub recommended: usize,
    /// Tiers ordered by upvote count, highest first.
    pub by_count: Vec<Tier>,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                Tier::SavedAndUpvoted,
                Tier::Saved,
                Tier::Upvoted,
                Tier::Neither,
                Tier::Own,
            ],
            recommended: 3,
            by_count: vec![Tier::SavedAndUpvoted, Tier::Upvoted],
        }
    }
}

impl RankingPolicy {
    /// Stable ranking: tier order first, then upvotes within counted tiers.
    /// Cards in tiers the policy does not list are dropped.
    pub fn rank(&self, cards: &[NftCard], filter: DiscoverFilter) -> Vec<NftCard> {
        let shown = match filter {
            DiscoverFilter::All => self.tiers.len(),
            DiscoverFilter::Recommended => self.recommended.min(self.tiers.len()),
        };
        let mut ranked: Vec<(usize, Reverse<u64>, &NftCard)> = cards
            .iter()
            .filter_map(|card| {
                let tier = Tier::of(card);
                let pos = self.tiers.iter().position(|t| *t == tier)?;
                let count = if self.by_count.contains(&tier) {
                    card.upvotes
                } else {
                    0
                };
                (pos < shown).then_some((pos, Reverse(count), card))
            })
            .collect();
        ranked.sort_by_key(|(pos, count, _)| (*pos, *count));
        ranked.into_iter().map(|(_, _, card)| card.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverView {
    pub filter: DiscoverFilter,
    pub cards: Vec<NftCard>,
    pub loaded: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    #[serde(skip)]
    all: Vec<NftCard>,
}

pub struct DiscoverScreen {
    ctx: ScreenContext,
    policy: RankingPolicy,
    view: Mounted<DiscoverView>,
    busy: BusyFlag,
}

impl DiscoverScreen {
    pub fn new(ctx: ScreenContext, policy: RankingPolicy) -> Self {
        Self {
            ctx,
            policy,
            view: Mounted::new(DiscoverView::default()),
            busy: BusyFlag::default(),
        }
    }

    pub fn view(&self) -> DiscoverView {
        self.view.get()
    }

    pub fn unmount(&self) {
        self.view.unmount();
    }

    pub fn set_filter(&self, filter: DiscoverFilter) -> DiscoverView {
        self.view.update(|v| {
            v.filter = filter;
            v.cards = self.policy.rank(&v.all, filter);
        });
        self.view()
    }

    /// Fetch listings, saved entries and upvote counts.
    pub async fn load(&self) -> DiscoverView {
        let viewer = &self.ctx.viewer;
        let (listed, saved) = tokio::join!(self.ctx.market.listed_nfts(), self.ctx.saved.ids(viewer));
        let (listed, error) = match listed {
            Ok(nfts) => (nfts, None),
            Err(e) => {
                warn!(error = %e, "failed to load listings");
                (Vec::new(), Some(format!("Failed to load NFTs: {e}")))
            }
        };

        let ids: Vec<String> = listed.iter().map(|n| n.id.to_text()).collect();
        let counts = self.ctx.upvotes.counts(&ids).await;

        let all: Vec<NftCard> = listed
            .iter()
            .map(|nft| {
                let id = nft.id.to_text();
                let count = counts.get(&id).copied().unwrap_or(0);
                NftCard::new(nft, viewer, saved.contains(&id), count)
            })
            .collect();

        self.view.update(|v| {
            v.cards = self.policy.rank(&all, v.filter);
            v.all = all;
            v.loaded = true;
            v.error = error;
        });
        self.view()
    }

    /// Buy a listed NFT and reload on success.
    pub async fn buy(&self, id: &Principal) -> Result<()> {
        let _guard = self.busy.acquire()?;
        let card = self.card(id)?;
        if !card.can_buy {
            return Err(AppError::InvalidInput(format!("{} is not for sale", card.name)));
        }

        if let Err(e) = self
            .ctx
            .market
            .buy(&card.id, &card.owner, card.price, &self.ctx.viewer)
            .await
        {
            self.view.update(|v| v.error = Some(format!("Purchase failed: {e}")));
            return Err(e.into());
        }

        info!(nft = %card.id, "bought");
        self.load().await;
        self.view.update(|v| v.message = Some(format!("Bought {}", card.name)));
        Ok(())
    }

    /// Returns whether the NFT is now saved.
    pub async fn toggle_save(&self, id: &Principal) -> Result<bool> {
        let _guard = self.busy.acquire()?;
        let card = self.card(id)?;
        let saved = self
            .ctx
            .saved
            .toggle(&self.ctx.viewer, &card.id.to_text(), &card.owner.to_text())
            .await?;
        self.update_card(id, |c| c.saved = saved);
        Ok(saved)
    }

    pub async fn toggle_upvote(&self, id: &Principal) -> Result<ToggleOutcome> {
        let _guard = self.busy.acquire()?;
        let card = self.card(id)?;
        let nft_id = card.id.to_text();
        let owner = card.owner.to_text();
        let viewer = self.ctx.viewer.to_text();

        let outcome = self
            .ctx
            .upvotes
            .toggle(&nft_id, &viewer, Some(&owner))
            .await?;
        match outcome {
            ToggleOutcome::Upvoted => {
                self.ctx.upvoted.insert(&self.ctx.viewer, &nft_id, &owner).await?;
                self.update_card(id, |c| c.upvotes += 1);
            }
            ToggleOutcome::Removed => {
                self.ctx.upvoted.remove(&self.ctx.viewer, &nft_id).await?;
                self.update_card(id, |c| c.upvotes = c.upvotes.saturating_sub(1));
            }
        }
        Ok(outcome)
    }

    fn card(&self, id: &Principal) -> Result<NftCard> {
        self.view
            .get()
            .all
            .into_iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| AppError::InvalidInput(format!("NFT {id} is not listed")))
    }

    fn update_card(&self, id: &Principal, f: impl Fn(&mut NftCard)) {
        self.view.update(|v| {
            v.all.iter_mut().filter(|c| &c.id == id).for_each(&f);
            v.cards = self.policy.rank(&v.all, v.filter);
        });
    }
}
