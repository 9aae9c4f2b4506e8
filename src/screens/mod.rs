//! Screen controllers.
//!
//! Each screen loads its data through the SDK, keeps a render-ready view in a
//! [`Mounted`] cell and guards its mutating actions with a [`BusyFlag`].

pub mod collection;
pub mod discover;
pub mod login;
pub mod mint;
pub mod quiz;
pub mod saved;
pub mod upvoted;
pub mod wallet;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use opend::{
    Marketplace, Nft, NftListStore, OpendError, OriginalityClient, Platform, Principal,
    QuizClient, UpvoteClient,
};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Token symbol shown next to prices.
pub const TOKEN_SYMBOL: &str = "DANG";

/// Everything a screen needs for one authenticated viewer.
#[derive(Clone)]
pub struct ScreenContext {
    pub viewer: Principal,
    pub market: Marketplace,
    pub upvotes: UpvoteClient,
    pub originality: OriginalityClient,
    pub quiz: QuizClient,
    pub saved: NftListStore,
    pub upvoted: NftListStore,
    pub platform: Platform,
}

/// State cell that stops accepting writes once its screen is gone.
#[derive(Debug)]
pub struct Mounted<T> {
    inner: Arc<Mutex<MountedInner<T>>>,
}

#[derive(Debug)]
struct MountedInner<T> {
    mounted: bool,
    value: T,
}

impl<T> Clone for Mounted<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Mounted<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MountedInner {
                mounted: true,
                value,
            })),
        }
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Replace the value; returns false if the screen was unmounted.
    pub fn set(&self, value: T) -> bool {
        self.update(|v| *v = value)
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut inner = self.lock();
        if !inner.mounted {
            debug!("dropping state update for unmounted screen");
            return false;
        }
        f(&mut inner.value);
        true
    }

    pub fn unmount(&self) {
        self.lock().mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MountedInner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One-at-a-time guard for a screen's mutating actions.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    /// Claim the flag, failing fast with [`OpendError::Busy`] when taken.
    pub fn acquire(&self) -> Result<BusyGuard> {
        if self.0.swap(true, Ordering::AcqRel) {
            return Err(OpendError::Busy.into());
        }
        Ok(BusyGuard(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Render-ready NFT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NftCard {
    pub id: Principal,
    pub name: String,
    pub owner: Principal,
    pub price: u64,
    pub image_size: usize,
    pub is_owner: bool,
    pub price_badge: Option<String>,
    pub can_buy: bool,
    pub can_sell: bool,
    pub saved: bool,
    pub upvotes: u64,
}

impl NftCard {
    pub fn new(nft: &Nft, viewer: &Principal, saved: bool, upvotes: u64) -> Self {
        let is_owner = nft.is_owned_by(viewer);
        Self {
            id: nft.id.clone(),
            name: nft.name.clone(),
            owner: nft.owner.clone(),
            price: nft.price,
            image_size: nft.image.len(),
            is_owner,
            price_badge: nft
                .is_listed()
                .then(|| format!("{} {TOKEN_SYMBOL}", nft.price)),
            can_buy: nft.is_listed() && !is_owner,
            can_sell: is_owner && !nft.is_listed(),
            saved,
            upvotes,
        }
    }
}

/// Resolve stored ids to NFTs, keeping order. Unparsable or unresolvable ids
/// are skipped.
pub async fn resolve_nfts(market: &Marketplace, ids: &[String]) -> Vec<Nft> {
    let principals: Vec<Principal> = ids
        .iter()
        .filter_map(|id| match Principal::from_text(id) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(id, error = %e, "skipping stored id");
                None
            }
        })
        .collect();
    join_all(principals.iter().map(|id| market.nft_by_id(id)))
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Parse a principal typed by the user.
pub fn parse_principal(text: &str) -> Result<Principal> {
    let text = text.trim();
    if text.is_empty() {
        return Err(crate::error::AppError::InvalidInput(
            "Please enter a principal".into(),
        ));
    }
    Principal::from_text(text)
        .map_err(|_| crate::error::AppError::InvalidInput(format!("Invalid principal: {text}")))
}


#[cfg(test)]
mod tests {
    use super::testing::{nft, principal};
    use super::*;

    #[test]
    fn test_card_unlisted_has_no_buy_or_badge() {
        let viewer = principal(1);
        let a = NftCard::new(&nft(1, &principal(2), 0), &viewer, false, 0);
        let b = NftCard::new(&nft(2, &principal(2), 50), &viewer, false, 0);

        assert!(!a.can_buy);
        assert!(a.price_badge.is_none());
        assert!(b.can_buy);
        assert_eq!(b.price_badge.as_deref(), Some("50 DANG"));
    }

    #[test]
    fn test_card_owner_can_sell_unlisted_only() {
        let viewer = principal(1);
        let mine = NftCard::new(&nft(1, &viewer, 0), &viewer, false, 0);
        let listed = NftCard::new(&nft(2, &viewer, 10), &viewer, false, 0);
        assert!(mine.can_sell && !mine.can_buy);
        assert!(!listed.can_sell && !listed.can_buy);
    }

    #[test]
    fn test_busy_flag_rejects_second_action() {
        let flag = BusyFlag::default();
        let guard = flag.acquire().unwrap();
        assert!(flag.is_busy());
        assert!(flag.acquire().is_err());
        drop(guard);
        assert!(flag.acquire().is_ok());
    }

    #[test]
    fn test_mounted_drops_writes_after_unmount() {
        let cell = Mounted::new(1);
        assert!(cell.set(2));
        cell.unmount();
        assert!(!cell.set(3));
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_parse_principal_input() {
        assert!(parse_principal("  ").is_err());
        assert!(parse_principal("not a principal").is_err());
        assert_eq!(parse_principal(" 2vxsx-fae ").unwrap(), Principal::anonymous());
    }
}
