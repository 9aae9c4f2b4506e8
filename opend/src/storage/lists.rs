//! Per-principal saved and upvoted NFT id lists.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::KeyValueStore;
use crate::error::Result;
use crate::principal::Principal;

pub const SAVED_KEY: &str = "@mintvault_liked_nfts";
pub const UPVOTED_KEY: &str = "@mintvault_upvoted_nfts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Saved,
    Upvoted,
}

impl ListKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ListKind::Saved => SAVED_KEY,
            ListKind::Upvoted => UPVOTED_KEY,
        }
    }
}

/// A list element: older builds stored bare ids, newer ones pair the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListEntry {
    Id(String),
    Owned {
        id: String,
        #[serde(default)]
        owner: String,
    },
}

impl ListEntry {
    pub fn id(&self) -> &str {
        match self {
            ListEntry::Id(id) => id,
            ListEntry::Owned { id, .. } => id,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            ListEntry::Id(_) => None,
            ListEntry::Owned { owner, .. } => Some(owner.as_str()).filter(|o| !o.is_empty()),
        }
    }
}

/// Parse a persisted list. Anything malformed reads as empty; stray elements
/// that are neither form are dropped.
pub fn parse_entries(raw: Option<&str>) -> Vec<ListEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ListEntry>(v).ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn entry_ids(entries: &[ListEntry]) -> Vec<String> {
    entries.iter().map(|e| e.id().to_string()).collect()
}

pub fn entry_owner_ids(entries: &[ListEntry]) -> HashSet<String> {
    entries
        .iter()
        .filter_map(|e| e.owner().map(str::to_string))
        .collect()
}

/// One list kind over a key-value store.
#[derive(Clone)]
pub struct NftListStore {
    store: Arc<dyn KeyValueStore>,
    kind: ListKind,
}

impl NftListStore {
    pub fn new(store: Arc<dyn KeyValueStore>, kind: ListKind) -> Self {
        Self { store, kind }
    }

    pub fn saved(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, ListKind::Saved)
    }

    pub fn upvoted(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, ListKind::Upvoted)
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn key(&self, principal: &Principal) -> String {
        format!("{}_{}", self.kind.prefix(), principal)
    }

    /// Entries for `principal`. Never fails: storage errors read as empty.
    pub async fn entries(&self, principal: &Principal) -> Vec<ListEntry> {
        match self.store.get(&self.key(principal)).await {
            Ok(raw) => parse_entries(raw.as_deref()),
            Err(e) => {
                warn!(kind = ?self.kind, error = %e, "list read failed, treating as empty");
                Vec::new()
            }
        }
    }

    pub async fn ids(&self, principal: &Principal) -> Vec<String> {
        entry_ids(&self.entries(principal).await)
    }

    pub async fn contains(&self, principal: &Principal, nft_id: &str) -> bool {
        self.entries(principal).await.iter().any(|e| e.id() == nft_id)
    }

    pub async fn insert(&self, principal: &Principal, nft_id: &str, owner: &str) -> Result<()> {
        let mut entries = self.entries(principal).await;
        if entries.iter().any(|e| e.id() == nft_id) {
            return Ok(());
        }
        entries.push(ListEntry::Owned {
            id: nft_id.to_string(),
            owner: owner.to_string(),
        });
        self.write(principal, &entries).await
    }

    pub async fn remove(&self, principal: &Principal, nft_id: &str) -> Result<()> {
        let mut entries = self.entries(principal).await;
        let before = entries.len();
        entries.retain(|e| e.id() != nft_id);
        if entries.len() == before {
            return Ok(());
        }
        self.write(principal, &entries).await
    }

    /// Flip membership of `nft_id`; returns whether it is now present.
    pub async fn toggle(&self, principal: &Principal, nft_id: &str, owner: &str) -> Result<bool> {
        if self.contains(principal, nft_id).await {
            self.remove(principal, nft_id).await?;
            Ok(false)
        } else {
            self.insert(principal, nft_id, owner).await?;
            Ok(true)
        }
    }

    async fn write(&self, principal: &Principal, entries: &[ListEntry]) -> Result<()> {
        let body = serde_json::to_string(entries)?;
        self.store.set(&self.key(principal), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_parse_missing_and_malformed_is_empty() {
        for raw in [
            None,
            Some(""),
            Some("not json"),
            Some("{\"id\":\"x\"}"),
            Some("42"),
            Some("null"),
            Some("[1, 2"),
        ] {
            assert!(parse_entries(raw).is_empty(), "expected empty for {raw:?}");
        }
    }

    #[test]
    fn test_parse_mixed_entries() {
        let raw = r#"["a", {"id":"b","owner":"o"}, 7, {"nope":true}]"#;
        let entries = parse_entries(Some(raw));
        assert_eq!(entry_ids(&entries), vec!["a", "b"]);
        let owners = entry_owner_ids(&entries);
        assert_eq!(owners.len(), 1);
        assert!(owners.contains("o"));
    }

    #[tokio::test]
    async fn test_keys_are_per_principal() {
        let store = NftListStore::saved(Arc::new(MemoryStore::new()));
        let p = Principal::anonymous();
        assert_eq!(store.key(&p), "@mintvault_liked_nfts_2vxsx-fae");
        let up = NftListStore::upvoted(Arc::new(MemoryStore::new()));
        assert_eq!(up.key(&p), "@mintvault_upvoted_nfts_2vxsx-fae");
    }

    #[tokio::test]
    async fn test_toggle_twice_restores() {
        let mem = Arc::new(MemoryStore::new());
        let store = NftListStore::saved(mem.clone());
        let p = Principal::anonymous();

        assert!(store.toggle(&p, "nft-1", "owner-1").await.unwrap());
        assert!(store.contains(&p, "nft-1").await);
        assert_eq!(
            store.entries(&p).await,
            vec![ListEntry::Owned {
                id: "nft-1".into(),
                owner: "owner-1".into()
            }]
        );

        assert!(!store.toggle(&p, "nft-1", "owner-1").await.unwrap());
        assert!(store.entries(&p).await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_list_recovers_on_write() {
        let mem = Arc::new(MemoryStore::new());
        let store = NftListStore::saved(mem.clone());
        let p = Principal::anonymous();
        mem.set(&store.key(&p), "{{{").await.unwrap();

        assert!(store.ids(&p).await.is_empty());
        store.insert(&p, "x", "o").await.unwrap();
        assert_eq!(store.ids(&p).await, vec!["x"]);
    }

    #[tokio::test]
    async fn test_removes_legacy_bare_id() {
        let mem = Arc::new(MemoryStore::new());
        let store = NftListStore::saved(mem.clone());
        let p = Principal::anonymous();
        mem.set(&store.key(&p), "[\"legacy\"]").await.unwrap();

        assert!(!store.toggle(&p, "legacy", "o").await.unwrap());
        assert!(store.ids(&p).await.is_empty());
    }
}
