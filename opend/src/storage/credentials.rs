use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::KeyValueStore;
use crate::error::Result;

pub const IDENTITY_KEY: &str = "ic-identity";
pub const DELEGATION_KEY: &str = "ic-delegation";
pub const LOGIN_TIMESTAMP_KEY: &str = "login_timestamp";

/// Credential strings as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub key: String,
    pub delegation: String,
}

/// Persisted auth session: session key, delegation chain and login time.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Both halves of the credential, or `None` if either is missing.
    pub async fn load(&self) -> Result<Option<StoredCredential>> {
        let key = self.store.get(IDENTITY_KEY).await?;
        let delegation = self.store.get(DELEGATION_KEY).await?;
        Ok(match (key, delegation) {
            (Some(key), Some(delegation)) => Some(StoredCredential { key, delegation }),
            _ => None,
        })
    }

    /// Write the credential and the login time as one batch.
    pub async fn save(&self, credential: &StoredCredential, logged_in_at: DateTime<Utc>) -> Result<()> {
        let ts = logged_in_at.timestamp_millis().to_string();
        self.store
            .set_many(&[
                (IDENTITY_KEY, credential.key.as_str()),
                (DELEGATION_KEY, credential.delegation.as_str()),
                (LOGIN_TIMESTAMP_KEY, ts.as_str()),
            ])
            .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store
            .remove_many(&[IDENTITY_KEY, DELEGATION_KEY, LOGIN_TIMESTAMP_KEY])
            .await
    }

    /// Login time; unparsable values read as missing.
    pub async fn login_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get(LOGIN_TIMESTAMP_KEY).await? else {
            return Ok(None);
        };
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
        if parsed.is_none() {
            warn!(raw = %raw, "ignoring unparsable login timestamp");
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn credential() -> StoredCredential {
        StoredCredential {
            key: "k".into(),
            delegation: "d".into(),
        }
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let mem = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(mem.clone());
        let now = Utc::now();

        store.save(&credential(), now).await.unwrap();
        assert_eq!(mem.write_count(), 1);
        assert_eq!(store.load().await.unwrap(), Some(credential()));
        assert_eq!(
            store.login_timestamp().await.unwrap().unwrap().timestamp_millis(),
            now.timestamp_millis()
        );

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(store.login_timestamp().await.unwrap().is_none());
        assert!(mem.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_half_credential_is_none() {
        let mem = Arc::new(MemoryStore::new());
        mem.set(IDENTITY_KEY, "k").await.unwrap();
        let store = CredentialStore::new(mem);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_timestamp_reads_as_missing() {
        let mem = Arc::new(MemoryStore::new());
        mem.set(LOGIN_TIMESTAMP_KEY, "yesterday").await.unwrap();
        let store = CredentialStore::new(mem);
        assert!(store.login_timestamp().await.unwrap().is_none());
    }
}
