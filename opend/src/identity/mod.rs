//! Signed identities obtained from the identity provider.
//!
//! A [`DelegatedIdentity`] pairs a locally held Ed25519 session key with the
//! delegation chain the provider issued for it. The caller's principal is
//! derived from the chain's root public key, not from the session key.

pub mod bridge;
pub mod callback;
pub mod signing;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::error::{OpendError, Result};
use crate::principal::Principal;

use self::signing::{ed25519_der, ed25519_raw, sign_request};

/// Ed25519 key the provider delegated to.
#[derive(Clone)]
pub struct SessionKey {
    signing_key: SigningKey,
}

impl SessionKey {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Parse the stored form `["<public key hex>", "<secret key hex>"]`.
    ///
    /// The secret may be a 32-byte seed or a 64-byte keypair (seed first).
    pub fn from_json(json: &str) -> Result<Self> {
        let parts: Vec<String> = serde_json::from_str(json)
            .map_err(|e| OpendError::Identity(format!("session key is not a JSON pair: {e}")))?;
        let [public_hex, secret_hex] = parts.as_slice() else {
            return Err(OpendError::Identity(format!(
                "session key has {} parts, expected 2",
                parts.len()
            )));
        };

        let secret = hex::decode(secret_hex)
            .map_err(|e| OpendError::Identity(format!("session key secret: {e}")))?;
        let seed: [u8; 32] = match secret.len() {
            32 | 64 => secret[..32]
                .try_into()
                .map_err(|_| OpendError::Identity("invalid key length".into()))?,
            n => {
                return Err(OpendError::Identity(format!(
                    "unexpected secret key length: {n}"
                )))
            }
        };
        let signing_key = SigningKey::from_bytes(&seed);

        let public = hex::decode(public_hex)
            .map_err(|e| OpendError::Identity(format!("session key public part: {e}")))?;
        if ed25519_raw(&public) != Some(signing_key.verifying_key().to_bytes()) {
            return Err(OpendError::Identity(
                "session key public part does not match secret".into(),
            ));
        }

        Ok(Self { signing_key })
    }

    pub fn to_json(&self) -> String {
        let pair = [
            hex::encode(self.public_key_der()),
            hex::encode(self.signing_key.to_bytes()),
        ];
        serde_json::Value::from(pair.to_vec()).to_string()
    }

    pub fn public_key_der(&self) -> Vec<u8> {
        ed25519_der(&self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, body: &[u8]) -> Vec<u8> {
        sign_request(body, &self.signing_key)
    }
}

/// One link of a delegation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Hex DER public key being delegated to.
    pub pubkey: String,
    /// Expiry in nanoseconds since the epoch, hex encoded.
    pub expiration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDelegation {
    pub delegation: Delegation,
    pub signature: String,
}

/// Delegation chain issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationChain {
    pub delegations: Vec<SignedDelegation>,
    /// Hex DER root public key.
    pub public_key: String,
}

impl DelegationChain {
    pub fn from_json(json: &str) -> Result<Self> {
        let chain: Self = serde_json::from_str(json)
            .map_err(|e| OpendError::Identity(format!("delegation chain: {e}")))?;
        if chain.delegations.is_empty() {
            return Err(OpendError::Identity("delegation chain is empty".into()));
        }
        Ok(chain)
    }

    pub fn root_public_key(&self) -> Result<Vec<u8>> {
        hex::decode(&self.public_key)
            .map_err(|e| OpendError::Identity(format!("root public key: {e}")))
    }

    /// Earliest expiry in the chain, in nanoseconds.
    pub fn expiration_ns(&self) -> Result<u64> {
        self.delegations
            .iter()
            .map(|d| {
                u64::from_str_radix(&d.delegation.expiration, 16).map_err(|e| {
                    OpendError::Identity(format!(
                        "bad expiration {:?}: {e}",
                        d.delegation.expiration
                    ))
                })
            })
            .try_fold(u64::MAX, |min, exp| exp.map(|e| min.min(e)))
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let now_ns = now.timestamp_nanos_opt().unwrap_or(i64::MAX) as u64;
        matches!(self.expiration_ns(), Ok(exp) if exp > now_ns)
    }

    /// Public key the last link delegates to.
    fn leaf_public_key(&self) -> Result<Vec<u8>> {
        let last = self
            .delegations
            .last()
            .ok_or_else(|| OpendError::Identity("delegation chain is empty".into()))?;
        hex::decode(&last.delegation.pubkey)
            .map_err(|e| OpendError::Identity(format!("delegated public key: {e}")))
    }
}

/// Session key plus the chain authorizing it.
#[derive(Clone)]
pub struct DelegatedIdentity {
    key: SessionKey,
    chain: DelegationChain,
    principal: Principal,
}

impl DelegatedIdentity {
    pub fn new(key: SessionKey, chain: DelegationChain) -> Result<Self> {
        let leaf = chain.leaf_public_key()?;
        if ed25519_raw(&leaf) != ed25519_raw(&key.public_key_der()) {
            return Err(OpendError::Identity(
                "delegation chain was not issued to this session key".into(),
            ));
        }
        let principal = Principal::self_authenticating(&chain.root_public_key()?);
        Ok(Self {
            key,
            chain,
            principal,
        })
    }

    /// Rebuild from the two persisted JSON strings.
    pub fn from_stored(key_json: &str, delegation_json: &str) -> Result<Self> {
        Self::new(
            SessionKey::from_json(key_json)?,
            DelegationChain::from_json(delegation_json)?,
        )
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn chain(&self) -> &DelegationChain {
        &self.chain
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ns = self.chain.expiration_ns().ok()?;
        Some(DateTime::from_timestamp_nanos(ns.min(i64::MAX as u64) as i64))
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.chain.is_valid_at(now)
    }

    pub fn sign(&self, body: &[u8]) -> Vec<u8> {
        self.key.sign(body)
    }
}

impl std::fmt::Debug for DelegatedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedIdentity")
            .field("principal", &self.principal)
            .field("expires_at", &self.expires_at())
            .finish_non_exhaustive()
    }
}

/// Build a chain rooted at `root` that delegates to `session` until `expires`.
///
/// The provider does this for real logins; tests and local tooling use it to
/// mint credentials without one.
pub fn issue_delegation(
    root: &SigningKey,
    session: &SessionKey,
    expires: DateTime<Utc>,
) -> DelegationChain {
    let expiration = expires.timestamp_nanos_opt().unwrap_or(i64::MAX) as u64;
    let delegation = Delegation {
        pubkey: hex::encode(session.public_key_der()),
        expiration: format!("{expiration:x}"),
        targets: None,
    };
    let signed_body = serde_json::to_vec(&delegation).unwrap_or_default();
    let signature = sign_request(&signed_body, root);
    DelegationChain {
        delegations: vec![SignedDelegation {
            delegation,
            signature: hex::encode(signature),
        }],
        public_key: hex::encode(ed25519_der(&root.verifying_key().to_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn root() -> SigningKey {
        SigningKey::from_bytes(&[1u8; 32])
    }

    fn session() -> SessionKey {
        SessionKey::from_signing_key(SigningKey::from_bytes(&[2u8; 32]))
    }

    #[test]
    fn test_session_key_json_round_trip() {
        let key = session();
        let parsed = SessionKey::from_json(&key.to_json()).unwrap();
        assert_eq!(parsed.public_key_der(), key.public_key_der());
    }

    #[test]
    fn test_session_key_accepts_64_byte_secret() {
        let key = session();
        let sk = SigningKey::from_bytes(&[2u8; 32]);
        let mut keypair = sk.to_bytes().to_vec();
        keypair.extend_from_slice(sk.verifying_key().as_bytes());
        let json = format!(
            "[\"{}\",\"{}\"]",
            hex::encode(key.public_key_der()),
            hex::encode(keypair)
        );
        assert!(SessionKey::from_json(&json).is_ok());
    }

    #[test]
    fn test_session_key_rejects_mismatched_public() {
        let other = SessionKey::from_signing_key(SigningKey::from_bytes(&[3u8; 32]));
        let json = format!(
            "[\"{}\",\"{}\"]",
            hex::encode(other.public_key_der()),
            hex::encode([2u8; 32])
        );
        assert!(SessionKey::from_json(&json).is_err());
    }

    #[test]
    fn test_identity_principal_is_root_derived() {
        let chain = issue_delegation(&root(), &session(), Utc::now() + Duration::hours(1));
        let identity = DelegatedIdentity::new(session(), chain.clone()).unwrap();
        let expected = Principal::self_authenticating(&chain.root_public_key().unwrap());
        assert_eq!(identity.principal(), &expected);
    }

    #[test]
    fn test_chain_for_other_key_rejected() {
        let other = SessionKey::from_signing_key(SigningKey::from_bytes(&[9u8; 32]));
        let chain = issue_delegation(&root(), &other, Utc::now() + Duration::hours(1));
        assert!(DelegatedIdentity::new(session(), chain).is_err());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let chain = issue_delegation(&root(), &session(), now + Duration::minutes(5));
        assert!(chain.is_valid_at(now));
        assert!(!chain.is_valid_at(now + Duration::minutes(6)));
    }

    #[test]
    fn test_chain_json_uses_camel_case_root() {
        let chain = issue_delegation(&root(), &session(), Utc::now());
        let json = serde_json::to_string(&chain).unwrap();
        assert!(json.contains("\"publicKey\""));
        assert_eq!(DelegationChain::from_json(&json).unwrap(), chain);
    }

    #[test]
    fn test_empty_chain_rejected() {
        let json = r#"{"delegations":[],"publicKey":"00"}"#;
        assert!(DelegationChain::from_json(json).is_err());
    }
}
