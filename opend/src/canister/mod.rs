//! Canister gateway client and the typed canister wrappers built on it.
//!
//! Calls travel as JSON envelopes to
//! `{host}/api/v2/canister/{canister_id}/{query|call}`. Authenticated calls
//! carry the session key's signature over the serialized `content` plus the
//! delegation chain linking that key to the caller's principal.

pub mod marketplace;
pub mod nft;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OpendError, Result};
use crate::identity::{DelegatedIdentity, SignedDelegation};
use crate::principal::Principal;
use crate::rest::HttpClient;

pub use marketplace::OpendCanister;
pub use nft::NftCanister;
pub use token::TokenCanister;

/// Result string update methods return on success.
pub const SUCCESS: &str = "Success";

const INGRESS_TTL: Duration = Duration::from_secs(4 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Query,
    Call,
}

impl RequestType {
    fn path_segment(self) -> &'static str {
        match self {
            RequestType::Query => "query",
            RequestType::Call => "call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContent {
    pub request_type: RequestType,
    pub canister_id: Principal,
    pub method_name: String,
    pub arg: serde_json::Value,
    pub sender: Principal,
    /// Nanoseconds since the epoch.
    pub ingress_expiry: u64,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub content: RequestContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_delegation: Option<Vec<SignedDelegation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_sig: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallResponse {
    Replied {
        reply: serde_json::Value,
    },
    Rejected {
        reject_code: u32,
        reject_message: String,
    },
}

/// Gateway client bound to an optional caller identity.
///
/// Cheap to clone; rebinding the identity produces a new agent.
#[derive(Debug, Clone)]
pub struct CanisterAgent {
    http: HttpClient,
    identity: Option<Arc<DelegatedIdentity>>,
}

impl CanisterAgent {
    /// Anonymous agent against `host`.
    pub fn new(host: &str) -> Self {
        Self {
            http: HttpClient::new(host),
            identity: None,
        }
    }

    pub fn with_identity(&self, identity: Option<Arc<DelegatedIdentity>>) -> Self {
        Self {
            http: self.http.clone(),
            identity,
        }
    }

    pub fn identity(&self) -> Option<&Arc<DelegatedIdentity>> {
        self.identity.as_ref()
    }

    /// Principal calls are made as.
    pub fn sender(&self) -> Principal {
        self.identity
            .as_ref()
            .map(|i| i.principal().clone())
            .unwrap_or_else(Principal::anonymous)
    }

    /// Side-effect-free call.
    pub async fn query<T: DeserializeOwned>(
        &self,
        canister: &Principal,
        method: &str,
        arg: serde_json::Value,
    ) -> Result<T> {
        self.call(RequestType::Query, canister, method, arg).await
    }

    /// State-changing call.
    pub async fn update<T: DeserializeOwned>(
        &self,
        canister: &Principal,
        method: &str,
        arg: serde_json::Value,
    ) -> Result<T> {
        self.call(RequestType::Call, canister, method, arg).await
    }

    /// Build and sign the envelope for one call.
    pub fn envelope(
        &self,
        request_type: RequestType,
        canister: &Principal,
        method: &str,
        arg: serde_json::Value,
    ) -> Result<Envelope> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let expiry = Utc::now() + INGRESS_TTL;

        let content = RequestContent {
            request_type,
            canister_id: canister.clone(),
            method_name: method.to_string(),
            arg,
            sender: self.sender(),
            ingress_expiry: expiry.timestamp_nanos_opt().unwrap_or(i64::MAX) as u64,
            nonce: hex::encode(nonce),
        };

        let Some(identity) = &self.identity else {
            return Ok(Envelope {
                content,
                sender_pubkey: None,
                sender_delegation: None,
                sender_sig: None,
            });
        };

        let body = serde_json::to_vec(&content)?;
        Ok(Envelope {
            sender_pubkey: Some(identity.chain().public_key.clone()),
            sender_delegation: Some(identity.chain().delegations.clone()),
            sender_sig: Some(hex::encode(identity.sign(&body))),
            content,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request_type: RequestType,
        canister: &Principal,
        method: &str,
        arg: serde_json::Value,
    ) -> Result<T> {
        let envelope = self.envelope(request_type, canister, method, arg)?;
        let path = format!(
            "/api/v2/canister/{}/{}",
            canister,
            request_type.path_segment()
        );
        debug!(%canister, method, kind = ?request_type, "canister call");

        match self.http.post_json::<_, CallResponse>(&path, &envelope).await? {
            CallResponse::Replied { reply } => Ok(serde_json::from_value(reply)?),
            CallResponse::Rejected {
                reject_code,
                reject_message,
            } => Err(OpendError::Rejected {
                code: reject_code,
                message: reject_message,
            }),
        }
    }
}
