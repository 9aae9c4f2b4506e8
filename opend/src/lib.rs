pub mod canister;
pub mod config;
pub mod error;
pub mod identity;
pub mod market;
pub mod platform;
pub mod principal;
pub mod rest;
pub mod services;
pub mod storage;
pub mod types;

// ---- Top-level re-exports ----

// Config + errors
pub use config::{OpendConfig, SessionTimeout};
pub use error::{OpendError, Result};

// Identity + session
pub use identity::bridge::{AuthState, CaptureOutcome, SessionBridge};
pub use identity::{DelegatedIdentity, DelegationChain, SessionKey};
pub use principal::Principal;

// Canisters
pub use canister::{CanisterAgent, NftCanister, OpendCanister, TokenCanister, SUCCESS};
pub use market::Marketplace;

// Remote services
pub use services::{OriginalityClient, OriginalityRequest, QuizClient, UpvoteClient};

// Host capabilities + local persistence
pub use platform::{Clipboard, Platform, UrlOpener};
pub use storage::{CredentialStore, KeyValueStore, ListEntry, ListKind, NftListStore};

// Data types
pub use types::{
    CyclesStatus, MetadataRecord, Nft, OriginalityProgress, OriginalityResponse,
    OriginalityVerdict, ToggleOutcome, Transaction, UpvoteInfo,
};
