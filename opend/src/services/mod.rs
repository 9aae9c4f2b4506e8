//! Clients for the off-chain HTTP services.

pub mod originality;
pub mod quiz;
pub mod upvotes;

pub use originality::{OriginalityClient, OriginalityRequest};
pub use quiz::QuizClient;
pub use upvotes::UpvoteClient;
