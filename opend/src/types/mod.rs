pub mod blob;
pub mod nft;
pub mod originality;
pub mod quiz;
pub mod transaction;
pub mod upvote;

pub use nft::*;
pub use originality::*;
pub use quiz::*;
pub use transaction::*;
pub use upvote::*;
