use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mintvault: terminal client for the OpenD NFT marketplace.
#[derive(Parser, Debug)]
#[command(name = "mintvault", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Print views as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the identity provider to start a login
    Login,

    /// Complete a login with the redirect URL from the identity provider
    Callback {
        url: String,
    },

    /// Forget the stored session
    Logout,

    /// Print the logged-in principal
    Whoami {
        /// Also copy it to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Session state and marketplace cycles
    Status,

    /// Listed NFTs, ranked by saves and upvotes
    Discover {
        /// Only saved or upvoted NFTs
        #[arg(long)]
        recommended: bool,
    },

    /// NFTs you own
    Collection,

    /// List an owned NFT for sale
    Sell {
        id: String,
        price: u64,
    },

    /// Buy a listed NFT
    Buy {
        id: String,
    },

    /// Toggle an NFT in the saved list
    Save {
        id: String,
    },

    /// Toggle your upvote on an NFT
    Upvote {
        id: String,
    },

    /// Saved NFTs still for sale
    Saved,

    /// Remove an NFT from the saved list
    Unsave {
        id: String,
    },

    /// NFTs you upvoted, newest first
    Upvoted,

    /// Check an image for originality and mint it
    Mint {
        name: String,
        image: PathBuf,
    },

    /// Token balance and transactions
    Wallet,

    /// Send tokens to another principal
    Transfer {
        to: String,
        amount: u64,
    },

    /// Claim tokens from the faucet
    Faucet,

    /// Quiz points and eligibility
    Quiz,

    /// Convert quiz points to tokens
    QuizClaim,

    /// Open the quiz in a browser
    QuizOpen,

    /// Keep the session alive and log out when it lapses
    Watch {
        /// Seconds between session checks
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mintvault", "sell", "2vxsx-fae", "25", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Sell { ref id, price: 25 } if id == "2vxsx-fae"));
    }

    #[test]
    fn test_rejects_negative_price() {
        assert!(Cli::try_parse_from(["mintvault", "sell", "2vxsx-fae", "-5"]).is_err());
    }
}
