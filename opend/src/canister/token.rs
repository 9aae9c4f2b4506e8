use serde_json::json;

use crate::canister::CanisterAgent;
use crate::error::Result;
use crate::principal::Principal;
use crate::types::Transaction;

/// Typed wrapper over the token ledger canister.
#[derive(Debug, Clone)]
pub struct TokenCanister {
    agent: CanisterAgent,
    canister_id: Principal,
}

impl TokenCanister {
    pub fn new(agent: CanisterAgent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }

    pub async fn balance_of(&self, owner: &Principal) -> Result<u64> {
        self.agent
            .query(&self.canister_id, "balanceOf", json!([owner]))
            .await
    }

    pub async fn get_symbol(&self) -> Result<String> {
        self.agent
            .query(&self.canister_id, "getSymbol", json!([]))
            .await
    }

    pub async fn get_transactions(&self, owner: &Principal) -> Result<Vec<Transaction>> {
        self.agent
            .query(&self.canister_id, "getTransactions", json!([owner]))
            .await
    }

    pub async fn transfer(&self, to: &Principal, amount: u64) -> Result<String> {
        self.agent
            .update(&self.canister_id, "transfer", json!([to, amount]))
            .await
    }

    pub async fn transfer_with_description(
        &self,
        to: &Principal,
        amount: u64,
        description: &str,
    ) -> Result<String> {
        self.agent
            .update(
                &self.canister_id,
                "transferWithDescription",
                json!([to, amount, description]),
            )
            .await
    }

    /// Credit the caller with quiz points converted to tokens.
    pub async fn reward_quiz(&self, amount: u64) -> Result<String> {
        self.agent
            .update(&self.canister_id, "rewardQuiz", json!([amount]))
            .await
    }

    /// Faucet.
    pub async fn pay_out(&self) -> Result<String> {
        self.agent
            .update(&self.canister_id, "payOut", json!([]))
            .await
    }
}
