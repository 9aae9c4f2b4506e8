use opend::error::expect_success;
use opend::types::sort_newest_first;
use opend::Transaction;
use serde::Serialize;
use tracing::{info, warn};

use super::{parse_principal, BusyFlag, Mounted, ScreenContext, TOKEN_SYMBOL};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletView {
    pub balance: u64,
    pub symbol: String,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub loaded: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

pub struct WalletScreen {
    ctx: ScreenContext,
    view: Mounted<WalletView>,
    busy: BusyFlag,
}

impl WalletScreen {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: Mounted::new(WalletView::default()),
            busy: BusyFlag::default(),
        }
    }

    pub fn view(&self) -> WalletView {
        self.view.get()
    }

    pub async fn load(&self) -> WalletView {
        let token = self.ctx.market.token();
        let viewer = &self.ctx.viewer;
        let (balance, symbol, transactions) = tokio::join!(
            token.balance_of(viewer),
            token.get_symbol(),
            token.get_transactions(viewer),
        );

        let mut errors = Vec::new();
        let balance = balance.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load balance");
            errors.push("balance");
            0
        });
        let symbol = symbol.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load token symbol");
            TOKEN_SYMBOL.to_string()
        });
        let mut transactions = transactions.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load transactions");
            errors.push("transactions");
            Vec::new()
        });
        sort_newest_first(&mut transactions);

        self.view.update(|v| {
            v.balance = balance;
            v.symbol = symbol;
            v.transactions = transactions;
            v.loaded = true;
            v.error = (!errors.is_empty()).then(|| format!("Failed to load {}", errors.join(" and ")));
        });
        self.view()
    }

    /// Send tokens; the ledger's result string is reported as the message.
    pub async fn transfer(&self, recipient: &str, amount: u64) -> Result<()> {
        let to = parse_principal(recipient)?;
        if to == self.ctx.viewer {
            return Err(AppError::InvalidInput(
                "Cannot transfer to your own account".into(),
            ));
        }
        if amount == 0 {
            return Err(AppError::InvalidInput("Amount must be greater than 0".into()));
        }
        let _guard = self.busy.acquire()?;

        let result = self.ctx.market.token().transfer(&to, amount).await?;
        self.view.update(|v| v.message = Some(result.clone()));
        expect_success(result)?;
        info!(%to, amount, "transfer sent");
        self.load().await;
        Ok(())
    }

    /// Claim tokens from the ledger's faucet.
    pub async fn faucet(&self) -> Result<()> {
        let _guard = self.busy.acquire()?;
        let result = self.ctx.market.token().pay_out().await?;
        self.view.update(|v| v.message = Some(result.clone()));
        expect_success(result)?;
        self.load().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::testing::*;
    use serde_json::json;
    use wiremock::MockServer;

    #[tokio::test]
    async fn test_transfer_validation() {
        let server = MockServer::start().await;
        let viewer = principal(1);
        let h = harness(&server, viewer.clone());
        let screen = WalletScreen::new(h.ctx);

        let own = screen.transfer(&viewer.to_text(), 5).await.unwrap_err();
        assert_eq!(own.to_string(), "Cannot transfer to your own account");
        assert!(screen.transfer("", 5).await.is_err());
        assert!(screen.transfer("garbage", 5).await.is_err());
        assert!(screen.transfer(&principal(2).to_text(), 0).await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_sorts_transactions() {
        let server = MockServer::start().await;
        let viewer = principal(1);
        let h = harness(&server, viewer.clone());
        let token = h.config.token_canister_id.clone();
        let tx = |id: u64, ts: u64| {
            json!({
                "id": id, "amount": 1, "description": "x",
                "from": viewer.to_text(), "to": principal(2).to_text(), "timestamp": ts
            })
        };
        mock_call(&server, &token, "query", "balanceOf", replied(json!(120))).await;
        mock_call(&server, &token, "query", "getSymbol", replied(json!("DANG"))).await;
        mock_call(
            &server,
            &token,
            "query",
            "getTransactions",
            replied(json!([tx(1, 100), tx(2, 300), tx(3, 200)])),
        )
        .await;

        let view = WalletScreen::new(h.ctx).load().await;
        assert_eq!(view.balance, 120);
        assert_eq!(view.symbol, "DANG");
        let ids: Vec<u64> = view.transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_transfer_failure_reports_result_string() {
        let server = MockServer::start().await;
        let h = harness(&server, principal(1));
        let token = h.config.token_canister_id.clone();
        mock_call(&server, &token, "call", "transfer", replied(json!("Insufficient Funds"))).await;

        let screen = WalletScreen::new(h.ctx);
        let err = screen.transfer(&principal(2).to_text(), 5).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient Funds");
        assert_eq!(screen.view().message.as_deref(), Some("Insufficient Funds"));
    }
}
