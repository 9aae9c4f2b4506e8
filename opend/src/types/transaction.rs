use serde::{Deserialize, Serialize};

use crate::principal::Principal;

/// Ledger entry, owned and ordered by the token canister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub amount: u64,
    pub description: String,
    pub from: Principal,
    pub to: Principal,
    /// Nanoseconds since the epoch.
    pub timestamp: u64,
}

/// Sort by timestamp, newest first.
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64, timestamp: u64) -> Transaction {
        Transaction {
            id,
            amount: 1,
            description: String::new(),
            from: Principal::anonymous(),
            to: Principal::management(),
            timestamp,
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let mut txs = vec![tx(1, 10), tx(2, 30), tx(3, 20)];
        sort_newest_first(&mut txs);
        let ids: Vec<u64> = txs.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
