use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single directed transfer that clears part of the group's balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub debtor: Uuid,
    pub creditor: Uuid,
    pub amount: Decimal,
}

impl Settlement {
    pub fn new(debtor: Uuid, creditor: Uuid, amount: Decimal) -> Self {
        Self {
            debtor,
            creditor,
            amount,
        }
    }
}

/// Ordered transfers that zero every balance in a group.
///
/// Derived on request from current expense data; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub group_id: Uuid,
    pub settlements: Vec<Settlement>,
    pub generated_at: DateTime<Utc>,
}

impl SettlementPlan {
    pub fn new(group_id: Uuid, settlements: Vec<Settlement>) -> Self {
        Self {
            group_id,
            settlements,
            generated_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    /// Total money moved by the plan.
    pub fn total_volume(&self) -> Decimal {
        self.settlements.iter().map(|s| s.amount).sum()
    }

    pub fn to_summaries(&self) -> Vec<DebtSummary> {
        self.settlements
            .iter()
            .map(|s| DebtSummary::new(s.debtor, s.creditor, s.amount))
            .collect()
    }
}

/// Outbound row: how much one user owes another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSummary {
    pub debtor_id: Uuid,
    pub creditor_id: Uuid,
    pub total_owed: Decimal,
}

impl DebtSummary {
    pub fn new(debtor_id: Uuid, creditor_id: Uuid, total_owed: Decimal) -> Self {
        Self {
            debtor_id,
            creditor_id,
            total_owed,
        }
    }
}

/// Outbound result of settling one or more shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleResponse {
    pub settled_count: usize,
    pub message: String,
}
