use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Status of a pairwise share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    /// Still owed; included in netting.
    Pending,
    /// Historical and resolved; excluded from netting.
    Settled,
}

/// How much one debtor owes one creditor for a single expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub group_id: Uuid,
    pub debtor_id: Uuid,
    pub creditor_id: Uuid,
    pub amount_owed: Decimal,
    /// Share of the expense amount, in percent.
    pub percentage: Decimal,
    pub status: ShareStatus,
}

impl ExpenseShare {
    pub fn new(
        expense_id: Uuid,
        group_id: Uuid,
        debtor_id: Uuid,
        creditor_id: Uuid,
        amount_owed: Decimal,
        percentage: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            group_id,
            debtor_id,
            creditor_id,
            amount_owed,
            percentage,
            status: ShareStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ShareStatus::Pending
    }

    /// Marks the share as settled.
    pub fn settle(&mut self) -> Result<()> {
        if self.status == ShareStatus::Settled {
            return Err(AppError::AlreadySettled(format!(
                "Debt '{}' is already settled",
                self.id
            )));
        }
        self.status = ShareStatus::Settled;
        Ok(())
    }
}
