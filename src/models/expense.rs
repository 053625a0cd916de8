use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::User;
use crate::error::{AppError, Result};

/// Kind of expense record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    /// A purchase shared among debtors.
    #[default]
    Expense,
    /// A repayment recorded by settle-up; flows opposite to the debt it clears.
    Settlement,
}

/// One payment event within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub category: ExpenseCategory,
    pub payer: User,
    /// Users who owe an even share of `amount`. Never empty.
    pub debtors: BTreeSet<User>,
    pub date: DateTime<Utc>,
}

impl Expense {
    /// Creates an expense, rejecting an empty debtor set.
    pub fn new(
        group_id: Uuid,
        amount: Decimal,
        payer: User,
        debtors: BTreeSet<User>,
    ) -> Result<Self> {
        if debtors.is_empty() {
            return Err(AppError::InvalidDebtorSet(
                "No debtors. Nobody needs to return money then?".to_string(),
            ));
        }
        if amount < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Expense amount must be non-negative, got {}",
                amount
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            description: String::new(),
            amount,
            category: ExpenseCategory::Expense,
            payer,
            debtors,
            date: Utc::now(),
        })
    }

    /// Creates the record of `payer` paying `payee` back.
    pub fn settlement(group_id: Uuid, payer: User, payee: User, amount: Decimal) -> Result<Self> {
        let description = format!("{} paid {}", payer.name, payee.name);
        let mut debtors = BTreeSet::new();
        debtors.insert(payee);

        let mut expense = Self::new(group_id, amount, payer, debtors)?;
        expense.category = ExpenseCategory::Settlement;
        expense.description = description;
        Ok(expense)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Even share owed by each debtor.
    pub fn share(&self) -> Decimal {
        self.amount / Decimal::from(self.debtors.len() as u64)
    }

    /// `(debtor, creditor, amount)` obligations created by this expense.
    /// The payer never owes themselves, even when listed as a debtor.
    pub fn obligations(&self) -> impl Iterator<Item = (Uuid, Uuid, Decimal)> + '_ {
        let share = self.share();
        let payer_id = self.payer.id;
        self.debtors
            .iter()
            .filter(move |debtor| debtor.id != payer_id)
            .map(move |debtor| (debtor.id, payer_id, share))
    }

    pub fn is_settlement(&self) -> bool {
        self.category == ExpenseCategory::Settlement
    }

    /// Removes a debtor; the last remaining debtor cannot be removed.
    pub fn remove_debtor(&mut self, user: &User) -> Result<()> {
        if self.debtors.contains(user) && self.debtors.len() == 1 {
            return Err(AppError::LastDebtorRemoval(
                "Cannot remove the last debtor from an expense.".to_string(),
            ));
        }
        self.debtors.remove(user);
        Ok(())
    }
}
