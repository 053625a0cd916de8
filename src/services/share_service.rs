use crate::error::{AppError, Result};
use crate::models::{
    round_currency, BalanceMap, DebtSummary, Expense, ExpenseShare, Group, SettleResponse,
    SettlementPlan,
};
use crate::observability::{get_metrics, mask_uuid};
use crate::repositories::{ExpenseRepository, ExpenseShareRepository, GroupRepository};
use crate::services::{rejected, BalanceAggregator, SettlementPlanner};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Works on explicitly stored pairwise shares instead of recomputed splits.
pub struct ShareService {
    share_repo: Arc<dyn ExpenseShareRepository>,
    expense_repo: Arc<dyn ExpenseRepository>,
    group_repo: Arc<dyn GroupRepository>,
    aggregator: BalanceAggregator,
    planner: SettlementPlanner,
}

impl ShareService {
    pub fn new(
        share_repo: Arc<dyn ExpenseShareRepository>,
        expense_repo: Arc<dyn ExpenseRepository>,
        group_repo: Arc<dyn GroupRepository>,
    ) -> Self {
        Self {
            share_repo,
            expense_repo,
            group_repo,
            aggregator: BalanceAggregator::new(),
            planner: SettlementPlanner::new(),
        }
    }

    /// Splits an expense evenly into one pending share per debtor other than the payer.
    ///
    /// An expense is split once; use [`ShareService::resplit_expense`] to redo it.
    pub fn record_equal_split(&self, expense_id: Uuid) -> Result<Vec<ExpenseShare>> {
        let expense = self.get_expense_or_raise(expense_id)?;

        if !self.share_repo.find_by_expense_id(expense.id)?.is_empty() {
            return Err(rejected(
                "record_equal_split",
                AppError::Validation(format!(
                    "Expense '{}' is already split into shares.",
                    expense.id
                )),
            ));
        }

        let shares = equal_split(&expense);
        self.share_repo.save_all(&shares)?;

        info!(expense_id = %expense.id, share_count = shares.len(), "Expense split into shares");
        Ok(shares)
    }

    /// Replaces the pending shares of an already split expense with an even split
    /// over its current debtors.
    pub fn resplit_expense(&self, expense_id: Uuid) -> Result<Vec<ExpenseShare>> {
        let expense = self.get_expense_or_raise(expense_id)?;
        resplit_pending(self.share_repo.as_ref(), &expense)
    }

    /// Net balances over the pending shares of a group.
    pub fn calculate_debts(&self, group_id: Uuid) -> Result<BalanceMap> {
        let group = self.get_group_or_raise(group_id)?;
        self.balances_for(&group)
    }

    pub fn get_settlement_plan(&self, group_id: Uuid) -> Result<SettlementPlan> {
        let group = self.get_group_or_raise(group_id)?;
        let balances = self.balances_for(&group)?;
        let plan = self.planner.plan_for_group(group.id, &balances);
        get_metrics().record_plan(balances.len() as u64, plan.len() as u64);
        Ok(plan)
    }

    /// Lists debts as the plan when the group simplifies debts, else per directed pair.
    pub fn list_debts(&self, group_id: Uuid) -> Result<Vec<DebtSummary>> {
        let group = self.get_group_or_raise(group_id)?;
        if group.debt_simplification {
            Ok(self.get_settlement_plan(group_id)?.to_summaries())
        } else {
            let shares = self.share_repo.find_by_group_id(group.id)?;
            Ok(self.aggregator.raw_debts_from_shares(&shares))
        }
    }

    /// Marks a single share of the group as settled.
    pub fn settle_share(&self, group_id: Uuid, share_id: Uuid) -> Result<SettleResponse> {
        let mut share = self
            .share_repo
            .find_by_id(share_id)?
            .filter(|s| s.group_id == group_id)
            .ok_or_else(|| AppError::NotFound("Debt not found in this group".to_string()))?;

        share.settle().map_err(|e| rejected("settle_share", e))?;
        self.share_repo.save_all(std::slice::from_ref(&share))?;

        get_metrics().record_shares_settled(1);
        info!(group_id = %mask_uuid(&group_id), share_id = %share.id, "Share settled");

        Ok(SettleResponse {
            settled_count: 1,
            message: format!("Debt of {} settled successfully", share.amount_owed),
        })
    }

    /// Settles every pending share `debtor_id` owes `creditor_id` in the group.
    pub fn settle_pair(
        &self,
        group_id: Uuid,
        debtor_id: Uuid,
        creditor_id: Uuid,
    ) -> Result<SettleResponse> {
        let group = self.get_group_or_raise(group_id)?;

        let mut pending: Vec<ExpenseShare> = self
            .share_repo
            .find_by_group_id(group.id)?
            .into_iter()
            .filter(|s| s.is_pending() && s.debtor_id == debtor_id && s.creditor_id == creditor_id)
            .collect();

        if pending.is_empty() {
            return Err(rejected(
                "settle_pair",
                AppError::NoOutstandingDebt(format!(
                    "'{}' has no pending debts to '{}'.",
                    debtor_id, creditor_id
                )),
            ));
        }

        let mut total = Decimal::ZERO;
        for share in pending.iter_mut() {
            share.settle()?;
            total += share.amount_owed;
        }
        self.share_repo.save_all(&pending)?;

        get_metrics().record_shares_settled(pending.len() as u64);
        info!(
            group_id = %mask_uuid(&group.id),
            settled_count = pending.len(),
            "Pair settled"
        );

        Ok(SettleResponse {
            settled_count: pending.len(),
            message: format!("{} debts totalling {} settled successfully", pending.len(), total),
        })
    }

    fn balances_for(&self, group: &Group) -> Result<BalanceMap> {
        let shares = self.share_repo.find_by_group_id(group.id)?;
        let balances = self.aggregator.calculate_debts_from_shares(&shares);
        get_metrics().record_aggregation(shares.len() as u64, balances.len() as u64);
        Ok(balances)
    }

    fn get_expense_or_raise(&self, expense_id: Uuid) -> Result<Expense> {
        self.expense_repo
            .find_by_id(expense_id)?
            .ok_or_else(|| AppError::NotFound(format!("Expense with id '{}' not found.", expense_id)))
    }

    fn get_group_or_raise(&self, group_id: Uuid) -> Result<Group> {
        self.group_repo
            .find_by_id(group_id)?
            .ok_or_else(|| AppError::NotFound(format!("Group with id '{}' not found.", group_id)))
    }
}

/// One pending share per debtor other than the payer, rounded to cents.
fn equal_split(expense: &Expense) -> Vec<ExpenseShare> {
    let debtor_count = Decimal::from(expense.debtors.len() as u64);
    let percentage = round_currency(Decimal::ONE_HUNDRED / debtor_count);

    expense
        .obligations()
        .map(|(debtor_id, creditor_id, amount)| {
            ExpenseShare::new(
                expense.id,
                expense.group_id,
                debtor_id,
                creditor_id,
                round_currency(amount),
                percentage,
            )
        })
        .collect()
}

/// Brings the shares of a split expense back in line with its debtors.
///
/// Pending shares are dropped and recomputed. A debtor whose share is already
/// settled keeps it and gets no new one. Expenses never split are left alone.
pub(crate) fn resplit_pending(
    share_repo: &dyn ExpenseShareRepository,
    expense: &Expense,
) -> Result<Vec<ExpenseShare>> {
    let existing = share_repo.find_by_expense_id(expense.id)?;
    if existing.is_empty() {
        return Ok(Vec::new());
    }

    let settled: BTreeSet<Uuid> = existing
        .iter()
        .filter(|s| !s.is_pending())
        .map(|s| s.debtor_id)
        .collect();
    let stale: Vec<Uuid> = existing
        .iter()
        .filter(|s| s.is_pending())
        .map(|s| s.id)
        .collect();
    let shares: Vec<ExpenseShare> = equal_split(expense)
        .into_iter()
        .filter(|s| !settled.contains(&s.debtor_id))
        .collect();

    share_repo.delete_all(&stale)?;
    share_repo.save_all(&shares)?;

    debug!(
        expense_id = %expense.id,
        replaced = stale.len(),
        share_count = shares.len(),
        "Expense shares re-split"
    );
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ShareStatus, User};
    use crate::repositories::{
        MockExpenseRepository, MockExpenseShareRepository, MockGroupRepository,
    };
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    #[test]
    fn test_record_equal_split() {
        let alice = User::new("Alice", "alice@test.com");
        let bob = User::new("Bob", "bob@test.com");
        let charlie = User::new("Charlie", "charlie@test.com");
        let expense = Expense::new(
            Uuid::new_v4(),
            dec!(10),
            alice.clone(),
            BTreeSet::from([alice.clone(), bob.clone(), charlie.clone()]),
        )
        .unwrap();
        let expense_id = expense.id;

        let mut expense_repo = MockExpenseRepository::new();
        expense_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(expense.clone())));
        let mut share_repo = MockExpenseShareRepository::new();
        share_repo.expect_find_by_expense_id().returning(|_| Ok(Vec::new()));
        share_repo
            .expect_save_all()
            .withf(|shares| shares.len() == 2)
            .times(1)
            .returning(|_| Ok(()));
        let service = ShareService::new(
            Arc::new(share_repo),
            Arc::new(expense_repo),
            Arc::new(MockGroupRepository::new()),
        );

        let shares = service.record_equal_split(expense_id).unwrap();

        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|s| s.creditor_id == alice.id));
        assert!(shares.iter().all(|s| s.amount_owed == dec!(3.33)));
        assert!(shares.iter().all(|s| s.percentage == dec!(33.33)));
        assert!(shares.iter().all(|s| s.status == ShareStatus::Pending));
    }

    #[test]
    fn test_record_equal_split_twice_is_rejected() {
        let alice = User::new("Alice", "alice@test.com");
        let bob = User::new("Bob", "bob@test.com");
        let expense = Expense::new(
            Uuid::new_v4(),
            dec!(100),
            alice.clone(),
            BTreeSet::from([alice.clone(), bob.clone()]),
        )
        .unwrap();
        let existing = equal_split(&expense);
        let expense_id = expense.id;

        let mut expense_repo = MockExpenseRepository::new();
        expense_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(expense.clone())));
        let mut share_repo = MockExpenseShareRepository::new();
        share_repo
            .expect_find_by_expense_id()
            .returning(move |_| Ok(existing.clone()));
        share_repo.expect_save_all().never();
        let service = ShareService::new(
            Arc::new(share_repo),
            Arc::new(expense_repo),
            Arc::new(MockGroupRepository::new()),
        );

        let result = service.record_equal_split(expense_id);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_settle_share_from_other_group() {
        let share = ExpenseShare::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(5),
            dec!(50),
        );
        let mut share_repo = MockExpenseShareRepository::new();
        share_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(share.clone())));
        share_repo.expect_save_all().never();
        let service = ShareService::new(
            Arc::new(share_repo),
            Arc::new(MockExpenseRepository::new()),
            Arc::new(MockGroupRepository::new()),
        );

        let result = service.settle_share(Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_settle_share_already_settled() {
        let group_id = Uuid::new_v4();
        let mut share = ExpenseShare::new(
            Uuid::new_v4(),
            group_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(5),
            dec!(50),
        );
        share.settle().unwrap();
        let share_id = share.id;

        let mut share_repo = MockExpenseShareRepository::new();
        share_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(share.clone())));
        share_repo.expect_save_all().never();
        let service = ShareService::new(
            Arc::new(share_repo),
            Arc::new(MockExpenseRepository::new()),
            Arc::new(MockGroupRepository::new()),
        );

        let result = service.settle_share(group_id, share_id);
        assert!(matches!(result, Err(AppError::AlreadySettled(_))));
    }

    #[test]
    fn test_settle_pair_without_pending_shares() {
        let group = Group::new(
            "Trip".to_string(),
            "USD".to_string(),
            User::new("Alice", "alice@test.com"),
        );
        let group_id = group.id;
        let mut group_repo = MockGroupRepository::new();
        group_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(group.clone())));
        let mut share_repo = MockExpenseShareRepository::new();
        share_repo.expect_find_by_group_id().returning(|_| Ok(Vec::new()));
        let service = ShareService::new(
            Arc::new(share_repo),
            Arc::new(MockExpenseRepository::new()),
            Arc::new(group_repo),
        );

        let result = service.settle_pair(group_id, Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(result, Err(AppError::NoOutstandingDebt(_))));
    }
}
