use crate::error::{AppError, Result};
use crate::models::{
    BalanceMap, DebtSummary, Expense, Group, SettlementPlan, User, SETTLEMENT_EPSILON,
};
use crate::observability::{get_metrics, mask_amount, mask_uuid, LatencyTimer};
use crate::repositories::{ExpenseRepository, ExpenseShareRepository, GroupRepository};
use crate::services::share_service::resplit_pending;
use crate::services::{rejected, BalanceAggregator, SettlementPlanner};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// Request to record a new expense.
#[derive(Debug, Clone, Validate)]
pub struct CreateExpenseRequest {
    pub group_id: Uuid,
    pub amount: Decimal,
    pub payer: User,
    /// Users who share the cost. `None` splits across every group member.
    pub debtors: Option<BTreeSet<User>>,
    #[validate(length(max = 255))]
    pub description: String,
}

impl CreateExpenseRequest {
    pub fn new(group_id: Uuid, amount: Decimal, payer: User) -> Self {
        Self {
            group_id,
            amount,
            payer,
            debtors: None,
            description: String::new(),
        }
    }

    pub fn with_debtors<I: IntoIterator<Item = User>>(mut self, debtors: I) -> Self {
        self.debtors = Some(debtors.into_iter().collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Records expenses of a group and derives its balances and settlement plan.
pub struct ExpenseService {
    expense_repo: Arc<dyn ExpenseRepository>,
    group_repo: Arc<dyn GroupRepository>,
    /// When set, recorded shares follow debtor changes.
    share_repo: Option<Arc<dyn ExpenseShareRepository>>,
    aggregator: BalanceAggregator,
    planner: SettlementPlanner,
}

impl ExpenseService {
    pub fn new(expense_repo: Arc<dyn ExpenseRepository>, group_repo: Arc<dyn GroupRepository>) -> Self {
        Self {
            expense_repo,
            group_repo,
            share_repo: None,
            aggregator: BalanceAggregator::new(),
            planner: SettlementPlanner::new(),
        }
    }

    pub fn with_share_repository(mut self, share_repo: Arc<dyn ExpenseShareRepository>) -> Self {
        self.share_repo = Some(share_repo);
        self
    }

    /// Records an expense after checking the debtors belong to the group.
    pub fn create_expense(&self, request: CreateExpenseRequest) -> Result<Expense> {
        request.validate()?;
        let group = self.get_group_or_raise(request.group_id)?;

        let debtors = request.debtors.unwrap_or_else(|| group.members.clone());
        if !debtors.is_subset(&group.members) {
            return Err(rejected(
                "create_expense",
                AppError::InvalidDebtorSet("All debtors must be group members.".to_string()),
            ));
        }

        let expense = Expense::new(group.id, request.amount, request.payer, debtors)
            .map_err(|e| rejected("create_expense", e))?
            .with_description(request.description);
        self.expense_repo.save(&expense)?;

        get_metrics().record_expense_created("expense");
        info!(
            group_id = %mask_uuid(&group.id),
            expense_id = %expense.id,
            amount = %mask_amount(&expense.amount),
            debtor_count = expense.debtors.len(),
            "Expense recorded"
        );

        Ok(expense)
    }

    /// Net pairwise balances of a group.
    pub fn calculate_debts(&self, group_id: Uuid) -> Result<BalanceMap> {
        let group = self.get_group_or_raise(group_id)?;
        self.balances_for(&group)
    }

    /// Minimal transfers that clear every balance of a group.
    pub fn get_settlement_plan(&self, group_id: Uuid) -> Result<SettlementPlan> {
        let group = self.get_group_or_raise(group_id)?;
        self.plan_for(&group)
    }

    /// Lists debts as the plan when the group simplifies debts, else as netted
    /// pairs (not raw per-share sums; see [`crate::services::ShareService::list_debts`]).
    pub fn list_debts(&self, group_id: Uuid) -> Result<Vec<DebtSummary>> {
        let group = self.get_group_or_raise(group_id)?;
        if group.debt_simplification {
            Ok(self.plan_for(&group)?.to_summaries())
        } else {
            Ok(self.balances_for(&group)?.to_summaries())
        }
    }

    /// Records `payer` paying back `amount` of what they owe `payee`.
    pub fn settle_up(
        &self,
        group_id: Uuid,
        payer: &User,
        payee: &User,
        amount: Decimal,
    ) -> Result<Expense> {
        let group = self.get_group_or_raise(group_id)?;
        let current_debt = self.balances_for(&group)?.get(payer.id, payee.id);

        if current_debt < SETTLEMENT_EPSILON {
            return Err(rejected(
                "settle_up",
                AppError::NoOutstandingDebt(format!(
                    "'{}' does not owe '{}' anything.",
                    payer.name, payee.name
                )),
            ));
        }
        if amount > current_debt + SETTLEMENT_EPSILON {
            return Err(rejected(
                "settle_up",
                AppError::SettlementExceedsDebt(format!(
                    "Settlement amount {} exceeds debt of {}.",
                    amount, current_debt
                )),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(rejected(
                "settle_up",
                AppError::Validation("Settlement amount must be positive".to_string()),
            ));
        }

        let settlement = Expense::settlement(group.id, payer.clone(), payee.clone(), amount)?;
        self.expense_repo.save(&settlement)?;

        get_metrics().record_expense_created("settlement");
        get_metrics().record_settle_up(&group.currency_code);
        info!(
            group_id = %mask_uuid(&group.id),
            amount = %mask_amount(&amount),
            remaining = %mask_amount(&(current_debt - amount)),
            "Settle-up recorded"
        );

        Ok(settlement)
    }

    /// Removes `user` from the debtors of an expense and re-splits its pending shares.
    pub fn drop_out_from_expense(&self, expense_id: Uuid, user: &User) -> Result<Expense> {
        let mut expense = self
            .expense_repo
            .find_by_id(expense_id)?
            .ok_or_else(|| AppError::NotFound(format!("Expense with id '{}' not found.", expense_id)))?;

        expense
            .remove_debtor(user)
            .map_err(|e| rejected("drop_out_from_expense", e))?;
        self.expense_repo.save(&expense)?;
        if let Some(share_repo) = &self.share_repo {
            resplit_pending(share_repo.as_ref(), &expense)?;
        }

        debug!(expense_id = %expense.id, debtor_count = expense.debtors.len(), "Debtor removed from expense");
        Ok(expense)
    }

    fn balances_for(&self, group: &Group) -> Result<BalanceMap> {
        let expenses = self.expense_repo.find_by_group_id(group.id)?;
        let balances = self.aggregator.calculate_debts(&expenses);
        get_metrics().record_aggregation(expenses.len() as u64, balances.len() as u64);
        Ok(balances)
    }

    fn plan_for(&self, group: &Group) -> Result<SettlementPlan> {
        let timer = LatencyTimer::new();
        let balances = self.balances_for(group)?;
        let plan = self.planner.plan_for_group(group.id, &balances);

        let metrics = get_metrics();
        metrics.record_plan(balances.len() as u64, plan.len() as u64);
        metrics.record_planning_latency(timer.elapsed_ms());

        Ok(plan)
    }

    fn get_group_or_raise(&self, group_id: Uuid) -> Result<Group> {
        self.group_repo
            .find_by_id(group_id)?
            .ok_or_else(|| AppError::NotFound(format!("Group with id '{}' not found.", group_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MockExpenseRepository, MockGroupRepository};
    use rust_decimal_macros::dec;

    struct Fixture {
        alice: User,
        bob: User,
        charlie: User,
        group: Group,
    }

    fn fixture() -> Fixture {
        let alice = User::new("Alice", "alice@test.com");
        let bob = User::new("Bob", "bob@test.com");
        let charlie = User::new("Charlie", "charlie@test.com");
        let mut group = Group::new("Trip".to_string(), "USD".to_string(), alice.clone());
        group.add_member(bob.clone());
        group.add_member(charlie.clone());
        Fixture {
            alice,
            bob,
            charlie,
            group,
        }
    }

    fn group_repo_returning(group: Group) -> MockGroupRepository {
        let mut repo = MockGroupRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(group.clone())));
        repo
    }

    fn expense_repo_with(expenses: Vec<Expense>) -> MockExpenseRepository {
        let mut repo = MockExpenseRepository::new();
        repo.expect_find_by_group_id()
            .returning(move |_| Ok(expenses.clone()));
        repo
    }

    #[test]
    fn test_create_expense_unknown_group() {
        let mut group_repo = MockGroupRepository::new();
        group_repo.expect_find_by_id().returning(|_| Ok(None));
        let service = ExpenseService::new(Arc::new(MockExpenseRepository::new()), Arc::new(group_repo));

        let request = CreateExpenseRequest::new(Uuid::new_v4(), dec!(10), User::new("Alice", "a@test.com"));
        let result = service.create_expense(request);

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_create_expense_defaults_to_all_members() {
        let f = fixture();
        let mut expense_repo = MockExpenseRepository::new();
        expense_repo.expect_save().times(1).returning(|_| Ok(()));
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(group_repo_returning(f.group.clone())));

        let expense = service
            .create_expense(CreateExpenseRequest::new(f.group.id, dec!(90), f.alice.clone()))
            .unwrap();

        assert_eq!(expense.debtors, f.group.members);
        assert_eq!(expense.share(), dec!(30));
    }

    #[test]
    fn test_create_expense_rejects_non_member_debtor() {
        let f = fixture();
        let outsider = User::new("Eve", "eve@test.com");
        let mut expense_repo = MockExpenseRepository::new();
        expense_repo.expect_save().never();
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(group_repo_returning(f.group.clone())));

        let request = CreateExpenseRequest::new(f.group.id, dec!(10), f.alice.clone())
            .with_debtors([f.bob.clone(), outsider]);
        let result = service.create_expense(request);

        assert!(matches!(result, Err(AppError::InvalidDebtorSet(_))));
    }

    #[test]
    fn test_create_expense_rejects_empty_debtors() {
        let f = fixture();
        let mut expense_repo = MockExpenseRepository::new();
        expense_repo.expect_save().never();
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(group_repo_returning(f.group.clone())));

        let request = CreateExpenseRequest::new(f.group.id, dec!(10), f.alice.clone())
            .with_debtors(Vec::<User>::new());
        let result = service.create_expense(request);

        assert!(matches!(result, Err(AppError::InvalidDebtorSet(_))));
    }

    #[test]
    fn test_create_expense_rejects_long_description() {
        let f = fixture();
        let service = ExpenseService::new(
            Arc::new(MockExpenseRepository::new()),
            Arc::new(MockGroupRepository::new()),
        );

        let request = CreateExpenseRequest::new(f.group.id, dec!(10), f.alice.clone())
            .with_description("x".repeat(256));
        let result = service.create_expense(request);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_repository_errors_propagate() {
        let f = fixture();
        let mut expense_repo = MockExpenseRepository::new();
        expense_repo
            .expect_find_by_group_id()
            .returning(|_| Err(AppError::Internal(anyhow::anyhow!("store unavailable"))));
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(group_repo_returning(f.group.clone())));

        let result = service.calculate_debts(f.group.id);
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn test_settle_up_without_debt() {
        let f = fixture();
        let service = ExpenseService::new(
            Arc::new(expense_repo_with(Vec::new())),
            Arc::new(group_repo_returning(f.group.clone())),
        );

        let result = service.settle_up(f.group.id, &f.bob, &f.alice, dec!(5));
        assert!(matches!(result, Err(AppError::NoOutstandingDebt(_))));
    }

    #[test]
    fn test_settle_up_exceeding_debt() {
        let f = fixture();
        let dinner = Expense::new(
            f.group.id,
            dec!(60),
            f.alice.clone(),
            f.group.members.clone(),
        )
        .unwrap();
        let service = ExpenseService::new(
            Arc::new(expense_repo_with(vec![dinner])),
            Arc::new(group_repo_returning(f.group.clone())),
        );

        let result = service.settle_up(f.group.id, &f.bob, &f.alice, dec!(50));
        assert!(matches!(result, Err(AppError::SettlementExceedsDebt(_))));

        // Within half a cent of the debt is accepted.
        let mut expense_repo = expense_repo_with(vec![Expense::new(
            f.group.id,
            dec!(60),
            f.alice.clone(),
            f.group.members.clone(),
        )
        .unwrap()]);
        expense_repo.expect_save().times(1).returning(|_| Ok(()));
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(group_repo_returning(f.group.clone())));

        let settlement = service
            .settle_up(f.group.id, &f.bob, &f.alice, dec!(20.004))
            .unwrap();
        assert!(settlement.is_settlement());
        assert_eq!(settlement.payer, f.bob);
        assert_eq!(settlement.debtors, BTreeSet::from([f.alice.clone()]));
    }

    #[test]
    fn test_settle_up_rejects_zero_amount() {
        let f = fixture();
        let dinner = Expense::new(f.group.id, dec!(60), f.alice.clone(), f.group.members.clone()).unwrap();
        let service = ExpenseService::new(
            Arc::new(expense_repo_with(vec![dinner])),
            Arc::new(group_repo_returning(f.group.clone())),
        );

        let result = service.settle_up(f.group.id, &f.charlie, &f.alice, Decimal::ZERO);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_drop_out_from_unknown_expense() {
        let f = fixture();
        let mut expense_repo = MockExpenseRepository::new();
        expense_repo.expect_find_by_id().returning(|_| Ok(None));
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(MockGroupRepository::new()));

        let result = service.drop_out_from_expense(Uuid::new_v4(), &f.bob);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_drop_out_last_debtor() {
        let f = fixture();
        let expense = Expense::new(
            f.group.id,
            dec!(10),
            f.alice.clone(),
            BTreeSet::from([f.bob.clone()]),
        )
        .unwrap();
        let mut expense_repo = MockExpenseRepository::new();
        expense_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(expense.clone())));
        expense_repo.expect_save().never();
        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(MockGroupRepository::new()));

        let result = service.drop_out_from_expense(Uuid::new_v4(), &f.bob);
        assert!(matches!(result, Err(AppError::LastDebtorRemoval(_))));
    }

    #[test]
    fn test_drop_out_resplits_pending_shares() {
        use crate::models::ExpenseShare;
        use crate::repositories::MockExpenseShareRepository;

        let f = fixture();
        let expense = Expense::new(f.group.id, dec!(90), f.alice.clone(), f.group.members.clone()).unwrap();
        let old_shares: Vec<ExpenseShare> = expense
            .obligations()
            .map(|(debtor, creditor, amount)| {
                ExpenseShare::new(expense.id, f.group.id, debtor, creditor, amount, dec!(33.33))
            })
            .collect();
        let old_ids: Vec<Uuid> = old_shares.iter().map(|s| s.id).collect();

        let mut expense_repo = MockExpenseRepository::new();
        expense_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(expense.clone())));
        expense_repo.expect_save().returning(|_| Ok(()));

        let mut share_repo = MockExpenseShareRepository::new();
        share_repo
            .expect_find_by_expense_id()
            .returning(move |_| Ok(old_shares.clone()));
        share_repo
            .expect_delete_all()
            .withf(move |ids| ids == old_ids.as_slice())
            .times(1)
            .returning(|_| Ok(()));
        let bob_id = f.bob.id;
        share_repo
            .expect_save_all()
            .withf(move |shares| {
                shares.len() == 1 && shares[0].debtor_id == bob_id && shares[0].amount_owed == dec!(45)
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = ExpenseService::new(Arc::new(expense_repo), Arc::new(MockGroupRepository::new()))
            .with_share_repository(Arc::new(share_repo));

        let expense = service.drop_out_from_expense(Uuid::new_v4(), &f.charlie).unwrap();
        assert_eq!(expense.debtors.len(), 2);
    }

    #[test]
    fn test_list_debts_respects_simplification_flag() {
        let f = fixture();
        let expenses = vec![
            Expense::new(f.group.id, dec!(15), f.bob.clone(), BTreeSet::from([f.alice.clone()])).unwrap(),
            Expense::new(f.group.id, dec!(15), f.charlie.clone(), BTreeSet::from([f.bob.clone()])).unwrap(),
        ];

        let raw_service = ExpenseService::new(
            Arc::new(expense_repo_with(expenses.clone())),
            Arc::new(group_repo_returning(f.group.clone())),
        );
        assert_eq!(raw_service.list_debts(f.group.id).unwrap().len(), 2);

        let simplified = f.group.clone().with_debt_simplification(true);
        let plan_service = ExpenseService::new(
            Arc::new(expense_repo_with(expenses)),
            Arc::new(group_repo_returning(simplified)),
        );
        let debts = plan_service.list_debts(f.group.id).unwrap();

        assert_eq!(debts, vec![DebtSummary::new(f.alice.id, f.charlie.id, dec!(15))]);
    }
}
