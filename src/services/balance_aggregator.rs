use crate::models::{
    round_currency, BalanceMap, DebtPair, DebtSummary, Expense, ExpenseShare, NetPosition,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

/// Reduces expense records of one group into net pairwise balances.
///
/// Obligations flowing in both directions between two users cancel out, so
/// the resulting [`BalanceMap`] carries at most one entry per pair. Every net
/// amount is rounded to cents; anything below half a cent is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceAggregator;

impl BalanceAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Nets the even-split obligations of every expense.
    pub fn calculate_debts(&self, expenses: &[Expense]) -> BalanceMap {
        let balances = net_obligations(expenses.iter().flat_map(|e| e.obligations()));
        debug!(
            expense_count = expenses.len(),
            pair_count = balances.len(),
            "Aggregated expense balances"
        );
        balances
    }

    /// Nets already-split shares. Settled shares are history and ignored.
    pub fn calculate_debts_from_shares(&self, shares: &[ExpenseShare]) -> BalanceMap {
        let balances = net_obligations(
            shares
                .iter()
                .filter(|s| s.is_pending())
                .map(|s| (s.debtor_id, s.creditor_id, s.amount_owed)),
        );
        debug!(
            share_count = shares.len(),
            pair_count = balances.len(),
            "Aggregated share balances"
        );
        balances
    }

    /// Pending shares summed per directed pair without cross-direction netting.
    pub fn raw_debts_from_shares(&self, shares: &[ExpenseShare]) -> Vec<DebtSummary> {
        let mut raw: BTreeMap<DebtPair, Decimal> = BTreeMap::new();

        for share in shares.iter().filter(|s| s.is_pending()) {
            if share.debtor_id == share.creditor_id {
                continue;
            }
            *raw.entry(DebtPair::new(share.debtor_id, share.creditor_id))
                .or_insert(Decimal::ZERO) += share.amount_owed;
        }

        raw.into_iter()
            .filter(|(_, amount)| *amount > Decimal::ZERO)
            .map(|(pair, amount)| DebtSummary::new(pair.debtor, pair.creditor, amount))
            .collect()
    }

    /// Signed position per user derived from a balance map.
    pub fn net_positions(&self, balances: &BalanceMap) -> BTreeMap<Uuid, NetPosition> {
        balances.net_positions()
    }
}

/// Accumulates `(debtor, creditor, amount)` flows and cancels opposite directions.
fn net_obligations<I>(obligations: I) -> BalanceMap
where
    I: IntoIterator<Item = (Uuid, Uuid, Decimal)>,
{
    let mut raw: BTreeMap<DebtPair, Decimal> = BTreeMap::new();
    for (debtor, creditor, amount) in obligations {
        if debtor == creditor {
            continue;
        }
        *raw.entry(DebtPair::new(debtor, creditor))
            .or_insert(Decimal::ZERO) += amount;
    }

    let mut processed: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
    let mut netted = BalanceMap::new();

    for (pair, amount) in &raw {
        if !processed.insert(pair.unordered_key()) {
            continue;
        }

        let reverse = raw.get(&pair.reversed()).copied().unwrap_or(Decimal::ZERO);
        let net = *amount - reverse;

        if net > Decimal::ZERO {
            netted.insert(*pair, round_currency(net));
        } else if net < Decimal::ZERO {
            netted.insert(pair.reversed(), round_currency(-net));
        }
    }

    netted
}
