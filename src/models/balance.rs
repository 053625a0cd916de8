use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::DebtSummary;

/// Balances with a magnitude below this are treated as settled (half a cent).
pub const SETTLEMENT_EPSILON: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Decimal places kept on every netted amount.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds an amount to currency-cent precision.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp(CURRENCY_SCALE)
}

/// Returns true if the amount is indistinguishable from zero at cent precision.
pub fn is_negligible(amount: Decimal) -> bool {
    amount.abs() < SETTLEMENT_EPSILON
}

/// Directed edge of the balance graph: `debtor` owes `creditor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DebtPair {
    pub debtor: Uuid,
    pub creditor: Uuid,
}

impl DebtPair {
    pub fn new(debtor: Uuid, creditor: Uuid) -> Self {
        Self { debtor, creditor }
    }

    pub fn reversed(&self) -> Self {
        Self {
            debtor: self.creditor,
            creditor: self.debtor,
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.debtor == user_id || self.creditor == user_id
    }

    /// Direction-independent key, used to visit each unordered pair once.
    pub fn unordered_key(&self) -> (Uuid, Uuid) {
        if self.debtor < self.creditor {
            (self.debtor, self.creditor)
        } else {
            (self.creditor, self.debtor)
        }
    }
}

/// Net amounts owed between pairs of users after cancelling opposite flows.
///
/// Every entry is positive, rounded to cents and at least [`SETTLEMENT_EPSILON`];
/// no self-pairs; at most one direction per unordered pair. Iteration is ordered
/// by `(debtor, creditor)` so results never depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMap {
    entries: BTreeMap<DebtPair, Decimal>,
}

impl BalanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a net debt, dropping self-pairs and negligible amounts.
    /// An existing entry in the opposite direction is netted against it.
    pub(crate) fn insert(&mut self, pair: DebtPair, amount: Decimal) {
        if pair.debtor == pair.creditor {
            return;
        }
        if let Some(reverse) = self.entries.remove(&pair.reversed()) {
            let net = round_currency(amount - reverse);
            if net > Decimal::ZERO {
                self.insert(pair, net);
            } else {
                self.insert(pair.reversed(), -net);
            }
            return;
        }
        if amount < SETTLEMENT_EPSILON {
            return;
        }
        self.entries.insert(pair, amount);
    }

    /// Amount `debtor` currently owes `creditor`, zero if none.
    pub fn get(&self, debtor: Uuid, creditor: Uuid) -> Decimal {
        self.entries
            .get(&DebtPair::new(debtor, creditor))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, debtor: Uuid, creditor: Uuid) -> bool {
        self.entries.contains_key(&DebtPair::new(debtor, creditor))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DebtPair, &Decimal)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the user takes part in any non-negligible balance.
    pub fn has_outstanding(&self, user_id: Uuid) -> bool {
        self.entries
            .iter()
            .any(|(pair, amount)| pair.involves(user_id) && *amount > SETTLEMENT_EPSILON)
    }

    /// Sum of all net debts in the map.
    pub fn total(&self) -> Decimal {
        self.entries.values().copied().sum()
    }

    /// Signed net position per user: positive means the user is owed money.
    pub fn net_positions(&self) -> BTreeMap<Uuid, NetPosition> {
        let mut positions: BTreeMap<Uuid, NetPosition> = BTreeMap::new();

        for (pair, amount) in &self.entries {
            positions
                .entry(pair.debtor)
                .or_insert_with(|| NetPosition::new(pair.debtor))
                .add_payable(*amount);
            positions
                .entry(pair.creditor)
                .or_insert_with(|| NetPosition::new(pair.creditor))
                .add_receivable(*amount);
        }

        positions
    }

    pub fn to_summaries(&self) -> Vec<DebtSummary> {
        self.entries
            .iter()
            .map(|(pair, amount)| DebtSummary::new(pair.debtor, pair.creditor, *amount))
            .collect()
    }
}

impl FromIterator<(DebtPair, Decimal)> for BalanceMap {
    fn from_iter<T: IntoIterator<Item = (DebtPair, Decimal)>>(iter: T) -> Self {
        let mut map = BalanceMap::new();
        for (pair, amount) in iter {
            map.insert(pair, amount);
        }
        map
    }
}

/// A user's aggregate position across all balances of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPosition {
    pub user_id: Uuid,
    /// Total amount others owe this user.
    pub gross_receivable: Decimal,
    /// Total amount this user owes others.
    pub gross_payable: Decimal,
    /// Net position: positive = receive, negative = pay.
    pub net_position: Decimal,
    /// Number of balance entries contributing to this position.
    pub entry_count: u32,
}

impl NetPosition {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            gross_receivable: Decimal::ZERO,
            gross_payable: Decimal::ZERO,
            net_position: Decimal::ZERO,
            entry_count: 0,
        }
    }

    pub fn add_receivable(&mut self, amount: Decimal) {
        self.gross_receivable += amount;
        self.entry_count += 1;
        self.recalculate_net();
    }

    pub fn add_payable(&mut self, amount: Decimal) {
        self.gross_payable += amount;
        self.entry_count += 1;
        self.recalculate_net();
    }

    fn recalculate_net(&mut self) {
        self.net_position = self.gross_receivable - self.gross_payable;
    }

    pub fn is_net_creditor(&self) -> bool {
        self.net_position > SETTLEMENT_EPSILON
    }

    pub fn is_net_debtor(&self) -> bool {
        self.net_position < -SETTLEMENT_EPSILON
    }

    pub fn is_balanced(&self) -> bool {
        is_negligible(self.net_position)
    }

    pub fn absolute_net(&self) -> Decimal {
        self.net_position.abs()
    }
}
