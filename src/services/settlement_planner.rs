use crate::models::{round_currency, BalanceMap, Settlement, SettlementPlan, SETTLEMENT_EPSILON};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use tracing::debug;
use uuid::Uuid;

/// Remaining amount a user still has to pay or receive while planning.
#[derive(Debug, Clone, Copy)]
struct OpenBalance {
    user_id: Uuid,
    remaining: Decimal,
}

/// Largest amount first; equal amounts ordered by user id.
fn by_amount_desc(a: &OpenBalance, b: &OpenBalance) -> Ordering {
    b.remaining
        .cmp(&a.remaining)
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Turns net balances into the transfers that clear them.
///
/// Greedy minimum-cash-flow matching: the largest debtor pays the largest
/// creditor as much as both can absorb, then whichever side is cleared drops
/// out. A plan never has more than `debtors + creditors - 1` transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementPlanner;

impl SettlementPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn get_settlement_plan(&self, balances: &BalanceMap) -> Vec<Settlement> {
        let positions = balances.net_positions();

        let mut debtors: Vec<OpenBalance> = positions
            .values()
            .filter(|p| p.is_net_debtor())
            .map(|p| OpenBalance {
                user_id: p.user_id,
                remaining: p.absolute_net(),
            })
            .collect();
        let mut creditors: Vec<OpenBalance> = positions
            .values()
            .filter(|p| p.is_net_creditor())
            .map(|p| OpenBalance {
                user_id: p.user_id,
                remaining: p.net_position,
            })
            .collect();

        debtors.sort_by(by_amount_desc);
        creditors.sort_by(by_amount_desc);

        let mut settlements = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < debtors.len() && j < creditors.len() {
            let debtor = &mut debtors[i];
            let creditor = &mut creditors[j];

            let transfer = round_currency(debtor.remaining.min(creditor.remaining));
            if transfer > Decimal::ZERO {
                settlements.push(Settlement::new(debtor.user_id, creditor.user_id, transfer));
            }

            debtor.remaining = round_currency(debtor.remaining - transfer);
            creditor.remaining = round_currency(creditor.remaining - transfer);

            if debtor.remaining < SETTLEMENT_EPSILON {
                i += 1;
            }
            if creditor.remaining < SETTLEMENT_EPSILON {
                j += 1;
            }
        }

        debug!(
            debtor_count = debtors.len(),
            creditor_count = creditors.len(),
            transfer_count = settlements.len(),
            "Settlement plan computed"
        );

        settlements
    }

    /// Wraps the transfers for `group_id` into a timestamped plan.
    pub fn plan_for_group(&self, group_id: Uuid, balances: &BalanceMap) -> SettlementPlan {
        SettlementPlan::new(group_id, self.get_settlement_plan(balances))
    }
}
