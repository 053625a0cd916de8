pub mod balance;
pub mod expense;
pub mod expense_share;
pub mod group;
pub mod settlement;
pub mod user;

pub use balance::{
    is_negligible, round_currency, BalanceMap, DebtPair, NetPosition, SETTLEMENT_EPSILON,
};
pub use expense::{Expense, ExpenseCategory};
pub use expense_share::{ExpenseShare, ShareStatus};
pub use group::Group;
pub use settlement::{DebtSummary, SettleResponse, Settlement, SettlementPlan};
pub use user::User;
