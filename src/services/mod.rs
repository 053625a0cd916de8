pub mod balance_aggregator;
pub mod expense_service;
pub mod group_service;
pub mod settlement_planner;
pub mod share_service;

pub use balance_aggregator::BalanceAggregator;
pub use expense_service::{CreateExpenseRequest, ExpenseService};
pub use group_service::{CreateGroupRequest, GroupService};
pub use settlement_planner::SettlementPlanner;
pub use share_service::ShareService;

use crate::error::AppError;
use crate::observability::get_metrics;

/// Counts and logs a business-rule rejection before handing the error back.
pub(crate) fn rejected(operation: &str, error: AppError) -> AppError {
    get_metrics().record_rejection(operation, error.reason());
    tracing::warn!(operation, reason = error.reason(), "{}", error);
    error
}
