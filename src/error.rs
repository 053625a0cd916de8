use thiserror::Error;

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Domain and infrastructure errors surfaced to callers.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced group, expense or share does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Empty debtor set, or a debtor outside the group membership.
    #[error("Invalid debtor set: {0}")]
    InvalidDebtorSet(String),

    #[error("No outstanding debt: {0}")]
    NoOutstandingDebt(String),

    #[error("Settlement exceeds debt: {0}")]
    SettlementExceedsDebt(String),

    #[error("Cannot remove last debtor: {0}")]
    LastDebtorRemoval(String),

    /// Member still has a non-zero net balance in the group.
    #[error("Membership blocked by debt: {0}")]
    MembershipBlockedByDebt(String),

    #[error("Already settled: {0}")]
    AlreadySettled(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidDebtorSet(_) => "invalid_debtor_set",
            AppError::NoOutstandingDebt(_) => "no_outstanding_debt",
            AppError::SettlementExceedsDebt(_) => "settlement_exceeds_debt",
            AppError::LastDebtorRemoval(_) => "last_debtor_removal",
            AppError::MembershipBlockedByDebt(_) => "membership_blocked_by_debt",
            AppError::AlreadySettled(_) => "already_settled",
            AppError::Validation(_) => "validation",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
