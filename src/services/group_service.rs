use crate::config::LedgerSettings;
use crate::error::{AppError, Result};
use crate::models::{Group, User};
use crate::observability::{mask_email, mask_uuid};
use crate::repositories::GroupRepository;
use crate::services::{rejected, ExpenseService};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Request to create a new group.
#[derive(Debug, Clone, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// ISO-like currency code; the configured default when `None`.
    #[validate(length(min = 3, max = 10))]
    pub currency_code: Option<String>,
    pub debt_simplification: Option<bool>,
}

impl CreateGroupRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            currency_code: None,
            debt_simplification: None,
        }
    }

    pub fn with_currency(mut self, currency_code: impl Into<String>) -> Self {
        self.currency_code = Some(currency_code.into());
        self
    }

    pub fn with_debt_simplification(mut self, enabled: bool) -> Self {
        self.debt_simplification = Some(enabled);
        self
    }
}

/// Manages group membership.
pub struct GroupService {
    group_repo: Arc<dyn GroupRepository>,
    expense_service: Arc<ExpenseService>,
    ledger: LedgerSettings,
}

impl GroupService {
    pub fn new(group_repo: Arc<dyn GroupRepository>, expense_service: Arc<ExpenseService>) -> Self {
        Self::with_settings(group_repo, expense_service, crate::config::Settings::default().ledger)
    }

    pub fn with_settings(
        group_repo: Arc<dyn GroupRepository>,
        expense_service: Arc<ExpenseService>,
        ledger: LedgerSettings,
    ) -> Self {
        Self {
            group_repo,
            expense_service,
            ledger,
        }
    }

    /// Creates a group with `creator` as its first member.
    pub fn create_group(&self, request: CreateGroupRequest, creator: User) -> Result<Group> {
        request.validate()?;
        if request.name.trim().is_empty() {
            return Err(AppError::Validation("Group name cannot be empty".to_string()));
        }

        let currency = request
            .currency_code
            .unwrap_or_else(|| self.ledger.default_currency.clone())
            .to_uppercase();
        let simplify = request
            .debt_simplification
            .unwrap_or(self.ledger.debt_simplification_default);

        let group = Group::new(request.name, currency, creator).with_debt_simplification(simplify);
        self.group_repo.save(&group)?;

        info!(
            group_id = %mask_uuid(&group.id),
            currency = %group.currency_code,
            "Group created"
        );
        Ok(group)
    }

    pub fn get_group(&self, group_id: Uuid) -> Result<Group> {
        self.group_repo
            .find_by_id(group_id)?
            .ok_or_else(|| AppError::NotFound(format!("Group with id '{}' not found.", group_id)))
    }

    pub fn find_by_invite_code(&self, invite_code: &str) -> Result<Group> {
        self.group_repo
            .find_by_invite_code(invite_code)?
            .ok_or_else(|| {
                AppError::NotFound(format!("Group with invite code '{}' not found.", invite_code))
            })
    }

    /// Adds `user` to the group. Adding an existing member is a no-op.
    pub fn invite_to_group(&self, group_id: Uuid, user: User) -> Result<Group> {
        let group = self.get_group(group_id)?;
        self.add_member(group, user)
    }

    pub fn join_by_invite_code(&self, invite_code: &str, user: User) -> Result<Group> {
        let group = self.find_by_invite_code(invite_code)?;
        self.add_member(group, user)
    }

    /// Switches between the raw and the netted debt listing.
    pub fn set_debt_simplification(&self, group_id: Uuid, enabled: bool) -> Result<Group> {
        let group = self.get_group(group_id)?.with_debt_simplification(enabled);
        self.group_repo.save(&group)?;
        Ok(group)
    }

    /// Removes `user` from the group once all of their balances are settled.
    pub fn drop_out_from_group(&self, group_id: Uuid, user: &User) -> Result<Group> {
        let mut group = self.get_group(group_id)?;

        let debts = self.expense_service.calculate_debts(group_id)?;
        if debts.has_outstanding(user.id) {
            return Err(rejected(
                "drop_out_from_group",
                AppError::MembershipBlockedByDebt(format!(
                    "User '{}' has unsettled debts.",
                    user.name
                )),
            ));
        }

        group.remove_member(user);
        self.group_repo.save(&group)?;

        info!(
            group_id = %mask_uuid(&group.id),
            user = %mask_email(&user.email),
            "Member left group"
        );
        Ok(group)
    }

    fn add_member(&self, mut group: Group, user: User) -> Result<Group> {
        let email = user.email.clone();
        if group.add_member(user) {
            self.group_repo.save(&group)?;
            info!(
                group_id = %mask_uuid(&group.id),
                user = %mask_email(&email),
                member_count = group.member_count(),
                "Member joined group"
            );
        }
        Ok(group)
    }
}
