#![allow(dead_code)]

use group_settlement::models::{Group, User};
use group_settlement::repositories::{
    InMemoryExpenseRepository, InMemoryExpenseShareRepository, InMemoryGroupRepository,
};
use group_settlement::services::{CreateGroupRequest, ExpenseService, GroupService, ShareService};
use std::sync::Arc;

pub fn user(name: &str) -> User {
    User::new(name, format!("{}@test.com", name.to_lowercase()))
}

/// Services wired over shared in-memory stores.
pub struct TestApp {
    pub groups: GroupService,
    pub expenses: Arc<ExpenseService>,
    pub shares: ShareService,
}

impl TestApp {
    pub fn new() -> Self {
        let group_repo = Arc::new(InMemoryGroupRepository::new());
        let expense_repo = Arc::new(InMemoryExpenseRepository::new());
        let share_repo = Arc::new(InMemoryExpenseShareRepository::new());

        let expenses = Arc::new(
            ExpenseService::new(expense_repo.clone(), group_repo.clone())
                .with_share_repository(share_repo.clone()),
        );
        let groups = GroupService::new(group_repo.clone(), expenses.clone());
        let shares = ShareService::new(share_repo, expense_repo, group_repo);

        Self {
            groups,
            expenses,
            shares,
        }
    }

    /// Creates a group owned by the first user with everyone else invited.
    pub fn group_of(&self, members: &[&User]) -> Group {
        self.group_with(CreateGroupRequest::new("Test group"), members)
    }

    pub fn group_with(&self, request: CreateGroupRequest, members: &[&User]) -> Group {
        let (creator, rest) = members.split_first().expect("group needs at least one member");
        let group = self
            .groups
            .create_group(request, (*creator).clone())
            .expect("Failed to create group");
        for member in rest {
            self.groups
                .invite_to_group(group.id, (*member).clone())
                .expect("Failed to invite member");
        }
        self.groups.get_group(group.id).expect("Failed to reload group")
    }
}
