use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::User;

/// Length of a generated invite code.
pub const INVITE_CODE_LENGTH: usize = 8;

/// A group of users sharing expenses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub currency_code: String,
    pub members: BTreeSet<User>,
    pub invite_code: String,
    /// When set, debts are listed as a netted settlement plan instead of raw shares.
    pub debt_simplification: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Creates a new group with the creator as its first member.
    pub fn new(name: String, currency_code: String, creator: User) -> Self {
        let id = Uuid::new_v4();
        let invite_code = generate_invite_code(id, &name);
        let created_by = creator.id;
        let mut members = BTreeSet::new();
        members.insert(creator);

        Self {
            id,
            name,
            currency_code,
            members,
            invite_code,
            debt_simplification: false,
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn with_debt_simplification(mut self, enabled: bool) -> Self {
        self.debt_simplification = enabled;
        self
    }

    pub fn is_member(&self, user: &User) -> bool {
        self.members.contains(user)
    }

    /// Adds a member. Returns false if the user was already a member.
    pub fn add_member(&mut self, user: User) -> bool {
        self.members.insert(user)
    }

    /// Removes a member. Returns false if the user was not a member.
    pub fn remove_member(&mut self, user: &User) -> bool {
        self.members.remove(user)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Derives an uppercase alphanumeric invite code from the group identity.
pub fn generate_invite_code(group_id: Uuid, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(group_id.as_bytes());
    hasher.update(name.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..INVITE_CODE_LENGTH].to_uppercase()
}
