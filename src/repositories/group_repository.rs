use crate::error::{AppError, Result};
use crate::models::Group;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Storage contract for groups.
#[cfg_attr(test, mockall::automock)]
pub trait GroupRepository: Send + Sync {
    /// Inserts or replaces a group.
    fn save(&self, group: &Group) -> Result<()>;

    /// Finds a group by its id.
    fn find_by_id(&self, id: Uuid) -> Result<Option<Group>>;

    /// Finds a group by its invite code.
    fn find_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>>;
}

/// Group repository backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemoryGroupRepository {
    groups: RwLock<HashMap<Uuid, Group>>,
}

impl InMemoryGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupRepository for InMemoryGroupRepository {
    fn save(&self, group: &Group) -> Result<()> {
        let mut groups = self
            .groups
            .write()
            .map_err(|_| AppError::Internal(anyhow!("group store lock poisoned")))?;
        groups.insert(group.id, group.clone());
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let groups = self
            .groups
            .read()
            .map_err(|_| AppError::Internal(anyhow!("group store lock poisoned")))?;
        Ok(groups.get(&id).cloned())
    }

    fn find_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>> {
        let groups = self
            .groups
            .read()
            .map_err(|_| AppError::Internal(anyhow!("group store lock poisoned")))?;
        Ok(groups
            .values()
            .find(|g| g.invite_code.eq_ignore_ascii_case(invite_code))
            .cloned())
    }
}
