use crate::error::{AppError, Result};
use crate::models::ExpenseShare;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Storage contract for pairwise expense shares.
#[cfg_attr(test, mockall::automock)]
pub trait ExpenseShareRepository: Send + Sync {
    /// Inserts or replaces a batch of shares.
    fn save_all(&self, shares: &[ExpenseShare]) -> Result<()>;

    /// Finds a share by its id.
    fn find_by_id(&self, id: Uuid) -> Result<Option<ExpenseShare>>;

    /// Lists every share belonging to a group.
    fn find_by_group_id(&self, group_id: Uuid) -> Result<Vec<ExpenseShare>>;

    /// Lists the shares split from one expense.
    fn find_by_expense_id(&self, expense_id: Uuid) -> Result<Vec<ExpenseShare>>;

    /// Removes the given shares. Unknown ids are ignored.
    fn delete_all(&self, ids: &[Uuid]) -> Result<()>;
}

/// Share repository backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemoryExpenseShareRepository {
    shares: RwLock<HashMap<Uuid, ExpenseShare>>,
}

impl InMemoryExpenseShareRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn select<F>(&self, predicate: F) -> Result<Vec<ExpenseShare>>
    where
        F: Fn(&ExpenseShare) -> bool,
    {
        let shares = self
            .shares
            .read()
            .map_err(|_| AppError::Internal(anyhow!("share store lock poisoned")))?;

        let mut found: Vec<ExpenseShare> =
            shares.values().filter(|s| predicate(s)).cloned().collect();
        found.sort_by_key(|s| (s.expense_id, s.debtor_id, s.id));

        Ok(found)
    }
}

impl ExpenseShareRepository for InMemoryExpenseShareRepository {
    fn save_all(&self, shares: &[ExpenseShare]) -> Result<()> {
        let mut stored = self
            .shares
            .write()
            .map_err(|_| AppError::Internal(anyhow!("share store lock poisoned")))?;
        for share in shares {
            stored.insert(share.id, share.clone());
        }
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<ExpenseShare>> {
        let shares = self
            .shares
            .read()
            .map_err(|_| AppError::Internal(anyhow!("share store lock poisoned")))?;
        Ok(shares.get(&id).cloned())
    }

    fn find_by_group_id(&self, group_id: Uuid) -> Result<Vec<ExpenseShare>> {
        self.select(|s| s.group_id == group_id)
    }

    fn find_by_expense_id(&self, expense_id: Uuid) -> Result<Vec<ExpenseShare>> {
        self.select(|s| s.expense_id == expense_id)
    }

    fn delete_all(&self, ids: &[Uuid]) -> Result<()> {
        let mut stored = self
            .shares
            .write()
            .map_err(|_| AppError::Internal(anyhow!("share store lock poisoned")))?;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }
}
