use crate::error::{AppError, Result};
use crate::models::Expense;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Storage contract for expenses.
#[cfg_attr(test, mockall::automock)]
pub trait ExpenseRepository: Send + Sync {
    /// Inserts or replaces an expense.
    fn save(&self, expense: &Expense) -> Result<()>;

    /// Finds an expense by its id.
    fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>>;

    /// Lists every expense of a group, oldest first.
    fn find_by_group_id(&self, group_id: Uuid) -> Result<Vec<Expense>>;
}

/// Expense repository backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemoryExpenseRepository {
    expenses: RwLock<HashMap<Uuid, Expense>>,
}

impl InMemoryExpenseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExpenseRepository for InMemoryExpenseRepository {
    fn save(&self, expense: &Expense) -> Result<()> {
        let mut expenses = self
            .expenses
            .write()
            .map_err(|_| AppError::Internal(anyhow!("expense store lock poisoned")))?;
        expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>> {
        let expenses = self
            .expenses
            .read()
            .map_err(|_| AppError::Internal(anyhow!("expense store lock poisoned")))?;
        Ok(expenses.get(&id).cloned())
    }

    fn find_by_group_id(&self, group_id: Uuid) -> Result<Vec<Expense>> {
        let expenses = self
            .expenses
            .read()
            .map_err(|_| AppError::Internal(anyhow!("expense store lock poisoned")))?;

        let mut found: Vec<Expense> = expenses
            .values()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        Ok(found)
    }
}
