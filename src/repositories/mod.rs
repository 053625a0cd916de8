pub mod expense_repository;
pub mod group_repository;
pub mod share_repository;

pub use expense_repository::{ExpenseRepository, InMemoryExpenseRepository};
pub use group_repository::{GroupRepository, InMemoryGroupRepository};
pub use share_repository::{ExpenseShareRepository, InMemoryExpenseShareRepository};

#[cfg(test)]
pub use expense_repository::MockExpenseRepository;
#[cfg(test)]
pub use group_repository::MockGroupRepository;
#[cfg(test)]
pub use share_repository::MockExpenseShareRepository;
