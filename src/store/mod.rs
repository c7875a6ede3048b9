//! Persistence boundary. Handlers and the auth extractor only ever talk to
//! these traits; `SqlStore` and `MemoryStore` are interchangeable behind them.

use async_trait::async_trait;

use crate::model::{AuthToken, Expense, ExpenseAccount, ExpenseCategory, User};

mod filter;
pub mod memory;
pub mod sql;

pub use filter::{ExpenseFilter, ExpenseQuery};
pub use memory::MemoryStore;
pub use sql::SqlStore;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("write failed: {0}")]
    Write(#[source] anyhow::Error),
    #[error("fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),
}

impl StoreError {
    pub fn write(e: impl Into<anyhow::Error>) -> Self {
        Self::Write(e.into())
    }

    pub fn fetch(e: impl Into<anyhow::Error>) -> Self {
        Self::Fetch(e.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> StoreResult<User>;

    async fn get_by_email(&self, email: &str) -> StoreResult<User>;

    /// Insert. A second user with the same email is a write error.
    async fn store(&self, user: &User) -> StoreResult<()>;

    async fn update(&self, user: &User) -> StoreResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    /// Issue and persist a new token for `user`.
    async fn create(&self, user: &User) -> StoreResult<AuthToken>;

    /// Live tokens only. Unknown, expired and inactive keys all come back as
    /// `NotFound`.
    async fn find(&self, key: &str) -> StoreResult<AuthToken>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Runs `Expense::pre_save` before inserting.
    async fn store(&self, expense: &mut Expense) -> StoreResult<()>;

    /// Account, category and user come back hydrated.
    async fn get_by_id(&self, id: &str) -> StoreResult<Expense>;

    async fn get_expenses(&self, user_id: &str, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>>;

    async fn store_account(&self, account: &mut ExpenseAccount) -> StoreResult<()>;

    async fn get_accounts(&self, user_id: &str) -> StoreResult<Vec<ExpenseAccount>>;

    async fn get_account_by_id(&self, id: &str) -> StoreResult<ExpenseAccount>;

    async fn delete_account(&self, account: &ExpenseAccount) -> StoreResult<()>;

    async fn store_category(&self, category: &mut ExpenseCategory) -> StoreResult<()>;

    async fn get_categories(&self, user_id: &str) -> StoreResult<Vec<ExpenseCategory>>;

    async fn get_category_by_id(&self, id: &str) -> StoreResult<ExpenseCategory>;
}

/// All capability groups behind one handle.
pub trait Store: Send + Sync {
    fn users(&self) -> &dyn UserStore;
    fn auth_tokens(&self) -> &dyn AuthTokenStore;
    fn expenses(&self) -> &dyn ExpenseStore;
}
