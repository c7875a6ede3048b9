//! Postgres implementation. Every method is a single statement or a run of
//! independent reads; there are no multi-step transactions.

use std::sync::Arc;

use sqlx::PgPool;
use time::Duration;

use super::{AuthTokenStore, ExpenseStore, Store, UserStore};
use crate::{
    clock::{Clock, SystemClock},
    config::AuthConfig,
};

mod auth_tokens;
mod expenses;
mod users;

pub use auth_tokens::SqlAuthTokenStore;
pub use expenses::SqlExpenseStore;
pub use users::SqlUserStore;

const USER_COLUMNS: &str = "id, email, password_hash, name, active, created_at, updated_at";

#[derive(Clone)]
pub struct SqlStore {
    users: SqlUserStore,
    auth_tokens: SqlAuthTokenStore,
    expenses: SqlExpenseStore,
}

impl SqlStore {
    pub fn new(pool: PgPool, auth: &AuthConfig) -> Self {
        Self::with_clock(pool, auth, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, auth: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: SqlUserStore::new(pool.clone()),
            auth_tokens: SqlAuthTokenStore::new(
                pool.clone(),
                Duration::hours(auth.token_ttl_hours),
                clock.clone(),
            ),
            expenses: SqlExpenseStore::new(pool, clock),
        }
    }
}

impl Store for SqlStore {
    fn users(&self) -> &dyn UserStore {
        &self.users
    }

    fn auth_tokens(&self) -> &dyn AuthTokenStore {
        &self.auth_tokens
    }

    fn expenses(&self) -> &dyn ExpenseStore {
        &self.expenses
    }
}
