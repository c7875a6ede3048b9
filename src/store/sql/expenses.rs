use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::USER_COLUMNS;
use crate::{
    clock::Clock,
    model::{Expense, ExpenseAccount, ExpenseCategory, User},
    store::{ExpenseFilter, ExpenseStore, StoreError, StoreResult},
};

const EXPENSE_COLUMNS: &str =
    "id, title, amount, date, user_id, account_id, category_id, created_at, updated_at";

#[derive(Clone)]
pub struct SqlExpenseStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl SqlExpenseStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn account_opt(&self, id: &str) -> StoreResult<Option<ExpenseAccount>> {
        sqlx::query_as::<_, ExpenseAccount>(
            "SELECT id, name, user_id, created_at, updated_at FROM expense_accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::fetch)
    }

    async fn category_opt(&self, id: &str) -> StoreResult<Option<ExpenseCategory>> {
        sqlx::query_as::<_, ExpenseCategory>(
            "SELECT id, name, user_id, created_at, updated_at FROM expense_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::fetch)
    }
}

/// Distinct ids, sorted, for an `= ANY($1)` bind.
fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    ids.map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait]
impl ExpenseStore for SqlExpenseStore {
    async fn store(&self, expense: &mut Expense) -> StoreResult<()> {
        expense.pre_save(self.clock.now());
        sqlx::query(
            r#"
            INSERT INTO expenses (id, title, amount, date, user_id, account_id, category_id,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.title)
        .bind(expense.amount)
        .bind(expense.date)
        .bind(&expense.user_id)
        .bind(&expense.account_id)
        .bind(&expense.category_id)
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;

        debug!(expense_id = %expense.id, user_id = %expense.user_id, "expense stored");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Expense> {
        let mut expense =
            sqlx::query_as::<_, Expense>(&format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::fetch)?
                .ok_or(StoreError::NotFound)?;

        expense.account = self.account_opt(&expense.account_id).await?;
        expense.category = self.category_opt(&expense.category_id).await?;
        expense.user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(&expense.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::fetch)?;
        Ok(expense)
    }

    async fn get_expenses(&self, user_id: &str, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>> {
        let mut rows = sqlx::query_as::<_, Expense>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
              FROM expenses
             WHERE user_id = $1
               AND EXTRACT(YEAR FROM date AT TIME ZONE 'UTC')::int = $2
               AND EXTRACT(MONTH FROM date AT TIME ZONE 'UTC')::int = $3
             ORDER BY date, id
             LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(filter.year)
        .bind(filter.month)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch)?;

        if rows.is_empty() {
            return Ok(rows);
        }

        let account_ids = unique_ids(rows.iter().map(|e| e.account_id.as_str()));
        let accounts: HashMap<String, ExpenseAccount> = sqlx::query_as::<_, ExpenseAccount>(
            "SELECT id, name, user_id, created_at, updated_at FROM expense_accounts WHERE id = ANY($1)",
        )
        .bind(account_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch)?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();

        let category_ids = unique_ids(rows.iter().map(|e| e.category_id.as_str()));
        let categories: HashMap<String, ExpenseCategory> = sqlx::query_as::<_, ExpenseCategory>(
            "SELECT id, name, user_id, created_at, updated_at FROM expense_categories WHERE id = ANY($1)",
        )
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch)?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

        for e in &mut rows {
            e.account = accounts.get(&e.account_id).cloned();
            e.category = categories.get(&e.category_id).cloned();
        }
        Ok(rows)
    }

    async fn store_account(&self, account: &mut ExpenseAccount) -> StoreResult<()> {
        account.pre_save(self.clock.now());
        sqlx::query(
            r#"
            INSERT INTO expense_accounts (id, name, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.user_id)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;
        Ok(())
    }

    async fn get_accounts(&self, user_id: &str) -> StoreResult<Vec<ExpenseAccount>> {
        sqlx::query_as::<_, ExpenseAccount>(
            r#"
            SELECT id, name, user_id, created_at, updated_at
              FROM expense_accounts
             WHERE user_id = $1
             ORDER BY created_at, name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch)
    }

    async fn get_account_by_id(&self, id: &str) -> StoreResult<ExpenseAccount> {
        self.account_opt(id).await?.ok_or(StoreError::NotFound)
    }

    async fn delete_account(&self, account: &ExpenseAccount) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM expense_accounts WHERE id = $1")
            .bind(&account.id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::write)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::write(anyhow::anyhow!("account {} does not exist", account.id)));
        }
        Ok(())
    }

    async fn store_category(&self, category: &mut ExpenseCategory) -> StoreResult<()> {
        category.pre_save(self.clock.now());
        sqlx::query(
            r#"
            INSERT INTO expense_categories (id, name, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.user_id)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;
        Ok(())
    }

    async fn get_categories(&self, user_id: &str) -> StoreResult<Vec<ExpenseCategory>> {
        sqlx::query_as::<_, ExpenseCategory>(
            r#"
            SELECT id, name, user_id, created_at, updated_at
              FROM expense_categories
             WHERE user_id = $1
             ORDER BY created_at, name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::fetch)
    }

    async fn get_category_by_id(&self, id: &str) -> StoreResult<ExpenseCategory> {
        self.category_opt(id).await?.ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        store::sql::{test_support, SqlUserStore},
    };
    use rust_decimal::Decimal;
    use time::macros::datetime;

    #[test]
    fn page_ids_are_deduplicated() {
        let ids = unique_ids(["b", "a", "b", "a", "c"].into_iter());
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn store_filter_and_hydrate() {
        let pool = test_support::pool().await;
        let user = test_support::user(&SqlUserStore::new(pool.clone())).await;
        let store = SqlExpenseStore::new(pool, Arc::new(SystemClock));

        let mut account = ExpenseAccount::new("Cash", &user.id);
        store.store_account(&mut account).await.unwrap();
        let mut category = ExpenseCategory::new("Food", &user.id);
        store.store_category(&mut category).await.unwrap();

        for date in [datetime!(2024-05-02 10:00 UTC), datetime!(2024-06-02 10:00 UTC)] {
            let mut e = Expense::new("Lunch", Decimal::new(1250, 2), date, &user.id, &account.id, &category.id);
            store.store(&mut e).await.unwrap();
        }

        let may = store
            .get_expenses(&user.id, &ExpenseFilter::for_month(2024, 5))
            .await
            .unwrap();
        assert_eq!(may.len(), 1);
        assert_eq!(may[0].amount, Decimal::new(1250, 2));
        assert_eq!(may[0].account.as_ref().map(|a| a.name.as_str()), Some("Cash"));

        let full = store.get_by_id(&may[0].id).await.unwrap();
        assert_eq!(full.category, Some(category));
        assert_eq!(full.user.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn delete_account_roundtrip() {
        let pool = test_support::pool().await;
        let user = test_support::user(&SqlUserStore::new(pool.clone())).await;
        let store = SqlExpenseStore::new(pool, Arc::new(SystemClock));

        let mut account = ExpenseAccount::new("Old card", &user.id);
        store.store_account(&mut account).await.unwrap();
        assert_eq!(store.get_accounts(&user.id).await.unwrap().len(), 1);

        store.delete_account(&account).await.unwrap();
        assert!(store.get_account_by_id(&account.id).await.unwrap_err().is_not_found());
    }
}
