//! In-process store. Backs the test suite and runs the server when no
//! `DATABASE_URL` is configured. Nothing survives a restart.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::{Duration, UtcOffset};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthTokenStore, ExpenseFilter, ExpenseStore, Store, StoreError, StoreResult, UserStore};
use crate::{
    clock::{Clock, SystemClock},
    model::{AuthToken, Expense, ExpenseAccount, ExpenseCategory, User},
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    tokens: HashMap<String, AuthToken>,
    accounts: HashMap<String, ExpenseAccount>,
    categories: HashMap<String, ExpenseCategory>,
    expenses: HashMap<String, Expense>,
}

#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
}

impl MemoryStore {
    pub fn new(token_ttl: Duration) -> Self {
        Self::with_clock(token_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(token_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            clock,
            token_ttl,
        }
    }

    /// Insert a token as-is, bypassing key generation. Lets tests plant
    /// expired or deactivated tokens.
    pub async fn put_token(&self, token: AuthToken) {
        let mut t = self.tables.write().await;
        t.tokens.insert(token.key.clone(), token);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::hours(72))
    }
}

impl Store for MemoryStore {
    fn users(&self) -> &dyn UserStore {
        self
    }

    fn auth_tokens(&self) -> &dyn AuthTokenStore {
        self
    }

    fn expenses(&self) -> &dyn ExpenseStore {
        self
    }
}

fn duplicate(what: &str, value: &str) -> StoreError {
    StoreError::write(anyhow::anyhow!("{what} {value:?} already exists"))
}

fn dangling(what: &str, value: &str) -> StoreError {
    StoreError::write(anyhow::anyhow!("{what} {value:?} does not exist"))
}

impl Tables {
    /// Same references the SQL schema guards with foreign keys.
    fn check_expense_refs(&self, e: &Expense) -> StoreResult<()> {
        if !self.users.contains_key(&e.user_id) {
            return Err(dangling("user", &e.user_id));
        }
        if !self.accounts.contains_key(&e.account_id) {
            return Err(dangling("account", &e.account_id));
        }
        if !self.categories.contains_key(&e.category_id) {
            return Err(dangling("category", &e.category_id));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: &str) -> StoreResult<User> {
        let t = self.tables.read().await;
        t.users.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn store(&self, user: &User) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.users.contains_key(&user.id) {
            return Err(duplicate("user id", &user.id));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(duplicate("email", &user.email));
        }
        t.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user.id) {
            return Err(StoreError::write(anyhow::anyhow!("user {} does not exist", user.id)));
        }
        if t.users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(duplicate("email", &user.email));
        }
        t.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

#[async_trait]
impl AuthTokenStore for MemoryStore {
    async fn create(&self, user: &User) -> StoreResult<AuthToken> {
        let token = AuthToken::issue(user, self.clock.now(), self.token_ttl);
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user.id) {
            return Err(StoreError::write(anyhow::anyhow!("token owner {} does not exist", user.id)));
        }
        if t.tokens.contains_key(&token.key) {
            return Err(duplicate("token key", "<redacted>"));
        }
        let mut stored = token.clone();
        stored.user = None;
        t.tokens.insert(stored.key.clone(), stored);
        debug!(user_id = %user.id, "auth token created");
        Ok(token)
    }

    async fn find(&self, key: &str) -> StoreResult<AuthToken> {
        let now = self.clock.now();
        let t = self.tables.read().await;
        let token = t
            .tokens
            .get(key)
            .filter(|tok| tok.is_valid_at(now))
            .ok_or(StoreError::NotFound)?;
        let user = t.users.get(&token.user_id).ok_or(StoreError::NotFound)?;
        Ok(AuthToken {
            user: Some(user.clone()),
            ..token.clone()
        })
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn store(&self, expense: &mut Expense) -> StoreResult<()> {
        expense.pre_save(self.clock.now());
        let mut row = expense.clone();
        row.account = None;
        row.category = None;
        row.user = None;
        let mut t = self.tables.write().await;
        t.check_expense_refs(&row)?;
        t.expenses.insert(row.id.clone(), row);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Expense> {
        let t = self.tables.read().await;
        let mut expense = t.expenses.get(id).cloned().ok_or(StoreError::NotFound)?;
        expense.account = t.accounts.get(&expense.account_id).cloned();
        expense.category = t.categories.get(&expense.category_id).cloned();
        expense.user = t.users.get(&expense.user_id).cloned();
        Ok(expense)
    }

    async fn get_expenses(&self, user_id: &str, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Expense> = t
            .expenses
            .values()
            .filter(|e| {
                e.user_id == user_id && filter.matches(e.date.to_offset(UtcOffset::UTC).date())
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        Ok(rows
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .map(|mut e| {
                e.account = t.accounts.get(&e.account_id).cloned();
                e.category = t.categories.get(&e.category_id).cloned();
                e
            })
            .collect())
    }

    async fn store_account(&self, account: &mut ExpenseAccount) -> StoreResult<()> {
        account.pre_save(self.clock.now());
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&account.user_id) {
            return Err(dangling("user", &account.user_id));
        }
        if t.accounts.contains_key(&account.id) {
            return Err(duplicate("account id", &account.id));
        }
        t.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_accounts(&self, user_id: &str) -> StoreResult<Vec<ExpenseAccount>> {
        let t = self.tables.read().await;
        let mut rows: Vec<ExpenseAccount> = t
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn get_account_by_id(&self, id: &str) -> StoreResult<ExpenseAccount> {
        let t = self.tables.read().await;
        t.accounts.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete_account(&self, account: &ExpenseAccount) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.expenses.values().any(|e| e.account_id == account.id) {
            return Err(StoreError::write(anyhow::anyhow!(
                "account {} is still referenced by expenses",
                account.id
            )));
        }
        t.accounts
            .remove(&account.id)
            .map(|_| ())
            .ok_or_else(|| StoreError::write(anyhow::anyhow!("account {} does not exist", account.id)))
    }

    async fn store_category(&self, category: &mut ExpenseCategory) -> StoreResult<()> {
        category.pre_save(self.clock.now());
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&category.user_id) {
            return Err(dangling("user", &category.user_id));
        }
        if t.categories.contains_key(&category.id) {
            return Err(duplicate("category id", &category.id));
        }
        t.categories.insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn get_categories(&self, user_id: &str) -> StoreResult<Vec<ExpenseCategory>> {
        let t = self.tables.read().await;
        let mut rows: Vec<ExpenseCategory> = t
            .categories
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn get_category_by_id(&self, id: &str) -> StoreResult<ExpenseCategory> {
        let t = self.tables.read().await;
        t.categories.get(id).cloned().ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, store::ExpenseFilter};
    use rust_decimal::Decimal;
    use time::macros::datetime;

    fn setup() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(datetime!(2024-05-10 09:00 UTC));
        let store = MemoryStore::with_clock(Duration::hours(72), Arc::new(clock.clone()));
        (store, clock)
    }

    async fn registered(store: &MemoryStore, email: &str) -> User {
        let mut user = User::new(email, "Test");
        user.password_hash = "hash".into();
        user.pre_save(datetime!(2024-05-01 00:00 UTC));
        store.users().store(&user).await.unwrap();
        user
    }

    async fn account_and_category(store: &MemoryStore, user: &User) -> (ExpenseAccount, ExpenseCategory) {
        let mut account = ExpenseAccount::new("Cash", &user.id);
        store.expenses().store_account(&mut account).await.unwrap();
        let mut category = ExpenseCategory::new("Food", &user.id);
        store.expenses().store_category(&mut category).await.unwrap();
        (account, category)
    }

    #[tokio::test]
    async fn user_lookup_by_id_and_email() {
        let (store, _) = setup();
        let user = registered(&store, "alice@example.com").await;

        assert_eq!(store.users().get_by_id(&user.id).await.unwrap(), user);
        assert_eq!(store.users().get_by_email("alice@example.com").await.unwrap().id, user.id);
        assert!(store.users().get_by_id("nope").await.unwrap_err().is_not_found());
        assert!(store.users().get_by_email("bob@example.com").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (store, _) = setup();
        registered(&store, "alice@example.com").await;

        let mut again = User::new("alice@example.com", "Other");
        again.pre_save(datetime!(2024-05-02 00:00 UTC));
        let err = store.users().store(&again).await.unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));
    }

    #[tokio::test]
    async fn update_changes_profile() {
        let (store, _) = setup();
        let mut user = registered(&store, "alice@example.com").await;
        user.name = "Alice Liddell".into();
        store.users().update(&user).await.unwrap();
        assert_eq!(store.users().get_by_id(&user.id).await.unwrap().name, "Alice Liddell");

        let ghost = User::new("ghost@example.com", "");
        assert!(store.users().update(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn created_token_resolves_until_expiry() {
        let (store, clock) = setup();
        let user = registered(&store, "alice@example.com").await;

        let token = store.auth_tokens().create(&user).await.unwrap();
        assert_eq!(token.expiry, datetime!(2024-05-13 09:00 UTC));

        let found = store.auth_tokens().find(&token.key).await.unwrap();
        assert_eq!(found.user_id, user.id);
        assert_eq!(found.user.as_ref().map(|u| u.email.as_str()), Some("alice@example.com"));

        clock.advance(Duration::hours(71) + Duration::minutes(59));
        assert!(store.auth_tokens().find(&token.key).await.is_ok());

        clock.advance(Duration::minutes(1));
        assert!(store.auth_tokens().find(&token.key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn find_is_uniform_for_unknown_expired_and_inactive() {
        let (store, clock) = setup();
        let user = registered(&store, "alice@example.com").await;

        let mut inactive = AuthToken::issue(&user, clock.now(), Duration::hours(72));
        inactive.active = false;
        let expired = AuthToken::issue(&user, clock.now() - Duration::hours(100), Duration::hours(72));
        store.put_token(inactive.clone()).await;
        store.put_token(expired.clone()).await;

        for key in ["never-issued", inactive.key.as_str(), expired.key.as_str()] {
            let err = store.auth_tokens().find(key).await.unwrap_err();
            assert!(err.is_not_found(), "{key} should be NotFound");
        }
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_a_write_error() {
        let (store, _) = setup();
        let mut stranger = User::new("x@y.zz", "");
        stranger.pre_save(datetime!(2024-05-01 00:00 UTC));
        assert!(matches!(
            store.auth_tokens().create(&stranger).await,
            Err(StoreError::Write(_))
        ));
    }

    #[tokio::test]
    async fn expenses_are_scoped_filtered_and_paged() {
        let (store, _) = setup();
        let alice = registered(&store, "alice@example.com").await;
        let bob = registered(&store, "bob@example.com").await;
        let (a, c) = account_and_category(&store, &alice).await;
        let (b_a, b_c) = account_and_category(&store, &bob).await;

        let dates = [
            datetime!(2024-05-01 10:00 UTC),
            datetime!(2024-05-15 10:00 UTC),
            datetime!(2024-05-31 23:00 UTC),
            datetime!(2024-06-01 00:00 UTC),
            datetime!(2023-05-15 10:00 UTC),
        ];
        for d in dates {
            let mut e = Expense::new("x", Decimal::from(5), d, &alice.id, &a.id, &c.id);
            store.expenses().store(&mut e).await.unwrap();
        }
        let mut other = Expense::new("y", Decimal::from(9), datetime!(2024-05-03 10:00 UTC), &bob.id, &b_a.id, &b_c.id);
        store.expenses().store(&mut other).await.unwrap();

        let may = store
            .expenses()
            .get_expenses(&alice.id, &ExpenseFilter::for_month(2024, 5))
            .await
            .unwrap();
        assert_eq!(may.len(), 3);
        assert!(may.iter().all(|e| e.user_id == alice.id));

        let page = ExpenseFilter { limit: 2, offset: 2, ..ExpenseFilter::for_month(2024, 5) };
        let rest = store.expenses().get_expenses(&alice.id, &page).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn get_by_id_hydrates_relations() {
        let (store, _) = setup();
        let user = registered(&store, "alice@example.com").await;
        let mut account = ExpenseAccount::new("Grocery", &user.id);
        store.expenses().store_account(&mut account).await.unwrap();
        let mut category = ExpenseCategory::new("Food", &user.id);
        store.expenses().store_category(&mut category).await.unwrap();

        let mut e = Expense::new(
            "Milk",
            Decimal::new(1999, 2),
            datetime!(2024-05-02 08:00 UTC),
            &user.id,
            &account.id,
            &category.id,
        );
        store.expenses().store(&mut e).await.unwrap();
        assert!(!e.id.is_empty());

        let got = store.expenses().get_by_id(&e.id).await.unwrap();
        assert_eq!(got.amount, Decimal::new(1999, 2));
        assert_eq!(got.account, Some(account));
        assert_eq!(got.category, Some(category));
        assert_eq!(got.user.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn accounts_are_per_user_and_deletable() {
        let (store, _) = setup();
        let alice = registered(&store, "alice@example.com").await;
        let bob = registered(&store, "bob@example.com").await;

        let mut cash = ExpenseAccount::new("Cash", &alice.id);
        store.expenses().store_account(&mut cash).await.unwrap();
        let mut card = ExpenseAccount::new("Card", &bob.id);
        store.expenses().store_account(&mut card).await.unwrap();

        let mine = store.expenses().get_accounts(&alice.id).await.unwrap();
        assert_eq!(mine, vec![cash.clone()]);

        store.expenses().delete_account(&cash).await.unwrap();
        assert!(store.expenses().get_account_by_id(&cash.id).await.unwrap_err().is_not_found());
        assert!(store.expenses().delete_account(&cash).await.is_err());
    }

    #[tokio::test]
    async fn account_in_use_cannot_be_deleted() {
        let (store, _) = setup();
        let user = registered(&store, "alice@example.com").await;
        let (cash, food) = account_and_category(&store, &user).await;
        let mut e = Expense::new("x", Decimal::ONE, datetime!(2024-05-02 08:00 UTC), &user.id, &cash.id, &food.id);
        store.expenses().store(&mut e).await.unwrap();

        assert!(matches!(
            store.expenses().delete_account(&cash).await,
            Err(StoreError::Write(_))
        ));
    }

    #[tokio::test]
    async fn expense_with_dangling_refs_is_a_write_error() {
        let (store, _) = setup();
        let user = registered(&store, "alice@example.com").await;
        let (account, category) = account_and_category(&store, &user).await;
        let date = datetime!(2024-05-02 08:00 UTC);

        let cases = [
            ("no-such-user", account.id.as_str(), category.id.as_str()),
            (user.id.as_str(), "no-such-account", category.id.as_str()),
            (user.id.as_str(), account.id.as_str(), "no-such-category"),
        ];
        for (user_id, account_id, category_id) in cases {
            let mut e = Expense::new("x", Decimal::ONE, date, user_id, account_id, category_id);
            assert!(
                matches!(store.expenses().store(&mut e).await, Err(StoreError::Write(_))),
                "{user_id}/{account_id}/{category_id}"
            );
        }
        assert!(store
            .expenses()
            .get_expenses(&user.id, &ExpenseFilter::for_month(2024, 5))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn account_and_category_need_an_owner() {
        let (store, _) = setup();
        let mut account = ExpenseAccount::new("Cash", "no-such-user");
        assert!(matches!(
            store.expenses().store_account(&mut account).await,
            Err(StoreError::Write(_))
        ));
        let mut category = ExpenseCategory::new("Food", "no-such-user");
        assert!(matches!(
            store.expenses().store_category(&mut category).await,
            Err(StoreError::Write(_))
        ));
    }
}
