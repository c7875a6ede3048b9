use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use time::Duration;
use tracing::debug;

use super::USER_COLUMNS;
use crate::{
    clock::Clock,
    model::{AuthToken, User},
    store::{AuthTokenStore, StoreError, StoreResult},
};

#[derive(Clone)]
pub struct SqlAuthTokenStore {
    pool: PgPool,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SqlAuthTokenStore {
    pub fn new(pool: PgPool, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { pool, ttl, clock }
    }
}

#[async_trait]
impl AuthTokenStore for SqlAuthTokenStore {
    async fn create(&self, user: &User) -> StoreResult<AuthToken> {
        let token = AuthToken::issue(user, self.clock.now(), self.ttl);
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (key, user_id, expiry, active)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.key)
        .bind(&token.user_id)
        .bind(token.expiry)
        .bind(token.active)
        .execute(&self.pool)
        .await
        .map_err(StoreError::write)?;

        debug!(user_id = %user.id, expiry = %token.expiry, "auth token created");
        Ok(token)
    }

    async fn find(&self, key: &str) -> StoreResult<AuthToken> {
        // Expiry is checked here, at lookup time, against the host clock.
        let mut token = sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT key, user_id, expiry, active
              FROM auth_tokens
             WHERE key = $1 AND active AND expiry > $2
            "#,
        )
        .bind(key)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::fetch)?
        .ok_or(StoreError::NotFound)?;

        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(&token.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::fetch)?
            .ok_or(StoreError::NotFound)?;

        token.user = Some(user);
        Ok(token)
    }
}
