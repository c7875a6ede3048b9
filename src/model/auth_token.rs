use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

use super::User;
use crate::ids;

/// Bearer credential issued at login or registration.
///
/// `user` is filled in by lookups for convenience only. Changing it never
/// reaches the users table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AuthToken {
    pub key: String,
    pub user_id: String,
    pub expiry: OffsetDateTime,
    pub active: bool,
    #[sqlx(skip)]
    pub user: Option<User>,
}

impl AuthToken {
    /// Fresh token for `user`, valid for `ttl` from `now`.
    pub fn issue(user: &User, now: OffsetDateTime, ttl: Duration) -> Self {
        Self {
            key: ids::generate_token_key(),
            user_id: user.id.clone(),
            expiry: now + ttl,
            active: true,
            user: Some(user.clone()),
        }
    }

    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.active && now < self.expiry
    }
}
