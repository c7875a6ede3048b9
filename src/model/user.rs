use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{
    auth::password::{CredentialHasher, HashingError},
    ids,
};

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
    pub name: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            id: String::new(),
            email: normalize_email(email),
            password_hash: String::new(),
            name: name.trim().to_string(),
            active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    pub fn set_password(&mut self, hasher: &CredentialHasher, plain: &str) -> Result<(), HashingError> {
        self.password_hash = hasher.hash(plain)?;
        Ok(())
    }

    pub fn check_password(&self, hasher: &CredentialHasher, plain: &str) -> bool {
        hasher.verify(plain, &self.password_hash)
    }

    /// Call before the first insert. The id is only ever assigned once.
    pub fn pre_save(&mut self, now: OffsetDateTime) {
        if self.id.is_empty() {
            self.id = ids::new_id();
        }
        self.created_at = now;
        self.updated_at = now;
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now;
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User<{}>", self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
