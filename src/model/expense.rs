use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use super::User;
use crate::ids;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExpenseAccount {
    pub id: String,
    pub name: String,
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ExpenseAccount {
    pub fn new(name: &str, user_id: &str) -> Self {
        Self {
            id: String::new(),
            name: name.trim().to_string(),
            user_id: user_id.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    pub fn pre_save(&mut self, now: OffsetDateTime) {
        if self.id.is_empty() {
            self.id = ids::new_id();
        }
        self.created_at = now;
        self.updated_at = now;
    }
}

impl fmt::Display for ExpenseAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpenseAccount<{}>", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExpenseCategory {
    pub id: String,
    pub name: String,
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ExpenseCategory {
    pub fn new(name: &str, user_id: &str) -> Self {
        Self {
            id: String::new(),
            name: name.trim().to_string(),
            user_id: user_id.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    pub fn pre_save(&mut self, now: OffsetDateTime) {
        if self.id.is_empty() {
            self.id = ids::new_id();
        }
        self.created_at = now;
        self.updated_at = now;
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpenseCategory<{}>", self.name)
    }
}

/// A single spend. Account and category are referenced by id; the nested
/// records are only populated by `ExpenseStore::get_by_id` and listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: String,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub user_id: String,
    pub account_id: String,
    pub category_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub account: Option<ExpenseAccount>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<ExpenseCategory>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<User>,
}

impl Expense {
    pub fn new(
        title: &str,
        amount: Decimal,
        date: OffsetDateTime,
        user_id: &str,
        account_id: &str,
        category_id: &str,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.trim().to_string(),
            amount,
            date,
            user_id: user_id.to_string(),
            account_id: account_id.to_string(),
            category_id: category_id.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            account: None,
            category: None,
            user: None,
        }
    }

    /// Always assigns a fresh id; expenses are never re-saved.
    pub fn pre_save(&mut self, now: OffsetDateTime) {
        self.id = ids::new_id();
        self.created_at = now;
        self.updated_at = now;
    }
}

impl fmt::Display for Expense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expense<{}>", self.id)
    }
}
