mod auth_token;
mod expense;
mod user;

pub use auth_token::AuthToken;
pub use expense::{Expense, ExpenseAccount, ExpenseCategory};
pub use user::{normalize_email, User};
