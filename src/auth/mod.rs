use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;

pub use extractors::{authenticate, AuthError, Context};

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
