use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::{
    model::User,
    state::AppState,
    store::{AuthTokenStore, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Token missing")]
    MissingCredential,
    /// Unknown, expired and inactive tokens all land here.
    #[error("Token not found")]
    TokenNotFound,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error_message": self.to_string() })),
        )
            .into_response()
    }
}

/// Request-scoped authentication result. Built fresh for every request by
/// resolving the `Authorization` header; a handler that takes a `Context`
/// only runs once a live token has been found.
#[derive(Debug, Clone)]
pub struct Context {
    pub user: User,
}

/// Token key from the `Authorization` header. Accepts the raw key or
/// `Bearer <key>`.
pub fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let key = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    (!key.is_empty()).then_some(key)
}

/// Resolve a presented credential to its user. Store failures are treated as
/// an unknown token, never as success.
pub async fn authenticate(tokens: &dyn AuthTokenStore, credential: Option<&str>) -> Result<User, AuthError> {
    let key = credential.ok_or(AuthError::MissingCredential)?;

    let token = match tokens.find(key).await {
        Ok(t) => t,
        Err(StoreError::NotFound) => {
            warn!("auth token not found, expired or inactive");
            return Err(AuthError::TokenNotFound);
        }
        Err(e) => {
            error!(error = %e, "auth token lookup failed");
            return Err(AuthError::TokenNotFound);
        }
    };

    match token.user {
        Some(user) if user.id == token.user_id => {
            debug!(user_id = %user.id, "request authenticated");
            Ok(user)
        }
        _ => {
            warn!(user_id = %token.user_id, "auth token has no resolvable owner");
            Err(AuthError::TokenNotFound)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Context {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = authenticate(state.store.auth_tokens(), bearer_credential(&parts.headers)).await?;
        Ok(Context { user })
    }
}
