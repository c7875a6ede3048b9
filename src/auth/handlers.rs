use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest},
        extractors::Context,
    },
    error::{json_body, ApiError},
    model::{normalize_email, User},
    state::AppState,
    store::StoreError,
};

const EMAIL_TAKEN: &str = "Email already registered";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", post(register))
        .route("/users/login/", post(login))
        .route("/users/profile/", get(get_profile).put(update_profile))
}

/// A write that lost a race on the unique email surfaces as a conflict, not
/// as a storage failure.
async fn conflict_or(state: &AppState, user: &User, err: StoreError) -> ApiError {
    if let StoreError::Write(_) = &err {
        if let Ok(owner) = state.store.users().get_by_email(&user.email).await {
            if owner.id != user.id {
                warn!(email = %user.email, "email claimed concurrently");
                return ApiError::Conflict(EMAIL_TAKEN);
            }
        }
    }
    err.into()
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let payload = json_body(body)?;
    payload.validate().map_err(ApiError::Validation)?;

    let email = normalize_email(&payload.email);
    match state.store.users().get_by_email(&email).await {
        Ok(_) => {
            warn!(%email, "email already registered");
            return Err(ApiError::Conflict(EMAIL_TAKEN));
        }
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let mut user = User::new(&email, &payload.name);
    user.set_password(&state.hasher, &payload.password)?;
    user.pre_save(state.clock.now());
    if let Err(e) = state.store.users().store(&user).await {
        return Err(conflict_or(&state, &user, e).await);
    }

    let token = state.store.auth_tokens().create(&user).await?;

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            auth_token: token.key,
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    const INVALID_CREDENTIALS: &str = "Invalid email or password.";

    let payload = json_body(body)?;
    payload.validate().map_err(ApiError::Validation)?;

    let email = normalize_email(&payload.email);
    let user = match state.store.users().get_by_email(&email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            warn!(%email, "login unknown email");
            return Err(ApiError::BadRequest(INVALID_CREDENTIALS));
        }
        Err(e) => return Err(e.into()),
    };

    if !user.active || !user.check_password(&state.hasher, &payload.password) {
        warn!(user_id = %user.id, "login rejected");
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS));
    }

    let token = state.store.auth_tokens().create(&user).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            auth_token: token.key,
        }),
    ))
}

#[instrument(skip(ctx), fields(user_id = %ctx.user.id))]
pub async fn get_profile(ctx: Context) -> Json<User> {
    Json(ctx.user)
}

#[instrument(skip(state, ctx, body), fields(user_id = %ctx.user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    ctx: Context,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let payload = json_body(body)?;
    payload.validate().map_err(ApiError::Validation)?;

    // Work on a copy; the token's user is a read-only snapshot.
    let mut user = ctx.user.clone();
    if let Some(email) = payload.email.as_deref().map(normalize_email) {
        if email != user.email {
            match state.store.users().get_by_email(&email).await {
                Ok(_) => return Err(ApiError::Conflict(EMAIL_TAKEN)),
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
            user.email = email;
        }
    }
    if let Some(name) = payload.name {
        user.name = name.trim().to_string();
    }
    user.touch(state.clock.now());
    if let Err(e) = state.store.users().update(&user).await {
        return Err(conflict_or(&state, &user, e).await);
    }

    info!("profile updated");
    Ok(Json(user))
}
