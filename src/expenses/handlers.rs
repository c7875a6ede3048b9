use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::Context,
    error::{json_body, ApiError},
    model::{Expense, ExpenseAccount, ExpenseCategory},
    state::AppState,
    store::{ExpenseFilter, ExpenseQuery, StoreError, StoreResult},
    validation::{PayloadErrors, NOT_FOUND},
};

use super::dto::{CreateExpenseRequest, NamedRequest};

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses/", get(list_expenses).post(create_expense))
        .route("/expenses/accounts/", get(list_accounts).post(create_account))
        .route("/expenses/accounts/:id/", delete(delete_account))
        .route("/expenses/categories/", get(list_categories).post(create_category))
        .route("/expenses/:id/", get(get_expense))
}

/// `NotFound` becomes `None`; anything else is a real failure.
fn found<T>(res: StoreResult<T>) -> Result<Option<T>, ApiError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, ctx, body), fields(user_id = %ctx.user.id))]
pub async fn create_expense(
    State(state): State<AppState>,
    ctx: Context,
    body: Result<Json<CreateExpenseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let payload = json_body(body)?;
    let new = payload.validate().map_err(ApiError::Validation)?;
    let expenses = state.store.expenses();

    let mut errs = PayloadErrors::default();
    let account = found(expenses.get_account_by_id(&new.account_id).await)?
        .filter(|a| a.user_id == ctx.user.id);
    if account.is_none() {
        errs.add("account_id", NOT_FOUND);
    }
    let category = found(expenses.get_category_by_id(&new.category_id).await)?
        .filter(|c| c.user_id == ctx.user.id);
    if category.is_none() {
        errs.add("category_id", NOT_FOUND);
    }
    if !errs.is_empty() {
        warn!(account_id = %new.account_id, category_id = %new.category_id, "expense references unknown records");
        return Err(ApiError::Validation(errs));
    }

    let mut expense = Expense::new(
        &new.title,
        new.amount,
        new.date,
        &ctx.user.id,
        &new.account_id,
        &new.category_id,
    );
    expenses.store(&mut expense).await?;
    expense.account = account;
    expense.category = category;

    info!(expense_id = %expense.id, "expense created");
    Ok((StatusCode::CREATED, Json(expense)))
}

#[instrument(skip(state, ctx), fields(user_id = %ctx.user.id))]
pub async fn list_expenses(
    State(state): State<AppState>,
    ctx: Context,
    Query(q): Query<ExpenseQuery>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let filter = ExpenseFilter::from_query(&q, state.clock.now().date());
    let rows = state.store.expenses().get_expenses(&ctx.user.id, &filter).await?;
    Ok(Json(rows))
}

#[instrument(skip(state, ctx), fields(user_id = %ctx.user.id))]
pub async fn get_expense(
    State(state): State<AppState>,
    ctx: Context,
    Path(id): Path<String>,
) -> Result<Json<Expense>, ApiError> {
    let expense = state.store.expenses().get_by_id(&id).await?;
    // Someone else's expense looks exactly like a missing one.
    if expense.user_id != ctx.user.id {
        return Err(ApiError::NotFound);
    }
    Ok(Json(expense))
}

#[instrument(skip(state, ctx), fields(user_id = %ctx.user.id))]
pub async fn list_accounts(
    State(state): State<AppState>,
    ctx: Context,
) -> Result<Json<Vec<ExpenseAccount>>, ApiError> {
    Ok(Json(state.store.expenses().get_accounts(&ctx.user.id).await?))
}

#[instrument(skip(state, ctx, body), fields(user_id = %ctx.user.id))]
pub async fn create_account(
    State(state): State<AppState>,
    ctx: Context,
    body: Result<Json<NamedRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExpenseAccount>), ApiError> {
    let payload = json_body(body)?;
    payload.validate().map_err(ApiError::Validation)?;

    let mut account = ExpenseAccount::new(&payload.name, &ctx.user.id);
    state.store.expenses().store_account(&mut account).await?;

    info!(account_id = %account.id, "account created");
    Ok((StatusCode::CREATED, Json(account)))
}

#[instrument(skip(state, ctx), fields(user_id = %ctx.user.id))]
pub async fn delete_account(
    State(state): State<AppState>,
    ctx: Context,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let expenses = state.store.expenses();
    let account = expenses.get_account_by_id(&id).await?;
    if account.user_id != ctx.user.id {
        warn!(account_id = %id, "delete of foreign account");
        return Err(ApiError::Forbidden);
    }
    expenses.delete_account(&account).await?;

    info!(account_id = %id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, ctx), fields(user_id = %ctx.user.id))]
pub async fn list_categories(
    State(state): State<AppState>,
    ctx: Context,
) -> Result<Json<Vec<ExpenseCategory>>, ApiError> {
    Ok(Json(state.store.expenses().get_categories(&ctx.user.id).await?))
}

#[instrument(skip(state, ctx, body), fields(user_id = %ctx.user.id))]
pub async fn create_category(
    State(state): State<AppState>,
    ctx: Context,
    body: Result<Json<NamedRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExpenseCategory>), ApiError> {
    let payload = json_body(body)?;
    payload.validate().map_err(ApiError::Validation)?;

    let mut category = ExpenseCategory::new(&payload.name, &ctx.user.id);
    state.store.expenses().store_category(&mut category).await?;

    info!(category_id = %category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}
