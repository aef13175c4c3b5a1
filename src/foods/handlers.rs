use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::Limit;
use crate::{
    auth::AuthUser,
    error::AppError,
    state::AppState,
    store::{Favorite, FoodHistoryEntry},
};

#[instrument(skip(state))]
pub async fn recent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<Limit>,
) -> Result<Json<Vec<FoodHistoryEntry>>, AppError> {
    let items = state
        .store
        .recent(user_id, q.resolve())
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn frequent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<Limit>,
) -> Result<Json<Vec<FoodHistoryEntry>>, AppError> {
    let items = state
        .store
        .frequent(user_id, q.resolve())
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Favorite>>, AppError> {
    let items = state
        .store
        .favorites(user_id)
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(items))
}

/// Favorites are picked from food history by item id.
#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let history = state
        .store
        .history_item(user_id, id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::NotFound("history item"))?;
    state
        .store
        .add_favorite(user_id, &history.item)
        .await
        .map_err(AppError::Persistence)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .store
        .remove_favorite(user_id, id)
        .await
        .map_err(AppError::Persistence)?;
    if !removed {
        return Err(AppError::NotFound("favorite"));
    }
    Ok(StatusCode::NO_CONTENT)
}
