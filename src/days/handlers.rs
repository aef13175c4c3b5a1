use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{EntryInput, RelogRequest};
use crate::{
    auth::AuthUser,
    error::AppError,
    nutrition::{goals, DailyLog, DayKey, MealEntry},
    profile,
    state::AppState,
    storage::PHOTO_URL_TTL_SECS,
};

/// `today` resolves in the service's configured offset.
fn resolve_day(state: &AppState, raw: &str) -> Result<DayKey, AppError> {
    if raw.eq_ignore_ascii_case("today") {
        return Ok(state.today());
    }
    Ok(raw.parse()?)
}

async fn load_day(state: &AppState, user_id: Uuid, day: DayKey) -> Result<DailyLog, AppError> {
    state
        .store
        .query(user_id, day)
        .await
        .map_err(AppError::Persistence)
}

async fn find_entry(
    state: &AppState,
    user_id: Uuid,
    day: DayKey,
    id: Uuid,
) -> Result<MealEntry, AppError> {
    load_day(state, user_id, day)
        .await?
        .find(id)
        .cloned()
        .ok_or(AppError::NotFound("entry"))
}

/// History is a convenience; a failure here never undoes a logged entry.
async fn record_history(state: &AppState, user_id: Uuid, entry: &MealEntry) {
    if let Err(e) = state.store.record_use(user_id, entry).await {
        warn!(error = ?e, %user_id, entry_id = %entry.id, "food history not updated");
    }
}

#[instrument(skip(state))]
pub async fn get_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<DailyLog>, AppError> {
    let day = resolve_day(&state, &date)?;
    Ok(Json(load_day(&state, user_id, day).await?))
}

#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<goals::GoalProgress>, AppError> {
    let day = resolve_day(&state, &date)?;
    let log = load_day(&state, user_id, day).await?;
    let profile = profile::services::load_or_create(&state, user_id).await?;
    Ok(Json(goals::evaluate(day, log.totals(), &profile.settings)))
}

#[instrument(skip(state, body))]
pub async fn add_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
    Json(body): Json<EntryInput>,
) -> Result<(StatusCode, Json<MealEntry>), AppError> {
    let day = resolve_day(&state, &date)?;
    let entry = body.into_entry(Uuid::new_v4(), OffsetDateTime::now_utc(), None)?;
    state
        .store
        .add(user_id, day, entry.clone())
        .await
        .map_err(AppError::Persistence)?;
    record_history(&state, user_id, &entry).await;
    info!(%user_id, %day, entry_id = %entry.id, "entry logged");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state, body))]
pub async fn replace_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((date, id)): Path<(String, Uuid)>,
    Json(body): Json<EntryInput>,
) -> Result<Json<MealEntry>, AppError> {
    let day = resolve_day(&state, &date)?;
    let old = find_entry(&state, user_id, day, id).await?;
    let new = body.into_entry(old.id, old.created_at, old.image_ref.clone())?;
    state
        .store
        .update(user_id, day, &old, new.clone())
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(new))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((date, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let day = resolve_day(&state, &date)?;
    let entry = find_entry(&state, user_id, day, id).await?;
    let removed = state
        .store
        .remove(user_id, day, id)
        .await
        .map_err(AppError::Persistence)?;
    if !removed {
        return Err(AppError::NotFound("entry"));
    }
    if let (Some(key), Some(storage)) = (&entry.image_ref, &state.storage) {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = ?e, %key, "entry photo not deleted");
        }
    }
    info!(%user_id, %day, entry_id = %id, "entry removed");
    Ok(StatusCode::NO_CONTENT)
}

/// 302 to a short-lived link for the entry's photo.
#[instrument(skip(state))]
pub async fn entry_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((date, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let day = resolve_day(&state, &date)?;
    let entry = find_entry(&state, user_id, day, id).await?;
    let key = entry.image_ref.ok_or(AppError::NotFound("photo"))?;
    let storage = state.storage.as_ref().ok_or(AppError::NotFound("photo"))?;
    let url = storage
        .presign_get(&key, PHOTO_URL_TTL_SECS)
        .await
        .map_err(AppError::Internal)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}

#[instrument(skip(state, body))]
pub async fn relog_from_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((date, id)): Path<(String, Uuid)>,
    body: Result<Json<RelogRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MealEntry>), AppError> {
    let day = resolve_day(&state, &date)?;
    // No body at all means "same slot, one serving"; a body must be valid.
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => RelogRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let history = state
        .store
        .history_item(user_id, id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::NotFound("history item"))?;

    let entry = history.item.relogged(
        req.meal_type.unwrap_or(history.item.meal_type),
        req.quantity.unwrap_or(1.0),
    );
    entry.validate()?;
    state
        .store
        .add(user_id, day, entry.clone())
        .await
        .map_err(AppError::Persistence)?;
    record_history(&state, user_id, &history.item).await;
    info!(%user_id, %day, entry_id = %entry.id, from = %id, "entry re-logged from history");
    Ok((StatusCode::CREATED, Json(entry)))
}
