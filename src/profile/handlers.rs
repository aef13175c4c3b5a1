use axum::{extract::State, Json};
use tracing::{info, instrument};

use super::{dto::ProfileUpdate, services};
use crate::{
    auth::AuthUser,
    error::AppError,
    nutrition::{
        goals::{estimate_calorie_goal, CalorieEstimate},
        SettingsPatch, UserProfile, UserSettings,
    },
    state::AppState,
};

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(services::load_or_create(&state, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::Validation("displayName must not be empty".into()));
    }
    let mut profile = services::load_or_create(&state, user_id).await?;
    profile.display_name = display_name.to_string();
    profile.email = body.email.filter(|e| !e.trim().is_empty());
    profile.photo_ref = body.photo_ref.filter(|p| !p.trim().is_empty());
    services::save(&state, user_id, &profile).await?;
    Ok(Json(profile))
}

#[instrument(skip(state, patch))]
pub async fn patch_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<UserSettings>, AppError> {
    let mut profile = services::load_or_create(&state, user_id).await?;
    profile.settings = patch.apply(&profile.settings)?;
    services::save(&state, user_id, &profile).await?;
    Ok(Json(profile.settings))
}

#[instrument(skip(state))]
pub async fn suggested_calorie_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CalorieEstimate>, AppError> {
    let profile = services::load_or_create(&state, user_id).await?;
    Ok(Json(estimate_calorie_goal(&profile.settings)))
}

#[instrument(skip(state))]
pub async fn apply_suggested_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserSettings>, AppError> {
    let mut profile = services::load_or_create(&state, user_id).await?;
    let estimate = estimate_calorie_goal(&profile.settings);
    if estimate.calorie_goal == 0 {
        return Err(AppError::Validation(
            "suggested calorie goal is not positive; check body metrics".into(),
        ));
    }
    profile.settings.daily_calorie_goal = estimate.calorie_goal;
    services::save(&state, user_id, &profile).await?;
    info!(%user_id, calorie_goal = estimate.calorie_goal, "applied suggested calorie goal");
    Ok(Json(profile.settings))
}
