use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CaptureRequest, CaptureResponse, ConfirmRequest},
    services,
};
use crate::{
    analysis::EncodedImage,
    auth::AuthUser,
    error::AppError,
    nutrition::{DayKey, MealEntry},
    state::AppState,
};

/// Runs one analysis for the submitted photo. If the capture is dismissed
/// while the model is answering, the result is discarded and 410 returned.
#[instrument(skip(state, body))]
pub async fn submit_capture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, AppError> {
    let bridge = state.analysis()?.clone();
    let image = EncodedImage::from_client(&body.image);
    if image.data.is_empty() {
        return Err(AppError::BadRequest("image must not be empty".into()));
    }

    let ticket = state.captures.open(user_id, image.clone()).await?;
    let capture_id = ticket.id();
    let analysis = match bridge.analyze(&image).await {
        Ok(analysis) => analysis,
        Err(e) => {
            ticket.fail().await;
            return Err(e.into());
        }
    };
    ticket.complete(analysis.clone()).await?;
    info!(%user_id, %capture_id, food = %analysis.food_name, "capture analyzed");
    Ok(Json(CaptureResponse {
        capture_id,
        analysis,
    }))
}

#[instrument(skip(state))]
pub async fn dismiss_capture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> StatusCode {
    state.captures.dismiss(user_id).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub date: DayKey,
    pub entry: MealEntry,
}

#[instrument(skip(state, edits))]
pub async fn confirm_capture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(capture_id): Path<Uuid>,
    Json(edits): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<ConfirmResponse>), AppError> {
    let (date, entry) = services::confirm(&state, user_id, capture_id, edits).await?;
    Ok((StatusCode::CREATED, Json(ConfirmResponse { date, entry })))
}
