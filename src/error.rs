use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    analysis::AnalysisUnavailable,
    captures::registry::CaptureError,
    nutrition::{model::DayKeyError, EntryError, SettingsError},
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Could not analyze the photo. Dismiss and try again with a new capture.")]
    AnalysisUnavailable(#[from] AnalysisUnavailable),

    #[error("Photo analysis is not configured: set GEMINI_API_KEY")]
    SetupRequired,

    #[error("Could not save your changes; nothing was modified")]
    Persistence(#[source] anyhow::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    StaleCapture(String),

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AnalysisUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::SetupRequired | AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StaleCapture(_) => StatusCode::GONE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::AnalysisUnavailable(e) => warn!(reason = %e.reason, "analysis failed"),
            AppError::Persistence(e) => error!(error = ?e, "store write failed"),
            AppError::Internal(e) => error!(error = ?e, "internal error"),
            _ => {}
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<EntryError> for AppError {
    fn from(e: EntryError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<DayKeyError> for AppError {
    fn from(e: DayKeyError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::UNPROCESSABLE_ENTITY {
            AppError::Validation(e.body_text())
        } else {
            AppError::BadRequest(e.body_text())
        }
    }
}

impl From<CaptureError> for AppError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::InProgress | CaptureError::NotReady(_) => {
                AppError::Conflict(e.to_string())
            }
            CaptureError::Stale(_) => AppError::StaleCapture(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (
                AppError::from(AnalysisUnavailable::new("timeout")),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::SetupRequired, StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::Persistence(anyhow::anyhow!("disk full")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::NotFound("entry"), StatusCode::NOT_FOUND),
            (
                AppError::from(EntryError::EmptyName),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(CaptureError::InProgress),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(CaptureError::Stale(Uuid::nil())),
                StatusCode::GONE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn analysis_reason_is_not_shown_to_users() {
        let err = AppError::from(AnalysisUnavailable::new("status 403: API key invalid"));
        assert!(!err.to_string().contains("403"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
