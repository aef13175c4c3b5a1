//! Capture → analyze → confirm flow for meal photos.

pub mod dto;
pub mod handlers;
pub mod registry;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/captures", post(handlers::submit_capture))
        .route("/captures/current", delete(handlers::dismiss_capture))
        .route("/captures/:id/confirm", post(handlers::confirm_capture))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}
