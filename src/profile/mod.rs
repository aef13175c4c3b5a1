mod dto;
pub mod handlers;
pub mod services;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/profile/settings", patch(handlers::patch_settings))
        .route(
            "/profile/suggested-calorie-goal",
            get(handlers::suggested_calorie_goal),
        )
        .route(
            "/profile/settings/apply-suggested-goal",
            post(handlers::apply_suggested_goal),
        )
}
