mod dto;
pub mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/days/:date/log", get(handlers::get_log))
        .route("/days/:date/summary", get(handlers::get_summary))
        .route("/days/:date/entries", post(handlers::add_entry))
        .route(
            "/days/:date/entries/:id",
            put(handlers::replace_entry).delete(handlers::delete_entry),
        )
        .route("/days/:date/entries/:id/photo", get(handlers::entry_photo))
        .route(
            "/days/:date/entries/from-history/:id",
            post(handlers::relog_from_history),
        )
}
