mod dto;
pub mod handlers;

use axum::{
    routing::{get, put},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/foods/recent", get(handlers::recent))
        .route("/foods/frequent", get(handlers::frequent))
        .route("/foods/favorites", get(handlers::favorites))
        .route(
            "/foods/favorites/:id",
            put(handlers::add_favorite).delete(handlers::remove_favorite),
        )
}
