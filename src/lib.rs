//! NutriLens: meal-photo nutrition logging against daily goals.

pub mod analysis;
pub mod app;
pub mod auth;
pub mod captures;
pub mod config;
pub mod days;
pub mod error;
pub mod foods;
pub mod nutrition;
pub mod profile;
pub mod state;
pub mod storage;
pub mod store;

