//! Persistence for meal logs, profiles and food history.
//!
//! Two interchangeable backends implement the same traits: [`local::LocalStore`]
//! keeps JSON records in a key-value store (files on disk), and
//! [`remote::PgStore`] keeps one JSON document per day in PostgreSQL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::{DailyLog, DayKey, MealEntry, UserProfile};

pub mod history;
pub mod kv;
pub mod local;
pub mod remote;

/// A previously logged item, ranked by recency or frequency for quick re-logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodHistoryEntry {
    pub item: MealEntry,
    #[serde(with = "time::serde::rfc3339")]
    pub last_used: OffsetDateTime,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub item: MealEntry,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

/// Day-keyed meal entries.
///
/// Implementations serialize read-modify-write of a single (user, day) and
/// recompute the day's totals after each slot mutation, before writing.
#[async_trait]
pub trait MealLogStore: Send + Sync {
    async fn add(&self, user: Uuid, day: DayKey, entry: MealEntry) -> anyhow::Result<()>;

    /// Returns `false` when no entry with `entry_id` was logged on `day`.
    async fn remove(&self, user: Uuid, day: DayKey, entry_id: Uuid) -> anyhow::Result<bool>;

    async fn query(&self, user: Uuid, day: DayKey) -> anyhow::Result<DailyLog>;

    /// Removes `old` and adds `new` in one write, so a failure leaves the day
    /// as it was.
    async fn update(
        &self,
        user: Uuid,
        day: DayKey,
        old: &MealEntry,
        new: MealEntry,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, user: Uuid) -> anyhow::Result<Option<UserProfile>>;
    async fn save_profile(&self, user: Uuid, profile: &UserProfile) -> anyhow::Result<()>;
}

#[async_trait]
pub trait FoodHistoryStore: Send + Sync {
    /// Creates the history record with frequency 1, or bumps frequency and
    /// `lastUsed` when `entry.id` is already known.
    async fn record_use(&self, user: Uuid, entry: &MealEntry) -> anyhow::Result<()>;
    async fn recent(&self, user: Uuid, limit: usize) -> anyhow::Result<Vec<FoodHistoryEntry>>;
    async fn frequent(&self, user: Uuid, limit: usize) -> anyhow::Result<Vec<FoodHistoryEntry>>;
    async fn history_item(&self, user: Uuid, id: Uuid)
        -> anyhow::Result<Option<FoodHistoryEntry>>;

    async fn add_favorite(&self, user: Uuid, entry: &MealEntry) -> anyhow::Result<()>;
    async fn remove_favorite(&self, user: Uuid, id: Uuid) -> anyhow::Result<bool>;
    async fn favorites(&self, user: Uuid) -> anyhow::Result<Vec<Favorite>>;
}

/// Everything the HTTP layer needs from a backend.
pub trait NutritionStore: MealLogStore + ProfileStore + FoodHistoryStore {}

impl<T> NutritionStore for T where T: MealLogStore + ProfileStore + FoodHistoryStore {}
