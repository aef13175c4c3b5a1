use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    history, kv::KeyValueStore, Favorite, FoodHistoryEntry, FoodHistoryStore, MealLogStore,
    ProfileStore,
};
use crate::nutrition::{DailyLog, DayKey, MealEntry, UserProfile};

pub const PROFILE_KEY: &str = "nutrilens_profile";
pub const LOGS_KEY: &str = "nutrilens_logs";
pub const HISTORY_KEY: &str = "nutrilens_history";
pub const FAVORITES_KEY: &str = "nutrilens_favorites";

/// Persisted form of one entry in the flat `nutrilens_logs` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    /// Absent in records written before entries carried their day; those fall
    /// back to the UTC day of `createdAt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day: Option<DayKey>,
    #[serde(flatten)]
    entry: MealEntry,
}

impl StoredEntry {
    fn day(&self) -> DayKey {
        self.day
            .unwrap_or_else(|| DayKey::of(self.entry.created_at, UtcOffset::UTC))
    }
}

/// Live window: the one day of entries kept resident for a user.
#[derive(Debug, Default)]
struct UserState {
    live: Option<DailyLog>,
}

/// Users whose live window stays resident before idle ones are evicted.
pub const DEFAULT_RESIDENT_USERS: usize = 1024;

/// Meal log over a [`KeyValueStore`].
///
/// Only the most recently touched day is held in memory per user. Every write
/// rebuilds the persisted list from the stored entries of all *other* days
/// plus the live day, so moving the window never drops history.
///
/// At most `resident_limit` users are kept resident. When a new user arrives
/// at the limit, every user with no operation in flight is dropped; their
/// next request reloads the day from the key-value store.
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    users: Mutex<HashMap<Uuid, Arc<Mutex<UserState>>>>,
    resident_limit: usize,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_resident_limit(kv, DEFAULT_RESIDENT_USERS)
    }

    pub fn with_resident_limit(kv: Arc<dyn KeyValueStore>, resident_limit: usize) -> Self {
        Self {
            kv,
            users: Mutex::new(HashMap::new()),
            resident_limit: resident_limit.max(1),
        }
    }

    async fn user_state(&self, user: Uuid) -> Arc<Mutex<UserState>> {
        let mut users = self.users.lock().await;
        if !users.contains_key(&user) && users.len() >= self.resident_limit {
            let before = users.len();
            // The map holds the only reference of an idle user.
            users.retain(|_, state| Arc::strong_count(state) > 1);
            debug!(evicted = before - users.len(), "evicted idle live windows");
        }
        users.entry(user).or_default().clone()
    }

    async fn read_json<T: DeserializeOwned + Default>(
        &self,
        user: Uuid,
        key: &str,
    ) -> anyhow::Result<T> {
        match self.kv.get(user, key).await? {
            Some(raw) => serde_json::from_str(&raw).with_context(|| format!("decode {key}")),
            None => Ok(T::default()),
        }
    }

    async fn write_json<T: Serialize + Sync>(
        &self,
        user: Uuid,
        key: &str,
        value: &T,
    ) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
        self.kv.set(user, key, raw).await
    }

    async fn load_day(&self, user: Uuid, state: &UserState, day: DayKey) -> anyhow::Result<DailyLog> {
        if let Some(live) = state.live.as_ref().filter(|l| l.date == day) {
            return Ok(live.clone());
        }
        let stored: Vec<StoredEntry> = self.read_json(user, LOGS_KEY).await?;
        let entries = stored
            .into_iter()
            .filter(|s| s.day() == day)
            .map(|s| s.entry);
        debug!(%user, %day, "loaded day into live window");
        Ok(DailyLog::from_entries(day, entries))
    }

    async fn persist_day(&self, user: Uuid, log: &DailyLog) -> anyhow::Result<()> {
        let stored: Vec<StoredEntry> = self.read_json(user, LOGS_KEY).await?;
        let mut merged: Vec<StoredEntry> = stored
            .into_iter()
            .filter(|s| s.day() != log.date)
            .collect();
        merged.extend(log.entries().map(|entry| StoredEntry {
            day: Some(log.date),
            entry: entry.clone(),
        }));
        self.write_json(user, LOGS_KEY, &merged).await
    }

    /// Applies `f` to a copy of the day and commits it to the live window only
    /// after the write succeeded; a failed write leaves memory untouched.
    async fn mutate_day<F, T>(&self, user: Uuid, day: DayKey, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut DailyLog) -> T + Send,
        T: Send,
    {
        let state = self.user_state(user).await;
        let mut state = state.lock().await;
        let mut log = self.load_day(user, &state, day).await?;
        let out = f(&mut log);
        self.persist_day(user, &log).await?;
        state.live = Some(log);
        Ok(out)
    }
}

#[async_trait]
impl MealLogStore for LocalStore {
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn add(&self, user: Uuid, day: DayKey, entry: MealEntry) -> anyhow::Result<()> {
        self.mutate_day(user, day, move |log| log.insert(entry)).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, user: Uuid, day: DayKey, entry_id: Uuid) -> anyhow::Result<bool> {
        let state = self.user_state(user).await;
        let mut state = state.lock().await;
        let mut log = self.load_day(user, &state, day).await?;
        if log.remove(entry_id).is_none() {
            state.live = Some(log);
            return Ok(false);
        }
        self.persist_day(user, &log).await?;
        state.live = Some(log);
        Ok(true)
    }

    #[instrument(skip(self, old, new), fields(entry_id = %old.id))]
    async fn update(
        &self,
        user: Uuid,
        day: DayKey,
        old: &MealEntry,
        new: MealEntry,
    ) -> anyhow::Result<()> {
        let old_id = old.id;
        self.mutate_day(user, day, move |log| {
            log.remove(old_id);
            log.insert(new);
        })
        .await
    }

    #[instrument(skip(self))]
    async fn query(&self, user: Uuid, day: DayKey) -> anyhow::Result<DailyLog> {
        let state = self.user_state(user).await;
        let mut state = state.lock().await;
        let log = self.load_day(user, &state, day).await?;
        state.live = Some(log.clone());
        Ok(log)
    }
}

#[async_trait]
impl ProfileStore for LocalStore {
    async fn load_profile(&self, user: Uuid) -> anyhow::Result<Option<UserProfile>> {
        self.read_json(user, PROFILE_KEY).await
    }

    async fn save_profile(&self, user: Uuid, profile: &UserProfile) -> anyhow::Result<()> {
        self.write_json(user, PROFILE_KEY, profile).await
    }
}

#[async_trait]
impl FoodHistoryStore for LocalStore {
    async fn record_use(&self, user: Uuid, entry: &MealEntry) -> anyhow::Result<()> {
        let state = self.user_state(user).await;
        let _guard = state.lock().await;
        let mut items: Vec<FoodHistoryEntry> = self.read_json(user, HISTORY_KEY).await?;
        history::record_use(&mut items, entry, OffsetDateTime::now_utc());
        self.write_json(user, HISTORY_KEY, &items).await
    }

    async fn recent(&self, user: Uuid, limit: usize) -> anyhow::Result<Vec<FoodHistoryEntry>> {
        let items = self.read_json(user, HISTORY_KEY).await?;
        Ok(history::most_recent(items, limit))
    }

    async fn frequent(&self, user: Uuid, limit: usize) -> anyhow::Result<Vec<FoodHistoryEntry>> {
        let items = self.read_json(user, HISTORY_KEY).await?;
        Ok(history::most_frequent(items, limit))
    }

    async fn history_item(
        &self,
        user: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<FoodHistoryEntry>> {
        let items: Vec<FoodHistoryEntry> = self.read_json(user, HISTORY_KEY).await?;
        Ok(items.into_iter().find(|h| h.item.id == id))
    }

    async fn add_favorite(&self, user: Uuid, entry: &MealEntry) -> anyhow::Result<()> {
        let state = self.user_state(user).await;
        let _guard = state.lock().await;
        let mut favorites: Vec<Favorite> = self.read_json(user, FAVORITES_KEY).await?;
        history::upsert_favorite(&mut favorites, entry, OffsetDateTime::now_utc());
        self.write_json(user, FAVORITES_KEY, &favorites).await
    }

    async fn remove_favorite(&self, user: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let state = self.user_state(user).await;
        let _guard = state.lock().await;
        let mut favorites: Vec<Favorite> = self.read_json(user, FAVORITES_KEY).await?;
        let before = favorites.len();
        favorites.retain(|f| f.item.id != id);
        if favorites.len() == before {
            return Ok(false);
        }
        self.write_json(user, FAVORITES_KEY, &favorites).await?;
        Ok(true)
    }

    async fn favorites(&self, user: Uuid) -> anyhow::Result<Vec<Favorite>> {
        let favorites = self.read_json(user, FAVORITES_KEY).await?;
        Ok(history::newest_favorites_first(favorites))
    }
}
