use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::instrument;
use uuid::Uuid;

use super::{Favorite, FoodHistoryEntry, FoodHistoryStore, MealLogStore, ProfileStore};
use crate::nutrition::{DailyLog, DayKey, MealEntry, UserProfile};

/// PostgreSQL backend: one JSON day document per (user, day) in `meal_days`.
///
/// Day mutations run in a transaction that locks the row with `FOR UPDATE`,
/// so concurrent writers to the same day are serialized by the database.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct DayRow {
    body: Json<DailyLog>,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    item: Json<MealEntry>,
    last_used: OffsetDateTime,
    frequency: i32,
}

impl From<HistoryRow> for FoodHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            item: row.item.0,
            last_used: row.last_used,
            frequency: u32::try_from(row.frequency).unwrap_or(0),
        }
    }
}

#[derive(Debug, FromRow)]
struct FavoriteRow {
    item: Json<MealEntry>,
    added_at: OffsetDateTime,
}

impl From<FavoriteRow> for Favorite {
    fn from(row: FavoriteRow) -> Self {
        Self {
            item: row.item.0,
            added_at: row.added_at,
        }
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn lock_day(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
        day: Date,
    ) -> anyhow::Result<Option<DailyLog>> {
        let row = sqlx::query_as::<_, DayRow>(
            r#"
            SELECT body
            FROM meal_days
            WHERE user_id = $1 AND day = $2
            FOR UPDATE
            "#,
        )
        .bind(user)
        .bind(day)
        .fetch_optional(&mut **tx)
        .await
        .context("select meal_day")?;
        Ok(row.map(|r| r.body.0.normalized()))
    }

    async fn write_day(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
        log: &DailyLog,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE meal_days
            SET body = $3, updated_at = now()
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(user)
        .bind(log.date.date())
        .bind(Json(log))
        .execute(&mut **tx)
        .await
        .context("update meal_day")?;
        Ok(())
    }

    /// Creates the day row if needed, then applies `f` under the row lock and
    /// writes the result back in the same transaction.
    async fn mutate_day<F>(&self, user: Uuid, day: DayKey, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut DailyLog) + Send,
    {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query(
            r#"
            INSERT INTO meal_days (user_id, day, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, day) DO NOTHING
            "#,
        )
        .bind(user)
        .bind(day.date())
        .bind(Json(DailyLog::empty(day)))
        .execute(&mut *tx)
        .await
        .context("insert meal_day")?;

        let mut log = Self::lock_day(&mut tx, user, day.date())
            .await?
            .unwrap_or_else(|| DailyLog::empty(day));
        f(&mut log);
        Self::write_day(&mut tx, user, &log).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}

#[async_trait]
impl MealLogStore for PgStore {
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn add(&self, user: Uuid, day: DayKey, entry: MealEntry) -> anyhow::Result<()> {
        self.mutate_day(user, day, move |log| log.insert(entry)).await
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
    async fn remove(&self, user: Uuid, day: DayKey, entry_id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let Some(mut log) = Self::lock_day(&mut tx, user, day.date()).await? else {
            return Ok(false);
        };
        if log.remove(entry_id).is_none() {
            return Ok(false);
        }
        Self::write_day(&mut tx, user, &log).await?;
        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn query(&self, user: Uuid, day: DayKey) -> anyhow::Result<DailyLog> {
        let row = sqlx::query_as::<_, DayRow>(
            r#"
            SELECT body
            FROM meal_days
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(user)
        .bind(day.date())
        .fetch_optional(&self.db)
        .await
        .context("select meal_day")?;
        Ok(row
            .map(|r| r.body.0.normalized())
            .unwrap_or_else(|| DailyLog::empty(day)))
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn load_profile(&self, user: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let body: Option<Json<UserProfile>> =
            sqlx::query_scalar("SELECT body FROM profiles WHERE user_id = $1")
                .bind(user)
                .fetch_optional(&self.db)
                .await
                .context("select profile")?;
        Ok(body.map(|b| b.0))
    }

    async fn save_profile(&self, user: Uuid, profile: &UserProfile) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, body)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET body = EXCLUDED.body, updated_at = now()
            "#,
        )
        .bind(user)
        .bind(Json(profile))
        .execute(&self.db)
        .await
        .context("upsert profile")?;
        Ok(())
    }
}

#[async_trait]
impl FoodHistoryStore for PgStore {
    async fn record_use(&self, user: Uuid, entry: &MealEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO food_history (user_id, item_id, item, last_used, frequency)
            VALUES ($1, $2, $3, now(), 1)
            ON CONFLICT (user_id, item_id) DO UPDATE
            SET item = EXCLUDED.item,
                last_used = now(),
                frequency = food_history.frequency + 1
            "#,
        )
        .bind(user)
        .bind(entry.id)
        .bind(Json(entry))
        .execute(&self.db)
        .await
        .context("upsert food_history")?;
        Ok(())
    }

    async fn recent(&self, user: Uuid, limit: usize) -> anyhow::Result<Vec<FoodHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT item, last_used, frequency
            FROM food_history
            WHERE user_id = $1
            ORDER BY last_used DESC
            LIMIT $2
            "#,
        )
        .bind(user)
        .bind(clamp_limit(limit))
        .fetch_all(&self.db)
        .await
        .context("select recent foods")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn frequent(&self, user: Uuid, limit: usize) -> anyhow::Result<Vec<FoodHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT item, last_used, frequency
            FROM food_history
            WHERE user_id = $1
            ORDER BY frequency DESC, last_used DESC
            LIMIT $2
            "#,
        )
        .bind(user)
        .bind(clamp_limit(limit))
        .fetch_all(&self.db)
        .await
        .context("select frequent foods")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn history_item(
        &self,
        user: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<FoodHistoryEntry>> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT item, last_used, frequency
            FROM food_history
            WHERE user_id = $1 AND item_id = $2
            "#,
        )
        .bind(user)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select food_history item")?;
        Ok(row.map(Into::into))
    }

    async fn add_favorite(&self, user: Uuid, entry: &MealEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO favorites (user_id, item_id, item, added_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id, item_id) DO UPDATE
            SET item = EXCLUDED.item, added_at = now()
            "#,
        )
        .bind(user)
        .bind(entry.id)
        .bind(Json(entry))
        .execute(&self.db)
        .await
        .context("upsert favorite")?;
        Ok(())
    }

    async fn remove_favorite(&self, user: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND item_id = $2")
            .bind(user)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete favorite")?;
        Ok(done.rows_affected() > 0)
    }

    async fn favorites(&self, user: Uuid) -> anyhow::Result<Vec<Favorite>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT item, added_at
            FROM favorites
            WHERE user_id = $1
            ORDER BY added_at DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.db)
        .await
        .context("select favorites")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::nutrition::model::fixtures::{day, entry};
    use crate::nutrition::MealSlot;

    /// Runs only when `NUTRILENS_TEST_DATABASE_URL` names a scratch PostgreSQL
    /// database.
    async fn store() -> Option<PgStore> {
        let url = std::env::var("NUTRILENS_TEST_DATABASE_URL").ok()?;
        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .unwrap();
        let store = PgStore::new(db);
        store.migrate().await.unwrap();
        Some(store)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn row_lock_serializes_writes_to_one_day() {
        let Some(store) = store().await else {
            return;
        };
        let store = Arc::new(store);
        let user = Uuid::new_v4();
        let today = day("2024-06-01");
        let doomed = entry("Donut", MealSlot::Snacks, 300.0, 1.0);
        store.add(user, today, doomed.clone()).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..12 {
            let store = store.clone();
            let e = entry(&format!("Bite {i}"), MealSlot::Lunch, 10.0, 1.0);
            tasks.push(tokio::spawn(async move { store.add(user, today, e).await }));
        }
        let remover = {
            let store = store.clone();
            tokio::spawn(async move { store.remove(user, today, doomed.id).await })
        };
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert!(remover.await.unwrap().unwrap());

        let log = store.query(user, today).await.unwrap();
        assert_eq!(log.slot(MealSlot::Lunch).len(), 12);
        assert!(log.slot(MealSlot::Snacks).is_empty());
        assert_eq!(log.totals().calories, 120.0);
    }

    #[tokio::test]
    async fn update_replaces_the_entry_in_one_transaction() {
        let Some(store) = store().await else {
            return;
        };
        let user = Uuid::new_v4();
        let today = day("2024-06-01");
        let old = entry("Yogurt", MealSlot::Breakfast, 150.0, 1.0);
        store.add(user, today, old.clone()).await.unwrap();

        let mut new = old.clone();
        new.meal_type = MealSlot::Snacks;
        new.quantity = 2.0;
        store.update(user, today, &old, new).await.unwrap();

        let log = store.query(user, today).await.unwrap();
        assert!(log.slot(MealSlot::Breakfast).is_empty());
        assert_eq!(log.slot(MealSlot::Snacks).len(), 1);
        assert_eq!(log.totals().calories, 300.0);
        assert!(!store.remove(user, today, Uuid::new_v4()).await.unwrap());
    }
}
