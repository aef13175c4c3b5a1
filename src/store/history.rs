use std::cmp::Reverse;

use time::OffsetDateTime;

use super::{Favorite, FoodHistoryEntry};
use crate::nutrition::MealEntry;

/// Upserts `entry` into an in-memory history list.
pub fn record_use(history: &mut Vec<FoodHistoryEntry>, entry: &MealEntry, now: OffsetDateTime) {
    match history.iter_mut().find(|h| h.item.id == entry.id) {
        Some(existing) => {
            existing.last_used = now;
            existing.frequency = existing.frequency.saturating_add(1);
        }
        None => history.push(FoodHistoryEntry {
            item: entry.clone(),
            last_used: now,
            frequency: 1,
        }),
    }
}

pub fn most_recent(mut history: Vec<FoodHistoryEntry>, limit: usize) -> Vec<FoodHistoryEntry> {
    history.sort_by_key(|h| Reverse(h.last_used));
    history.truncate(limit);
    history
}

/// Ties on frequency go to the more recently used item.
pub fn most_frequent(mut history: Vec<FoodHistoryEntry>, limit: usize) -> Vec<FoodHistoryEntry> {
    history.sort_by_key(|h| (Reverse(h.frequency), Reverse(h.last_used)));
    history.truncate(limit);
    history
}

pub fn upsert_favorite(favorites: &mut Vec<Favorite>, entry: &MealEntry, now: OffsetDateTime) {
    favorites.retain(|f| f.item.id != entry.id);
    favorites.push(Favorite {
        item: entry.clone(),
        added_at: now,
    });
}

pub fn newest_favorites_first(mut favorites: Vec<Favorite>) -> Vec<Favorite> {
    favorites.sort_by_key(|f| Reverse(f.added_at));
    favorites
}
