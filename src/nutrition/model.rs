use std::{fmt, ops::AddAssign, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{macros::format_description, Date, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::aggregate;

/// Calendar day used as the key of a daily log (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(Date);

#[derive(Debug, thiserror::Error)]
#[error("invalid day key {0:?}, expected YYYY-MM-DD")]
pub struct DayKeyError(String);

impl DayKey {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn date(&self) -> Date {
        self.0
    }

    /// Day on which `ts` falls when observed at `offset`.
    pub fn of(ts: OffsetDateTime, offset: UtcOffset) -> Self {
        Self(ts.to_offset(offset).date())
    }

    pub fn today(offset: UtcOffset) -> Self {
        Self::of(OffsetDateTime::now_utc(), offset)
    }
}

impl FromStr for DayKey {
    type Err = DayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| DayKeyError(s.to_string()))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Meal slot an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    #[serde(alias = "Breakfast")]
    Breakfast,
    #[serde(alias = "Lunch")]
    Lunch,
    #[serde(alias = "Dinner")]
    Dinner,
    #[serde(alias = "Snack", alias = "snack", alias = "Snacks")]
    Snacks,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snacks,
    ];
}

/// Summed calories (kcal) and macros (g).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

impl AddAssign for NutrientTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.calories += rhs.calories;
        self.protein += rhs.protein;
        self.carbs += rhs.carbs;
        self.fats += rhs.fats;
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EntryError {
    #[error("food name must not be empty")]
    EmptyName,
    #[error("{0} must be a finite, non-negative number")]
    InvalidNumber(&'static str),
}

fn default_serving_size() -> String {
    "1 serving".into()
}

fn default_quantity() -> f64 {
    1.0
}

/// One logged food item. Macros are per serving; `quantity` scales them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: Uuid,
    #[serde(alias = "name")]
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    #[serde(default = "default_serving_size")]
    pub serving_size: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub meal_type: MealSlot,
}

impl MealEntry {
    pub fn validate(&self) -> Result<(), EntryError> {
        if self.food_name.trim().is_empty() {
            return Err(EntryError::EmptyName);
        }
        let fields = [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fats", self.fats),
            ("quantity", self.quantity),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(EntryError::InvalidNumber(name));
            }
        }
        Ok(())
    }

    /// Nutrients of this entry multiplied by its quantity.
    pub fn scaled(&self) -> NutrientTotals {
        NutrientTotals {
            calories: self.calories * self.quantity,
            protein: self.protein * self.quantity,
            carbs: self.carbs * self.quantity,
            fats: self.fats * self.quantity,
        }
    }

    /// Copy of this entry under a fresh id and timestamp, e.g. when re-logging
    /// an item from history.
    pub fn relogged(&self, meal_type: MealSlot, quantity: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            meal_type,
            quantity,
            created_at: OffsetDateTime::now_utc(),
            ..self.clone()
        }
    }
}

/// All entries of one day, grouped by meal slot.
///
/// `totals` is derived state: every mutation goes through [`DailyLog::insert`]
/// or [`DailyLog::remove`], which recompute it from the four slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    pub date: DayKey,
    #[serde(default)]
    breakfast: Vec<MealEntry>,
    #[serde(default)]
    lunch: Vec<MealEntry>,
    #[serde(default)]
    dinner: Vec<MealEntry>,
    #[serde(default)]
    snacks: Vec<MealEntry>,
    #[serde(default)]
    totals: NutrientTotals,
}

impl DailyLog {
    pub fn empty(date: DayKey) -> Self {
        Self {
            date,
            breakfast: Vec::new(),
            lunch: Vec::new(),
            dinner: Vec::new(),
            snacks: Vec::new(),
            totals: NutrientTotals::default(),
        }
    }

    pub fn from_entries(date: DayKey, entries: impl IntoIterator<Item = MealEntry>) -> Self {
        let mut log = Self::empty(date);
        for entry in entries {
            log.remove_from_slots(entry.id);
            log.slot_mut(entry.meal_type).push(entry);
        }
        log.recompute();
        log
    }

    /// Recomputes the cached totals; use after deserializing a stored document.
    pub fn normalized(mut self) -> Self {
        self.recompute();
        self
    }

    pub fn totals(&self) -> NutrientTotals {
        self.totals
    }

    pub fn slot(&self, slot: MealSlot) -> &[MealEntry] {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
            MealSlot::Snacks => &self.snacks,
        }
    }

    fn slot_mut(&mut self, slot: MealSlot) -> &mut Vec<MealEntry> {
        match slot {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
            MealSlot::Snacks => &mut self.snacks,
        }
    }

    /// Entries in slot order (breakfast, lunch, dinner, snacks).
    pub fn entries(&self) -> impl Iterator<Item = &MealEntry> {
        MealSlot::ALL.into_iter().flat_map(move |slot| self.slot(slot).iter())
    }

    pub fn find(&self, id: Uuid) -> Option<&MealEntry> {
        self.entries().find(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Adds `entry` to the slot named by its meal type. An entry with the same
    /// id is dropped from every slot first, so an id is never listed twice.
    pub fn insert(&mut self, entry: MealEntry) {
        self.remove_from_slots(entry.id);
        self.slot_mut(entry.meal_type).push(entry);
        self.recompute();
    }

    pub fn remove(&mut self, id: Uuid) -> Option<MealEntry> {
        let removed = self.remove_from_slots(id);
        self.recompute();
        removed
    }

    fn remove_from_slots(&mut self, id: Uuid) -> Option<MealEntry> {
        let mut removed = None;
        for slot in MealSlot::ALL {
            let entries = self.slot_mut(slot);
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                removed = Some(entries.remove(pos));
            }
        }
        removed
    }

    fn recompute(&mut self) {
        self.totals = aggregate::totals(self.entries());
    }

    pub fn into_entries(self) -> Vec<MealEntry> {
        let mut out = self.breakfast;
        out.extend(self.lunch);
        out.extend(self.dinner);
        out.extend(self.snacks);
        out
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn entry(name: &str, slot: MealSlot, calories: f64, quantity: f64) -> MealEntry {
        MealEntry {
            id: Uuid::new_v4(),
            food_name: name.into(),
            calories,
            protein: calories / 20.0,
            carbs: calories / 10.0,
            fats: calories / 40.0,
            serving_size: "1 plate".into(),
            quantity,
            image_ref: None,
            created_at: OffsetDateTime::now_utc(),
            meal_type: slot,
        }
    }

    pub fn day(s: &str) -> DayKey {
        s.parse().expect("valid day key")
    }
}
