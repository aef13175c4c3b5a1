//! Meal log data model plus the pure aggregation and goal arithmetic.

pub mod aggregate;
pub mod goals;
pub mod model;
pub mod profile;

pub use model::{DailyLog, DayKey, EntryError, MealEntry, MealSlot, NutrientTotals};
pub use profile::{
    ActivityLevel, Gender, SettingsError, SettingsPatch, UserProfile, UserSettings, WeightGoal,
};
