use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::{EntryError, MealEntry, MealSlot};

/// Manually entered (or edited) food item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    #[serde(alias = "name")]
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    #[serde(default)]
    pub serving_size: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    pub meal_type: MealSlot,
}

impl EntryInput {
    /// Builds a validated entry. `id`, `created_at` and `image_ref` come from
    /// the caller so an edit keeps its identity and photo.
    pub fn into_entry(
        self,
        id: Uuid,
        created_at: OffsetDateTime,
        image_ref: Option<String>,
    ) -> Result<MealEntry, EntryError> {
        let entry = MealEntry {
            id,
            food_name: self.food_name.trim().to_string(),
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fats: self.fats,
            serving_size: self
                .serving_size
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "1 serving".into()),
            quantity: self.quantity.unwrap_or(1.0),
            image_ref,
            created_at,
            meal_type: self.meal_type,
        };
        entry.validate()?;
        Ok(entry)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelogRequest {
    pub meal_type: Option<MealSlot>,
    pub quantity: Option<f64>,
}
