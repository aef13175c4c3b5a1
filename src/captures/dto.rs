use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    analysis::FoodAnalysis,
    nutrition::{DayKey, EntryError, MealEntry, MealSlot},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Base64 JPEG, optionally as a `data:` URL.
    pub image: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub capture_id: Uuid,
    pub analysis: FoodAnalysis,
}

/// User edits applied on top of the analysis before logging.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    #[serde(alias = "name")]
    pub food_name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub serving_size: Option<String>,
    pub quantity: Option<f64>,
    pub meal_type: Option<MealSlot>,
    pub date: Option<DayKey>,
}

impl ConfirmRequest {
    /// Meal slot preselected when the user does not pick one.
    pub const DEFAULT_SLOT: MealSlot = MealSlot::Lunch;

    pub fn to_entry(&self, analysis: &FoodAnalysis) -> Result<MealEntry, EntryError> {
        let entry = MealEntry {
            id: Uuid::new_v4(),
            food_name: self
                .food_name
                .as_deref()
                .unwrap_or(&analysis.food_name)
                .trim()
                .to_string(),
            calories: self.calories.unwrap_or(analysis.calories),
            protein: self.protein.unwrap_or(analysis.protein),
            carbs: self.carbs.unwrap_or(analysis.carbs),
            fats: self.fats.unwrap_or(analysis.fats),
            serving_size: self
                .serving_size
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "1 serving".into()),
            quantity: self.quantity.unwrap_or(1.0),
            image_ref: None,
            created_at: OffsetDateTime::now_utc(),
            meal_type: self.meal_type.unwrap_or(Self::DEFAULT_SLOT),
        };
        entry.validate()?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fake::salad;

    #[test]
    fn untouched_confirmation_keeps_the_estimate() {
        let entry = ConfirmRequest::default().to_entry(&salad()).unwrap();
        assert_eq!(entry.food_name, "Greek salad");
        assert_eq!(entry.calories, 320.0);
        assert_eq!(entry.quantity, 1.0);
        assert_eq!(entry.meal_type, MealSlot::Lunch);
    }

    #[test]
    fn edits_override_the_estimate() {
        let req = ConfirmRequest {
            food_name: Some("Village salad".into()),
            fats: Some(30.0),
            quantity: Some(0.5),
            meal_type: Some(MealSlot::Dinner),
            ..Default::default()
        };
        let entry = req.to_entry(&salad()).unwrap();
        assert_eq!(entry.food_name, "Village salad");
        assert_eq!(entry.fats, 30.0);
        assert_eq!(entry.protein, 9.0);
        assert_eq!(entry.scaled().calories, 160.0);
        assert_eq!(entry.meal_type, MealSlot::Dinner);
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let req = ConfirmRequest {
            calories: Some(-10.0),
            ..Default::default()
        };
        assert_eq!(
            req.to_entry(&salad()),
            Err(EntryError::InvalidNumber("calories"))
        );
    }
}
