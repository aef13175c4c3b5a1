use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightGoal {
    Lose,
    Maintain,
    Gain,
}

impl WeightGoal {
    /// Daily kcal adjustment applied on top of TDEE.
    pub fn adjustment(self) -> f64 {
        match self {
            WeightGoal::Lose => -500.0,
            WeightGoal::Maintain => 0.0,
            WeightGoal::Gain => 500.0,
        }
    }
}

/// Body metrics and daily targets. Goal fields also accept the older
/// `goalCalories`/`goalProtein`/`goalCarbs`/`goalFats` names when read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub age: u32,
    pub gender: Gender,
    /// kg
    pub weight: f64,
    /// cm
    pub height: f64,
    pub activity_level: ActivityLevel,
    pub goal: WeightGoal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f64>,
    #[serde(default, alias = "goalCalories")]
    pub daily_calorie_goal: u32,
    #[serde(default, alias = "goalProtein")]
    pub protein_goal: u32,
    #[serde(default, alias = "goalCarbs")]
    pub carbs_goal: u32,
    #[serde(default, alias = "goalFats")]
    pub fats_goal: u32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            age: 28,
            gender: Gender::Male,
            weight: 75.0,
            height: 180.0,
            activity_level: ActivityLevel::Moderate,
            goal: WeightGoal::Maintain,
            target_weight: None,
            daily_calorie_goal: 2200,
            protein_goal: 150,
            carbs_goal: 250,
            fats_goal: 70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserProfile {
    /// Profile handed to a user on first use.
    pub fn first_use(now: OffsetDateTime) -> Self {
        Self {
            display_name: "Guest User".into(),
            email: Some("guest@example.com".into()),
            photo_ref: None,
            settings: UserSettings::default(),
            created_at: now,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Partial settings update.
///
/// The `alias` attributes are the complete table of legacy form names; any
/// other unknown key is rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsPatch {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<WeightGoal>,
    pub target_weight: Option<f64>,
    #[serde(alias = "goalCalories")]
    pub daily_calorie_goal: Option<u32>,
    #[serde(alias = "goalProtein")]
    pub protein_goal: Option<u32>,
    #[serde(alias = "goalCarbs")]
    pub carbs_goal: Option<u32>,
    #[serde(alias = "goalFats")]
    pub fats_goal: Option<u32>,
}

fn positive_goal(name: &'static str, value: u32) -> Result<u32, SettingsError> {
    if value == 0 {
        return Err(SettingsError::NotPositive(name));
    }
    Ok(value)
}

fn in_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<f64, SettingsError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SettingsError::NotPositive(name));
    }
    if value < min || value > max {
        return Err(SettingsError::OutOfRange(name));
    }
    Ok(value)
}

impl SettingsPatch {
    /// Returns `current` with every present field replaced; nothing is written
    /// unless all present fields are valid.
    pub fn apply(self, current: &UserSettings) -> Result<UserSettings, SettingsError> {
        let mut next = current.clone();
        if let Some(age) = self.age {
            if age == 0 {
                return Err(SettingsError::NotPositive("age"));
            }
            if age > 130 {
                return Err(SettingsError::OutOfRange("age"));
            }
            next.age = age;
        }
        if let Some(gender) = self.gender {
            next.gender = gender;
        }
        if let Some(weight) = self.weight {
            next.weight = in_range("weight", weight, 1.0, 700.0)?;
        }
        if let Some(height) = self.height {
            next.height = in_range("height", height, 30.0, 300.0)?;
        }
        if let Some(level) = self.activity_level {
            next.activity_level = level;
        }
        if let Some(goal) = self.goal {
            next.goal = goal;
        }
        if let Some(target) = self.target_weight {
            next.target_weight = Some(in_range("targetWeight", target, 1.0, 700.0)?);
        }
        if let Some(v) = self.daily_calorie_goal {
            next.daily_calorie_goal = positive_goal("dailyCalorieGoal", v)?;
        }
        if let Some(v) = self.protein_goal {
            next.protein_goal = positive_goal("proteinGoal", v)?;
        }
        if let Some(v) = self.carbs_goal {
            next.carbs_goal = positive_goal("carbsGoal", v)?;
        }
        if let Some(v) = self.fats_goal {
            next.fats_goal = positive_goal("fatsGoal", v)?;
        }
        Ok(next)
    }
}
