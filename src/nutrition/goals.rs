use serde::Serialize;

use super::model::{DayKey, NutrientTotals};
use super::profile::{Gender, UserSettings};

const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;
const KCAL_PER_GRAM_CARBS: f64 = 4.0;
const KCAL_PER_GRAM_FATS: f64 = 9.0;

/// `round(value / goal * 100)` clamped to 0..=100. A goal that is zero,
/// negative or not a number yields 0.
pub fn percentage(value: f64, goal: f64) -> u8 {
    if !goal.is_finite() || goal <= 0.0 || !value.is_finite() {
        return 0;
    }
    (value / goal * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Mifflin-St Jeor basal metabolic rate in kcal/day.
pub fn bmr(settings: &UserSettings) -> f64 {
    let base = 10.0 * settings.weight + 6.25 * settings.height - 5.0 * f64::from(settings.age);
    match settings.gender {
        Gender::Male => base + 5.0,
        Gender::Female | Gender::Other => base - 161.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalorieEstimate {
    pub bmr: f64,
    pub tdee: f64,
    pub calorie_goal: u32,
}

/// Advisory daily calorie goal; callers decide whether to store it.
pub fn estimate_calorie_goal(settings: &UserSettings) -> CalorieEstimate {
    let bmr = bmr(settings);
    let tdee = bmr * settings.activity_level.multiplier();
    let adjusted = (tdee + settings.goal.adjustment()).round().max(0.0);
    CalorieEstimate {
        bmr,
        tdee,
        calorie_goal: adjusted as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub consumed: f64,
    pub goal: u32,
    pub percentage: u8,
}

impl Progress {
    fn new(consumed: f64, goal: u32) -> Self {
        Self {
            consumed,
            goal,
            percentage: percentage(consumed, f64::from(goal)),
        }
    }
}

/// kcal contributed by each macro, for the dashboard breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroCalories {
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub date: DayKey,
    pub totals: NutrientTotals,
    pub calories: Progress,
    pub protein: Progress,
    pub carbs: Progress,
    pub fats: Progress,
    /// May go negative once the goal is exceeded.
    pub calories_remaining: f64,
    pub macro_calories: MacroCalories,
}

pub fn evaluate(date: DayKey, totals: NutrientTotals, settings: &UserSettings) -> GoalProgress {
    GoalProgress {
        date,
        totals,
        calories: Progress::new(totals.calories, settings.daily_calorie_goal),
        protein: Progress::new(totals.protein, settings.protein_goal),
        carbs: Progress::new(totals.carbs, settings.carbs_goal),
        fats: Progress::new(totals.fats, settings.fats_goal),
        calories_remaining: f64::from(settings.daily_calorie_goal) - totals.calories,
        macro_calories: MacroCalories {
            protein: totals.protein * KCAL_PER_GRAM_PROTEIN,
            carbs: totals.carbs * KCAL_PER_GRAM_CARBS,
            fats: totals.fats * KCAL_PER_GRAM_FATS,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::model::fixtures::day;
    use crate::nutrition::profile::{ActivityLevel, WeightGoal};

    fn reference_settings(goal: WeightGoal) -> UserSettings {
        UserSettings {
            age: 28,
            gender: Gender::Male,
            weight: 75.0,
            height: 180.0,
            activity_level: ActivityLevel::Moderate,
            goal,
            ..UserSettings::default()
        }
    }

    #[test]
    fn mifflin_st_jeor_reference_values() {
        let est = estimate_calorie_goal(&reference_settings(WeightGoal::Maintain));
        // 10*75 + 6.25*180 - 5*28 + 5
        assert_eq!(est.bmr, 1740.0);
        assert!((est.tdee - 2697.0).abs() < 1e-9);
        assert_eq!(est.calorie_goal, 2697);

        assert_eq!(
            estimate_calorie_goal(&reference_settings(WeightGoal::Lose)).calorie_goal,
            2197
        );
        assert_eq!(
            estimate_calorie_goal(&reference_settings(WeightGoal::Gain)).calorie_goal,
            3197
        );
    }

    #[test]
    fn female_and_other_use_minus_161() {
        let mut s = reference_settings(WeightGoal::Maintain);
        s.gender = Gender::Female;
        assert_eq!(bmr(&s), 1740.0 - 166.0);
        s.gender = Gender::Other;
        assert_eq!(bmr(&s), 1574.0);
    }

    #[test]
    fn every_activity_tier_has_its_multiplier() {
        let tiers = [
            (ActivityLevel::Sedentary, 1.2),
            (ActivityLevel::Light, 1.375),
            (ActivityLevel::Moderate, 1.55),
            (ActivityLevel::Active, 1.725),
            (ActivityLevel::VeryActive, 1.9),
        ];
        for (level, m) in tiers {
            let mut s = reference_settings(WeightGoal::Maintain);
            s.activity_level = level;
            let est = estimate_calorie_goal(&s);
            assert_eq!(est.calorie_goal, (1740.0_f64 * m).round() as u32);
        }
    }

    #[test]
    fn estimate_survives_serialization() {
        let s = reference_settings(WeightGoal::Lose);
        let before = estimate_calorie_goal(&s);
        let json = serde_json::to_string(&s).unwrap();
        let back: UserSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(estimate_calorie_goal(&back), before);
    }

    #[test]
    fn percentage_is_clamped_and_safe() {
        assert_eq!(percentage(0.0, 2000.0), 0);
        assert_eq!(percentage(1000.0, 2000.0), 50);
        assert_eq!(percentage(5000.0, 2000.0), 100);
        assert_eq!(percentage(500.0, 0.0), 0);
        assert_eq!(percentage(500.0, f64::NAN), 0);
        assert_eq!(percentage(-10.0, 100.0), 0);
        assert_eq!(percentage(1.0, 3.0), 33);
    }

    #[test]
    fn evaluate_reports_each_macro_independently() {
        let settings = UserSettings::default();
        let totals = NutrientTotals {
            calories: 3300.0,
            protein: 75.0,
            carbs: 250.0,
            fats: 7.0,
        };
        let p = evaluate(day("2024-05-01"), totals, &settings);
        assert_eq!(p.calories.percentage, 100);
        assert_eq!(p.protein.percentage, 50);
        assert_eq!(p.carbs.percentage, 100);
        assert_eq!(p.fats.percentage, 10);
        assert_eq!(p.calories_remaining, -1100.0);
        assert_eq!(p.macro_calories.fats, 63.0);
    }

    #[test]
    fn zero_calorie_goal_reads_as_zero_percent() {
        let settings = UserSettings {
            daily_calorie_goal: 0,
            ..UserSettings::default()
        };
        let totals = NutrientTotals {
            calories: 800.0,
            ..NutrientTotals::default()
        };
        assert_eq!(evaluate(day("2024-05-01"), totals, &settings).calories.percentage, 0);
    }
}
