use super::model::{MealEntry, NutrientTotals};

/// Sums quantity-scaled nutrients over `entries`. Empty input gives zero totals.
pub fn totals<'a, I>(entries: I) -> NutrientTotals
where
    I: IntoIterator<Item = &'a MealEntry>,
{
    entries
        .into_iter()
        .fold(NutrientTotals::default(), |mut acc, entry| {
            acc += entry.scaled();
            acc
        })
}
