use super::FoodAnalysis;

/// Why model text could not be turned into a [`FoodAnalysis`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExtractError {
    #[error("no JSON object found in model text")]
    NoObject,
    #[error("model JSON does not match the expected shape: {0}")]
    Shape(String),
    #[error("{0} must be a finite, non-negative number")]
    InvalidNumber(&'static str),
    #[error("food name is empty")]
    EmptyName,
}

/// Slice from the first `{` to the last `}`. Models wrap JSON in prose or
/// markdown fences even when asked for bare JSON.
pub fn extract_json_object(text: &str) -> Result<&str, ExtractError> {
    let start = text.find('{').ok_or(ExtractError::NoObject)?;
    let end = text.rfind('}').ok_or(ExtractError::NoObject)?;
    if end < start {
        return Err(ExtractError::NoObject);
    }
    Ok(&text[start..=end])
}

pub fn parse_food_analysis(text: &str) -> Result<FoodAnalysis, ExtractError> {
    let json = extract_json_object(text)?;
    let mut analysis: FoodAnalysis =
        serde_json::from_str(json).map_err(|e| ExtractError::Shape(e.to_string()))?;

    analysis.food_name = analysis.food_name.trim().to_string();
    if analysis.food_name.is_empty() {
        return Err(ExtractError::EmptyName);
    }
    let fields = [
        ("calories", analysis.calories),
        ("protein", analysis.protein),
        ("carbs", analysis.carbs),
        ("fats", analysis.fats),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(ExtractError::InvalidNumber(name));
        }
    }
    analysis.confidence = if analysis.confidence.is_finite() {
        analysis.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"foodName":"Caesar salad","calories":420,"protein":18,"carbs":12,"fats":33,"confidence":0.82,"description":"Romaine, croutons, parmesan"}"#;

    #[test]
    fn finds_object_inside_markdown_fence() {
        let text = format!("```json\n{BODY}\n```");
        let a = parse_food_analysis(&text).unwrap();
        assert_eq!(a.food_name, "Caesar salad");
        assert_eq!(a.calories, 420.0);
        assert_eq!(a.confidence, 0.82);
    }

    #[test]
    fn finds_object_inside_prose() {
        let text = format!("Sure! Here is my estimate: {BODY} Let me know if you need more.");
        assert_eq!(extract_json_object(&text).unwrap(), BODY);
    }

    #[test]
    fn text_without_braces_is_a_typed_error() {
        assert_eq!(
            extract_json_object("I cannot identify any food here."),
            Err(ExtractError::NoObject)
        );
        assert_eq!(extract_json_object("} backwards {"), Err(ExtractError::NoObject));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let err = parse_food_analysis(r#"{"name":"Soup"}"#).unwrap_err();
        assert!(matches!(err, ExtractError::Shape(_)));
    }

    #[test]
    fn negative_values_are_rejected_and_confidence_clamped() {
        let neg = r#"{"foodName":"X","calories":-5,"protein":1,"carbs":1,"fats":1}"#;
        assert_eq!(
            parse_food_analysis(neg),
            Err(ExtractError::InvalidNumber("calories"))
        );

        let over = r#"{"foodName":"Toast","calories":80,"protein":3,"carbs":14,"fats":1,"confidence":7}"#;
        let a = parse_food_analysis(over).unwrap();
        assert_eq!(a.confidence, 1.0);
        assert_eq!(a.description, "");
    }
}
