//! Photo → nutrition estimate.
//!
//! The service only depends on [`AnalysisBridge`]; [`gemini::GeminiBridge`] is
//! the production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod gemini;
pub mod parse;

#[cfg(test)]
pub(crate) mod fake;

pub use parse::ExtractError;

/// Structured estimate for the main food item in a photo, per serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodAnalysis {
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
}

/// Image handed to the bridge: base64 payload plus its MIME type.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL.
    pub fn from_client(raw: &str) -> Self {
        match raw.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
            Some((meta, payload)) => {
                let mime = meta.split(';').next().filter(|m| !m.is_empty());
                Self {
                    mime_type: mime.unwrap_or("image/jpeg").to_string(),
                    data: payload.trim().to_string(),
                }
            }
            None => Self {
                mime_type: "image/jpeg".into(),
                data: raw.trim().to_string(),
            },
        }
    }
}

/// The only failure the rest of the service sees from an analysis attempt.
/// `reason` is for logs, not for users.
#[derive(Debug, thiserror::Error)]
#[error("analysis unavailable: {reason}")]
pub struct AnalysisUnavailable {
    pub reason: String,
}

impl AnalysisUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<ExtractError> for AnalysisUnavailable {
    fn from(e: ExtractError) -> Self {
        Self::new(e.to_string())
    }
}

/// One attempt per call; no retries.
#[async_trait]
pub trait AnalysisBridge: Send + Sync {
    async fn analyze(&self, image: &EncodedImage) -> Result<FoodAnalysis, AnalysisUnavailable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        let img = EncodedImage::from_client("data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.data, "iVBORw0KGgo=");

        let raw = EncodedImage::from_client("/9j/4AAQSkZJRg==");
        assert_eq!(raw.mime_type, "image/jpeg");
        assert_eq!(raw.data, "/9j/4AAQSkZJRg==");
    }
}
