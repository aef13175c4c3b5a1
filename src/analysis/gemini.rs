use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{parse, AnalysisBridge, AnalysisUnavailable, EncodedImage, FoodAnalysis};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROMPT: &str = "Analyze this food image. Identify the main food item and estimate its \
calories, protein, carbs, and fats per serving. Provide the result in JSON format.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "foodName": { "type": "STRING", "description": "Name of the food item" },
            "calories": { "type": "NUMBER", "description": "Calories per serving (kcal)" },
            "protein": { "type": "NUMBER", "description": "Protein per serving (g)" },
            "carbs": { "type": "NUMBER", "description": "Carbohydrates per serving (g)" },
            "fats": { "type": "NUMBER", "description": "Fats per serving (g)" },
            "confidence": { "type": "NUMBER", "description": "Confidence score 0-1" },
            "description": { "type": "STRING", "description": "Short summary of ingredients detected" }
        },
        "required": ["foodName", "calories", "protein", "carbs", "fats", "confidence", "description"]
    })
}

/// Image first, then the prompt; the schema pins the JSON reply shape.
fn build_request(image: &EncodedImage) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: [Content {
            parts: [
                RequestPart::Inline {
                    inline_data: InlineData {
                        mime_type: &image.mime_type,
                        data: &image.data,
                    },
                },
                RequestPart::Text { text: PROMPT },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(),
        },
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(response: GenerateResponse) -> Option<String> {
    let parts = response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts;
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Google Generative Language `generateContent` client.
pub struct GeminiBridge {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBridge {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl AnalysisBridge for GeminiBridge {
    #[instrument(skip(self, image), fields(model = %self.model, mime = %image.mime_type))]
    async fn analyze(&self, image: &EncodedImage) -> Result<FoodAnalysis, AnalysisUnavailable> {
        let request = build_request(image);

        debug!("sending analysis request");
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisUnavailable::new(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "analysis provider returned an error");
            return Err(AnalysisUnavailable::new(format!("status {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisUnavailable::new(format!("decode response: {e}")))?;
        let text = candidate_text(body)
            .ok_or_else(|| AnalysisUnavailable::new("response has no candidate text"))?;

        let analysis = parse::parse_food_analysis(&text)?;
        debug!(food = %analysis.food_name, confidence = analysis.confidence, "analysis parsed");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_has_inline_image_prompt_and_schema() {
        let image = EncodedImage::from_client("data:image/jpeg;base64,AAAA");
        let v = serde_json::to_value(build_request(&image)).unwrap();
        let parts = &v["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "AAAA");
        assert!(parts[1]["text"].as_str().unwrap().contains("calories"));
        assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            v["generationConfig"]["responseSchema"]["required"][0],
            "foodName"
        );
    }

    #[test]
    fn candidate_parts_are_concatenated() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "{\"foodName\":\"Pho\",\"calories\":450," },
                    { "text": "\"protein\":25,\"carbs\":60,\"fats\":10,\"confidence\":0.7,\"description\":\"noodle soup\"}" }
                ]}
            }]
        });
        let response: GenerateResponse = serde_json::from_value(raw).unwrap();
        let text = candidate_text(response).unwrap();
        let analysis = parse::parse_food_analysis(&text).unwrap();
        assert_eq!(analysis.food_name, "Pho");
        assert_eq!(analysis.fats, 10.0);
    }

    #[test]
    fn missing_candidates_yield_nothing() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(candidate_text(response).is_none());
        let response: GenerateResponse =
            serde_json::from_value(json!({ "candidates": [{ "content": { "parts": [] } }] }))
                .unwrap();
        assert!(candidate_text(response).is_none());
    }

    #[test]
    fn url_uses_model_and_trims_base() {
        let bridge = GeminiBridge::new(
            "k",
            "gemini-test",
            "https://example.test/v1beta/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            bridge.url(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }
}
