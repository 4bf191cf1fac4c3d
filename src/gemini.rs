// src/gemini.rs
//! Minimal client for the Gemini `generateContent` REST endpoint.
use crate::config::Config;
use crate::error::AppError;
use crate::models::GroundingSource;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn user_prompt(prompt: String) -> Vec<Content> {
        vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part { text: Some(prompt) }],
        }]
    }

    /// A prompt answered with Google Search grounding. The API rejects JSON
    /// response mode on grounded requests, so this never sets one.
    pub fn grounded(prompt: String) -> Self {
        GenerateContentRequest {
            contents: Self::user_prompt(prompt),
            tools: vec![Tool {
                google_search: Some(GoogleSearch {}),
            }],
            generation_config: None,
        }
    }

    /// A prompt whose answer must be JSON conforming to `schema`.
    pub fn json(prompt: String, schema: Value) -> Self {
        GenerateContentRequest {
            contents: Self::user_prompt(prompt),
            tools: Vec::new(),
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    pub fn grounding_sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .map(|web| GroundingSource {
                        title: web.title.clone().unwrap_or_default(),
                        url: web.uri.clone().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(GeminiClient {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AppError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(AppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_model_api, test_config};
    use serde_json::json;
    use warp::http::StatusCode;

    #[test]
    fn grounded_request_has_search_tool_and_no_json_mode() {
        let value = serde_json::to_value(GenerateContentRequest::grounded("hi".into())).unwrap();
        assert_eq!(value["tools"], json!([{ "googleSearch": {} }]));
        assert!(value.get("generationConfig").is_none());
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn json_request_carries_schema() {
        let schema = json!({ "type": "ARRAY" });
        let value = serde_json::to_value(GenerateContentRequest::json("p".into(), schema)).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[test]
    fn response_text_and_sources() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "AAPL is at " }, { "text": "$175.43" }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://example.com/a", "title": "Example A" } },
                        { "retrievedContext": {} },
                        { "web": { "uri": "https://example.com/b" } }
                    ]
                }
            }]
        }))
        .unwrap();

        assert_eq!(response.text().as_deref(), Some("AAPL is at $175.43"));
        let sources = response.grounding_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "Example A");
        assert_eq!(sources[1].url, "https://example.com/b");
        assert_eq!(sources[1].title, "");
    }

    #[test]
    fn empty_response_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.text().is_none());
        assert!(response.grounding_sources().is_empty());
    }

    #[tokio::test]
    async fn posts_to_model_endpoint_with_key() {
        let (base_url, captured) = spawn_model_api(|_| {
            (
                StatusCode::OK,
                json!({ "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }] }),
            )
        });
        let client = GeminiClient::new(&test_config(&base_url)).unwrap();

        let response = client
            .generate_content(&GenerateContentRequest::grounded("ping".into()))
            .await
            .unwrap();

        assert_eq!(response.text().as_deref(), Some("ok"));
        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["target"], "gemini-2.5-flash:generateContent");
        assert_eq!(calls[0]["key"], "test-key");
    }

    #[tokio::test]
    async fn error_status_becomes_api_error() {
        let (base_url, _) = spawn_model_api(|_| {
            (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": { "code": 429, "message": "Resource exhausted" } }),
            )
        });
        let client = GeminiClient::new(&test_config(&base_url)).unwrap();

        let err = client
            .generate_content(&GenerateContentRequest::grounded("ping".into()))
            .await
            .unwrap_err();

        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Resource exhausted");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
