//! Google Gemini `generateContent` client
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL.
//! Non-2xx replies are mapped to a [`ServiceError`] through
//! [`classify_service_error`](crate::error::classify_service_error) so quota
//! rejections are distinguishable from other failures.

use crate::error::{ServiceError, ServiceErrorKind};
use crate::services::classifier::TextClassifier;
use crate::services::request_builder::ClassificationRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("fda483-ai/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`GeminiClient`]
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Transport-level request timeout
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
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

/// Error envelope returned with non-2xx statuses
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

/// Gemini text classification client
///
/// Cheap to share: the inner `reqwest::Client` pools connections and is
/// only read after construction.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    settings: GeminiSettings,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, settings: GeminiSettings) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ServiceError::new(ServiceErrorKind::Transport, e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

#[async_trait]
impl TextClassifier for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ServiceError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        };

        tracing::trace!(model = %self.settings.model, "Calling generateContent");

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::timeout(self.settings.timeout)
                } else {
                    ServiceError::from_transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            ServiceError::new(
                ServiceErrorKind::Unknown,
                format!("Malformed generateContent body: {}", e),
            )
        })?;

        response_text(parsed)
    }
}

/// Concatenated text parts of the first candidate
fn response_text(response: GenerateContentResponse) -> Result<String, ServiceError> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        ServiceError::new(ServiceErrorKind::Unknown, "Response contained no candidates")
    })?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ServiceError::new(
            ServiceErrorKind::Unknown,
            format!(
                "Candidate had no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unspecified")
            ),
        ));
    }

    Ok(text)
}

/// Human-readable message from an error body, falling back to the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) => format!("{} ({})", parsed.error.message, status),
            None => parsed.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new("test_key", GeminiSettings::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_endpoint_format() {
        let settings = GeminiSettings {
            base_url: "http://localhost:8080/v1beta/".to_string(),
            model: "gemini-1.5-flash-latest".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::new("k", settings).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "classify" }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "classify");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "```json\n{"}, {"text": "}\n```"}]},
                                "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "```json\n{}\n```");
    }

    #[test]
    fn test_response_without_candidates_is_service_error() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        let err = response_text(response).unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::Unknown);
    }

    #[test]
    fn test_empty_candidate_reports_finish_reason() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        let err = response_text(response).unwrap_err();
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_quota_error_body_classified() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = ServiceError::from_status(429, error_message(body));
        assert_eq!(err.kind, ServiceErrorKind::QuotaExceeded);
        assert!(err.message.contains("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn test_non_json_error_body_kept_verbatim() {
        assert_eq!(error_message("  upstream connect error  "), "upstream connect error");
    }
}
