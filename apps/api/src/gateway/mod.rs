/// AI Gateway: the single point of contact with the external model.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions MUST go through an `AiGateway`.
///
/// The gateway is a transport boundary only: it returns the model's raw text
/// and never interprets it. Parsing lives in `interview::parser`.
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("AI API key not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// A validated media clip ready to be sent to the model.
#[derive(Debug, Clone)]
pub struct Media {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Uniform interface to the external model: prompt + media in, raw text out.
///
/// Carried in `AppState` as `Arc<dyn AiGateway>`.
#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn invoke(&self, prompt: &str, media: &Media) -> Result<String, GatewayError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini REST implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Gemini `generateContent` client. Media travels inline as base64.
/// Single-shot: no retry, the caller decides what a failure means.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl GeminiGateway {
    pub fn new(
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            model,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn invoke(&self, prompt: &str, media: &Media) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::NotConfigured)?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &media.mime_type,
                            data: BASE64_STANDARD.encode(&media.bytes),
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
        };

        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = extract_text(parsed).ok_or(GatewayError::EmptyContent)?;

        debug!(
            "Gemini call succeeded: model={}, media_bytes={}, response_chars={}",
            self.model,
            media.bytes.len(),
            text.len()
        );

        Ok(text)
    }
}

/// Joins the text parts of the first candidate. `None` when there is no text.
fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let parts = response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts;
    let text = parts
        .into_iter()
        .filter_map(|p| p.text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.trim().is_empty()).then_some(text)
}

fn map_http_error(status: StatusCode, body: String) -> GatewayError {
    let message = serde_json::from_str::<GeminiError>(&body)
        .ok()
        .and_then(|e| match (e.error.status, e.error.message) {
            (Some(s), Some(m)) if !s.is_empty() => Some(format!("{s}: {m}")),
            (_, m) => m,
        })
        .unwrap_or(body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::QuotaExceeded(message)
    } else {
        GatewayError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}},
                {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).as_deref(), Some("{\"a\":\n1}"));
    }

    #[test]
    fn test_extract_text_none_without_candidates() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_text(response).is_none());
    }

    #[test]
    fn test_quota_errors_are_distinguished() {
        let body = r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        match map_http_error(StatusCode::TOO_MANY_REQUESTS, body.to_string()) {
            GatewayError::QuotaExceeded(msg) => {
                assert_eq!(msg, "RESOURCE_EXHAUSTED: Resource exhausted")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_error_body_is_kept_verbatim() {
        match map_http_error(StatusCode::BAD_REQUEST, "bad video".to_string()) {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad video");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_request_serializes_inline_data_in_camel_case() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "video/webm",
                            data: BASE64_STANDARD.encode(b"abc"),
                        },
                    },
                    Part::Text { text: "hello" },
                ],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "video/webm");
        assert_eq!(parts[0]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[1]["text"], "hello");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let gateway =
            GeminiGateway::new(None, "gemini-2.0-flash".into(), Duration::from_secs(1)).unwrap();
        let media = Media {
            bytes: Bytes::from_static(b"\x1a\x45\xdf\xa3"),
            mime_type: "video/webm".into(),
        };
        let err = gateway.invoke("prompt", &media).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
    }
}
