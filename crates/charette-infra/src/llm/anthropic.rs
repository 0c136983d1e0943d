//! Direct Anthropic Messages API client -- the primary generation tier.
//!
//! Sends requests straight to `/v1/messages` with reqwest. The API key is
//! wrapped in [`secrecy::SecretString`] and is never logged or included in
//! `Debug` output. HTTP status codes are mapped onto the error taxonomy the
//! retry layer distinguishes: 429 becomes `RateLimited`, 529 (or an
//! `overloaded_error` body) becomes `Overloaded`.

use std::future::Future;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use charette_core::llm::generator::TextGenerator;
use charette_types::llm::{GenerationRequest, LlmError};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Non-streaming response body.
#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

// ---------------------------------------------------------------------------
// AnthropicClient
// ---------------------------------------------------------------------------

/// Direct Anthropic Messages API client.
// No Debug derive: the SecretString field keeps the key out of logs, and
// omitting Debug entirely avoids accidental exposure of internal state.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicClient {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Create a client for the production API endpoint.
    pub fn new(api_key: SecretString) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // long analysis generations
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
        })
    }

    /// Override the base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn to_wire_request(request: &GenerationRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            system: request.system.clone(),
            temperature: request.temperature,
        }
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let body = Self::to_wire_request(request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &error_body));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let text = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

/// Map a non-success HTTP status (plus error body) onto [`LlmError`].
fn map_error_status(status: u16, body: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        400 => LlmError::InvalidRequest(body.to_string()),
        529 => LlmError::Overloaded(body.to_string()),
        _ if body.contains("overloaded_error") => LlmError::Overloaded(body.to_string()),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

impl TextGenerator for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        self.send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            prompt: "Analyze the site.".to_string(),
            system: Some("You are an architecture analyst.".to_string()),
            max_tokens: 8_192,
            temperature: Some(0.2),
        }
    }

    #[test]
    fn test_wire_request_shape() {
        let wire = AnthropicClient::to_wire_request(&request());
        assert_eq!(wire.model, "claude-sonnet-4-20250514");
        assert_eq!(wire.max_tokens, 8_192);
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.messages[0].content, "Analyze the site.");
        assert_eq!(
            wire.system.as_deref(),
            Some("You are an architecture analyst.")
        );
    }

    #[test]
    fn test_wire_request_omits_absent_options() {
        let wire = AnthropicClient::to_wire_request(&GenerationRequest {
            system: None,
            temperature: None,
            ..request()
        });
        let json = serde_json::to_string(&wire).unwrap();
        assert!(!json.contains("system"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_error_status_mapping() {
        assert!(matches!(
            map_error_status(401, ""),
            LlmError::AuthenticationFailed
        ));
        assert!(matches!(
            map_error_status(429, ""),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            map_error_status(529, "overloaded"),
            LlmError::Overloaded(_)
        ));
        assert!(matches!(
            map_error_status(400, "bad model"),
            LlmError::InvalidRequest(_)
        ));
        assert!(matches!(
            map_error_status(500, "boom"),
            LlmError::Provider { .. }
        ));
    }

    #[test]
    fn test_overloaded_error_body_detected_on_any_status() {
        let err = map_error_status(
            500,
            r#"{"type":"error","error":{"type":"overloaded_error"}}"#,
        );
        assert!(matches!(err, LlmError::Overloaded(_)));
    }

    #[test]
    fn test_response_text_blocks_joined() {
        let json = r#"{"content":[{"type":"text","text":"part one "},{"type":"text","text":"part two"}]}"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        let text = parsed
            .content
            .iter()
            .filter_map(|b| match b {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");
        assert_eq!(text, "part one part two");
    }
}
