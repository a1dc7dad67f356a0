//! HTTP backend for an OpenAI-compatible chat-completions API.
//!
//! One `generate` call is one POST; error mapping is by HTTP status and
//! response schema. The per-call timeout lives here, on the reqwest
//! client, not in the orchestrator.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use articleforge_shared::{ApiKey, ArticleForgeError, GeneratorConfig, Result};

use crate::types::{GenerationBackend, GenerationPayload, GenerationRequest};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("ArticleForge/", env!("CARGO_PKG_VERSION"));

/// Chat-completions path appended to the configured base URL.
const COMPLETIONS_PATH: &str = "/v1/chat/completions";

// ---------------------------------------------------------------------------
// Wire schema (OpenAI-compatible subset)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// HttpGenerationClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`GenerationBackend`] for an OpenAI-compatible endpoint.
pub struct HttpGenerationClient {
    client: Client,
    endpoint: Url,
    api_key: ApiKey,
    model: String,
}

impl HttpGenerationClient {
    /// Build a client from generator config and a caller-supplied credential.
    pub fn new(config: &GeneratorConfig, api_key: ApiKey) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ArticleForgeError::Unknown(format!("failed to build HTTP client: {e}"))
            })?;

        let base: Url = config.base_url.parse().map_err(|e| {
            ArticleForgeError::config(format!("invalid base_url {}: {e}", config.base_url))
        })?;
        let endpoint = join_endpoint(&base)?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
        })
    }
}

/// Append the completions path to a base URL, tolerating trailing slashes.
fn join_endpoint(base: &Url) -> Result<Url> {
    let joined = format!(
        "{}{}",
        base.as_str().trim_end_matches('/'),
        COMPLETIONS_PATH
    );
    joined
        .parse()
        .map_err(|e| ArticleForgeError::config(format!("invalid endpoint {joined}: {e}")))
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationPayload> {
        if request.prompt.trim().is_empty() {
            return Err(ArticleForgeError::validation("prompt must be non-empty"));
        }

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %self.model, prompt_len = request.prompt.len(), "sending generation request");

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ArticleForgeError::Timeout
                } else {
                    ArticleForgeError::Unknown(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ArticleForgeError::AuthInvalid);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ArticleForgeError::RateLimited);
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                return Err(ArticleForgeError::Timeout);
            }
            s if !s.is_success() => {
                return Err(ArticleForgeError::Unknown(format!("HTTP {s}")));
            }
            _ => {}
        }

        // On schema mismatch the raw payload is discarded; partial data is
        // never surfaced as success.
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ArticleForgeError::Malformed(format!("response body: {e}")))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ArticleForgeError::Malformed("no completion choices".into()))?;

        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(latency_ms, text_len = text.len(), "generation response received");

        Ok(GenerationPayload {
            text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> GeneratorConfig {
        GeneratorConfig {
            api_key_env: "UNUSED".into(),
            base_url: base_url.into(),
            model: "test-model".into(),
            timeout_secs: 5,
        }
    }

    fn client_for(server: &MockServer) -> HttpGenerationClient {
        HttpGenerationClient::new(&test_config(&server.uri()), ApiKey::new("test-key"))
            .expect("build client")
    }

    #[tokio::test]
    async fn successful_generation_parses_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-model-v2",
                "choices": [{"message": {"role": "assistant", "content": "generated text"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let payload = client
            .generate(&GenerationRequest::new("write about travel"))
            .await
            .expect("generate");

        assert_eq!(payload.text, "generated text");
        assert_eq!(payload.model, "test-model-v2");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&GenerationRequest::new("prompt"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ArticleForgeError::AuthInvalid));
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&GenerationRequest::new("prompt"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ArticleForgeError::RateLimited));
    }

    #[tokio::test]
    async fn schema_mismatch_maps_to_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"unexpected": "shape"}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&GenerationRequest::new("prompt"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ArticleForgeError::Malformed(_)));
    }

    #[tokio::test]
    async fn empty_choices_maps_to_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&GenerationRequest::new("prompt"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ArticleForgeError::Malformed(_)));
    }

    #[tokio::test]
    async fn empty_prompt_rejected_without_network_call() {
        let server = MockServer::start().await;
        // No mock mounted: any request would 404 and map to Unknown, so a
        // Validation error proves the call never left the client.
        let client = client_for(&server);
        let err = client
            .generate(&GenerationRequest::new("   "))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ArticleForgeError::Validation { .. }));
    }

    #[test]
    fn endpoint_join_tolerates_trailing_slash() {
        let base: Url = "https://api.example.com/".parse().unwrap();
        let endpoint = join_endpoint(&base).unwrap();
        assert_eq!(
            endpoint.as_str(),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
