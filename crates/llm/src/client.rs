//! Azure OpenAI chat-completions client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drafting::{ChatCompletion, CompletionError, CompletionRequest, DeploymentName};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AzureOpenAiConfig;
use crate::credentials::{
    BearerTokenProvider, ChainedTokenCredential, TokenCredential, COGNITIVE_SERVICES_SCOPE,
};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_body<'a>(request: &'a CompletionRequest, model: Option<&'a str>) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: &request.system,
            },
            ChatMessage {
                role: "user",
                content: &request.user,
            },
        ],
        temperature: request.temperature,
        response_format: request.json_object.then_some(ResponseFormat {
            kind: "json_object",
        }),
    }
}

/// Pulls the first choice's text out of a chat-completions response body.
///
/// A `null` or absent `content` is the empty string; a body without choices
/// is malformed.
fn first_choice_text(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|err| CompletionError::MalformedResponse {
            message: format!("could not decode chat response: {err}"),
        })?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| CompletionError::MalformedResponse {
            message: "chat response contained no choices".to_string(),
        })
}

/// Maps a non-success status to the domain error.
fn classify_failure(status: StatusCode, retry_after: Option<&str>, body: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Authentication {
            message: format!("provider returned {status}: {body}"),
        },
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited {
            retry_after: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        other => CompletionError::Rejected {
            status: other.as_u16(),
            body,
        },
    }
}

/// Sends chat completions to one Azure OpenAI deployment, authenticated with
/// an Entra ID bearer token.
#[derive(Debug)]
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    url: String,
    // `Some` on the v1 route, where the deployment travels as `model`.
    model: Option<DeploymentName>,
    tokens: BearerTokenProvider,
}

impl AzureOpenAiClient {
    /// Creates a client using the default credential chain.
    pub fn from_config(config: &AzureOpenAiConfig) -> Result<Self, reqwest::Error> {
        let http = build_http(config)?;
        let chain = ChainedTokenCredential::from_config(config, http.clone());
        Ok(Self::with_http(config, http, Arc::new(chain)))
    }

    /// Creates a client that obtains tokens from `credential`.
    pub fn new(
        config: &AzureOpenAiConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, reqwest::Error> {
        let http = build_http(config)?;
        Ok(Self::with_http(config, http, credential))
    }

    fn with_http(
        config: &AzureOpenAiConfig,
        http: reqwest::Client,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            http,
            url: config.chat_completions_url(),
            model: config
                .api_version
                .is_none()
                .then(|| config.deployment.clone()),
            tokens: BearerTokenProvider::new(credential, COGNITIVE_SERVICES_SCOPE),
        }
    }
}

fn build_http(config: &AzureOpenAiConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(config.timeout).build()
}

#[async_trait]
impl ChatCompletion for AzureOpenAiClient {
    #[tracing::instrument(name = "llm.chat_completion", skip_all, fields(url = %self.url))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|err| CompletionError::Authentication {
                message: err.to_string(),
            })?;

        let body = build_body(request, self.model.as_ref().map(DeploymentName::as_str));
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| CompletionError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "chat completion rejected");
            return Err(classify_failure(status, retry_after.as_deref(), text));
        }

        let text = response
            .text()
            .await
            .map_err(|err| CompletionError::Transport {
                message: format!("could not read response body: {err}"),
            })?;
        let content = first_choice_text(&text)?;
        debug!(content_chars = content.len(), "chat completion received");
        Ok(content)
    }
}
