use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::CompletionError;

/// Raw completion text together with the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError>;
}

/// One-shot fallback: default model, then the fallback model if the default was
/// rate limited, then give up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPolicy {
    pub default_model: String,
    pub fallback_model: String,
}

impl ModelPolicy {
    pub fn new(default_model: impl Into<String>, fallback_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            fallback_model: fallback_model.into(),
        }
    }

    pub async fn run<F, Fut>(&self, mut call: F) -> Result<Completion, CompletionError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<String, CompletionError>>,
    {
        let primary = self.default_model.clone();
        let model = match call(primary.clone()).await {
            Ok(text) => {
                return Ok(Completion {
                    text,
                    model: primary,
                })
            }
            Err(CompletionError::RateLimited { model }) => model,
            Err(err) => return Err(err),
        };

        if model == self.fallback_model {
            return Err(CompletionError::Upstream(format!(
                "rate limited on {model} with no other model to fall back to"
            )));
        }

        tracing::warn!(
            "model {model} is rate limited; retrying with fallback model {}",
            self.fallback_model
        );

        let fallback = self.fallback_model.clone();
        match call(fallback.clone()).await {
            Ok(text) => Ok(Completion {
                text,
                model: fallback,
            }),
            Err(CompletionError::RateLimited { model }) => Err(CompletionError::Upstream(
                format!("rate limited on fallback model {model}"),
            )),
            Err(err) => Err(err),
        }
    }
}

#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_tokens: usize,
    request_delay: Duration,
    policy: ModelPolicy,
}

impl OpenRouterClient {
    pub fn from_config(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            base_url: config.openrouter_base_url.clone(),
            api_key: config.openrouter_api_key.clone(),
            max_tokens: config.models.max_tokens,
            request_delay: config.http.request_delay,
            policy: ModelPolicy::new(
                config.models.default_model.clone(),
                config.models.fallback_model.clone(),
            ),
        }
    }

    /// Single chat-completions call against `model`, no fallback.
    pub async fn complete_with_model(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<String, CompletionError> {
        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatReq<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            max_tokens: usize,
        }

        // Fixed delay before every call; not a retry backoff.
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ChatReq {
                model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                max_tokens: self.max_tokens,
            })
            .send()
            .await
            .map_err(|err| {
                CompletionError::Upstream(format!("failed to call chat completions: {err}"))
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited {
                model: model.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream(format!(
                "chat completions returned {status}: {}",
                normalize_err_body(&body)
            )));
        }

        let body = response.text().await.map_err(|err| {
            CompletionError::Upstream(format!("failed to read chat completions body: {err}"))
        })?;
        first_message_content(&body)
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        self.policy
            .run(|model| async move { self.complete_with_model(prompt, &model).await })
            .await
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions body.
fn first_message_content(body: &str) -> Result<String, CompletionError> {
    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: Option<String>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChatResp {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    let response: ChatResp = serde_json::from_str(body).map_err(|err| {
        CompletionError::Upstream(format!("failed to decode chat completions response: {err}"))
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            CompletionError::Upstream("chat completions response had no message content".into())
        })
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let error = json.get("error");
        if let Some(message) = error
            .and_then(|e| e.get("message"))
            .or(error)
            .and_then(|v| v.as_str())
        {
            return message.to_string();
        }
    }

    trimmed.to_string()
}
