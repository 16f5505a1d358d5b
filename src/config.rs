use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub default_model: String,
    pub fallback_model: String,
    pub max_tokens: usize,
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub request_delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub wikipedia_base_url: String,
    pub allowed_origins: Vec<String>,
    pub prompts_path: Option<PathBuf>,
    pub models: ModelConfig,
    pub http: HttpConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so defaults can be
    /// exercised without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let num = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            bind_addr: var("CONCEPT_TREE_BIND", "127.0.0.1:8000"),
            openrouter_api_key: var("OPENROUTER_API_KEY", ""),
            openrouter_base_url: trim_base_url(var(
                "OPENROUTER_BASE_URL",
                "https://openrouter.ai/api/v1",
            )),
            wikipedia_base_url: trim_base_url(var(
                "WIKIPEDIA_BASE_URL",
                "https://en.wikipedia.org/api/rest_v1",
            )),
            allowed_origins: parse_origins(&var("ALLOWED_ORIGINS", "*")),
            prompts_path: lookup("PROMPTS_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            models: ModelConfig {
                default_model: var("LLM_MODEL", "google/gemma-3n-e4b-it:free"),
                fallback_model: var("LLM_FALLBACK_MODEL", "openai/gpt-3.5-turbo:free"),
                max_tokens: num("LLM_MAX_TOKENS", 750) as usize,
            },
            http: HttpConfig {
                request_delay: Duration::from_millis(num("LLM_REQUEST_DELAY_MS", 1_000)),
                timeout: Duration::from_secs(num("HTTP_TIMEOUT_SECS", 30)),
                user_agent: var("CLIENT_USER_AGENT", "fractal-knowledge-explorer/1.0"),
            },
        }
    }

    /// Shared outbound client. Every upstream call carries the client identifier
    /// and is bounded by the timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.http.user_agent.as_str())
            .timeout(self.http.timeout)
            .build()
            .context("failed to build http client")
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
