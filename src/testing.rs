//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CompletionError, LookupError};
use crate::models::FactualSummary;
use crate::openrouter::{Completion, CompletionClient, ModelPolicy};
use crate::wikipedia::FactualLookup;

#[derive(Default)]
pub struct MapLookup {
    summaries: HashMap<String, FactualSummary>,
    failing: Vec<String>,
    fail_all: bool,
    calls: Mutex<Vec<String>>,
}

impl MapLookup {
    pub fn unreachable() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn with_summary(mut self, title: &str, extract: Option<&str>, thumbnail: Option<&str>) -> Self {
        self.summaries.insert(
            title.to_string(),
            FactualSummary {
                extract: extract.map(str::to_string),
                thumbnail_url: thumbnail.map(str::to_string),
            },
        );
        self
    }

    pub fn with_thumbnail(self, title: &str, url: &str) -> Self {
        self.with_summary(title, None, Some(url))
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.failing.push(title.to_string());
        self
    }

    /// Titles looked up so far, sorted since child lookups run concurrently.
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().expect("calls lock").clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl FactualLookup for MapLookup {
    async fn lookup(&self, title: &str) -> Result<FactualSummary, LookupError> {
        self.calls.lock().expect("calls lock").push(title.to_string());
        if self.fail_all || self.failing.iter().any(|t| t == title) {
            return Err(LookupError::Unavailable("connection refused".to_string()));
        }
        Ok(self.summaries.get(title).cloned().unwrap_or_default())
    }
}

/// Replays scripted provider replies through the real [`ModelPolicy`].
pub struct ScriptedCompletion {
    policy: ModelPolicy,
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            policy: ModelPolicy::new("default-model", "fallback-model"),
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().expect("models lock").clone()
    }

    async fn reply(&self, model: String) -> Result<String, CompletionError> {
        self.models.lock().expect("models lock").push(model);
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Upstream("script exhausted".to_string())))
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.policy.run(|model| self.reply(model)).await
    }
}
