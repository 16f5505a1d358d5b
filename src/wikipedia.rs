use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::LookupError;
use crate::models::FactualSummary;

/// Source of short factual summaries keyed by title.
#[async_trait]
pub trait FactualLookup: Send + Sync {
    /// Non-success responses yield an empty summary; only transport-level
    /// failures are errors.
    async fn lookup(&self, title: &str) -> Result<FactualSummary, LookupError>;
}

#[derive(Clone)]
pub struct WikipediaClient {
    client: Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_config(client: Client, config: &AppConfig) -> Self {
        Self::new(client, config.wikipedia_base_url.clone())
    }

    fn summary_url(&self, title: &str) -> Result<Url, LookupError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| LookupError::Unavailable(format!("invalid base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Unavailable("base url cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(["page", "summary", page_title(title).as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl FactualLookup for WikipediaClient {
    async fn lookup(&self, title: &str) -> Result<FactualSummary, LookupError> {
        #[derive(Deserialize)]
        struct Thumbnail {
            source: Option<String>,
        }

        #[derive(Deserialize)]
        struct SummaryResp {
            extract: Option<String>,
            thumbnail: Option<Thumbnail>,
        }

        let url = self.summary_url(title)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| LookupError::Unavailable(format!("failed to call summary endpoint: {err}")))?;

        if !response.status().is_success() {
            tracing::debug!("no summary for {title:?}: status {}", response.status());
            return Ok(FactualSummary::default());
        }

        let body = response
            .json::<SummaryResp>()
            .await
            .map_err(|err| LookupError::Unavailable(format!("failed to decode summary: {err}")))?;

        Ok(FactualSummary {
            extract: non_blank(body.extract),
            thumbnail_url: non_blank(body.thumbnail.and_then(|thumb| thumb.source)),
        })
    }
}

/// Wikipedia page titles use underscores in place of spaces.
fn page_title(title: &str) -> String {
    title.trim().replace(' ', "_")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
