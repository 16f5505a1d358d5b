use std::sync::Arc;
use std::time::Instant;

use crate::enrich::enrich;
use crate::models::{ConceptNode, ConceptRequest, FactualSummary};
use crate::normalize::normalize;
use crate::openrouter::CompletionClient;
use crate::prompts::PromptTemplates;
use crate::wikipedia::FactualLookup;

/// Builds one concept tree per request. Never fails: every upstream problem
/// ends in a valid tree, at worst [`ConceptNode::error`].
#[derive(Clone)]
pub struct ConceptService {
    lookup: Arc<dyn FactualLookup>,
    completion: Arc<dyn CompletionClient>,
    prompts: Arc<PromptTemplates>,
}

impl ConceptService {
    pub fn new(
        lookup: Arc<dyn FactualLookup>,
        completion: Arc<dyn CompletionClient>,
        prompts: Arc<PromptTemplates>,
    ) -> Self {
        Self {
            lookup,
            completion,
            prompts,
        }
    }

    pub async fn handle(&self, request: &ConceptRequest) -> ConceptNode {
        let started = Instant::now();
        let keyword = request.keyword.trim();
        let prompt = self.prompts.render(
            &request.language,
            keyword,
            request.parent_context.as_deref(),
        );

        let (summary, completion) =
            tokio::join!(self.root_summary(keyword), self.completion.complete(&prompt));

        let completion = match completion {
            Ok(completion) => completion,
            Err(err) => {
                tracing::error!("tree generation for {keyword:?} failed: {err}");
                return ConceptNode::error(keyword);
            }
        };

        let tree = normalize(&completion.text, keyword);
        let tree = enrich(tree, &summary, self.lookup.as_ref()).await;

        tracing::info!(
            "built tree for {keyword:?} (language={}, model={}, children={}, error={}) in {}ms",
            request.language,
            completion.model,
            tree.children().len(),
            tree.is_error(),
            started.elapsed().as_millis()
        );
        tree
    }

    async fn root_summary(&self, keyword: &str) -> FactualSummary {
        match self.lookup.lookup(keyword).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!("continuing without factual summary for {keyword:?}: {err}");
                FactualSummary::default()
            }
        }
    }
}
