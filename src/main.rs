use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use concept_tree::openrouter::OpenRouterClient;
use concept_tree::prompts::PromptTemplates;
use concept_tree::wikipedia::WikipediaClient;
use concept_tree::{run_server, AppConfig, ConceptService};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    if config.openrouter_api_key.is_empty() {
        tracing::warn!("OPENROUTER_API_KEY is not set; completions will fail authorization");
    }

    let http = config.http_client()?;
    let prompts = PromptTemplates::load(config.prompts_path.as_deref())?;
    tracing::info!("prompt languages: {}", prompts.languages().join(", "));

    let concepts = ConceptService::new(
        Arc::new(WikipediaClient::from_config(http.clone(), &config)),
        Arc::new(OpenRouterClient::from_config(http, &config)),
        Arc::new(prompts),
    );

    run_server(config, concepts).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
