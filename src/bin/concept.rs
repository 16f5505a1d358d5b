use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use concept_tree::models::ConceptRequest;
use concept_tree::openrouter::OpenRouterClient;
use concept_tree::prompts::PromptTemplates;
use concept_tree::wikipedia::WikipediaClient;
use concept_tree::{AppConfig, ConceptService};

#[derive(Parser, Debug)]
#[command(name = "concept")]
#[command(about = "Build one concept tree and print it as JSON")]
struct Cli {
    keyword: String,
    #[arg(long, default_value = "en")]
    language: String,
    #[arg(long)]
    parent_context: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    if cli.keyword.trim().is_empty() {
        anyhow::bail!("keyword must not be empty");
    }

    let config = AppConfig::from_env();
    let http = config.http_client()?;
    let prompts = PromptTemplates::load(config.prompts_path.as_deref())?;

    let concepts = ConceptService::new(
        Arc::new(WikipediaClient::from_config(http.clone(), &config)),
        Arc::new(OpenRouterClient::from_config(http, &config)),
        Arc::new(prompts),
    );

    let request = ConceptRequest {
        keyword: cli.keyword,
        language: cli.language,
        parent_context: cli.parent_context,
    };
    let tree = concepts.handle(&request).await;

    let json = serde_json::to_string_pretty(&tree).context("failed to serialize concept tree")?;
    println!("{json}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
