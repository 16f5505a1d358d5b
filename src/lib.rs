pub mod concept;
pub mod config;
pub mod enrich;
pub mod error;
pub mod models;
pub mod normalize;
pub mod openrouter;
pub mod prompts;
pub mod server;
pub mod wikipedia;

#[cfg(test)]
mod testing;

pub use concept::ConceptService;
pub use config::AppConfig;
pub use server::run_server;
