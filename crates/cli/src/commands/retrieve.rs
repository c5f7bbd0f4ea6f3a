//! Retrieve command handler.

use crate::commands::print_json;
use clap::Args;
use qakb_core::{config::AppConfig, AppResult};
use qakb_knowledge::KnowledgeBase;

/// Retrieve the fragments most similar to a query
#[derive(Args, Debug)]
pub struct RetrieveCommand {
    /// Query text
    pub query: String,

    /// Number of fragments to return (default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RetrieveCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing retrieve command");

        let kb = KnowledgeBase::open(config).await?;
        let response = kb.retrieve(&self.query, self.top_k).await?;

        if self.json {
            return print_json(&response);
        }

        if response.contexts.is_empty() {
            println!("No matching fragments. Run 'qakb build' to index documents.");
            return Ok(());
        }

        for (rank, context) in response.contexts.iter().enumerate() {
            println!("[{}] {}", rank + 1, context.metadata.source);
            println!("{}", context.text.trim());
            println!();
        }

        Ok(())
    }
}
