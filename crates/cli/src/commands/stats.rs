//! Stats command handler.
//!
//! Summarizes the current index snapshot.

use crate::commands::print_json;
use clap::Args;
use qakb_core::{config::AppConfig, AppResult};
use qakb_knowledge::KnowledgeBase;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let kb = KnowledgeBase::open(config).await?;
        let stats = kb.stats().await?;

        if self.json {
            return print_json(&stats);
        }

        println!("Index: {}", kb.index_dir().display());
        println!("  Fragments: {}", stats.num_chunks);
        println!("  Documents: {}", stats.num_documents);
        println!("  Size: {} bytes", stats.index_size_bytes);
        match (&stats.embedding, stats.built_at) {
            (Some(embedding), Some(built_at)) => {
                println!("  Embedding: {}", embedding);
                println!("  Built at: {}", built_at);
            }
            _ => println!("  Not built yet"),
        }

        Ok(())
    }
}
