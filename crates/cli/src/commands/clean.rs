//! Clean command handler.

use clap::Args;
use qakb_core::{config::AppConfig, AppResult};
use qakb_knowledge::KnowledgeBase;

/// Empty the index
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clean command");

        let kb = KnowledgeBase::open(config).await?;
        kb.clean().await?;

        println!("Knowledge base at {} cleaned", kb.index_dir().display());
        Ok(())
    }
}
