//! Build command handler.
//!
//! Rebuilds the knowledge base from the support documents directory and the
//! reference document.

use crate::commands::print_json;
use clap::Args;
use qakb_core::{config::AppConfig, AppError, AppResult};
use qakb_knowledge::{KnowledgeBase, ProgressEvent, ProgressReporter};
use std::sync::Arc;

/// Rebuild the index from the support documents
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let kb = KnowledgeBase::open(config).await?;

        let progress = if self.json {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple());
            }))
        };

        let report = kb.build_with_progress(progress).await?;

        if self.json {
            print_json(&report)?;
        } else if report.is_ok() {
            println!(
                "Indexed {} documents ({} fragments)",
                report.num_documents, report.num_chunks
            );
        }

        if report.is_ok() {
            return Ok(());
        }

        let message = report.message.unwrap_or_else(|| "Build failed".to_string());
        if !self.json {
            println!("Build failed: {}", message);
        }
        Err(AppError::Other(message))
    }
}
