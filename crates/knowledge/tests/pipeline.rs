//! End-to-end build and retrieval against an on-disk LanceDB index.

use async_trait::async_trait;
use qakb_core::{AppError, AppResult};
use qakb_knowledge::builder::{NO_DOCUMENTS_MESSAGE, NO_TEXT_MESSAGE};
use qakb_knowledge::{
    BuildPhase, BuildStatus, Embedder, EmbeddingConfig, EmbeddingProvider, IndexManifest,
    KnowledgeBase, KnowledgeBaseConfig, LanceDbIndex, ProgressEvent, ProgressReporter,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Embeds text onto three axes by counting the words "alpha", "beta", "gamma".
#[derive(Debug, Default)]
struct AxisProvider {
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl EmbeddingProvider for AxisProvider {
    fn provider_name(&self) -> &str {
        "axis"
    }

    fn model_name(&self) -> &str {
        "axis-v1"
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Embedding("provider unavailable".to_string()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                let count = |word: &str| text.split_whitespace().filter(|w| *w == word).count();
                let v = [count("alpha"), count("beta"), count("gamma")];
                if v.iter().all(|&c| c == 0) {
                    vec![0.01, 0.01, 0.01]
                } else {
                    v.iter().map(|&c| c as f32).collect()
                }
            })
            .collect())
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

async fn trigram_kb(workspace: &Path, config: KnowledgeBaseConfig) -> KnowledgeBase {
    let embedder = Embedder::from_config(&config.embedding).await.unwrap();
    let index = LanceDbIndex::open(&config.index_path(workspace), embedder.dimensions())
        .await
        .unwrap();
    KnowledgeBase::with_components(workspace.to_path_buf(), config, embedder, Box::new(index))
}

async fn axis_kb(workspace: &Path, fail: Arc<AtomicBool>) -> KnowledgeBase {
    let config = KnowledgeBaseConfig::default();
    let embedder = Embedder::new(Arc::new(AxisProvider { fail }), 100);
    let index = LanceDbIndex::open(&config.index_path(workspace), 3)
        .await
        .unwrap();
    KnowledgeBase::with_components(workspace.to_path_buf(), config, embedder, Box::new(index))
}

#[tokio::test]
async fn test_fixed_size_fragments_from_single_file() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("support_docs"), "a.txt", &"x".repeat(1000));

    let config = KnowledgeBaseConfig {
        chunk_size: 500,
        ..Default::default()
    };
    let kb = trigram_kb(temp.path(), config).await;

    let report = kb.build().await.unwrap();
    assert_eq!(report.status, BuildStatus::Ok);
    assert_eq!(report.num_documents, 1);
    assert_eq!(report.num_chunks, 2);

    let response = kb.retrieve("xxxx", Some(5)).await.unwrap();
    assert_eq!(response.contexts.len(), 2);
    for context in &response.contexts {
        assert_eq!(context.text.len(), 500);
        assert_eq!(context.metadata.source, "a.txt");
    }
}

#[tokio::test]
async fn test_empty_corpus_reports_error_and_leaves_store_empty() {
    let temp = TempDir::new().unwrap();
    let kb = trigram_kb(temp.path(), KnowledgeBaseConfig::default()).await;

    let report = kb.build().await.unwrap();
    assert_eq!(report.status, BuildStatus::Error);
    assert_eq!(report.message.as_deref(), Some(NO_DOCUMENTS_MESSAGE));
    assert_eq!(report.num_chunks, 0);

    assert_eq!(kb.stats().await.unwrap().num_chunks, 0);
    assert!(kb.retrieve("anything", None).await.unwrap().contexts.is_empty());
}

#[tokio::test]
async fn test_documents_without_text_report_error() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("support_docs");
    write(&docs, "empty.txt", "");
    write(&docs, "broken.pdf", "");

    let kb = trigram_kb(temp.path(), KnowledgeBaseConfig::default()).await;
    let report = kb.build().await.unwrap();

    assert_eq!(report.status, BuildStatus::Error);
    assert_eq!(report.num_documents, 2);
    assert_eq!(report.message.as_deref(), Some(NO_TEXT_MESSAGE));
    assert_eq!(kb.stats().await.unwrap().num_chunks, 0);
}

#[tokio::test]
async fn test_every_source_is_retrievable_and_recorded() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("support_docs");
    write(&docs, "a.txt", "Discount code SAVE15 gives fifteen percent off.");
    write(&docs, "b.json", r#"{"shipping": {"express": "Express shipping costs $10"}}"#);
    write(&docs, "broken.pdf", "");
    write(
        temp.path(),
        "checkout.html",
        "<html><body><button id=\"pay\">Pay Now</button></body></html>",
    );

    let kb = trigram_kb(temp.path(), KnowledgeBaseConfig::default()).await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let progress = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
        events_clone.lock().unwrap().push(event.phase);
    }));

    let report = kb.build_with_progress(progress).await.unwrap();
    assert!(report.is_ok());
    assert_eq!(report.num_documents, 4);
    assert_eq!(report.num_chunks, 3);

    let phases: BTreeSet<String> = events
        .lock()
        .unwrap()
        .iter()
        .map(|p: &BuildPhase| p.to_string())
        .collect();
    for phase in ["discover", "extract", "chunk", "embed", "index"] {
        assert!(phases.contains(phase), "missing phase {}", phase);
    }

    let response = kb.retrieve("discount shipping pay", Some(10)).await.unwrap();
    let sources: BTreeSet<&str> = response
        .contexts
        .iter()
        .map(|c| c.metadata.source.as_str())
        .collect();
    assert_eq!(
        sources,
        BTreeSet::from(["a.txt", "b.json", "checkout.html"])
    );

    let json = response
        .contexts
        .iter()
        .find(|c| c.metadata.source == "b.json")
        .unwrap();
    assert_eq!(json.text, "shipping.express.: Express shipping costs $10");

    let manifest = IndexManifest::load(kb.index_dir()).unwrap().unwrap();
    assert_eq!(manifest.num_chunks, 3);
    assert_eq!(manifest.sources.len(), 4);
    let broken = manifest
        .sources
        .iter()
        .find(|s| s.name == "broken.pdf")
        .unwrap();
    assert_eq!(broken.chunks, 0);
    assert!(broken.error.is_some());

    let stats = kb.stats().await.unwrap();
    assert_eq!(stats.num_chunks, 3);
    assert_eq!(stats.num_documents, 4);
    assert_eq!(stats.embedding.as_deref(), Some("trigram/trigram-v1 (384d)"));
    assert!(stats.built_at.is_some());
    assert!(stats.index_size_bytes > 0);
}

#[tokio::test]
async fn test_retrieve_after_clean_is_empty() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("support_docs"), "a.txt", "some text to index");

    let kb = trigram_kb(temp.path(), KnowledgeBaseConfig::default()).await;
    assert!(kb.build().await.unwrap().is_ok());
    assert_eq!(kb.retrieve("text", None).await.unwrap().contexts.len(), 1);

    kb.clean().await.unwrap();
    assert!(kb.retrieve("text", None).await.unwrap().contexts.is_empty());

    let stats = kb.stats().await.unwrap();
    assert_eq!(stats.num_chunks, 0);
    assert!(stats.built_at.is_none());
}

#[tokio::test]
async fn test_top_k_limit_and_similarity_order() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("support_docs");
    write(&docs, "1-alpha.txt", "alpha alpha");
    write(&docs, "2-mixed.txt", "alpha beta");
    write(&docs, "3-gamma.txt", "gamma");

    let kb = axis_kb(temp.path(), Arc::new(AtomicBool::new(false))).await;
    assert_eq!(kb.build().await.unwrap().num_chunks, 3);

    let top_two = kb.retrieve("alpha", Some(2)).await.unwrap().contexts;
    let sources: Vec<&str> = top_two.iter().map(|c| c.metadata.source.as_str()).collect();
    assert_eq!(sources, vec!["1-alpha.txt", "2-mixed.txt"]);

    let all = kb.retrieve("gamma", Some(10)).await.unwrap().contexts;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].metadata.source, "3-gamma.txt");
}

#[tokio::test]
async fn test_embedding_failure_keeps_previous_snapshot() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("support_docs");
    write(&docs, "a.txt", "alpha");

    let fail = Arc::new(AtomicBool::new(false));
    let kb = axis_kb(temp.path(), fail.clone()).await;
    assert!(kb.build().await.unwrap().is_ok());

    write(&docs, "b.txt", "beta");
    fail.store(true, Ordering::SeqCst);
    let err = kb.build().await.unwrap_err();
    assert!(matches!(err, AppError::Embedding(_)));

    fail.store(false, Ordering::SeqCst);
    assert_eq!(kb.stats().await.unwrap().num_chunks, 1);
    let contexts = kb.retrieve("beta", Some(5)).await.unwrap().contexts;
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].metadata.source, "a.txt");
}

#[tokio::test]
async fn test_changed_embedding_requires_rebuild() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("support_docs"), "a.txt", "some text to index");

    let kb = trigram_kb(temp.path(), KnowledgeBaseConfig::default()).await;
    assert!(kb.build().await.unwrap().is_ok());
    drop(kb);

    let config = KnowledgeBaseConfig {
        embedding: EmbeddingConfig {
            model: "trigram-v2".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let kb = trigram_kb(temp.path(), config).await;

    let err = kb.retrieve("text", None).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));

    assert!(kb.build().await.unwrap().is_ok());
    assert_eq!(kb.retrieve("text", None).await.unwrap().contexts.len(), 1);
}
