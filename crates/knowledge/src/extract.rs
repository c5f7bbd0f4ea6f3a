//! Source file parsing and text extraction.
//!
//! Every document becomes an ordered list of page texts: one per PDF page,
//! a single entry for every other type.

use crate::types::Document;
use qakb_core::AppError;
use scraper::node::Node;
use scraper::Html;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Elements whose text content is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Document type classification, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Json,
    Html,
    Unknown,
}

impl DocumentKind {
    /// Detect the document type from its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "txt" | "md" | "markdown" => Self::Text,
            "pdf" => Self::Pdf,
            "json" => Self::Json,
            "html" | "htm" => Self::Html,
            _ => Self::Unknown,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Json => "json",
            Self::Html => "html",
            Self::Unknown => "unknown",
        }
    }
}

/// Why a document produced no pages.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse PDF {path:?}: {reason}")]
    Pdf { path: PathBuf, reason: String },

    #[error("extraction of {path:?} aborted: {reason}")]
    Aborted { path: PathBuf, reason: String },
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        AppError::Extraction(err.to_string())
    }
}

/// Converts documents into page texts.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    max_page_chars: usize,
}

impl Extractor {
    /// Create an extractor that drops pages longer than `max_page_chars`.
    pub fn new(max_page_chars: usize) -> Self {
        Self { max_page_chars }
    }

    /// Read a document from disk and extract its pages.
    pub fn extract(&self, document: &Document) -> Result<Vec<String>, ExtractionError> {
        let bytes = std::fs::read(&document.path).map_err(|source| ExtractionError::Read {
            path: document.path.clone(),
            source,
        })?;

        self.extract_loaded(document, &bytes)
    }

    /// Extract pages from content already read from `document.path`.
    pub fn extract_loaded(
        &self,
        document: &Document,
        bytes: &[u8],
    ) -> Result<Vec<String>, ExtractionError> {
        let pages = extract_bytes(document.kind, bytes).map_err(|reason| {
            ExtractionError::Pdf {
                path: document.path.clone(),
                reason,
            }
        })?;

        Ok(self.drop_oversized(&document.name, pages))
    }

    /// Blank out pages beyond the size limit, keeping page positions stable.
    fn drop_oversized(&self, name: &str, pages: Vec<String>) -> Vec<String> {
        pages
            .into_iter()
            .enumerate()
            .map(|(page, text)| {
                let chars = text.chars().count();
                if chars > self.max_page_chars {
                    tracing::warn!(
                        "Skipping page {} of {}: {} characters exceeds limit of {}",
                        page,
                        name,
                        chars,
                        self.max_page_chars
                    );
                    String::new()
                } else {
                    text
                }
            })
            .collect()
    }
}

/// Extract page texts from raw file content.
///
/// Only PDF extraction can fail; every other kind degrades to lossy text.
pub fn extract_bytes(kind: DocumentKind, bytes: &[u8]) -> Result<Vec<String>, String> {
    match kind {
        DocumentKind::Text | DocumentKind::Unknown => Ok(vec![decode_lossy(bytes)]),
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Json => Ok(vec![extract_json(bytes)]),
        DocumentKind::Html => Ok(vec![extract_html(&decode_lossy(bytes))]),
    }
}

/// Decode UTF-8, replacing invalid sequences.
fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// One string per page, in page order.
fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;

    let pages = document
        .get_pages()
        .into_keys()
        .map(|number| match document.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Failed to extract text from PDF page {}: {}", number, e);
                String::new()
            }
        })
        .collect();

    Ok(pages)
}

/// Flatten a JSON document into `path: value` lines, or fall back to text.
fn extract_json(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => {
            let mut lines = Vec::new();
            flatten_json(&value, "", &mut lines);
            lines.join("\n")
        }
        Err(e) => {
            tracing::debug!("Invalid JSON, indexing as plain text: {}", e);
            decode_lossy(bytes)
        }
    }
}

/// Object keys append `key.`, array positions append `[i].`.
fn flatten_json(value: &Value, prefix: &str, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_json(child, &format!("{}{}.", prefix, key), lines);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(child, &format!("{}[{}].", prefix, index), lines);
            }
        }
        Value::String(s) => lines.push(format!("{}: {}", prefix, s)),
        scalar => lines.push(format!("{}: {}", prefix, scalar)),
    }
}

/// Visible text of an HTML document, one text node per line.
fn extract_html(source: &str) -> String {
    let document = Html::parse_document(source);
    let mut lines = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => HIDDEN_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}
