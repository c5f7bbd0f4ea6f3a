//! Structured progress reporting for knowledge base builds.
//!
//! A build walks through fixed phases; each step emits a [`ProgressEvent`]
//! to an optional callback so a caller can render incremental feedback.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Phase of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Discover,
    Extract,
    Chunk,
    Embed,
    Index,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Discover => "discover",
            BuildPhase::Extract => "extract",
            BuildPhase::Chunk => "chunk",
            BuildPhase::Embed => "embed",
            BuildPhase::Index => "index",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted during a build.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: BuildPhase,

    /// Units of work done so far (documents, fragments)
    pub current: u64,

    /// Total expected work, if known
    pub total: Option<u64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: BuildPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    /// Percentage complete, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        })
    }

    /// Format as a single user-facing line, e.g. `[extract] 2/4 (50%) - a.txt`.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits build progress through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(&self, mut event: ProgressEvent) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        event.elapsed_secs = Some(elapsed);

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Build progress"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn discover(&self, found: u64, dir: &str) {
        self.emit(ProgressEvent::new(
            BuildPhase::Discover,
            found,
            Some(found),
            format!("found {} documents in {}", found, dir),
        ));
    }

    pub fn extract(&self, current: u64, total: u64, file: &str) {
        self.emit(ProgressEvent::new(
            BuildPhase::Extract,
            current,
            Some(total),
            format!("read {}", file),
        ));
    }

    pub fn chunk(&self, current: u64, total: u64, fragments: usize) {
        self.emit(ProgressEvent::new(
            BuildPhase::Chunk,
            current,
            Some(total),
            format!("{} fragments so far", fragments),
        ));
    }

    pub fn embed(&self, fragments: u64, model: &str) {
        self.emit(ProgressEvent::new(
            BuildPhase::Embed,
            fragments,
            Some(fragments),
            format!("model={}", model),
        ));
    }

    pub fn index(&self, fragments: u64) {
        self.emit(ProgressEvent::new(
            BuildPhase::Index,
            fragments,
            Some(fragments),
            "writing snapshot",
        ));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new(BuildPhase::Extract, 5, Some(10), "a.txt");
        let formatted = event.format_simple();
        assert_eq!(formatted, "[extract] 5/10 (50%) - a.txt");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            events_clone.lock().unwrap().push(event);
        }));

        reporter.discover(3, "support_docs");
        reporter.index(12);

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, BuildPhase::Discover);
        assert_eq!(captured[0].current, 3);
        assert_eq!(captured[1].phase, BuildPhase::Index);
        assert!(captured[1].elapsed_secs.is_some());
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().discover(1, "test");
    }
}
