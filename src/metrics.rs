use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_extracted: AtomicU64,
    pages_extracted: AtomicU64,
    summaries_generated: AtomicU64,
    translations_completed: AtomicU64,
    translation_failures: AtomicU64,
    audio_generated: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an extracted document and its page count.
    pub fn record_extraction(&self, page_count: u64) {
        self.documents_extracted.fetch_add(1, Ordering::Relaxed);
        self.pages_extracted
            .fetch_add(page_count, Ordering::Relaxed);
    }

    /// Record a generated summary.
    pub fn record_summary(&self) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a translation attempt and whether it succeeded.
    pub fn record_translation(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.translations_completed
        } else {
            &self.translation_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a synthesized audio file.
    pub fn record_audio(&self) {
        self.audio_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_extracted: self.documents_extracted.load(Ordering::Relaxed),
            pages_extracted: self.pages_extracted.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            translations_completed: self.translations_completed.load(Ordering::Relaxed),
            translation_failures: self.translation_failures.load(Ordering::Relaxed),
            audio_generated: self.audio_generated.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents whose text was extracted.
    pub documents_extracted: u64,
    /// Pages read across all extracted documents.
    pub pages_extracted: u64,
    /// Summaries produced by the model.
    pub summaries_generated: u64,
    /// Translations returned by the translation service.
    pub translations_completed: u64,
    /// Translations that ended in a displayed error.
    pub translation_failures: u64,
    /// Audio files written.
    pub audio_generated: u64,
}
