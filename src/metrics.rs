// Processing metrics module
//
// Lightweight counters for monitoring batch runs

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Cumulative metrics for one [`FileProcessor`](crate::processor::FileProcessor)
///
/// Uses atomic operations so a stop request or a status poll from another thread never
/// contends with the run that is updating them.
#[derive(Debug)]
pub struct ProcessorMetrics {
    /// Batch runs started
    pub runs_started: AtomicUsize,

    /// Batch runs that ended because of a stop request
    pub runs_cancelled: AtomicUsize,

    /// Files that completed processing (including failed ones)
    pub files_processed: AtomicUsize,

    /// Files moved to a new name
    pub files_renamed: AtomicUsize,

    /// Files deleted for having no combos
    pub files_deleted: AtomicUsize,

    /// Files whose processing stopped on an error
    pub files_failed: AtomicUsize,

    /// Combos accepted by the filter
    pub combos_found: AtomicUsize,

    /// Total per-file processing time in milliseconds
    pub total_processing_time_ms: AtomicU64,

    /// Creation time of the processor
    start_time: Instant,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicUsize::new(0),
            runs_cancelled: AtomicUsize::new(0),
            files_processed: AtomicUsize::new(0),
            files_renamed: AtomicUsize::new(0),
            files_deleted: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            combos_found: AtomicUsize::new(0),
            total_processing_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one processed file and how long it took
    pub fn record_file_processed(&self, duration: Duration) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_file_renamed(&self) {
        self.files_renamed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_deleted(&self) {
        self.files_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_combos_found(&self, count: usize) {
        self.combos_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average processing time per file in milliseconds
    pub fn avg_processing_time_ms(&self) -> f64 {
        let total = self.total_processing_time_ms.load(Ordering::Relaxed);
        let count = self.files_processed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Replay Processing Metrics ===");
        tracing::info!(
            "Runs: {} started, {} cancelled",
            self.runs_started.load(Ordering::Relaxed),
            self.runs_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Files: {} processed, {} renamed, {} deleted, {} failed",
            self.files_processed.load(Ordering::Relaxed),
            self.files_renamed.load(Ordering::Relaxed),
            self.files_deleted.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Combos found: {}, avg {:.2}ms per file, uptime {:.0}s",
            self.combos_found.load(Ordering::Relaxed),
            self.avg_processing_time_ms(),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for ProcessorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
