//! Batch processing of replay folders.
//!
//! [`FileProcessor`] is the coordinator that ties the services together. For every replay in
//! a folder it optionally renames the file from a template, optionally extracts combos, and
//! optionally deletes files without combos. At the end of a run every queued combo is written
//! to a single Dolphin queue file.
//!
//! # Lifecycle
//!
//! A processor is `Idle` until [`FileProcessor::process`] starts a run, `Running` while the
//! file loop is active, and ends the run either `Completed` or `Cancelled`. Only one run may be
//! active at a time; a second call fails with [`ProcessorError::AlreadyRunning`].
//!
//! # Cancellation
//!
//! [`FileProcessor::stop`] (or a [`StopHandle`] from another thread) sets a flag that is
//! checked between files. The file being processed when the stop arrives is finished first.
//!
//! # Error Policy
//!
//! Enumeration and queue-writing failures abort the run. Failures on a single file (read,
//! parse, rename, extraction, delete) are logged and recorded in that file's
//! [`PerFileOutcome::error`]; the run moves on to the next file.

use crate::metrics::ProcessorMetrics;
use crate::models::config::{ProcessorConfig, QueueSettings};
use crate::models::{BatchRequest, BatchSummary, PerFileOutcome};
use crate::services::combos::{
    ComboDetector, ComboFilter, ExtractError, ReplayError, ReplayReader, SettingsComboFilter,
    extract_combos_from_file,
};
use crate::services::discovery::{DiscoveryError, find_replay_files};
use crate::services::queue::{ComboQueue, QueueError};
use crate::services::rename::{RenameError, format_file_name, rename_file};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Errors that end a batch run
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    #[error("Invalid batch request: {0}")]
    InvalidRequest(String),

    #[error("Failed to enumerate replays: {0}")]
    Enumeration(#[from] DiscoveryError),

    #[error("Failed to write combo queue to {path}: {source}")]
    Serialization {
        path: Utf8PathBuf,
        #[source]
        source: QueueError,
    },
}

/// Errors that stop processing of a single file
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to read replay: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to parse replay: {0}")]
    Parse(#[from] ReplayError),

    #[error("Failed to rename replay: {0}")]
    Rename(#[from] RenameError),

    #[error("Failed to extract combos: {0}")]
    Extract(#[from] ExtractError),

    #[error("Failed to delete replay: {0}")]
    Delete(#[source] std::io::Error),
}

// Run states. A run passes through `STARTING` while it resets the stop flag, so a stop
// request is only accepted once the reset can no longer discard it.
const IDLE: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;

/// Cloneable handle that requests cancellation of a [`FileProcessor`] run
///
/// Safe to use from any thread. Stopping an idle processor does nothing.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_requested: Arc<AtomicBool>,
    run_state: Arc<AtomicU8>,
}

impl StopHandle {
    pub fn stop(&self) {
        if self.run_state.load(Ordering::Acquire) == RUNNING {
            tracing::info!("Stop requested - processing will halt after the current file");
            self.stop_requested.store(true, Ordering::Release);
        }
    }
}

/// Returns the processor to idle when a run ends, including on early return
struct RunGuard<'a> {
    run_state: &'a AtomicU8,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.run_state.store(IDLE, Ordering::Release);
    }
}

/// Coordinates renaming, combo extraction and queue output over a replay folder
///
/// The processor owns its combo queue and its cancellation flag. Share it behind an `Arc` to
/// call [`stop`](Self::stop) from another task, or hand out a [`StopHandle`].
pub struct FileProcessor {
    reader: Arc<dyn ReplayReader>,
    detector: Arc<dyn ComboDetector>,
    filter: Arc<dyn ComboFilter>,
    queue: Mutex<ComboQueue>,
    stop_requested: Arc<AtomicBool>,
    run_state: Arc<AtomicU8>,
    metrics: ProcessorMetrics,
}

impl FileProcessor {
    /// Create a processor from its replay collaborators
    pub fn new(
        reader: Arc<dyn ReplayReader>,
        detector: Arc<dyn ComboDetector>,
        filter: Arc<dyn ComboFilter>,
    ) -> Self {
        Self {
            reader,
            detector,
            filter,
            queue: Mutex::new(ComboQueue::default()),
            stop_requested: Arc::new(AtomicBool::new(false)),
            run_state: Arc::new(AtomicU8::new(IDLE)),
            metrics: ProcessorMetrics::new(),
        }
    }

    /// Create a processor whose filter and queue padding come from the saved configuration
    pub fn from_config(
        reader: Arc<dyn ReplayReader>,
        detector: Arc<dyn ComboDetector>,
        config: &ProcessorConfig,
    ) -> Self {
        let filter = Arc::new(SettingsComboFilter::new(config.combo_filter.clone()));
        Self::new(reader, detector, filter).with_queue_settings(config.queue)
    }

    /// Replace the queue padding settings
    pub fn with_queue_settings(self, settings: QueueSettings) -> Self {
        Self {
            queue: Mutex::new(ComboQueue::new(settings)),
            ..self
        }
    }

    /// Request cancellation of the current run; no effect when idle
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_requested: self.stop_requested.clone(),
            run_state: self.run_state.clone(),
        }
    }

    /// Whether a run is active; a [`stop`](Self::stop) issued after this returns true is honored
    pub fn is_running(&self) -> bool {
        self.run_state.load(Ordering::Acquire) == RUNNING
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// Number of combos currently queued
    pub fn queued_combos(&self) -> usize {
        self.lock_queue().len()
    }

    /// Copy of the current queue contents
    pub fn queue_snapshot(&self) -> ComboQueue {
        self.lock_queue().clone()
    }

    /// Write the current queue to `path` without starting a run
    ///
    /// The queue is only cleared when the next run starts, so this re-emits the combos of the
    /// previous run.
    pub async fn write_queue(&self, path: &Utf8Path) -> Result<usize, ProcessorError> {
        let snapshot = self.queue_snapshot();
        snapshot
            .write_file(path)
            .await
            .map_err(|source| ProcessorError::Serialization {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Run a batch without progress reporting
    pub async fn process(&self, request: &BatchRequest) -> Result<BatchSummary, ProcessorError> {
        self.process_with_progress(request, |_, _, _, _| {}).await
    }

    /// Run a batch, calling `on_progress(index, total, filename, outcome)` after each file
    ///
    /// `filename` is the path as enumerated, before any rename. The callback runs on the
    /// processing task; panicking inside it is the caller's responsibility and aborts the run.
    pub async fn process_with_progress<F>(
        &self,
        request: &BatchRequest,
        mut on_progress: F,
    ) -> Result<BatchSummary, ProcessorError>
    where
        F: FnMut(usize, usize, &Utf8Path, &PerFileOutcome),
    {
        request.validate().map_err(ProcessorError::InvalidRequest)?;

        if self
            .run_state
            .compare_exchange(IDLE, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Rejected batch request: a run is already in progress");
            return Err(ProcessorError::AlreadyRunning);
        }
        let _guard = RunGuard {
            run_state: &self.run_state,
        };

        let started = Instant::now();
        self.stop_requested.store(false, Ordering::Release);
        self.run_state.store(RUNNING, Ordering::Release);
        self.lock_queue().clear();
        self.metrics.record_run_started();

        if request.delete_files_with_zero_combos && !request.find_combos {
            tracing::warn!("Deleting zero-combo files requires finding combos; no files will be deleted");
        }

        let files = find_replay_files(&request.root_directory, request.recurse_into_subdirectories)?;
        let total = files.len();
        tracing::info!("Processing {} replays in {}", total, request.root_directory);

        let mut files_processed = 0;
        let mut cancelled = false;
        for (index, path) in files.iter().enumerate() {
            if self.stop_requested.load(Ordering::Acquire) {
                tracing::warn!(
                    "Batch cancelled after {} of {} files",
                    files_processed,
                    total
                );
                cancelled = true;
                break;
            }

            let file_started = Instant::now();
            let outcome = self.process_file(path, request).await;
            self.metrics.record_file_processed(file_started.elapsed());

            on_progress(index, total, path.as_path(), &outcome);
            files_processed += 1;
        }

        if cancelled {
            self.metrics.record_run_cancelled();
        }

        let combos_found = match (request.find_combos, &request.output_artifact_path) {
            (true, Some(output)) => self.write_queue(output).await?,
            _ => 0,
        };

        let summary = BatchSummary {
            combos_found,
            files_processed,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            cancelled,
        };

        tracing::info!(
            "Batch finished: {} files processed, {} combos written in {:.2}s{}",
            summary.files_processed,
            summary.combos_found,
            summary.elapsed_seconds,
            if cancelled { " (cancelled)" } else { "" }
        );
        self.metrics.log_summary();

        Ok(summary)
    }

    /// Process one file, recording any failure in the outcome instead of returning it
    async fn process_file(&self, path: &Utf8Path, request: &BatchRequest) -> PerFileOutcome {
        tracing::info!("Processing file: {}", path);

        let mut outcome = PerFileOutcome::default();
        if let Err(e) = self.try_process_file(path, request, &mut outcome).await {
            tracing::error!("Failed to process {}: {}", path, e);
            self.metrics.record_file_failed();
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn try_process_file(
        &self,
        path: &Utf8Path,
        request: &BatchRequest,
        outcome: &mut PerFileOutcome,
    ) -> Result<(), FileError> {
        let mut current = path.to_path_buf();

        if let Some(template) = request.active_rename_template() {
            let bytes = tokio::fs::read(&current).await.map_err(FileError::Read)?;
            let info = self.reader.read_game_info(&bytes)?;
            let original = current.file_name().unwrap_or_default();
            let new_name = format_file_name(template, &info.settings, &info.metadata, original);

            let renamed = rename_file(&current, &new_name).await?;
            if renamed != current {
                self.metrics.record_file_renamed();
            }
            outcome.new_filename = Some(renamed.clone());
            current = renamed;
        }

        if request.find_combos {
            let combos =
                extract_combos_from_file(self.detector.as_ref(), self.filter.as_ref(), &current)
                    .await?;
            let count = combos.len();

            {
                let mut queue = self.lock_queue();
                for combo in combos {
                    queue.add_combo(&current, combo);
                }
            }
            outcome.num_combos_found = Some(count);
            self.metrics.record_combos_found(count);

            if request.delete_files_with_zero_combos && count == 0 {
                tracing::info!("No combos found in {}. Deleting...", current);
                tokio::fs::remove_file(&current)
                    .await
                    .map_err(FileError::Delete)?;
                outcome.file_was_deleted = Some(true);
                self.metrics.record_file_deleted();
            }
        }

        Ok(())
    }

    fn lock_queue(&self) -> MutexGuard<'_, ComboQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Combo, ComboEnded, GameInfo, MatchSettings};
    use crate::services::combos::{ComboStream, MockComboFilter, StreamMode};
    use std::fs;
    use std::sync::mpsc as std_mpsc;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedSender;

    struct NoInfoReader;

    impl ReplayReader for NoInfoReader {
        fn read_game_info(&self, _bytes: &[u8]) -> Result<GameInfo, ReplayError> {
            Ok(GameInfo::default())
        }
    }

    /// Emits one combo per byte of input
    struct ByteDetector;

    struct ByteStream(UnboundedSender<ComboEnded>);

    impl ComboStream for ByteStream {
        fn write(&mut self, chunk: &[u8]) -> Result<(), ReplayError> {
            for byte in chunk {
                let _ = self.0.send(ComboEnded {
                    combo: Combo {
                        player_index: 0,
                        opponent_index: 1,
                        start_frame: *byte as i32,
                        end_frame: None,
                        start_percent: 0.0,
                        current_percent: 0.0,
                        end_percent: None,
                        moves: Vec::new(),
                        did_kill: false,
                    },
                    settings: MatchSettings::default(),
                });
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<(), ReplayError> {
            Ok(())
        }
    }

    impl ComboDetector for ByteDetector {
        fn open_stream(
            &self,
            _mode: StreamMode,
            events: UnboundedSender<ComboEnded>,
        ) -> Box<dyn ComboStream> {
            Box::new(ByteStream(events))
        }
    }

    fn processor_with_filter(filter: MockComboFilter) -> FileProcessor {
        FileProcessor::new(Arc::new(NoInfoReader), Arc::new(ByteDetector), Arc::new(filter))
    }

    fn replay_dir(files: &[(&str, &[u8])]) -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        for (name, contents) in files {
            fs::write(root.join(name), contents).unwrap();
        }
        (temp_dir, root)
    }

    #[tokio::test]
    async fn test_filter_decides_queued_combos() {
        let (_temp_dir, root) = replay_dir(&[("a.slp", b"\x01\x02\x03")]);
        let mut filter = MockComboFilter::new();
        filter
            .expect_is_combo()
            .returning(|combo, _| combo.start_frame % 2 == 1);
        let processor = processor_with_filter(filter);

        let request = BatchRequest {
            find_combos: true,
            ..BatchRequest::new(&root)
        };
        let summary = processor.process(&request).await.unwrap();

        assert_eq!(summary.files_processed, 1);
        // No output path, so nothing is written
        assert_eq!(summary.combos_found, 0);
        assert_eq!(processor.queued_combos(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_running() {
        let processor = processor_with_filter(MockComboFilter::new());
        let request = BatchRequest {
            rename_files: true,
            ..BatchRequest::new("/does/not/matter")
        };

        let result = processor.process(&request).await;
        assert!(matches!(result, Err(ProcessorError::InvalidRequest(_))));
        assert!(!processor.is_running());
    }

    #[tokio::test]
    async fn test_running_flag_cleared_after_enumeration_error() {
        let processor = processor_with_filter(MockComboFilter::new());
        let request = BatchRequest::new("/definitely/not/a/real/replay/dir");

        let result = processor.process(&request).await;
        assert!(matches!(result, Err(ProcessorError::Enumeration(_))));
        assert!(!processor.is_running());
    }

    #[tokio::test]
    async fn test_stop_inside_callback_halts_after_current_file() {
        let (_temp_dir, root) = replay_dir(&[("a.slp", b""), ("b.slp", b""), ("c.slp", b"")]);
        let processor = processor_with_filter(MockComboFilter::new());
        let handle = processor.stop_handle();

        let mut seen = Vec::new();
        let summary = processor
            .process_with_progress(&BatchRequest::new(&root), |index, total, _, _| {
                seen.push((index, total));
                handle.stop();
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![(0, 3)]);
        assert_eq!(summary.files_processed, 1);
        assert!(summary.cancelled);
        assert_eq!(processor.metrics().runs_cancelled.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_stop_while_idle_has_no_effect() {
        let (_temp_dir, root) = replay_dir(&[("a.slp", b""), ("b.slp", b"")]);
        let processor = processor_with_filter(MockComboFilter::new());

        processor.stop();
        let summary = processor.process(&BatchRequest::new(&root)).await.unwrap();

        assert_eq!(summary.files_processed, 2);
        assert!(!summary.cancelled);
    }

    /// Blocks in `finish` of the first stream until released
    struct GatedDetector {
        started: std::sync::Mutex<Option<std_mpsc::Sender<()>>>,
        release: std::sync::Mutex<Option<std_mpsc::Receiver<()>>>,
    }

    struct GatedStream {
        started: Option<std_mpsc::Sender<()>>,
        release: Option<std_mpsc::Receiver<()>>,
    }

    impl ComboStream for GatedStream {
        fn write(&mut self, _chunk: &[u8]) -> Result<(), ReplayError> {
            Ok(())
        }

        fn finish(&mut self) -> Result<(), ReplayError> {
            if let (Some(started), Some(release)) = (self.started.take(), self.release.take()) {
                started.send(()).unwrap();
                release.recv().unwrap();
            }
            Ok(())
        }
    }

    impl ComboDetector for GatedDetector {
        fn open_stream(
            &self,
            _mode: StreamMode,
            _events: UnboundedSender<ComboEnded>,
        ) -> Box<dyn ComboStream> {
            Box::new(GatedStream {
                started: self.started.lock().unwrap().take(),
                release: self.release.lock().unwrap().take(),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reentrant_run_is_rejected() {
        let (_temp_dir, root) = replay_dir(&[("a.slp", b""), ("b.slp", b"")]);
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let processor = Arc::new(FileProcessor::new(
            Arc::new(NoInfoReader),
            Arc::new(GatedDetector {
                started: std::sync::Mutex::new(Some(started_tx)),
                release: std::sync::Mutex::new(Some(release_rx)),
            }),
            Arc::new(MockComboFilter::new()),
        ));
        let request = BatchRequest {
            find_combos: true,
            ..BatchRequest::new(&root)
        };

        let runner = processor.clone();
        let first_request = request.clone();
        let first = tokio::spawn(async move { runner.process(&first_request).await });

        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();
        assert!(processor.is_running());

        let second = processor.process(&request).await;
        assert!(matches!(second, Err(ProcessorError::AlreadyRunning)));
        assert!(processor.is_running());

        release_tx.send(()).unwrap();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.files_processed, 2);
        assert!(!summary.cancelled);
        assert!(!processor.is_running());

        // The guard is released, so a fresh run is accepted
        let summary = processor.process(&request).await.unwrap();
        assert_eq!(summary.files_processed, 2);
    }

    #[test]
    fn test_stop_during_startup_is_ignored() {
        let processor = processor_with_filter(MockComboFilter::new());
        let handle = processor.stop_handle();

        processor.run_state.store(STARTING, Ordering::Release);
        assert!(!processor.is_running());
        handle.stop();
        assert!(!processor.stop_requested.load(Ordering::Acquire));

        processor.run_state.store(RUNNING, Ordering::Release);
        assert!(processor.is_running());
        handle.stop();
        assert!(processor.stop_requested.load(Ordering::Acquire));

        processor.run_state.store(IDLE, Ordering::Release);
    }

    #[tokio::test]
    async fn test_missing_file_is_recorded_and_run_continues() {
        let (_temp_dir, root) = replay_dir(&[("a.slp", b""), ("b.slp", b"")]);
        let processor = processor_with_filter(MockComboFilter::new());

        let mut outcomes = Vec::new();
        let first = root.join("a.slp");
        let summary = processor
            .process_with_progress(
                &BatchRequest {
                    find_combos: true,
                    ..BatchRequest::new(&root)
                },
                |index, _, path, outcome| {
                    if index == 0 {
                        // Remove the next file before the processor reaches it
                        fs::remove_file(path.with_file_name("b.slp")).unwrap();
                    }
                    outcomes.push((path.to_path_buf(), outcome.clone()));
                },
            )
            .await
            .unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(outcomes[0].0, first);
        assert_eq!(outcomes[0].1.num_combos_found, Some(0));
        assert!(outcomes[0].1.error.is_none());
        assert!(outcomes[1].1.error.is_some());
        assert_eq!(outcomes[1].1.num_combos_found, None);
        assert_eq!(processor.metrics().files_failed.load(Ordering::Relaxed), 1);
    }
}
