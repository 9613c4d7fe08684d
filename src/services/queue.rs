use crate::models::config::QueueSettings;
use crate::models::replay::{Combo, FIRST_FRAME};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while writing the combo queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to serialize combo queue: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write combo queue: {0}")]
    Io(#[from] std::io::Error),
}

/// One playback entry in a Dolphin queue file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DolphinEntry {
    pub path: String,
    pub start_frame: i32,
    pub end_frame: i32,
}

/// Top-level shape of a Dolphin playback queue file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DolphinQueue {
    pub mode: String,
    pub replay: String,
    pub is_real_time_mode: bool,
    pub output_overlay_files: bool,
    pub queue: Vec<DolphinEntry>,
}

/// Combos collected during a batch run, grouped by replay file
///
/// Files keep the order in which their first combo was added, and combos keep their
/// append order within a file. Writing the queue does not clear it.
#[derive(Debug, Clone, Default)]
pub struct ComboQueue {
    combos: IndexMap<Utf8PathBuf, Vec<Combo>>,
    settings: QueueSettings,
}

impl ComboQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            combos: IndexMap::new(),
            settings,
        }
    }

    pub fn add_combo(&mut self, path: &Utf8Path, combo: Combo) {
        self.combos.entry(path.to_path_buf()).or_default().push(combo);
    }

    pub fn clear(&mut self) {
        self.combos.clear();
    }

    /// Total number of queued combos across all files
    pub fn len(&self) -> usize {
        self.combos.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued combos for a single replay
    pub fn combos_for(&self, path: &Utf8Path) -> &[Combo] {
        self.combos.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over every queued combo with its replay path, in queue order
    pub fn iter(&self) -> impl Iterator<Item = (&Utf8Path, &Combo)> {
        self.combos
            .iter()
            .flat_map(|(path, combos)| combos.iter().map(move |c| (path.as_path(), c)))
    }

    /// Build the Dolphin playback queue for the current contents
    ///
    /// Negative padding counts as zero; frames saturate instead of overflowing.
    pub fn to_dolphin_queue(&self) -> DolphinQueue {
        let pre = self.settings.pre_combo_frames.max(0);
        let post = self.settings.post_combo_frames.max(0);
        let queue = self
            .iter()
            .map(|(path, combo)| DolphinEntry {
                path: path.to_string(),
                start_frame: combo.start_frame.saturating_sub(pre).max(FIRST_FRAME),
                end_frame: combo.last_frame().saturating_add(post),
            })
            .collect();

        DolphinQueue {
            mode: "queue".to_string(),
            replay: String::new(),
            is_real_time_mode: false,
            output_overlay_files: true,
            queue,
        }
    }

    /// Write the whole queue to `path` as Dolphin queue JSON
    ///
    /// # Returns
    /// The number of combos written
    pub async fn write_file(&self, path: &Utf8Path) -> Result<usize, QueueError> {
        let queue = self.to_dolphin_queue();
        let json = serde_json::to_string_pretty(&queue)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;

        tracing::info!("Wrote {} combos to {}", queue.queue.len(), path);
        Ok(queue.queue.len())
    }
}
