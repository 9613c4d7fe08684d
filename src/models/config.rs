use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Persisted processor settings, stored as `Processor Config.yaml`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub combo_filter: ComboFilterSettings,
    pub batch: BatchDefaults,
    pub queue: QueueSettings,
    pub debug_mode: bool,
}

/// Defaults used to pre-fill a batch request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchDefaults {
    pub rename_files: bool,
    pub rename_template: String,
    pub find_combos: bool,
    pub include_subfolders: bool,
    pub delete_zero_combo_files: bool,
    pub output_file: Option<Utf8PathBuf>,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            rename_files: false,
            rename_template: DEFAULT_RENAME_TEMPLATE.to_string(),
            find_combos: true,
            include_subfolders: false,
            delete_zero_combo_files: false,
            output_file: None,
        }
    }
}

/// Template offered when the user has not picked one
pub const DEFAULT_RENAME_TEMPLATE: &str = "{date}_{time} - {chars} ({tags}) on {stage}";

/// Playback padding applied when writing the Dolphin queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Frames played before each combo starts
    pub pre_combo_frames: i32,
    /// Frames played after each combo ends
    pub post_combo_frames: i32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            pre_combo_frames: 240,
            post_combo_frames: 90,
        }
    }
}

/// Minimum combo percent for one attacking character
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterPercent {
    pub character_id: u8,
    pub min_percent: f32,
}

/// Criteria a detected combo must meet to be kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboFilterSettings {
    /// Attacking characters to keep (empty keeps all)
    pub character_filter: Vec<u8>,
    /// Attacking ports to keep, 1-based (empty keeps all)
    pub port_filter: Vec<u8>,
    /// Attacking name tags to keep (empty keeps all)
    pub name_tags: Vec<String>,
    pub min_combo_percent: f32,
    pub per_character_min_combo_percent: Vec<CharacterPercent>,
    pub min_combo_length: usize,
    pub combo_must_kill: bool,
    pub exclude_cpus: bool,
    pub exclude_chain_grabs: bool,
    pub exclude_wobbles: bool,
    /// Characters whose throw-heavy combos are treated as chain grabs
    pub chain_grabbers: Vec<u8>,
    /// Share of total damage that makes a single hit "large"
    pub large_hit_threshold: f32,
    /// Pummels before a combo counts as a wobble
    pub wobble_threshold: usize,
    /// Share of throws and pummels before a combo counts as a chain grab
    pub chain_grab_threshold: f32,
}

impl Default for ComboFilterSettings {
    fn default() -> Self {
        Self {
            character_filter: Vec::new(),
            port_filter: Vec::new(),
            name_tags: Vec::new(),
            min_combo_percent: 60.0,
            per_character_min_combo_percent: Vec::new(),
            min_combo_length: 1,
            combo_must_kill: true,
            exclude_cpus: true,
            exclude_chain_grabs: true,
            exclude_wobbles: true,
            // Marth, Peach, Pikachu, Dr. Mario
            chain_grabbers: vec![9, 12, 13, 22],
            large_hit_threshold: 0.8,
            wobble_threshold: 8,
            chain_grab_threshold: 0.8,
        }
    }
}

impl ComboFilterSettings {
    /// Minimum percent for an attacking character, honoring per-character overrides
    pub fn min_percent_for(&self, character_id: Option<u8>) -> f32 {
        character_id
            .and_then(|id| {
                self.per_character_min_combo_percent
                    .iter()
                    .find(|entry| entry.character_id == id)
            })
            .map(|entry| entry.min_percent)
            .unwrap_or(self.min_combo_percent)
    }
}
