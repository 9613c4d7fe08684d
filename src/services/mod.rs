//! Services module - Pure business logic for replay batch processing.
//!
//! The services are **framework-agnostic** and know nothing about the GUI that drives them,
//! which keeps them testable and reusable from a CLI or a background task.
//!
//! # Components
//!
//! - [`discovery`]: Enumerates `.slp` files in a folder, optionally recursing, in a stable order.
//! - [`rename`]: Renders rename templates ([`format_file_name`]) and performs collision-safe
//!   renames ([`rename_file`]).
//! - [`combos`]: Traits for the external replay parser and combo detector, the settings-driven
//!   [`SettingsComboFilter`], and [`extract_combos`] which pipes a replay through a detector.
//! - [`queue`]: [`ComboQueue`], the per-run collection of combos written out as a Dolphin
//!   playback queue.
//!
//! # Replay Integration
//!
//! Parsing replay bytes and detecting combos are external capabilities. This crate consumes
//! them through [`ReplayReader`], [`ComboDetector`] and [`ComboFilter`] so that any parser can
//! be plugged in by the composition root.

pub mod combos;
pub mod discovery;
pub mod queue;
pub mod rename;

pub use combos::{
    ComboDetector, ComboFilter, ComboStream, ExtractError, ReplayError, ReplayReader,
    SettingsComboFilter, StreamMode, extract_combos, extract_combos_from_file,
};
pub use discovery::{DiscoveryError, find_replay_files, is_replay_file};
pub use queue::{ComboQueue, QueueError};
pub use rename::{RenameError, format_file_name, rename_file, unique_file_name};
