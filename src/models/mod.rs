//! Data models for the replay processor.
//!
//! This module contains the plain data structures shared by the services and the processor:
//! - [`BatchRequest`], [`PerFileOutcome`], [`BatchSummary`]: inputs and outputs of a batch run
//! - [`MatchSettings`], [`MatchMetadata`], [`Combo`]: facts read from replay files by the
//!   external replay parser and combo detector
//! - [`ProcessorConfig`]: user settings persisted as YAML
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: All structs derive `Serialize`/`Deserialize` for YAML and JSON persistence
//! - **Passive**: No I/O happens here; lookups and small derived values only

pub mod batch;
pub mod config;
pub mod replay;

pub use batch::{BatchRequest, BatchSummary, PerFileOutcome};
pub use config::{
    BatchDefaults, CharacterPercent, ComboFilterSettings, DEFAULT_RENAME_TEMPLATE,
    ProcessorConfig, QueueSettings,
};
pub use replay::{
    Combo, ComboEnded, GameInfo, MatchMetadata, MatchSettings, MoveLanded, PlayerMetadata,
    PlayerSettings, PlayerType,
};
