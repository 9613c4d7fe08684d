// Replay Processor - Batch renaming and combo extraction for Slippi replays
//
// This is the library crate containing the core business logic and data structures.
// Replay parsing and combo detection are supplied by the caller through the traits in
// `services::combos`.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{BatchRequest, BatchSummary, PerFileOutcome, ProcessorConfig};
pub use processor::{FileError, FileProcessor, ProcessorError, StopHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
