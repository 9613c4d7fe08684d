//! Replay file discovery.
//!
//! Walks a replay folder (optionally recursing) and returns every regular file with the
//! `.slp` extension. Entries are sorted by file name at every directory level, so the
//! result is stable for an unchanged folder.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of replay files, without the dot
pub const REPLAY_EXTENSION: &str = "slp";

/// Errors that make a folder impossible to enumerate
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Replay folder {0} does not exist")]
    NotFound(Utf8PathBuf),

    #[error("{0} is not a directory")]
    NotADirectory(Utf8PathBuf),

    #[error("Failed to read replay folder {path}: {source}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check whether a path has the replay extension (case-insensitive)
pub fn is_replay_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(REPLAY_EXTENSION))
}

/// Collect all replay files under `root`
///
/// # Arguments
/// * `root` - Folder to scan
/// * `recursive` - Descend into subfolders when true; otherwise only direct children
///
/// # Errors
/// Fails if `root` is missing, is not a directory, or cannot be listed. Unreadable
/// entries below the root are skipped with a warning.
pub fn find_replay_files(root: &Utf8Path, recursive: bool) -> Result<Vec<Utf8PathBuf>, DiscoveryError> {
    let metadata = std::fs::metadata(root).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::NotFound(root.to_path_buf()),
        _ => DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            source,
        },
    })?;

    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    // Listing the root up front turns permission errors into a hard failure
    std::fs::read_dir(root).map_err(|source| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = match Utf8PathBuf::try_from(entry.into_path()) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping non UTF-8 path: {}", e.as_path().display());
                continue;
            }
        };

        if is_replay_file(&path) {
            files.push(path);
        }
    }

    tracing::debug!(
        "Found {} replay files under {} (recursive: {})",
        files.len(),
        root,
        recursive
    );

    Ok(files)
}
