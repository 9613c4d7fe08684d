use crate::models::config::BatchDefaults;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Options for a single batch run over a replay folder
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub root_directory: Utf8PathBuf,
    pub recurse_into_subdirectories: bool,
    pub rename_files: bool,
    pub rename_template: Option<String>,
    pub find_combos: bool,
    pub delete_files_with_zero_combos: bool,
    pub output_artifact_path: Option<Utf8PathBuf>,
}

impl BatchRequest {
    /// Create a request that only enumerates `root_directory`
    pub fn new<P: AsRef<Utf8Path>>(root_directory: P) -> Self {
        Self {
            root_directory: root_directory.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Build a request from the saved batch defaults
    pub fn from_defaults<P: AsRef<Utf8Path>>(root_directory: P, defaults: &BatchDefaults) -> Self {
        let template = defaults.rename_template.trim();
        Self {
            root_directory: root_directory.as_ref().to_path_buf(),
            recurse_into_subdirectories: defaults.include_subfolders,
            rename_files: defaults.rename_files,
            rename_template: (!template.is_empty()).then(|| template.to_string()),
            find_combos: defaults.find_combos,
            delete_files_with_zero_combos: defaults.delete_zero_combo_files,
            output_artifact_path: defaults.output_file.clone(),
        }
    }

    /// The rename template to apply, if renaming is enabled
    pub fn active_rename_template(&self) -> Option<&str> {
        if !self.rename_files {
            return None;
        }
        self.rename_template
            .as_deref()
            .filter(|template| !template.trim().is_empty())
    }

    /// Check the request for contradictory options
    ///
    /// Renaming needs a non-empty template. Deleting zero-combo files without
    /// finding combos is allowed but never deletes anything.
    pub fn validate(&self) -> Result<(), String> {
        if self.rename_files && self.active_rename_template().is_none() {
            return Err("rename_files is set but no rename template was given".to_string());
        }
        Ok(())
    }
}

/// Result of processing one replay file
///
/// Fields are only populated for the steps that ran. `error` holds the message
/// of the step that failed, if any; earlier fields still reflect completed work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerFileOutcome {
    pub num_combos_found: Option<usize>,
    pub new_filename: Option<Utf8PathBuf>,
    pub file_was_deleted: Option<bool>,
    pub error: Option<String>,
}

impl PerFileOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate statistics of a finished (or cancelled) batch run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Combos written to the output artifact
    pub combos_found: usize,
    pub files_processed: usize,
    pub elapsed_seconds: f64,
    /// Whether the run stopped early because of a stop request
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_template_for_rename() {
        let mut request = BatchRequest::new("/replays");
        assert!(request.validate().is_ok());

        request.rename_files = true;
        assert!(request.validate().is_err());

        request.rename_template = Some("   ".to_string());
        assert!(request.validate().is_err());

        request.rename_template = Some("{stage}_{date}".to_string());
        assert!(request.validate().is_ok());
        assert_eq!(request.active_rename_template(), Some("{stage}_{date}"));
    }

    #[test]
    fn test_template_ignored_when_rename_disabled() {
        let request = BatchRequest {
            rename_template: Some("{stage}".to_string()),
            ..BatchRequest::new("/replays")
        };
        assert_eq!(request.active_rename_template(), None);
    }

    #[test]
    fn test_from_defaults() {
        let defaults = BatchDefaults {
            rename_files: true,
            rename_template: "{date}".to_string(),
            find_combos: true,
            include_subfolders: true,
            delete_zero_combo_files: false,
            output_file: Some(Utf8PathBuf::from("/out/combos.json")),
        };

        let request = BatchRequest::from_defaults("/replays", &defaults);
        assert_eq!(request.root_directory, Utf8PathBuf::from("/replays"));
        assert!(request.recurse_into_subdirectories);
        assert_eq!(request.rename_template.as_deref(), Some("{date}"));
        assert_eq!(
            request.output_artifact_path,
            Some(Utf8PathBuf::from("/out/combos.json"))
        );
    }
}
