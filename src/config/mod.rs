use crate::models::ProcessorConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the processor settings inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "Processor Config.yaml";

/// Prefix of environment variables that override file settings
///
/// Nested keys use a double underscore, e.g. `REPLAY_PROCESSOR__BATCH__FIND_COMBOS=false`.
pub const ENV_PREFIX: &str = "REPLAY_PROCESSOR";

/// Configuration manager for loading and saving the processor settings file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `Processor Config.yaml`; created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the processor settings.
    ///
    /// Layers the YAML file (if present) under `REPLAY_PROCESSOR__*` environment overrides.
    /// Missing keys fall back to their defaults.
    pub fn load_config(&self) -> Result<ProcessorConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = Config::builder()
            .add_source(
                File::new(self.config_path.as_str(), FileFormat::Yaml).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: ProcessorConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded processor config from {}", self.config_path);
        Ok(config)
    }

    /// Save the processor settings.
    pub fn save_config(&self, config: &ProcessorConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved processor config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the settings file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.config_path().as_str().ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = manager.load_config().unwrap();
        assert_eq!(config.combo_filter.min_combo_percent, 60.0);
    }

    #[test]
    fn test_save_then_load() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = ProcessorConfig::default();
        config.combo_filter.min_combo_percent = 45.0;
        config.combo_filter.port_filter = vec![1, 3];
        config.batch.output_file = Some(Utf8PathBuf::from("combos.json"));
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.combo_filter.min_combo_percent, 45.0);
        assert_eq!(loaded.combo_filter.port_filter, vec![1, 3]);
        assert_eq!(loaded.batch.output_file, Some(Utf8PathBuf::from("combos.json")));
    }
}
