//! Configuration manager, the main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "AUDIOSHELF";

/// Loads, saves and locates the configuration file
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a config manager for the platform config directory
    ///
    /// - Linux: `~/.config/audioshelf/`
    /// - macOS: `~/Library/Application Support/audioshelf/`
    /// - Windows: `%APPDATA%\audioshelf\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let persistence = ConfigPersistence::new(config_dir.join("config.toml"));

        Ok(Self {
            persistence,
            config_dir,
        })
    }

    /// Creates a config manager for an explicit config file path
    pub fn with_file(config_path: &Path) -> ConfigResult<Self> {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            persistence: ConfigPersistence::new(config_path.to_path_buf()),
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "audioshelf")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.persistence.path().to_path_buf()
    }

    /// Resolves a configured path; relative paths live under the config directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Loads the configuration; a missing file yields defaults
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Validates and saves the configuration atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, applies `update_fn`, and saves
    ///
    /// ```rust,no_run
    /// # use audioshelf_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.storage.move_timeout_secs = 60;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file if none exists.
    ///
    /// Returns `Ok(true)` if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    /// Overwrites the config file with defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Returns every validation problem in the stored config
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the config and applies `AUDIOSHELF_SECTION_FIELD` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }
}

/// Applies overrides looked up by variable name.
///
/// Recognised variables: `AUDIOSHELF_APP_DATABASE_PATH`, `AUDIOSHELF_APP_LOG_LEVEL`,
/// `AUDIOSHELF_STORAGE_MEDIA_ROOT`, `AUDIOSHELF_STORAGE_EXPORT_DIR` and
/// `AUDIOSHELF_STORAGE_MOVE_TIMEOUT_SECS`. Unparsable values are rejected.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |section: &str, field: &str| {
        let name = format!("{}_{}_{}", ENV_PREFIX, section, field);
        lookup(&name).map(|value| (name, value))
    };

    if let Some((_, value)) = var("APP", "DATABASE_PATH") {
        config.app.database_path = PathBuf::from(value);
    }

    if let Some((name, value)) = var("APP", "LOG_LEVEL") {
        config.app.log_level =
            value
                .parse::<LogLevel>()
                .map_err(|e| ConfigError::InvalidOverride {
                    variable: name,
                    reason: e.message,
                })?;
    }

    if let Some((_, value)) = var("STORAGE", "MEDIA_ROOT") {
        config.storage.media_root = PathBuf::from(value);
    }

    if let Some((_, value)) = var("STORAGE", "EXPORT_DIR") {
        config.storage.export_dir = PathBuf::from(value);
    }

    if let Some((name, value)) = var("STORAGE", "MOVE_TIMEOUT_SECS") {
        config.storage.move_timeout_secs =
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidOverride {
                    variable: name,
                    reason: e.to_string(),
                })?;
    }

    if let Err(errors) = config.validate() {
        log::warn!(
            "Config validation warnings after env overrides: {}",
            crate::error::join_errors(&errors)
        );
    }

    Ok(())
}
