//! Integration tests for the configuration system

use audioshelf_config::{
    apply_overrides, AppConfig, Config, ConfigError, ConfigManager, ConfigSection, LogLevel,
    StorageConfig, CONFIG_VERSION,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.storage.media_root = PathBuf::from("/srv/audiobooks");
    modified.app.log_level = LogLevel::Warn;
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.storage.media_root, PathBuf::from("/srv/audiobooks"));
    assert_eq!(reloaded.app.log_level, LogLevel::Warn);

    manager.reset()?;
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_invalid_config_is_not_saved() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.save(&Config::default())?;

    let mut invalid = Config::default();
    invalid.storage.supported_audio_extensions.clear();

    let result = manager.save(&invalid);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_atomic_save_keeps_backup() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    let config = Config::default();
    manager.save(&config)?;
    manager.save(&config)?;

    let backup_path = manager.config_path().with_extension("toml.backup");
    assert!(backup_path.exists());

    Ok(())
}

#[test]
fn test_all_sections_default_are_valid() {
    assert!(AppConfig::default().validate().is_ok());
    assert!(StorageConfig::default().validate().is_ok());
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_serialization_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let original = Config::default();
    let toml_string = toml::to_string(&original)?;
    let deserialized: Config = toml::from_str(&toml_string)?;
    assert_eq!(original, deserialized);
    Ok(())
}

#[test]
fn test_hand_written_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    std::fs::write(
        manager.config_path(),
        r#"
version = 1

[app]
database_path = "catalog.db"
log_level = "debug"

[storage]
media_root = "/mnt/media"
supported_audio_extensions = ["mp3", "m4b"]
"#,
    )?;

    let config = manager.load()?;
    assert_eq!(config.app.database_path, PathBuf::from("catalog.db"));
    assert_eq!(config.storage.media_root, PathBuf::from("/mnt/media"));
    assert_eq!(config.storage.move_timeout_secs, 30);
    assert!(config.storage.is_supported_audio("part1.m4b"));
    assert!(!config.storage.is_supported_audio("part1.flac"));

    Ok(())
}

#[test]
fn test_overrides_on_loaded_config() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let mut config = manager.load()?;
    apply_overrides(&mut config, |name| match name {
        "AUDIOSHELF_STORAGE_MEDIA_ROOT" => Some("/override/media".to_string()),
        "AUDIOSHELF_APP_LOG_LEVEL" => Some("trace".to_string()),
        _ => None,
    })?;

    assert_eq!(config.storage.media_root, PathBuf::from("/override/media"));
    assert_eq!(config.app.log_level, LogLevel::Trace);
    assert_eq!(config.app.database_path, AppConfig::default().database_path);

    Ok(())
}

#[test]
fn test_multiple_validation_errors_collected() {
    let mut config = Config::default();
    config.app.database_path = PathBuf::new();
    config.storage.move_timeout_secs = 0;
    config.storage.export_dir = PathBuf::new();

    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
}

#[test]
fn test_default_audio_extensions() {
    let config = Config::default();

    for ext in ["mp3", "m4a", "m4b", "ogg", "opus", "flac", "wav"] {
        assert!(config
            .storage
            .supported_audio_extensions
            .contains(&ext.to_string()));
    }
}
