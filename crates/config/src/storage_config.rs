//! Media storage configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where catalog media lives and how it is moved around
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for images and audio (relative to config dir if not absolute)
    pub media_root: PathBuf,

    /// Directory CSV exports are written to
    pub export_dir: PathBuf,

    /// Upper bound for a single file move during a rename cascade
    pub move_timeout_secs: u64,

    /// Accepted audio upload extensions, lowercase and without the dot
    pub supported_audio_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            export_dir: PathBuf::from("exports"),
            move_timeout_secs: 30,
            supported_audio_extensions: ["mp3", "m4a", "m4b", "aac", "ogg", "opus", "flac", "wav"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl StorageConfig {
    /// Returns true if the filename carries one of the accepted extensions
    pub fn is_supported_audio(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.supported_audio_extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

impl ConfigSection for StorageConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::not_empty(&self.media_root.to_string_lossy(), "storage.media_root"),
            Validator::not_empty(&self.export_dir.to_string_lossy(), "storage.export_dir"),
            Validator::in_range(self.move_timeout_secs, 1, 3600, "storage.move_timeout_secs"),
        ];

        if self.supported_audio_extensions.is_empty() {
            results.push(Err(ValidationError::new(
                "storage.supported_audio_extensions",
                "must list at least one extension",
            )));
        }

        for ext in &self.supported_audio_extensions {
            let valid = !ext.is_empty()
                && ext
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
            if !valid {
                results.push(Err(ValidationError::with_value(
                    "storage.supported_audio_extensions",
                    "extensions must be lowercase alphanumeric without a dot",
                    ext,
                )));
            }
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.media_root = other.media_root;
        self.export_dir = other.export_dir;
        self.move_timeout_secs = other.move_timeout_secs;
        self.supported_audio_extensions = other.supported_audio_extensions;
    }

    fn section_name(&self) -> &'static str {
        "storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.move_timeout_secs, 30);
        assert_eq!(config.section_name(), "storage");
    }

    #[test]
    fn test_move_timeout_bounds() {
        let mut config = StorageConfig::default();
        config.move_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.move_timeout_secs = 3601;
        assert!(config.validate().is_err());

        config.move_timeout_secs = 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_extensions() {
        let mut config = StorageConfig::default();
        config.supported_audio_extensions = vec![".mp3".to_string(), "MP3".to_string()];
        assert_eq!(config.validate().unwrap_err().len(), 2);

        config.supported_audio_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_supported_audio() {
        let config = StorageConfig::default();
        assert!(config.is_supported_audio("track1.mp3"));
        assert!(config.is_supported_audio("Chapter 01.M4B"));
        assert!(!config.is_supported_audio("cover.jpg"));
        assert!(!config.is_supported_audio("mp3"));
        assert!(!config.is_supported_audio(".mp3"));
    }

    #[test]
    fn test_merge() {
        let mut base = StorageConfig::default();
        let mut other = StorageConfig::default();
        other.media_root = PathBuf::from("/srv/media");
        other.supported_audio_extensions = vec!["mp3".to_string()];

        base.merge(other);
        assert_eq!(base.media_root, PathBuf::from("/srv/media"));
        assert!(!base.is_supported_audio("book.flac"));
    }
}
