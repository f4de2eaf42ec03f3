//! Application configuration: backend address, label mapping, export layout.
//!
//! Stored as pretty JSON. Every field has a default, so a missing file or a
//! partially written one still loads.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::DEFAULT_BASE_URL;
use crate::codec::ExportOptions;
use crate::label::LabelMapping;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tesa.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend URL must start with http:// or https://, got `{0}`")]
    InvalidBackendUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub label_mapping: LabelMapping,
    pub export: ExportOptions,
    pub request_timeout_secs: u64,
    /// Texts per backend request.
    pub batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BASE_URL.to_string(),
            label_mapping: LabelMapping::default(),
            export: ExportOptions::default(),
            request_timeout_secs: 30,
            batch_size: 64,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or defaults when the file does not exist.
    ///
    /// A stored label mapping that is not a bijection is repaired and a
    /// warning is logged; see [`LabelMapping::repaired`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let mut config: AppConfig = serde_json::from_str(&data)?;

        if !config.label_mapping.is_bijective() {
            let repaired = config.label_mapping.repaired();
            warn!(
                stored = ?config.label_mapping.classes(),
                repaired = ?repaired.classes(),
                "stored label mapping is not a bijection; repaired"
            );
            config.label_mapping = repaired;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBackendUrl(self.backend_url.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{DatasetCode, SemanticClass};

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tesa.json");
        let mut config = AppConfig::default();
        config.label_mapping = config
            .label_mapping
            .set(DatasetCode::new(2).unwrap(), SemanticClass::Negative);
        config.export.include_text = false;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_is_filled_in() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tesa.json");
        std::fs::write(&path, r#"{"label_mapping": {"0": "neutral", "1": "negative"}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(
            config.label_mapping.classes(),
            [
                SemanticClass::Neutral,
                SemanticClass::Negative,
                SemanticClass::Positive
            ]
        );
        assert_eq!(config.backend_url, DEFAULT_BASE_URL);
        assert!(config.export.include_id);
    }

    #[test]
    fn test_corrupt_mapping_is_repaired() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tesa.json");
        std::fs::write(&path, r#"{"label_mapping": {"0": "positive"}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(config.label_mapping.is_bijective());
        assert_eq!(
            config.label_mapping.classes(),
            [
                SemanticClass::Positive,
                SemanticClass::Neutral,
                SemanticClass::Negative
            ]
        );
    }

    #[test]
    fn test_invalid_backend_url() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tesa.json");
        std::fs::write(&path, r#"{"backend_url": "localhost:8000"}"#).unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::InvalidBackendUrl(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tesa.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Json(_))));
    }
}
