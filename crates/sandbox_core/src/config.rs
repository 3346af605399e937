//! Engine configuration.
//!
//! # Invariants
//! - Every field has a default, so an empty TOML document is a valid config.
//! - Unknown keys are rejected to surface typos early.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for publish behavior and process bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Edge label that links an entity to its image vertex.
    pub entity_has_image_relationship: String,
    /// Vertex property republished when such an edge is published.
    pub entity_image_property: String,
    /// Properties always promoted together with their element.
    pub system_properties: Vec<String>,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity_has_image_relationship: "entityHasImage".to_string(),
            entity_image_property: "entityImageVertexId".to_string(),
            system_properties: ["visibilityJson", "modifiedBy", "modifiedDate", "conceptType"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(value: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(value)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn is_system_property(&self, name: &str) -> bool {
        self.system_properties.iter().any(|system| system == name)
    }
}

/// Log backend settings consumed by binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.is_system_property("modifiedBy"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_toml_str(
            r#"
entity_has_image_relationship = "hasPicture"
system_properties = ["audit"]

[logging]
level = "warn"
"#,
        )
        .unwrap();
        assert_eq!(config.entity_has_image_relationship, "hasPicture");
        assert!(config.is_system_property("audit"));
        assert!(!config.is_system_property("modifiedBy"));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("colour = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "entity_image_property = \"glyph\"").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.entity_image_property, "glyph");
    }
}
