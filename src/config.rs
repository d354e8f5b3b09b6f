use crate::core::image::ImageIdStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Thresholds shared by the categorization algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizationConfig {
    /// Smallest tag group that becomes a category.
    pub min_category_size: usize,
    /// Deepest level the content-based algorithm may create (roots are level 1).
    pub max_category_depth: usize,
    /// Occurrences needed before a tag counts as frequent.
    pub min_tag_frequency: usize,
    /// Cosine similarity two images need to share a cluster.
    pub similarity_threshold: f64,
    pub min_cluster_size: usize,
    pub max_clusters: usize,
    pub image_id_strategy: ImageIdStrategy,
}

impl Default for CategorizationConfig {
    fn default() -> Self {
        Self {
            min_category_size: 3,
            max_category_depth: 3,
            min_tag_frequency: 2,
            similarity_threshold: 0.8,
            min_cluster_size: 3,
            max_clusters: 20,
            image_id_strategy: ImageIdStrategy::FileName,
        }
    }
}

impl CategorizationConfig {
    /// Reads a JSON config; fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at the default location, or the defaults when no
    /// file exists there.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => {
                log::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let at_least_one = [
            ("min_category_size", self.min_category_size),
            ("max_category_depth", self.max_category_depth),
            ("min_tag_frequency", self.min_tag_frequency),
            ("min_cluster_size", self.min_cluster_size),
            ("max_clusters", self.max_clusters),
        ];
        for (field, value) in at_least_one {
            if value < 1 {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: format!("must be at least 1, got {}", value),
                });
            }
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "similarity_threshold",
                message: format!("must be within [0, 1], got {}", self.similarity_threshold),
            });
        }

        Ok(())
    }
}

/// `<config dir>/phototree/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("phototree").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = CategorizationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_category_size, 3);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.image_id_strategy, ImageIdStrategy::FileName);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"min_category_size": 1, "image_id_strategy": "content_hash"}"#,
        )
        .unwrap();

        let config = CategorizationConfig::load(&path).unwrap();
        assert_eq!(config.min_category_size, 1);
        assert_eq!(config.max_clusters, 20);
        assert_eq!(config.image_id_strategy, ImageIdStrategy::ContentHash);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = CategorizationConfig {
            similarity_threshold: 1.5,
            ..CategorizationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "similarity_threshold", .. })
        ));

        let config = CategorizationConfig {
            max_clusters: 0,
            ..CategorizationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "max_clusters", .. })
        ));
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            CategorizationConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            CategorizationConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
