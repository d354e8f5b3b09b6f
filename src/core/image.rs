use crate::core::category::ImageId;
use crate::core::hash::{HashError, HashService};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How an image id is derived from its file.
///
/// `FileName` collides when two folders hold files with the same name;
/// `FullPath` and `ContentHash` do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImageIdStrategy {
    #[default]
    FileName,
    FullPath,
    ContentHash,
}

impl ImageIdStrategy {
    pub fn image_id(&self, path: &Path) -> Result<ImageId, HashError> {
        match self {
            ImageIdStrategy::FileName => Ok(path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string())),
            ImageIdStrategy::FullPath => Ok(path.to_string_lossy().to_string()),
            ImageIdStrategy::ContentHash => HashService::new().content_id(path),
        }
    }
}

/// One image as the categorization engine sees it: a stable id, its content
/// tags (most salient first) and an optional unit-length feature vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedImage {
    pub id: ImageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_vector: Option<Vec<f32>>,
}

impl AnalyzedImage {
    pub fn new(id: impl Into<ImageId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_features(mut self, features: Vec<f32>) -> Self {
        self.feature_vector = Some(features);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Scales `vector` to unit length in place; a zero vector is left alone.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Capitalizes the first letter of every word, like a folder title.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;

    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = true;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("beach"), "Beach");
        assert_eq!(title_case("golden retriever"), "Golden Retriever");
        assert_eq!(title_case("SUNSET"), "Sunset");
        assert_eq!(title_case("o'neil-park"), "O'Neil-Park");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_id_strategies() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("IMG_0001.jpg");
        fs::write(&path, b"pixels").unwrap();

        assert_eq!(ImageIdStrategy::FileName.image_id(&path).unwrap(), "IMG_0001.jpg");
        assert_eq!(
            ImageIdStrategy::FullPath.image_id(&path).unwrap(),
            path.to_string_lossy()
        );
        assert_eq!(ImageIdStrategy::ContentHash.image_id(&path).unwrap().len(), 64);
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let image: AnalyzedImage = serde_json::from_str(r#"{"id": "a.jpg"}"#).unwrap();
        assert_eq!(image, AnalyzedImage::new("a.jpg"));

        let image: AnalyzedImage = serde_json::from_str(
            r#"{"id": "b.jpg", "tags": ["beach", "sand"], "feature_vector": [1.0, 0.0]}"#,
        )
        .unwrap();
        assert_eq!(image.tags, vec!["beach", "sand"]);
        assert_eq!(image.feature_vector, Some(vec![1.0, 0.0]));
    }
}
