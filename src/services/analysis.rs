//! Collaborators that turn image files into [`AnalyzedImage`]s.
//!
//! The categorization engine only consumes tags and feature vectors; where
//! they come from is behind [`ImageAnalyzer`] and [`FeatureExtractor`]. The
//! [`ColorAnalyzer`] here is a lightweight stand-in for a vision model and
//! pre-computed results can be loaded with [`load_analysis_file`].

use crate::core::category::ImageId;
use crate::core::hash::HashError;
use crate::core::image::{normalize, AnalyzedImage};
use image::{DynamicImage, GenericImageView};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Hash computation error: {0}")]
    Hash(#[from] HashError),

    #[error("No feature vector available for image {image_id}")]
    MissingFeatures { image_id: ImageId },

    #[error("Feature vector for image {image_id} is empty or zero")]
    DegenerateFeatures { image_id: ImageId },

    #[error("Invalid analysis file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Produces the unit-length feature vector clustering compares.
pub trait FeatureExtractor: Send + Sync {
    fn extract_features(&self, image: &AnalyzedImage) -> Result<Vec<f32>, AnalysisError>;
}

/// Produces tags and features for an image file.
pub trait ImageAnalyzer: Send + Sync {
    fn analyze(&self, image_id: ImageId, path: &Path) -> Result<AnalyzedImage, AnalysisError>;
}

/// Uses the feature vector already attached to each image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedFeatures;

impl FeatureExtractor for PrecomputedFeatures {
    fn extract_features(&self, image: &AnalyzedImage) -> Result<Vec<f32>, AnalysisError> {
        let features = image
            .feature_vector
            .as_ref()
            .ok_or_else(|| AnalysisError::MissingFeatures {
                image_id: image.id.clone(),
            })?;

        if features.is_empty() || features.iter().all(|value| *value == 0.0) {
            return Err(AnalysisError::DegenerateFeatures {
                image_id: image.id.clone(),
            });
        }

        Ok(features.clone())
    }
}

const HISTOGRAM_BINS: usize = 4;
const THUMBNAIL_SIZE: u32 = 64;

/// Tags and a color-histogram feature vector computed from pixel data.
///
/// Tags, most salient first: dominant hue (or `monochrome`), brightness,
/// `colorful`, orientation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorAnalyzer;

impl ColorAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_image(&self, image_id: ImageId, image: &DynamicImage) -> AnalyzedImage {
        let (width, height) = image.dimensions();
        let small = image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgb8();

        let mut histogram = vec![0.0f32; HISTOGRAM_BINS * HISTOGRAM_BINS * HISTOGRAM_BINS];
        let mut hue_counts = [0usize; HUE_NAMES.len()];
        let mut luma_sum = 0.0f64;
        let mut saturated = 0usize;
        let pixel_count = (small.width() * small.height()).max(1) as usize;

        for pixel in small.pixels() {
            let [r, g, b] = pixel.0;
            let bin = |c: u8| c as usize * HISTOGRAM_BINS / 256;
            histogram[(bin(r) * HISTOGRAM_BINS + bin(g)) * HISTOGRAM_BINS + bin(b)] += 1.0;

            luma_sum += 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;

            let (hue, saturation, value) = rgb_to_hsv(r, g, b);
            if saturation > 0.25 && value > 0.15 {
                saturated += 1;
                hue_counts[hue_index(hue)] += 1;
            }
        }
        normalize(&mut histogram);

        let mut tags = Vec::new();
        let saturated_share = saturated as f64 / pixel_count as f64;
        if saturated_share < 0.1 {
            tags.push("monochrome".to_string());
        } else if let Some((index, _)) = hue_counts
            .iter()
            .enumerate()
            .max_by_key(|(index, count)| (**count, std::cmp::Reverse(*index)))
        {
            tags.push(HUE_NAMES[index].to_string());
        }

        let brightness = luma_sum / pixel_count as f64 / 255.0;
        if brightness < 0.3 {
            tags.push("dark".to_string());
        } else if brightness > 0.7 {
            tags.push("bright".to_string());
        }

        if saturated_share > 0.5 {
            tags.push("colorful".to_string());
        }

        tags.push(orientation(width, height).to_string());

        AnalyzedImage {
            id: image_id,
            path: None,
            tags,
            feature_vector: Some(histogram),
        }
    }
}

impl ImageAnalyzer for ColorAnalyzer {
    fn analyze(&self, image_id: ImageId, path: &Path) -> Result<AnalyzedImage, AnalysisError> {
        let image = image::open(path)?;
        Ok(self.analyze_image(image_id, &image).with_path(path))
    }
}

impl FeatureExtractor for ColorAnalyzer {
    /// Attached features win; otherwise the image file is decoded.
    fn extract_features(&self, image: &AnalyzedImage) -> Result<Vec<f32>, AnalysisError> {
        if image.feature_vector.is_some() {
            return PrecomputedFeatures.extract_features(image);
        }
        let path = image.path.as_ref().ok_or_else(|| AnalysisError::MissingFeatures {
            image_id: image.id.clone(),
        })?;
        let analyzed = self.analyze(image.id.clone(), path)?;
        PrecomputedFeatures.extract_features(&analyzed)
    }
}

const HUE_NAMES: [&str; 8] = [
    "red", "orange", "yellow", "green", "cyan", "blue", "purple", "pink",
];

fn hue_index(hue: f64) -> usize {
    match hue {
        h if h < 15.0 => 0,
        h if h < 45.0 => 1,
        h if h < 70.0 => 2,
        h if h < 160.0 => 3,
        h if h < 200.0 => 4,
        h if h < 260.0 => 5,
        h if h < 300.0 => 6,
        h if h < 340.0 => 7,
        _ => 0,
    }
}

/// Hue in degrees, saturation and value in [0, 1].
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue, saturation, max)
}

fn orientation(width: u32, height: u32) -> &'static str {
    let (w, h) = (width as f64, height as f64);
    if w > h * 1.1 {
        "landscape"
    } else if h > w * 1.1 {
        "portrait"
    } else {
        "square"
    }
}

/// Reads a JSON array of analyzed images, e.g. produced by an external
/// vision model.
pub fn load_analysis_file(path: &Path) -> Result<Vec<AnalyzedImage>, AnalysisError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| AnalysisError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_analysis_file(path: &Path, images: &[AnalyzedImage]) -> Result<(), AnalysisError> {
    let content = serde_json::to_string_pretty(images).map_err(|source| AnalysisError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_precomputed_features() {
        let image = AnalyzedImage::new("a.jpg").with_features(vec![0.6, 0.8]);
        assert_eq!(PrecomputedFeatures.extract_features(&image).unwrap(), vec![0.6, 0.8]);

        let missing = AnalyzedImage::new("b.jpg");
        assert!(matches!(
            PrecomputedFeatures.extract_features(&missing),
            Err(AnalysisError::MissingFeatures { .. })
        ));

        let zero = AnalyzedImage::new("c.jpg").with_features(vec![0.0, 0.0]);
        assert!(matches!(
            PrecomputedFeatures.extract_features(&zero),
            Err(AnalysisError::DegenerateFeatures { .. })
        ));
    }

    #[test]
    fn test_color_tags() {
        let analyzer = ColorAnalyzer::new();

        let sky = analyzer.analyze_image("sky.png".into(), &solid(200, 100, [40, 90, 230]));
        assert_eq!(sky.tags, vec!["blue", "colorful", "landscape"]);

        let night = analyzer.analyze_image("night.png".into(), &solid(100, 200, [10, 10, 10]));
        assert_eq!(night.tags, vec!["monochrome", "dark", "portrait"]);

        let paper = analyzer.analyze_image("paper.png".into(), &solid(100, 100, [250, 250, 250]));
        assert_eq!(paper.tags, vec!["monochrome", "bright", "square"]);
    }

    #[test]
    fn test_histogram_is_unit_length_and_discriminates() {
        let analyzer = ColorAnalyzer::new();
        let red = analyzer.analyze_image("r".into(), &solid(32, 32, [220, 20, 20]));
        let red_too = analyzer.analyze_image("r2".into(), &solid(48, 32, [230, 30, 25]));
        let green = analyzer.analyze_image("g".into(), &solid(32, 32, [20, 200, 20]));

        let red_features = red.feature_vector.unwrap();
        let norm: f32 = red_features.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let same = crate::services::similarity::cosine_similarity(
            &red_features,
            red_too.feature_vector.as_ref().unwrap(),
        );
        let different = crate::services::similarity::cosine_similarity(
            &red_features,
            green.feature_vector.as_ref().unwrap(),
        );
        assert!(same > 0.99);
        assert!(different < 0.01);
    }

    #[test]
    fn test_analyze_file_and_fallback_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("leaf.png");
        solid(20, 20, [30, 180, 40]).save(&path).unwrap();

        let analyzed = ColorAnalyzer::new().analyze("leaf.png".into(), &path).unwrap();
        assert_eq!(analyzed.tags[0], "green");
        assert_eq!(analyzed.path.as_deref(), Some(path.as_path()));

        let bare = AnalyzedImage::new("leaf.png").with_path(&path);
        let features = ColorAnalyzer::new().extract_features(&bare).unwrap();
        assert_eq!(features, analyzed.feature_vector.unwrap());

        let unreadable = ColorAnalyzer::new().analyze("x".into(), &temp_dir.path().join("missing.png"));
        assert!(unreadable.is_err());
    }

    #[test]
    fn test_analysis_file_roundtrip_and_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("analysis.json");
        let images = vec![
            AnalyzedImage::new("a.jpg").with_tags(["beach", "sand"]),
            AnalyzedImage::new("b.jpg").with_features(vec![1.0, 0.0]),
        ];

        save_analysis_file(&path, &images).unwrap();
        assert_eq!(load_analysis_file(&path).unwrap(), images);

        fs::write(&path, "[{\"tags\": []}]").unwrap();
        assert!(matches!(
            load_analysis_file(&path),
            Err(AnalysisError::Parse { .. })
        ));
    }
}
