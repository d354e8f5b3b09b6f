use crate::config::CategorizationConfig;
use crate::core::category_tree::CategoryTree;
use crate::core::image::AnalyzedImage;
use crate::services::clustering::HierarchicalClustering;
use crate::services::content::ContentBasedCategorization;
use crate::services::{CategorizationAlgorithm, CategorizationError};

/// Content-based trees with fewer categories than this fall back to clustering.
pub const MIN_CONTENT_CATEGORIES: usize = 3;

/// Tries tag grouping first and clusters by features when the tags are too
/// sparse to produce a useful tree.
pub struct HybridCategorization {
    content: ContentBasedCategorization,
    clustering: HierarchicalClustering,
}

impl HybridCategorization {
    pub fn new(content: ContentBasedCategorization, clustering: HierarchicalClustering) -> Self {
        Self { content, clustering }
    }

    /// Content and clustering stages sized from `config`.
    pub fn from_config(config: &CategorizationConfig) -> Self {
        Self::new(
            ContentBasedCategorization::from_config(config),
            HierarchicalClustering::from_config(config),
        )
    }

    fn build(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        let tree = self.content.categorize(images)?;
        if tree.len() >= MIN_CONTENT_CATEGORIES {
            return Ok(tree);
        }

        log::info!(
            "Content tags produced only {} categories, falling back to clustering",
            tree.len()
        );
        self.clustering.categorize(images)
    }
}

impl Default for HybridCategorization {
    fn default() -> Self {
        Self::from_config(&CategorizationConfig::default())
    }
}

impl CategorizationAlgorithm for HybridCategorization {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn categorize(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        self.build(images).map_err(|e| {
            log::error!("Failed to categorize images with hybrid approach: {}", e);
            e.context("Failed to categorize images with hybrid approach")
        })
    }
}
