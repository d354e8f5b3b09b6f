pub mod analysis;
pub mod categorization;
pub mod clustering;
pub mod content;
pub mod hybrid;
pub mod layout;
pub mod similarity;

use crate::core::category::TreeError;
use crate::core::category_tree::CategoryTree;
use crate::core::image::AnalyzedImage;
use thiserror::Error;

pub use analysis::{ColorAnalyzer, FeatureExtractor, ImageAnalyzer, PrecomputedFeatures};
pub use categorization::CategorizationService;
pub use clustering::HierarchicalClustering;
pub use content::ContentBasedCategorization;
pub use hybrid::HybridCategorization;
pub use layout::FolderPlan;

#[derive(Debug, Error)]
pub enum CategorizationError {
    #[error("Category tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Feature extraction failed for all {attempted} images")]
    NoFeatures { attempted: usize },

    #[error("{context}: {source}")]
    Failed {
        context: String,
        #[source]
        source: Box<CategorizationError>,
    },
}

impl CategorizationError {
    pub fn context(self, context: impl Into<String>) -> Self {
        CategorizationError::Failed {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, below every layer of context.
    pub fn root_cause(&self) -> &CategorizationError {
        match self {
            CategorizationError::Failed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Builds a populated category tree from a batch of analyzed images.
pub trait CategorizationAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    fn categorize(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError>;
}
