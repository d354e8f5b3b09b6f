use crate::config::CategorizationConfig;
use crate::core::category_tree::CategoryTree;
use crate::core::image::{AnalyzedImage, ImageIdStrategy};
use crate::services::analysis::{AnalysisError, ColorAnalyzer, ImageAnalyzer};
use crate::services::hybrid::HybridCategorization;
use crate::services::{CategorizationAlgorithm, CategorizationError};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Entry point for categorizing a batch of images with one algorithm.
pub struct CategorizationService {
    algorithm: Box<dyn CategorizationAlgorithm>,
    analyzer: Box<dyn ImageAnalyzer>,
    id_strategy: ImageIdStrategy,
}

impl CategorizationService {
    /// Hybrid categorization and color analysis configured from `config`.
    pub fn new(config: &CategorizationConfig) -> Self {
        Self {
            algorithm: Box::new(HybridCategorization::from_config(config)),
            analyzer: Box::new(ColorAnalyzer::new()),
            id_strategy: config.image_id_strategy,
        }
    }

    /// Replaces the algorithm that builds the tree.
    pub fn with_algorithm(mut self, algorithm: Box<dyn CategorizationAlgorithm>) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Box<dyn ImageAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Controls how ids are derived for images analyzed from disk.
    pub fn with_id_strategy(mut self, id_strategy: ImageIdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Builds a category tree for `images` with the configured algorithm.
    pub fn categorize(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        let tree = self
            .algorithm
            .categorize(images)
            .map_err(|e| e.context("Categorization failed"))?;

        log::info!(
            "Categorized {} images into {} categories using {}",
            images.len(),
            tree.len(),
            self.algorithm.name()
        );
        Ok(tree)
    }

    /// Analyzes `paths` in parallel. Images that cannot be analyzed are
    /// logged and left out; `on_analyzed` runs once per path either way.
    pub fn analyze_paths<F>(&self, paths: &[PathBuf], on_analyzed: F) -> Vec<AnalyzedImage>
    where
        F: Fn(&Path) + Sync,
    {
        let images: Vec<AnalyzedImage> = paths
            .par_iter()
            .filter_map(|path| {
                let result = self.analyze_path(path);
                on_analyzed(path);
                match result {
                    Ok(image) => Some(image),
                    Err(e) => {
                        log::warn!("Failed to analyze {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();

        let mut seen = HashSet::new();
        for image in &images {
            if !seen.insert(image.id.as_str()) {
                log::warn!(
                    "Duplicate image id '{}' ({}); choose a different id strategy to tell them apart",
                    image.id,
                    image
                        .path
                        .as_deref()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default()
                );
            }
        }

        log::debug!("Analyzed {} of {} images", images.len(), paths.len());
        images
    }

    /// Analyzes the files at `paths`, then categorizes whatever could be read.
    pub fn categorize_by_path(
        &self,
        paths: &[PathBuf],
    ) -> Result<(Vec<AnalyzedImage>, CategoryTree), CategorizationError> {
        let images = self.analyze_paths(paths, |_| {});
        let tree = self.categorize(&images)?;
        Ok((images, tree))
    }

    fn analyze_path(&self, path: &Path) -> Result<AnalyzedImage, AnalysisError> {
        let image_id = self.id_strategy.image_id(path)?;
        self.analyzer.analyze(image_id, path)
    }
}

impl Default for CategorizationService {
    fn default() -> Self {
        Self::new(&CategorizationConfig::default())
    }
}
