use crate::config::CategorizationConfig;
use crate::core::category::Category;
use crate::core::category_tree::CategoryTree;
use crate::core::image::{title_case, AnalyzedImage};
use crate::services::analysis::{FeatureExtractor, PrecomputedFeatures};
use crate::services::similarity::DistanceMatrix;
use crate::services::{CategorizationAlgorithm, CategorizationError};
use std::collections::HashMap;

const NAME_TAGS: usize = 3;

/// Groups images whose feature vectors are close under average linkage.
pub struct HierarchicalClustering {
    extractor: Box<dyn FeatureExtractor>,
    similarity_threshold: f64,
    min_cluster_size: usize,
    max_clusters: usize,
}

impl HierarchicalClustering {
    pub fn new(similarity_threshold: f64, min_cluster_size: usize, max_clusters: usize) -> Self {
        Self {
            extractor: Box::new(PrecomputedFeatures),
            similarity_threshold,
            min_cluster_size,
            max_clusters,
        }
    }

    pub fn from_config(config: &CategorizationConfig) -> Self {
        Self::new(
            config.similarity_threshold,
            config.min_cluster_size,
            config.max_clusters,
        )
    }

    /// Uses `extractor` in place of the stored feature vectors.
    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    fn build(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        let mut tree = CategoryTree::new();
        if images.is_empty() {
            return Ok(tree);
        }

        let mut featured: Vec<&AnalyzedImage> = Vec::with_capacity(images.len());
        let mut features: Vec<Vec<f32>> = Vec::with_capacity(images.len());
        for image in images {
            match self.extractor.extract_features(image) {
                Ok(vector) => {
                    featured.push(image);
                    features.push(vector);
                }
                Err(e) => log::warn!("Skipping {} for clustering: {}", image.id, e),
            }
        }

        if featured.is_empty() {
            return Err(CategorizationError::NoFeatures {
                attempted: images.len(),
            });
        }

        let slices: Vec<&[f32]> = features.iter().map(|vector| vector.as_slice()).collect();
        let matrix = DistanceMatrix::from_features(&slices);
        let labels = matrix
            .average_linkage()
            .cut(1.0 - self.similarity_threshold);

        // labels already count up in order of first member
        let cluster_count = labels.iter().max().map_or(0, |max| max + 1);
        let mut clusters: Vec<Vec<&AnalyzedImage>> = vec![Vec::new(); cluster_count];
        for (image, label) in featured.iter().copied().zip(&labels) {
            clusters[*label].push(image);
        }

        clusters.retain(|members| members.len() >= self.min_cluster_size);
        if clusters.len() > self.max_clusters {
            clusters.sort_by(|a, b| b.len().cmp(&a.len()));
            clusters.truncate(self.max_clusters);
        }
        log::debug!(
            "{} images formed {} clusters at threshold {}",
            featured.len(),
            clusters.len(),
            self.similarity_threshold
        );

        for (index, members) in clusters.iter().enumerate() {
            let name = cluster_name(members).unwrap_or_else(|| format!("Cluster {}", index + 1));
            let category = Category::new(name)
                .with_description(format!("Cluster of {} similar images", members.len()));
            let category_id = category.id.clone();
            tree.add_category(category)?;
            for image in members {
                tree.add_image_to_category(image.id.clone(), &category_id)?;
            }
        }

        Ok(tree)
    }
}

impl Default for HierarchicalClustering {
    fn default() -> Self {
        Self::from_config(&CategorizationConfig::default())
    }
}

impl CategorizationAlgorithm for HierarchicalClustering {
    fn name(&self) -> &'static str {
        "clustering"
    }

    fn categorize(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        log::info!("Clustering {} images by visual similarity", images.len());
        self.build(images).map_err(|e| {
            log::error!("Failed to categorize images by clustering: {}", e);
            e.context("Failed to categorize images by clustering")
        })
    }
}

/// The most common member tags joined with " & ", or `None` when no member
/// has tags.
fn cluster_name(members: &[&AnalyzedImage]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for image in members {
        for tag in &image.tags {
            match index.get(tag.as_str()) {
                Some(&position) => counts[position].1 += 1,
                None => {
                    index.insert(tag.as_str(), counts.len());
                    counts.push((tag.as_str(), 1));
                }
            }
        }
    }

    if counts.is_empty() {
        return None;
    }

    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let name = counts
        .iter()
        .take(NAME_TAGS)
        .map(|(tag, _)| title_case(tag))
        .collect::<Vec<_>>()
        .join(" & ");
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::AnalysisError;

    fn featured(id: &str, features: &[f32]) -> AnalyzedImage {
        AnalyzedImage::new(id).with_features(features.to_vec())
    }

    fn cluster_sizes(tree: &CategoryTree) -> Vec<usize> {
        tree.categories().map(|category| category.image_ids.len()).collect()
    }

    #[test]
    fn test_two_tight_pairs() {
        let images = vec![
            featured("a1.jpg", &[1.0, 0.0, 0.0]),
            featured("a2.jpg", &[0.99, 0.01, 0.0]),
            featured("b1.jpg", &[0.0, 1.0, 0.0]),
            featured("b2.jpg", &[0.01, 0.99, 0.0]),
        ];

        let tree = HierarchicalClustering::new(0.8, 2, 20).categorize(&images).unwrap();

        assert_eq!(cluster_sizes(&tree), vec![2, 2]);
        let first = tree.get_categories_for_image("a1.jpg");
        assert_eq!(first.len(), 1);
        assert!(first[0].image_ids.contains("a2.jpg"));
        assert_eq!(first[0].name, "Cluster 1");
        assert_eq!(first[0].description, "Cluster of 2 similar images");
        assert_eq!(tree.get_categories_for_image("b2.jpg")[0].name, "Cluster 2");
        assert!(tree.root_categories().iter().all(|category| category.is_leaf()));
    }

    #[test]
    fn test_cluster_named_after_common_tags() {
        let images = vec![
            featured("1.jpg", &[1.0, 0.0]).with_tags(["sky", "blue", "cloud"]),
            featured("2.jpg", &[1.0, 0.0]).with_tags(["blue", "sky"]),
            featured("3.jpg", &[1.0, 0.0]).with_tags(["sea", "blue", "wave"]),
        ];

        let tree = HierarchicalClustering::new(0.8, 1, 20).categorize(&images).unwrap();
        let names: Vec<&str> = tree.categories().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Blue & Sky & Cloud"]);
    }

    #[test]
    fn test_small_clusters_dropped_and_largest_kept() {
        let images = vec![
            featured("x.jpg", &[0.0, 0.0, 1.0]),
            featured("a1.jpg", &[1.0, 0.0, 0.0]),
            featured("b1.jpg", &[0.0, 1.0, 0.0]),
            featured("a2.jpg", &[1.0, 0.0, 0.0]),
            featured("b2.jpg", &[0.0, 1.0, 0.0]),
            featured("b3.jpg", &[0.0, 1.0, 0.0]),
        ];

        let tree = HierarchicalClustering::new(0.9, 2, 1).categorize(&images).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(cluster_sizes(&tree), vec![3]);
        assert!(tree.get_categories_for_image("x.jpg").is_empty());
        assert_eq!(tree.get_categories_for_image("b3.jpg").len(), 1);

        let all = HierarchicalClustering::new(0.9, 2, 20).categorize(&images).unwrap();
        assert_eq!(cluster_sizes(&all), vec![2, 3]);
    }

    #[test]
    fn test_images_without_features_are_skipped() {
        let images = vec![
            featured("1.jpg", &[1.0, 0.0]),
            AnalyzedImage::new("2.jpg"),
            featured("3.jpg", &[1.0, 0.0]),
        ];

        let tree = HierarchicalClustering::new(0.8, 2, 20).categorize(&images).unwrap();
        assert_eq!(cluster_sizes(&tree), vec![2]);
        assert!(tree.get_categories_for_image("2.jpg").is_empty());
    }

    #[test]
    fn test_no_features_at_all_is_an_error() {
        let images = vec![AnalyzedImage::new("1.jpg"), AnalyzedImage::new("2.jpg")];
        let err = HierarchicalClustering::default().categorize(&images).unwrap_err();

        assert!(err.to_string().starts_with("Failed to categorize images by clustering"));
        assert!(matches!(
            err.root_cause(),
            CategorizationError::NoFeatures { attempted: 2 }
        ));
    }

    #[test]
    fn test_empty_and_single_image() {
        assert!(HierarchicalClustering::default().categorize(&[]).unwrap().is_empty());

        let single = vec![featured("only.jpg", &[0.6, 0.8])];
        let tree = HierarchicalClustering::new(0.8, 1, 20).categorize(&single).unwrap();
        assert_eq!(cluster_sizes(&tree), vec![1]);
    }

    struct FirstTagAxis;

    impl FeatureExtractor for FirstTagAxis {
        fn extract_features(&self, image: &AnalyzedImage) -> Result<Vec<f32>, AnalysisError> {
            match image.tags.first().map(String::as_str) {
                Some("warm") => Ok(vec![1.0, 0.0]),
                Some("cool") => Ok(vec![0.0, 1.0]),
                _ => Err(AnalysisError::MissingFeatures {
                    image_id: image.id.clone(),
                }),
            }
        }
    }

    #[test]
    fn test_custom_extractor() {
        let images = vec![
            AnalyzedImage::new("1.jpg").with_tags(["warm"]),
            AnalyzedImage::new("2.jpg").with_tags(["cool"]),
            AnalyzedImage::new("3.jpg").with_tags(["warm"]),
            AnalyzedImage::new("4.jpg").with_tags(["other"]),
        ];

        let tree = HierarchicalClustering::new(0.8, 1, 20)
            .with_extractor(Box::new(FirstTagAxis))
            .categorize(&images)
            .unwrap();
        let names: Vec<&str> = tree.categories().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Warm", "Cool"]);
    }
}
