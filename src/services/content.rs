use crate::config::CategorizationConfig;
use crate::core::category::{Category, CategoryId};
use crate::core::category_tree::CategoryTree;
use crate::core::image::{title_case, AnalyzedImage};
use crate::services::{CategorizationAlgorithm, CategorizationError};
use std::collections::{HashMap, HashSet};

/// Groups images by their most salient frequent tag, then splits large
/// groups by a secondary tag.
#[derive(Debug, Clone)]
pub struct ContentBasedCategorization {
    min_category_size: usize,
    max_category_depth: usize,
    min_tag_frequency: usize,
}

/// Images sharing one tag, in order of first appearance.
struct TagGroup<'a> {
    tag: String,
    images: Vec<&'a AnalyzedImage>,
}

impl ContentBasedCategorization {
    /// `min_tag_frequency` is how many images must share a tag before it
    /// can become a category at all.
    pub fn new(min_category_size: usize, max_category_depth: usize, min_tag_frequency: usize) -> Self {
        Self {
            min_category_size,
            max_category_depth,
            min_tag_frequency,
        }
    }

    pub fn from_config(config: &CategorizationConfig) -> Self {
        Self::new(
            config.min_category_size,
            config.max_category_depth,
            config.min_tag_frequency,
        )
    }

    fn build(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        let mut tree = CategoryTree::new();

        let tag_counts = count_tags(images.iter().map(|image| image.tags.iter()));
        let frequent = self.frequent_tags(&tag_counts);
        let groups = group_by(images.iter(), |image| {
            image
                .tags
                .iter()
                .find(|tag| frequent.contains(tag.as_str()))
                .or_else(|| image.tags.first())
                .cloned()
        });

        for group in &groups {
            if group.images.len() < self.min_category_size {
                continue;
            }

            let category = Category::new(title_case(&group.tag))
                .with_description(format!("Images containing {}", group.tag))
                .with_tags(vec![group.tag.clone()]);
            let category_id = category.id.clone();
            tree.add_category(category)?;
            for image in &group.images {
                tree.add_image_to_category(image.id.clone(), &category_id)?;
            }
            log::debug!(
                "Created category '{}' with {} images",
                group.tag,
                group.images.len()
            );

            // sub-categories live one level below the roots
            if self.max_category_depth >= 2 && group.images.len() > self.min_category_size * 3 {
                self.create_subcategories(&mut tree, &category_id, group)?;
            }
        }

        tree.optimize_hierarchy(self.min_category_size)?;
        Ok(tree)
    }

    fn create_subcategories(
        &self,
        tree: &mut CategoryTree,
        parent_id: &CategoryId,
        group: &TagGroup<'_>,
    ) -> Result<(), CategorizationError> {
        let primary = group.tag.as_str();
        let secondary_counts = count_tags(
            group
                .images
                .iter()
                .copied()
                .map(|image| image.tags.iter().filter(move |tag| tag.as_str() != primary)),
        );
        let frequent = self.frequent_tags(&secondary_counts);
        let subgroups = group_by(group.images.iter().copied(), |image| {
            image
                .tags
                .iter()
                .find(|tag| tag.as_str() != primary && frequent.contains(tag.as_str()))
                .cloned()
        });

        let parent_name = tree
            .get_category(parent_id)
            .map(|parent| parent.name.clone())
            .unwrap_or_else(|| title_case(primary));

        for subgroup in subgroups {
            if subgroup.images.len() < self.min_category_size {
                continue;
            }

            let subcategory = Category::new(format!("{} - {}", parent_name, title_case(&subgroup.tag)))
                .with_description(format!("Images containing {} and {}", primary, subgroup.tag))
                .with_tags(vec![primary.to_string(), subgroup.tag.clone()]);
            let subcategory_id = subcategory.id.clone();
            tree.add_category(subcategory)?;
            tree.add_child(parent_id, &subcategory_id)?;

            // images stay members of the parent as well
            for image in &subgroup.images {
                tree.add_image_to_category(image.id.clone(), &subcategory_id)?;
            }
        }

        Ok(())
    }

    fn frequent_tags<'a>(&self, counts: &HashMap<&'a str, usize>) -> HashSet<&'a str> {
        counts
            .iter()
            .filter(|(_, count)| **count >= self.min_tag_frequency)
            .map(|(tag, _)| *tag)
            .collect()
    }
}

impl Default for ContentBasedCategorization {
    fn default() -> Self {
        Self::from_config(&CategorizationConfig::default())
    }
}

impl CategorizationAlgorithm for ContentBasedCategorization {
    fn name(&self) -> &'static str {
        "content"
    }

    fn categorize(&self, images: &[AnalyzedImage]) -> Result<CategoryTree, CategorizationError> {
        log::info!("Categorizing {} images by content tags", images.len());
        self.build(images).map_err(|e| {
            log::error!("Failed to categorize images by content: {}", e);
            e.context("Failed to categorize images by content")
        })
    }
}

fn count_tags<'a, I, T>(tag_lists: I) -> HashMap<&'a str, usize>
where
    I: Iterator<Item = T>,
    T: Iterator<Item = &'a String>,
{
    let mut counts = HashMap::new();
    for tags in tag_lists {
        for tag in tags {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

fn group_by<'a, I, F>(images: I, key: F) -> Vec<TagGroup<'a>>
where
    I: Iterator<Item = &'a AnalyzedImage>,
    F: Fn(&AnalyzedImage) -> Option<String>,
{
    let mut groups: Vec<TagGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for image in images {
        let Some(tag) = key(image) else {
            continue;
        };
        match index.get(&tag) {
            Some(&position) => groups[position].images.push(image),
            None => {
                index.insert(tag.clone(), groups.len());
                groups.push(TagGroup {
                    tag,
                    images: vec![image],
                });
            }
        }
    }

    groups
}
