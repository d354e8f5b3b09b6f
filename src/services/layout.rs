//! Maps every image to the folder its first category would file it under.
//! Nothing on disk is touched; the plan is for callers to act on or print.

use crate::core::category::ImageId;
use crate::core::category_tree::CategoryTree;
use crate::core::image::AnalyzedImage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Where one image would be filed, relative to the output root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub image_id: ImageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub folder: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FolderPlan {
    entries: Vec<PlanEntry>,
}

impl FolderPlan {
    /// One entry per image, in input order. Images in several categories go
    /// to the first one the tree reports.
    pub fn from_tree(tree: &CategoryTree, images: &[AnalyzedImage]) -> Self {
        let entries = images
            .iter()
            .map(|image| {
                let folder = tree
                    .get_categories_for_image(&image.id)
                    .first()
                    .map(|category| {
                        tree.get_category_path_names(&category.id)
                            .iter()
                            .map(|name| sanitize_segment(name))
                            .collect::<PathBuf>()
                    })
                    .unwrap_or_else(|| PathBuf::from(UNCATEGORIZED));

                PlanEntry {
                    image_id: image.id.clone(),
                    source: image.path.clone(),
                    folder,
                }
            })
            .collect();

        Self { entries }
    }

    /// Planned entries in input order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folder planned for `image_id`, or `None` for an image the plan never saw.
    pub fn folder_for(&self, image_id: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|entry| entry.image_id == image_id)
            .map(|entry| entry.folder.as_path())
    }

    /// Image count per folder, sorted by folder.
    pub fn folder_counts(&self) -> BTreeMap<&Path, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.folder.as_path()).or_insert(0) += 1;
        }
        counts
    }
}

/// Makes a category name usable as a single path component.
fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
