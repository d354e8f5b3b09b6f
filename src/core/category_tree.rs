use crate::core::category::{Category, CategoryId, CategoryMap, ImageId, TreeError};
use serde::Serialize;
use std::collections::BTreeSet;

/// Owns every category of one categorization run and keeps parent/child
/// links and the root set consistent.
///
/// Not synchronized: one caller builds and mutates a tree at a time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryTree {
    categories: CategoryMap,
    /// Insertion order, used wherever a scan must be reproducible.
    order: Vec<CategoryId>,
    roots: BTreeSet<CategoryId>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Whether a category with this id is in the tree.
    pub fn contains(&self, category_id: &CategoryId) -> bool {
        self.categories.contains_key(category_id)
    }

    /// Categories in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> + '_ {
        self.order.iter().filter_map(|id| self.categories.get(id))
    }

    /// Root categories in ascending id order.
    pub fn root_categories(&self) -> Vec<&Category> {
        self.roots
            .iter()
            .filter_map(|id| self.categories.get(id))
            .collect()
    }

    /// Every category keyed by id, for lookups that do not care about order.
    pub fn category_map(&self) -> &CategoryMap {
        &self.categories
    }

    /// Inserts `category` under its `parent_id` when that parent is present,
    /// otherwise as a root.
    ///
    /// A root whose `parent_id` names a category that is not in the tree yet
    /// is attached to it once that category is added. Nothing changes when
    /// an error is returned.
    pub fn add_category(&mut self, mut category: Category) -> Result<(), TreeError> {
        if self.categories.contains_key(&category.id) {
            return Err(TreeError::DuplicateId(category.id));
        }

        let id = category.id.clone();
        if category.parent_id.as_ref() == Some(&id) {
            return Err(TreeError::SelfParent(id));
        }

        let parent_id = category
            .parent_id
            .clone()
            .filter(|parent_id| self.categories.contains_key(parent_id));
        if let Some(parent_id) = &parent_id {
            if self.categories[parent_id].would_create_cycle(&id, &self.categories) {
                return Err(TreeError::Cycle {
                    parent: parent_id.clone(),
                    child: id,
                });
            }
        }

        let waiting: Vec<CategoryId> = self
            .categories()
            .filter(|other| other.parent_id.as_ref() == Some(&id))
            .map(|other| other.id.clone())
            .collect();
        for child_id in waiting {
            self.roots.remove(&child_id);
            category.child_ids.insert(child_id);
        }

        match parent_id.and_then(|parent_id| self.categories.get_mut(&parent_id)) {
            Some(parent) => {
                parent.child_ids.insert(id.clone());
            }
            None => {
                self.roots.insert(id.clone());
            }
        }

        self.order.push(id.clone());
        self.categories.insert(id, category);
        Ok(())
    }

    pub fn get_category(&self, category_id: &CategoryId) -> Option<&Category> {
        self.categories.get(category_id)
    }

    pub fn get_category_mut(&mut self, category_id: &CategoryId) -> Option<&mut Category> {
        self.categories.get_mut(category_id)
    }

    /// Removes one category; its children become roots rather than being
    /// deleted along with it.
    pub fn remove_category(&mut self, category_id: &CategoryId) {
        let Some(category) = self.categories.remove(category_id) else {
            return;
        };

        if let Some(parent) = category
            .parent_id
            .as_ref()
            .and_then(|parent_id| self.categories.get_mut(parent_id))
        {
            parent.child_ids.remove(category_id);
        }

        for child_id in &category.child_ids {
            if let Some(child) = self.categories.get_mut(child_id) {
                child.parent_id = None;
                self.roots.insert(child_id.clone());
            }
        }

        self.roots.remove(category_id);
        self.order.retain(|id| id != category_id);
    }

    /// Makes `child_id` a direct child of `parent_id`, detaching it from any
    /// previous parent first.
    pub fn add_child(&mut self, parent_id: &CategoryId, child_id: &CategoryId) -> Result<(), TreeError> {
        let parent = self
            .categories
            .get(parent_id)
            .ok_or_else(|| TreeError::NotFound(parent_id.clone()))?;
        let child = self
            .categories
            .get(child_id)
            .ok_or_else(|| TreeError::NotFound(child_id.clone()))?;

        if parent_id == child_id {
            return Err(TreeError::SelfParent(child_id.clone()));
        }
        if parent.would_create_cycle(child_id, &self.categories) {
            return Err(TreeError::Cycle {
                parent: parent_id.clone(),
                child: child_id.clone(),
            });
        }

        if let Some(previous_id) = child.parent_id.clone() {
            if let Some(previous) = self.categories.get_mut(&previous_id) {
                previous.child_ids.remove(child_id);
            }
        }

        if let Some(parent) = self.categories.get_mut(parent_id) {
            parent.child_ids.insert(child_id.clone());
        }
        if let Some(child) = self.categories.get_mut(child_id) {
            child.parent_id = Some(parent_id.clone());
        }
        self.roots.remove(child_id);
        Ok(())
    }

    /// Ancestors of `category_id` from its root down to the category itself.
    /// Empty for an unknown id.
    pub fn get_category_path(&self, category_id: &CategoryId) -> Vec<&Category> {
        self.categories
            .get(category_id)
            .map(|category| category.get_path(&self.categories))
            .unwrap_or_default()
    }

    /// Names along [`get_category_path`](Self::get_category_path).
    pub fn get_category_path_names(&self, category_id: &CategoryId) -> Vec<String> {
        self.categories
            .get(category_id)
            .map(|category| category.get_path_names(&self.categories))
            .unwrap_or_default()
    }

    /// Depth below the root (roots are 0); -1 for an unknown id.
    pub fn get_category_depth(&self, category_id: &CategoryId) -> i64 {
        self.get_category_path(category_id).len() as i64 - 1
    }

    /// Files `image_id` directly under `category_id`. Adding an image twice is a no-op.
    pub fn add_image_to_category(
        &mut self,
        image_id: impl Into<ImageId>,
        category_id: &CategoryId,
    ) -> Result<(), TreeError> {
        let category = self
            .categories
            .get_mut(category_id)
            .ok_or_else(|| TreeError::NotFound(category_id.clone()))?;
        category.add_image(image_id);
        Ok(())
    }

    /// Drops `image_id` from one category; descendants keep their copies.
    pub fn remove_image_from_category(&mut self, image_id: &str, category_id: &CategoryId) {
        if let Some(category) = self.categories.get_mut(category_id) {
            category.remove_image(image_id);
        }
    }

    /// Every category holding `image_id` directly, in insertion order.
    pub fn get_categories_for_image(&self, image_id: &str) -> Vec<&Category> {
        self.categories()
            .filter(|category| category.image_ids.contains(image_id))
            .collect()
    }

    /// Every image held anywhere in the tree.
    pub fn get_all_images(&self) -> BTreeSet<ImageId> {
        self.categories
            .values()
            .flat_map(|category| category.image_ids.iter().cloned())
            .collect()
    }

    /// Pre-order walk from the roots, siblings in ascending id order, paired
    /// with their depth.
    pub fn get_category_hierarchy(&self) -> Vec<(&Category, usize)> {
        let mut result = Vec::with_capacity(self.categories.len());
        let mut visited = BTreeSet::new();
        let mut stack: Vec<(&CategoryId, usize)> =
            self.roots.iter().rev().map(|id| (id, 0)).collect();

        while let Some((category_id, depth)) = stack.pop() {
            if !visited.insert(category_id) {
                continue;
            }
            let Some(category) = self.categories.get(category_id) else {
                continue;
            };

            result.push((category, depth));
            stack.extend(category.child_ids.iter().rev().map(|id| (id, depth + 1)));
        }

        result
    }

    /// Moves the images and direct children of `source_id` into `target_id`,
    /// then removes the source.
    pub fn merge_categories(&mut self, source_id: &CategoryId, target_id: &CategoryId) -> Result<(), TreeError> {
        if !self.categories.contains_key(source_id) || !self.categories.contains_key(target_id) {
            return Err(TreeError::InvalidMerge {
                source_id: source_id.clone(),
                target_id: target_id.clone(),
            });
        }
        if source_id == target_id {
            return Ok(());
        }

        let (images, children) = {
            let source = &self.categories[source_id];
            (source.image_ids.clone(), source.child_ids.clone())
        };

        // every re-parenting must be valid before anything moves
        let target = &self.categories[target_id];
        for child_id in &children {
            if child_id == target_id {
                return Err(TreeError::SelfParent(target_id.clone()));
            }
            if target.would_create_cycle(child_id, &self.categories) {
                return Err(TreeError::Cycle {
                    parent: target_id.clone(),
                    child: child_id.clone(),
                });
            }
        }

        if let Some(target) = self.categories.get_mut(target_id) {
            target.image_ids.extend(images);
        }

        for child_id in &children {
            if self.categories.contains_key(child_id) {
                self.add_child(target_id, child_id)?;
            }
        }

        self.remove_category(source_id);
        log::debug!("Merged category {} into {}", source_id, target_id);
        Ok(())
    }

    /// Folds leaf categories with fewer than `min_images_per_category` direct
    /// images into their parent, or into another childless category when
    /// they are roots.
    ///
    /// One sweep over the leaves present when the call starts; categories that
    /// become small leaves as a result are not revisited.
    pub fn optimize_hierarchy(&mut self, min_images_per_category: usize) -> Result<(), TreeError> {
        let small_leaves: Vec<CategoryId> = self
            .categories()
            .filter(|category| category.is_leaf() && category.image_ids.len() < min_images_per_category)
            .map(|category| category.id.clone())
            .collect();

        for category_id in small_leaves {
            let Some(category) = self.categories.get(&category_id) else {
                continue;
            };

            let target = match category
                .parent_id
                .as_ref()
                .filter(|parent_id| self.categories.contains_key(*parent_id))
            {
                Some(parent_id) => Some(parent_id.clone()),
                None => self
                    .categories()
                    .find(|other| other.id != category_id && other.is_leaf())
                    .map(|other| other.id.clone()),
            };

            if let Some(target_id) = target {
                self.merge_categories(&category_id, &target_id)?;
            }
        }

        Ok(())
    }
}
