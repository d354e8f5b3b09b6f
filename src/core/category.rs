use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Stable key of an image inside one categorization run.
pub type ImageId = String;

/// Id-keyed arena every category lookup goes through.
pub type CategoryMap = HashMap<CategoryId, Category>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Category with ID {0} already exists")]
    DuplicateId(CategoryId),

    #[error("Category with ID {0} does not exist")]
    NotFound(CategoryId),

    #[error("Cannot add category {0} as a child of itself")]
    SelfParent(CategoryId),

    #[error("Adding {child} under {parent} would create a circular reference")]
    Cycle { parent: CategoryId, child: CategoryId },

    #[error("Cannot merge {source_id} into {target_id}: both categories must exist")]
    InvalidMerge {
        source_id: CategoryId,
        target_id: CategoryId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn generate() -> Self {
        Self(format!("cat_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named node of the category hierarchy.
///
/// Links to other categories are ids only; resolving them always goes
/// through a [`CategoryMap`], normally the one owned by a
/// [`CategoryTree`](crate::core::category_tree::CategoryTree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub parent_id: Option<CategoryId>,
    pub child_ids: BTreeSet<CategoryId>,
    pub image_ids: BTreeSet<ImageId>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::generate(),
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            parent_id: None,
            child_ids: BTreeSet::new(),
            image_ids: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parent(mut self, parent_id: CategoryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }

    /// Attach `child` under this category.
    ///
    /// `categories` is used to walk this category's ancestors; neither `self`
    /// nor `child` has to be present in it.
    pub fn add_child(&mut self, child: &mut Category, categories: &CategoryMap) -> Result<(), TreeError> {
        if child.id == self.id {
            return Err(TreeError::SelfParent(self.id.clone()));
        }
        if self.would_create_cycle(&child.id, categories) {
            return Err(TreeError::Cycle {
                parent: self.id.clone(),
                child: child.id.clone(),
            });
        }

        child.parent_id = Some(self.id.clone());
        self.child_ids.insert(child.id.clone());
        Ok(())
    }

    pub fn remove_child(&mut self, child: &mut Category) {
        if self.child_ids.remove(&child.id) {
            child.parent_id = None;
        }
    }

    pub fn add_image(&mut self, image_id: impl Into<ImageId>) {
        self.image_ids.insert(image_id.into());
    }

    pub fn remove_image(&mut self, image_id: &str) {
        self.image_ids.remove(image_id);
    }

    /// Images of this category and, recursively, of all its descendants.
    pub fn get_all_image_ids(&self, categories: &CategoryMap) -> BTreeSet<ImageId> {
        let mut result = self.image_ids.clone();
        let mut visited = BTreeSet::from([self.id.clone()]);
        let mut pending: Vec<&CategoryId> = self.child_ids.iter().collect();

        while let Some(child_id) = pending.pop() {
            if !visited.insert(child_id.clone()) {
                continue;
            }
            if let Some(child) = categories.get(child_id) {
                result.extend(child.image_ids.iter().cloned());
                pending.extend(child.child_ids.iter());
            }
        }

        result
    }

    /// Categories from the root down to `self`, inclusive.
    ///
    /// A `parent_id` missing from `categories` ends the walk there.
    pub fn get_path<'a>(&'a self, categories: &'a CategoryMap) -> Vec<&'a Category> {
        let mut path = vec![self];
        let mut current = self;

        while let Some(parent_id) = &current.parent_id {
            // bounded so a corrupted map cannot loop forever
            if path.len() > categories.len() {
                break;
            }
            match categories.get(parent_id) {
                Some(parent) if parent.id != self.id => {
                    path.push(parent);
                    current = parent;
                }
                _ => break,
            }
        }

        path.reverse();
        path
    }

    pub fn get_path_names(&self, categories: &CategoryMap) -> Vec<String> {
        self.get_path(categories)
            .into_iter()
            .map(|category| category.name.clone())
            .collect()
    }

    /// Whether attaching `child_id` under `self` would make `self` a
    /// descendant of that child.
    pub fn would_create_cycle(&self, child_id: &CategoryId, categories: &CategoryMap) -> bool {
        if &self.id == child_id {
            return true;
        }

        let mut next = self.parent_id.as_ref();
        let mut steps = 0;
        while let Some(ancestor_id) = next {
            if ancestor_id == child_id {
                return true;
            }
            steps += 1;
            if steps > categories.len() {
                // an ancestor chain longer than the map is already a loop
                return true;
            }
            next = categories
                .get(ancestor_id)
                .and_then(|ancestor| ancestor.parent_id.as_ref());
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(categories: &[&Category]) -> CategoryMap {
        categories
            .iter()
            .map(|category| (category.id.clone(), (*category).clone()))
            .collect()
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Category::new("A");
        let b = Category::new("A");
        assert_ne!(a.id, b.id);
        assert!(a.id.as_str().starts_with("cat_"));
    }

    #[test]
    fn test_add_child_sets_both_sides() {
        let mut parent = Category::new("Parent");
        let mut child = Category::new("Child");

        parent.add_child(&mut child, &CategoryMap::new()).unwrap();

        assert_eq!(child.parent_id.as_ref(), Some(&parent.id));
        assert!(parent.child_ids.contains(&child.id));
    }

    #[test]
    fn test_add_self_as_child_fails() {
        let mut category = Category::new("Loop");
        let mut same = category.clone();

        let err = category.add_child(&mut same, &CategoryMap::new()).unwrap_err();
        assert_eq!(err, TreeError::SelfParent(category.id.clone()));
    }

    #[test]
    fn test_cycle_detected_through_grandparent() {
        let mut grandparent = Category::new("Grandparent");
        let mut parent = Category::new("Parent");
        let mut child = Category::new("Child");
        let empty = CategoryMap::new();

        grandparent.add_child(&mut parent, &empty).unwrap();
        parent.add_child(&mut child, &empty).unwrap();

        let categories = map_of(&[&grandparent, &parent, &child]);
        assert!(child.would_create_cycle(&grandparent.id, &categories));

        let err = child.add_child(&mut grandparent, &categories).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));
        assert!(grandparent.parent_id.is_none());
    }

    #[test]
    fn test_unrelated_attach_is_not_a_cycle() {
        let a = Category::new("A");
        let b = Category::new("B").with_parent(a.id.clone());
        let c = Category::new("C");

        let categories = map_of(&[&a, &b, &c]);
        assert!(!b.would_create_cycle(&c.id, &categories));
    }

    #[test]
    fn test_remove_child_only_for_recorded_children() {
        let mut parent = Category::new("Parent");
        let mut child = Category::new("Child");
        let mut stranger = Category::new("Stranger").with_parent(CategoryId::from("elsewhere"));

        parent.add_child(&mut child, &CategoryMap::new()).unwrap();
        parent.remove_child(&mut stranger);
        assert_eq!(stranger.parent_id, Some(CategoryId::from("elsewhere")));

        parent.remove_child(&mut child);
        assert!(child.parent_id.is_none());
        assert!(parent.child_ids.is_empty());
    }

    #[test]
    fn test_image_membership_is_idempotent() {
        let mut category = Category::new("Beach");
        category.add_image("a.jpg");
        category.add_image("a.jpg");
        assert_eq!(category.image_ids.len(), 1);

        let before = category.clone();
        category.remove_image("missing.jpg");
        assert_eq!(category, before);

        category.remove_image("a.jpg");
        assert!(category.image_ids.is_empty());
    }

    #[test]
    fn test_all_image_ids_include_descendants() {
        let mut root = Category::new("Root");
        let mut mid = Category::new("Mid");
        let mut leaf = Category::new("Leaf");
        let empty = CategoryMap::new();

        root.add_child(&mut mid, &empty).unwrap();
        mid.add_child(&mut leaf, &empty).unwrap();
        root.add_image("r.jpg");
        mid.add_image("m.jpg");
        leaf.add_image("l.jpg");

        let categories = map_of(&[&root, &mid, &leaf]);
        let all = root.get_all_image_ids(&categories);
        assert_eq!(
            all.into_iter().collect::<Vec<_>>(),
            vec!["l.jpg".to_string(), "m.jpg".to_string(), "r.jpg".to_string()]
        );
    }

    #[test]
    fn test_path_names_from_root() {
        let mut root = Category::new("Nature");
        let mut child = Category::new("Nature - Beach");
        root.add_child(&mut child, &CategoryMap::new()).unwrap();

        let categories = map_of(&[&root, &child]);
        assert_eq!(child.get_path_names(&categories), vec!["Nature", "Nature - Beach"]);
        assert_eq!(root.get_path_names(&categories), vec!["Nature"]);
    }

    #[test]
    fn test_path_with_dangling_parent_treats_self_as_root() {
        let orphan = Category::new("Orphan").with_parent(CategoryId::from("gone"));
        let categories = map_of(&[&orphan]);

        let path = orphan.get_path(&categories);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].id, orphan.id);
    }
}
