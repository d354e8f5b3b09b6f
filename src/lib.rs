//! Hierarchical photo categorization.
//!
//! Images carrying content tags and feature vectors are grouped into a
//! [`CategoryTree`] by content tags, by visual similarity, or by a hybrid of
//! the two, and each image gets a folder path from the resulting hierarchy.

pub mod config;
pub mod core;
pub mod services;

pub use crate::config::{CategorizationConfig, ConfigError};
pub use crate::core::{AnalyzedImage, Category, CategoryId, CategoryTree, ImageId, ImageIdStrategy, TreeError};
pub use crate::services::{CategorizationAlgorithm, CategorizationError, CategorizationService, FolderPlan};
