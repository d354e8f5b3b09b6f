pub mod category;
pub mod category_tree;
pub mod hash;
pub mod image;
pub mod scanner;

pub use category::{Category, CategoryId, CategoryMap, ImageId, TreeError};
pub use category_tree::CategoryTree;
pub use hash::HashService;
pub use image::{AnalyzedImage, ImageIdStrategy};
pub use scanner::ScannerService;
