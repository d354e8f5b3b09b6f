use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },
}

/// Finds image files the analyzers can decode.
pub struct ScannerService {
    supported_formats: HashSet<String>,
    recursive: bool,
}

impl ScannerService {
    pub fn new() -> Self {
        Self {
            supported_formats: SUPPORTED_FORMATS.iter().map(|ext| ext.to_string()).collect(),
            recursive: true,
        }
    }

    /// Descend into subdirectories (the default) or only read the top level.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn is_supported_format(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .map(|ext| self.supported_formats.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }

    /// Supported image files under `root`, sorted by path. A single file is
    /// accepted as its own result.
    pub fn discover_images(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::InvalidPath {
                path: root.to_string_lossy().to_string(),
            });
        }

        if root.is_file() {
            return Ok(if self.is_supported_format(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut discovered: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    None
                }
            })
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file() && self.is_supported_format(path))
            .collect();

        discovered.sort();
        log::debug!("Discovered {} images under {}", discovered.len(), root.display());
        Ok(discovered)
    }
}

impl Default for ScannerService {
    fn default() -> Self {
        Self::new()
    }
}
