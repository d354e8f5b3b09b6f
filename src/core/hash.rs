use crate::core::category::ImageId;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Failed to read {path} for hashing: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Derives image ids from file contents, so equal files share an id no matter
/// where they live or what they are called.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashService;

impl HashService {
    pub fn new() -> Self {
        Self
    }

    /// Lowercase hex SHA-256 of the file bytes.
    pub fn content_id(&self, file_path: &Path) -> Result<ImageId, HashError> {
        let read_error = |source| HashError::Io {
            path: file_path.display().to_string(),
            source,
        };

        let mut reader = BufReader::new(File::open(file_path).map_err(read_error)?);
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher).map_err(read_error)?;

        Ok(hex_digest(hasher))
    }
}

fn hex_digest(hasher: Sha256) -> String {
    format!("{:x}", hasher.finalize())
}
