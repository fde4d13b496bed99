use serde::Serialize;
use thiserror::Error;

/// Central error type for the genre-atlas crate.
#[derive(Debug, Error)]
pub enum AtlasError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Per-song pipeline stages
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    // Model acquisition
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Checksum mismatch for {path}")]
    Checksum { path: String },

    #[error("Cache dir not available")]
    CacheDirUnavailable,
}

/// Pipeline stage at which a song was dropped from a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Decode,
    FeatureExtraction,
    Classification,
    Other,
}

impl AtlasError {
    pub fn stage(&self) -> FailureStage {
        match self {
            AtlasError::Fetch(_) => FailureStage::Fetch,
            AtlasError::Decode(_) => FailureStage::Decode,
            AtlasError::FeatureExtraction(_) => FailureStage::FeatureExtraction,
            AtlasError::Classification(_) => FailureStage::Classification,
            _ => FailureStage::Other,
        }
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for AtlasError {
    fn from(e: std::io::Error) -> Self {
        AtlasError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(e: serde_json::Error) -> Self {
        AtlasError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for AtlasError {
    fn from(e: reqwest::Error) -> Self {
        AtlasError::Anyhow(e.into())
    }
}

impl From<hex::FromHexError> for AtlasError {
    fn from(e: hex::FromHexError) -> Self {
        AtlasError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
