//! Error types for tileset traversal

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// A subtree file could not be decoded or violates the subtree layout.
    #[error("Malformed subtree {uri}: {reason}")]
    MalformedSubtree { uri: String, reason: String },

    /// A subtree file, external buffer or external tileset was not found.
    #[error("Could not resolve {uri} ({context})")]
    UnresolvableResource { uri: String, context: String },

    /// A coordinate or availability index outside its valid domain.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Bad `implicitTiling` parameters.
    #[error("Invalid subdivision parameters: {0}")]
    InvalidSubdivision(String),

    #[error("Malformed tileset: {0}")]
    MalformedTileset(String),

    /// Raised by a traversal visitor; aborts the walk.
    #[error("Visitor error: {0}")]
    Visitor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed_subtree(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSubtree {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolvable(uri: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnresolvableResource {
            uri: uri.into(),
            context: context.into(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
