//! Error types for the translation pipeline
//!
//! Validation rejections are not errors: they are ordinary outcomes carried by
//! [`crate::validator::Verdict`]. The variants here cover persistence, resource
//! files and configuration.

use crate::mt::MtError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The persisted cache document for a file could not be parsed at all
    #[error("Corrupt cache file '{}': {source}", path.display())]
    CorruptCache {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem failure on a specific path
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A resource file could not be decoded or serialized
    #[error("Resource error: {0}")]
    Resource(String),

    /// Unrecoverable configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Translator boundary failure surfaced outside a batch
    #[error(transparent)]
    Translator(#[from] MtError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = Error::io(
            "cache/it/base.txt.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cache/it/base.txt.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_translator_error_is_transparent() {
        let err: Error = MtError::Config("missing key".to_string()).into();
        assert_eq!(err.to_string(), MtError::Config("missing key".to_string()).to_string());
    }
}
