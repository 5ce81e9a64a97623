//! Error types for closure queries and graph construction

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{FileKey, SymbolKey};

#[derive(Debug, Error)]
pub enum ClosureError {
    /// Only functions and records have signatures.
    #[error("cannot compute a signature for {kind} `{name}`")]
    UnsupportedDeclarationKind { name: String, kind: &'static str },

    #[error("symbol index {index} is out of range for {file} ({count} symbols)")]
    IndexOutOfRange { index: usize, count: usize, file: PathBuf },

    #[error("symbol `{0}` is not defined in any user file")]
    SymbolNotFound(SymbolKey),

    #[error("file {0} is not part of the inclusion graph")]
    FileNotFound(FileKey),

    /// A location with no backing file; dropped during construction.
    #[error("location does not belong to a physical file")]
    UnresolvedLocation,

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClosureError {
    /// Query errors abort a request; everything else is a setup problem.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            ClosureError::UnsupportedDeclarationKind { .. }
                | ClosureError::IndexOutOfRange { .. }
                | ClosureError::SymbolNotFound(_)
                | ClosureError::FileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClosureError>;
