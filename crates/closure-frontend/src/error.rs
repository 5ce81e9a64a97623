//! Front-end errors

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Utf8 { path: PathBuf },

    #[error("tree-sitter could not parse {path}")]
    Parse { path: PathBuf },

    #[error("source file not found: {0}")]
    NotFound(PathBuf),

    #[error("parser pool failure: {0}")]
    ParserPool(String),
}

pub type Result<T> = std::result::Result<T, FrontendError>;
