//! Run configuration, loaded from `closure.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClosureError, Result};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "closure.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClosureConfig {
    pub frontend: FrontendConfig,
    pub relations: RelationConfig,
}

/// How the front-end finds and classifies files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontendConfig {
    /// User include directories (`-I`).
    pub include_dirs: Vec<PathBuf>,
    /// Directories whose headers are system headers (`-isystem`).
    pub system_include_dirs: Vec<PathBuf>,
    /// Parse system headers for their declarations.
    pub follow_system_headers: bool,
    /// Source extensions picked up when a directory is given.
    pub extensions: Vec<String>,
    /// Glob patterns excluded from source discovery.
    pub exclude: Vec<String>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        FrontendConfig {
            include_dirs: Vec::new(),
            system_include_dirs: vec![PathBuf::from("/usr/local/include"), PathBuf::from("/usr/include")],
            follow_system_headers: true,
            extensions: vec!["c".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Which relations become symbol-graph edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationConfig {
    /// Add edges for record types that are only used as types (parameters,
    /// locals, casts, fields), not just named value references.
    pub include_type_references: bool,
}

impl ClosureConfig {
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| ClosureError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ClosureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text, path)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else `closure.toml` in `dir` when present, else defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = dir.join(CONFIG_FILE);
        if default_path.is_file() {
            Self::load(&default_path)
        } else {
            Ok(Self::default())
        }
    }
}
