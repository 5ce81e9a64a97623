//! Core data structures for the relation graphs

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Stable identity of a physical file: device and inode.
///
/// Two paths reaching the same file (symlinks, `./` prefixes, relative
/// includes) produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileKey {
    pub device: u64,
    pub inode: u64,
}

impl FileKey {
    pub fn new(device: u64, inode: u64) -> Self {
        FileKey { device, inode }
    }

    /// Resolve the key of the file at `path` from its metadata.
    #[cfg(unix)]
    pub fn for_path(path: &Path) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(path)?;
        Ok(FileKey::new(metadata.dev(), metadata.ino()))
    }

    /// Resolve the key of the file at `path` from its canonical path.
    #[cfg(not(unix))]
    pub fn for_path(path: &Path) -> std::io::Result<Self> {
        let canonical = std::fs::canonicalize(path)?;
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        Ok(FileKey::new(0, hasher.finish()))
    }

    /// Synthetic key for files that only exist in memory (tests, virtual units).
    pub fn synthetic(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        FileKey::new(0, hasher.finish())
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.device, self.inode)
    }
}

/// A file in the inclusion graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileNode {
    pub key: FileKey,
    /// Path as first observed; display only.
    pub display_name: PathBuf,
    /// Included files in directive order. Repeated includes stay repeated.
    pub inclusions: Vec<FileKey>,
}

impl FileNode {
    pub fn new(key: FileKey, display_name: impl Into<PathBuf>) -> Self {
        FileNode {
            key,
            display_name: display_name.into(),
            inclusions: Vec::new(),
        }
    }

    pub fn append_inclusion(&mut self, key: FileKey) {
        self.inclusions.push(key);
    }
}

/// Canonical mangled signature of a function or record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolKey(String);

impl SymbolKey {
    pub fn new(signature: impl Into<String>) -> Self {
        SymbolKey(signature.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolKey {
    fn from(value: &str) -> Self {
        SymbolKey::new(value)
    }
}

/// What kind of entity a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Record,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Record => "record",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A defined symbol in the symbol graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolNode {
    pub key: SymbolKey,
    /// Source-level name, for display.
    pub name: String,
    pub kind: SymbolKind,
    pub defining_file: FileKey,
    /// Referenced symbols in discovery order; may contain repeats.
    pub dependencies: Vec<SymbolKey>,
}

impl SymbolNode {
    pub fn new(key: SymbolKey, name: impl Into<String>, kind: SymbolKind, defining_file: FileKey) -> Self {
        SymbolNode {
            key,
            name: name.into(),
            kind,
            defining_file,
            dependencies: Vec::new(),
        }
    }

    pub fn append_dependency(&mut self, dependency: SymbolKey) {
        self.dependencies.push(dependency);
    }

    /// Dependencies with repeats removed, first occurrence order.
    pub fn unique_dependencies(&self) -> IndexSet<&SymbolKey> {
        self.dependencies.iter().collect()
    }

    /// Number of distinct dependencies.
    pub fn dependency_count(&self) -> usize {
        self.unique_dependencies().len()
    }
}

/// A referenced symbol with no definition in any visited unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalSymbol {
    pub name: String,
    pub kind: SymbolKind,
}

/// Files and symbols reachable from a seed, in first-discovery order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClosureResult {
    pub files: IndexSet<FileKey>,
    pub symbols: IndexSet<SymbolKey>,
}

impl ClosureResult {
    pub fn contains_file(&self, key: &FileKey) -> bool {
        self.files.contains(key)
    }

    pub fn contains_symbol(&self, key: &SymbolKey) -> bool {
        self.symbols.contains(key)
    }
}
