//! Report views over the relation graphs.
//!
//! Each view is a serializable struct plus a plain-text rendering. System
//! headers never appear in any of them.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::graph::RelationGraphs;
use crate::model::{ClosureResult, FileKey, SymbolKey, SymbolKind};
use crate::selector::ListedSymbol;

/// A file as shown in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub key: FileKey,
    pub path: PathBuf,
}

impl FileEntry {
    fn lookup(graphs: &RelationGraphs, key: FileKey) -> Self {
        FileEntry {
            key,
            path: graphs
                .inclusion
                .display_name(&key)
                .map(PathBuf::from)
                .unwrap_or_default(),
        }
    }

    fn line(&self) -> String {
        format!("{} {}", self.key, self.path.display())
    }
}

/// One user file and the user files it includes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEntry {
    #[serde(flatten)]
    pub file: FileEntry,
    pub includes: Vec<FileEntry>,
}

/// The inclusion graph with system headers elided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InclusionTree {
    pub files: Vec<TreeEntry>,
}

impl InclusionTree {
    pub fn from_graphs(graphs: &RelationGraphs) -> Self {
        let files = graphs
            .inclusion
            .nodes()
            .filter(|node| !graphs.system_headers.contains(&node.key))
            .map(|node| TreeEntry {
                file: FileEntry::lookup(graphs, node.key),
                includes: node
                    .inclusions
                    .iter()
                    .filter(|key| !graphs.system_headers.contains(key))
                    .map(|&key| FileEntry::lookup(graphs, key))
                    .collect(),
            })
            .collect();
        InclusionTree { files }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.files {
            let _ = writeln!(out, "{}", entry.file.line());
            if !entry.includes.is_empty() {
                out.push_str("includes:\n");
                for included in &entry.includes {
                    let _ = writeln!(out, "{}", included.line());
                }
            }
            out.push('\n');
        }
        out
    }
}

/// `index kind signature` per line.
pub fn render_symbol_list(listing: &[ListedSymbol]) -> String {
    let mut out = String::new();
    for entry in listing {
        let _ = writeln!(out, "{} {} {}", entry.index, entry.kind, entry.signature);
    }
    out
}

/// A closure symbol as shown in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolEntry {
    pub signature: SymbolKey,
    pub name: Option<String>,
    pub kind: Option<SymbolKind>,
    pub external: bool,
}

/// A closure result with display metadata resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureReport {
    pub seed_file: FileEntry,
    pub seed_symbol: SymbolKey,
    pub files: Vec<FileEntry>,
    pub symbols: Vec<SymbolEntry>,
}

impl ClosureReport {
    pub fn new(graphs: &RelationGraphs, seed_file: FileKey, seed_symbol: &SymbolKey, result: &ClosureResult) -> Self {
        let files = result
            .files
            .iter()
            .map(|&key| FileEntry::lookup(graphs, key))
            .collect();
        let symbols = result
            .symbols
            .iter()
            .map(|key| {
                let (name, kind) = match (graphs.symbols.node(key), graphs.symbols.external(key)) {
                    (Some(node), _) => (Some(node.name.clone()), Some(node.kind)),
                    (None, Some(external)) => (Some(external.name.clone()), Some(external.kind)),
                    (None, None) => (None, None),
                };
                SymbolEntry {
                    signature: key.clone(),
                    name,
                    kind,
                    external: !graphs.symbols.contains(key),
                }
            })
            .collect();
        ClosureReport {
            seed_file: FileEntry::lookup(graphs, seed_file),
            seed_symbol: seed_symbol.clone(),
            files,
            symbols,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("files:\n");
        for file in &self.files {
            let _ = writeln!(out, "{}", file.line());
        }
        out.push_str("symbols:\n");
        for symbol in &self.symbols {
            let _ = write!(out, "{}", symbol.signature);
            if let Some(name) = &symbol.name {
                let _ = write!(out, " {name}");
            }
            if symbol.external {
                out.push_str(" (external)");
            }
            out.push('\n');
        }
        out
    }
}
