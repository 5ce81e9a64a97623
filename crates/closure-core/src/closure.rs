//! Transitive closure of a seed symbol over the relation graphs.
//!
//! The query walks two frontiers breadth-first, one after the other. The
//! symbol frontier is drained first: it follows dependency edges, and every
//! reached symbol's defining file is queued on the file frontier in symbol
//! discovery order. Only then does the file frontier follow inclusion edges,
//! so the defining files of all reached symbols precede any file reached by
//! inclusion alone. Visited sets bound both walks, so mutually including
//! files and recursive call chains terminate however deep they are. System
//! headers never enter the result.

use std::collections::VecDeque;

use indexmap::IndexSet;

use crate::error::{ClosureError, Result};
use crate::graph::RelationGraphs;
use crate::model::{ClosureResult, FileKey, SymbolKey};

/// Read-only query engine over materialized graphs.
pub struct ClosureEngine<'g> {
    graphs: &'g RelationGraphs,
}

impl<'g> ClosureEngine<'g> {
    pub fn new(graphs: &'g RelationGraphs) -> Self {
        ClosureEngine { graphs }
    }

    /// Files and symbols reachable from `seed_symbol`, starting in `seed_file`.
    ///
    /// Both sets come back in first-discovery order. The seed file and the
    /// seed symbol are always their first elements.
    pub fn closure_of(&self, seed_file: FileKey, seed_symbol: &SymbolKey) -> Result<ClosureResult> {
        if !self.graphs.symbols.contains(seed_symbol) {
            return Err(ClosureError::SymbolNotFound(seed_symbol.clone()));
        }
        if !self.graphs.inclusion.contains(&seed_file) {
            return Err(ClosureError::FileNotFound(seed_file));
        }

        let mut files: IndexSet<FileKey> = IndexSet::new();
        let mut symbols: IndexSet<SymbolKey> = IndexSet::new();
        let mut file_frontier = VecDeque::new();
        let mut symbol_frontier = VecDeque::new();

        files.insert(seed_file);
        file_frontier.push_back(seed_file);
        symbols.insert(seed_symbol.clone());
        symbol_frontier.push_back(seed_symbol.clone());

        while let Some(key) = symbol_frontier.pop_front() {
            // externals are leaves without a file
            let Some(node) = self.graphs.symbols.node(&key) else {
                continue;
            };
            self.visit_file(node.defining_file, &mut files, &mut file_frontier);
            for dependency in &node.dependencies {
                if symbols.insert(dependency.clone()) {
                    symbol_frontier.push_back(dependency.clone());
                }
            }
        }

        while let Some(key) = file_frontier.pop_front() {
            let Some(node) = self.graphs.inclusion.node(&key) else {
                continue;
            };
            for &included in &node.inclusions {
                self.visit_file(included, &mut files, &mut file_frontier);
            }
        }

        tracing::debug!(
            "Closure of {}: {} files, {} symbols",
            seed_symbol,
            files.len(),
            symbols.len()
        );
        Ok(ClosureResult { files, symbols })
    }

    fn visit_file(&self, key: FileKey, files: &mut IndexSet<FileKey>, frontier: &mut VecDeque<FileKey>) {
        if self.graphs.system_headers.contains(&key) {
            return;
        }
        if files.insert(key) {
            frontier.push_back(key);
        }
    }
}

/// Convenience for a one-off query.
pub fn closure_of(graphs: &RelationGraphs, seed_file: FileKey, seed_symbol: &SymbolKey) -> Result<ClosureResult> {
    ClosureEngine::new(graphs).closure_of(seed_file, seed_symbol)
}
