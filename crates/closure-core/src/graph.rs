//! Relation graphs of a run: inclusion graph, symbol graph and system headers

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::RelationConfig;
use crate::decl::TranslationUnit;
use crate::inclusion::{InclusionGraph, InclusionGraphBuilder, SystemHeaderSet};
use crate::model::{FileKey, SymbolKey};
use crate::symbols::{SymbolGraph, SymbolGraphBuilder};

/// What construction skipped or dropped. Nothing here aborts a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub units: usize,
    pub definitions: usize,
    pub dropped_events: usize,
    pub skipped_declarations: usize,
    pub unresolved_symbols: usize,
    pub conflicting_definitions: usize,
}

impl BuildStats {
    fn absorb(&mut self, other: BuildStats) {
        self.units += other.units;
        self.definitions += other.definitions;
        self.dropped_events += other.dropped_events;
        self.skipped_declarations += other.skipped_declarations;
        self.unresolved_symbols += other.unresolved_symbols;
        self.conflicting_definitions += other.conflicting_definitions;
    }
}

/// Everything the closure query runs over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationGraphs {
    pub inclusion: InclusionGraph,
    pub symbols: SymbolGraph,
    pub system_headers: SystemHeaderSet,
    pub stats: BuildStats,
}

impl RelationGraphs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partial graphs of a single unit.
    pub fn from_unit<U>(unit: &U, config: &RelationConfig) -> Self
    where
        U: TranslationUnit + ?Sized,
    {
        let mut graphs = RelationGraphs::new();
        graphs.add_unit(unit, config);
        graphs
    }

    /// Feed one unit through both builders.
    pub fn add_unit<U>(&mut self, unit: &U, config: &RelationConfig)
    where
        U: TranslationUnit + ?Sized,
    {
        let dropped = InclusionGraphBuilder::new(&mut self.inclusion, &mut self.system_headers).add_unit(unit);
        let outcome = SymbolGraphBuilder::new(&mut self.symbols, config).add_unit(unit);

        self.stats.units += 1;
        self.stats.dropped_events += dropped;
        self.stats.definitions += outcome.definitions;
        self.stats.skipped_declarations += outcome.skipped_declarations;
        tracing::debug!(
            "Unit {}: {} definitions, {} dropped events",
            unit.main_path().display(),
            outcome.definitions,
            dropped
        );
    }

    /// Fold a partial graph in, resolving collisions by key.
    pub fn merge(&mut self, other: RelationGraphs) {
        self.inclusion.merge(other.inclusion);
        self.system_headers.extend(&other.system_headers);
        let conflicts = self.symbols.merge(other.symbols);
        self.stats.absorb(other.stats);
        self.stats.conflicting_definitions += conflicts;
    }

    /// Enforce that every symbol's defining file is a file node.
    pub fn finalize(&mut self) {
        let inclusion = &self.inclusion;
        let dropped = self.symbols.finalize(|file| inclusion.contains(file));
        self.stats.unresolved_symbols += dropped;
    }

    pub fn is_user_file(&self, key: &FileKey) -> bool {
        self.inclusion.contains(key) && !self.system_headers.contains(key)
    }

    /// User part of the inclusion graph as a petgraph digraph of display names.
    pub fn inclusion_digraph(&self) -> DiGraph<String, &'static str> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<FileKey, NodeIndex> = HashMap::new();
        for node in self.inclusion.nodes() {
            if self.system_headers.contains(&node.key) {
                continue;
            }
            let idx = graph.add_node(node.display_name.display().to_string());
            indices.insert(node.key, idx);
        }
        for node in self.inclusion.nodes() {
            let Some(&source) = indices.get(&node.key) else {
                continue;
            };
            for included in &node.inclusions {
                if let Some(&target) = indices.get(included) {
                    graph.update_edge(source, target, "includes");
                }
            }
        }
        graph
    }

    /// Symbol graph as a petgraph digraph of signatures, externals included.
    pub fn symbol_digraph(&self) -> DiGraph<String, &'static str> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<&SymbolKey, NodeIndex> = HashMap::new();
        for node in self.symbols.nodes() {
            indices.insert(&node.key, graph.add_node(node.key.to_string()));
        }
        for (key, _) in self.symbols.externals() {
            indices.entry(key).or_insert_with(|| graph.add_node(key.to_string()));
        }
        for node in self.symbols.nodes() {
            let source = indices[&node.key];
            for dependency in node.unique_dependencies() {
                if let Some(&target) = indices.get(dependency) {
                    graph.update_edge(source, target, "references");
                }
            }
        }
        graph
    }

    /// Graphviz rendering of the user inclusion graph.
    pub fn inclusion_dot(&self) -> String {
        let graph = self.inclusion_digraph();
        Dot::with_config(&graph, &[Config::EdgeNoLabel]).to_string()
    }

    /// Graphviz rendering of the symbol graph.
    pub fn symbol_dot(&self) -> String {
        let graph = self.symbol_digraph();
        Dot::with_config(&graph, &[Config::EdgeNoLabel]).to_string()
    }

    /// Groups of user files that include each other, directly or not.
    pub fn inclusion_cycles(&self) -> Vec<Vec<String>> {
        let graph = self.inclusion_digraph();
        tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| component.into_iter().map(|idx| graph[idx].clone()).collect())
            .collect()
    }
}

/// Build the relation graphs of a whole corpus.
///
/// Units are processed in parallel into partial graphs which are merged in
/// input order, so identical input yields identical graphs.
pub fn build_graphs<U>(units: &[U], config: &RelationConfig) -> RelationGraphs
where
    U: TranslationUnit + Sync,
{
    let partials: Vec<RelationGraphs> = units
        .par_iter()
        .map(|unit| RelationGraphs::from_unit(unit, config))
        .collect();

    let mut graphs = RelationGraphs::new();
    for partial in partials {
        graphs.merge(partial);
    }
    graphs.finalize();

    for cycle in graphs.inclusion_cycles() {
        tracing::warn!("Mutually including files: {}", cycle.join(", "));
    }
    tracing::info!(
        "Built graphs from {} units: {} files ({} system headers), {} symbols, {} externals",
        graphs.stats.units,
        graphs.inclusion.node_count(),
        graphs.system_headers.len(),
        graphs.symbols.node_count(),
        graphs.symbols.externals().count()
    );
    graphs
}
