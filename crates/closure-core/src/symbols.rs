//! Symbol reference graph keyed by canonical signature

use indexmap::IndexMap;

use crate::config::RelationConfig;
use crate::decl::{Declaration, ReferenceKind, TranslationUnit};
use crate::identity::signature_of;
use crate::model::{ExternalSymbol, FileKey, SymbolKey, SymbolNode};

/// Defined symbols and the symbols their definitions reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolGraph {
    nodes: IndexMap<SymbolKey, SymbolNode>,
    /// Referenced but never defined in a visited user file.
    externals: IndexMap<SymbolKey, ExternalSymbol>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, key: &SymbolKey) -> Option<&SymbolNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &SymbolKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn external(&self, key: &SymbolKey) -> Option<&ExternalSymbol> {
        self.externals.get(key)
    }

    pub fn is_external(&self, key: &SymbolKey) -> bool {
        !self.nodes.contains_key(key) && self.externals.contains_key(key)
    }

    /// Display name of a defined or external symbol.
    pub fn display_name(&self, key: &SymbolKey) -> Option<&str> {
        self.nodes
            .get(key)
            .map(|node| node.name.as_str())
            .or_else(|| self.externals.get(key).map(|ext| ext.name.as_str()))
    }

    /// Symbol nodes in first-definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &SymbolNode> {
        self.nodes.values()
    }

    pub fn externals(&self) -> impl Iterator<Item = (&SymbolKey, &ExternalSymbol)> {
        self.externals.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of dependency edges, repeats counted.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.dependencies.len()).sum()
    }

    /// Insert `node` unless its key is already defined. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, node: SymbolNode) -> bool {
        if self.nodes.contains_key(&node.key) {
            return false;
        }
        self.nodes.insert(node.key.clone(), node);
        true
    }

    pub fn note_external(&mut self, key: SymbolKey, external: ExternalSymbol) {
        self.externals.entry(key).or_insert(external);
    }

    /// Fold another graph in. First definition wins; returns how many
    /// incoming definitions disagreed with it about the defining file.
    pub fn merge(&mut self, other: SymbolGraph) -> usize {
        let mut conflicts = 0;
        for (key, node) in other.nodes {
            match self.nodes.get(&key) {
                Some(existing) if existing.defining_file != node.defining_file => {
                    tracing::warn!(
                        "Symbol {} (`{}`) is defined in both {} and {}; keeping the first",
                        key,
                        node.name,
                        existing.defining_file,
                        node.defining_file
                    );
                    conflicts += 1;
                }
                Some(_) => {}
                None => {
                    self.nodes.insert(key, node);
                }
            }
        }
        for (key, external) in other.externals {
            self.note_external(key, external);
        }
        conflicts
    }

    /// Drop symbols whose defining file fails `known_file`, and externals
    /// that turned out to be defined. Returns the number of dropped symbols.
    pub fn finalize(&mut self, known_file: impl Fn(&FileKey) -> bool) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|key, node| {
            let keep = known_file(&node.defining_file);
            if !keep {
                tracing::warn!("Discarding {} (`{}`): defining file {} is unresolved", key, node.name, node.defining_file);
            }
            keep
        });
        let nodes = &self.nodes;
        self.externals.retain(|key, _| !nodes.contains_key(key));
        before - self.nodes.len()
    }
}

/// Counters for what a builder skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolBuildOutcome {
    pub definitions: usize,
    pub skipped_declarations: usize,
}

/// Records the definitions of a unit into a [`SymbolGraph`].
pub struct SymbolGraphBuilder<'a> {
    graph: &'a mut SymbolGraph,
    config: &'a RelationConfig,
}

impl<'a> SymbolGraphBuilder<'a> {
    pub fn new(graph: &'a mut SymbolGraph, config: &'a RelationConfig) -> Self {
        SymbolGraphBuilder { graph, config }
    }

    pub fn add_unit<U>(&mut self, unit: &U) -> SymbolBuildOutcome
    where
        U: TranslationUnit + ?Sized,
    {
        let mut outcome = SymbolBuildOutcome::default();
        for decl in unit.declarations() {
            if !decl.is_symbol() || !decl.is_definition {
                continue;
            }
            if self.add_definition(unit, decl) {
                outcome.definitions += 1;
            } else {
                outcome.skipped_declarations += 1;
            }
        }
        outcome
    }

    /// Record one definition and its references. Returns false when the
    /// declaration was skipped (system header, no file, already recorded).
    pub fn add_definition<U>(&mut self, unit: &U, decl: &Declaration) -> bool
    where
        U: TranslationUnit + ?Sized,
    {
        let file = match decl.location.file_key() {
            Ok(file) => file,
            Err(err) => {
                tracing::debug!("Skipping `{}`: {}", decl.name, err);
                return false;
            }
        };
        if unit.is_in_system_header(&decl.location) {
            return false;
        }
        let (key, kind) = match (signature_of(unit, decl), decl.kind.symbol_kind()) {
            (Ok(key), Some(kind)) => (key, kind),
            (Err(err), _) => {
                tracing::debug!("Skipping `{}`: {}", decl.name, err);
                return false;
            }
            (Ok(_), None) => return false,
        };
        if self.graph.contains(&key) {
            tracing::debug!("{} already recorded", key);
            return false;
        }

        let mut node = SymbolNode::new(key.clone(), decl.name.clone(), kind, file);
        for reference in unit.references(decl) {
            if reference.kind == ReferenceKind::Type && !self.config.include_type_references {
                continue;
            }
            let Some(target) = unit.declaration(reference.target) else {
                continue;
            };
            let Some(target_kind) = target.kind.symbol_kind() else {
                continue;
            };
            let target_key = match signature_of(unit, target) {
                Ok(target_key) => target_key,
                Err(err) => {
                    tracing::debug!("Ignoring reference from `{}` to `{}`: {}", decl.name, target.name, err);
                    continue;
                }
            };
            if target_key == key {
                continue;
            }
            if !self.graph.contains(&target_key) {
                self.graph.note_external(
                    target_key.clone(),
                    ExternalSymbol {
                        name: target.name.clone(),
                        kind: target_kind,
                    },
                );
            }
            node.append_dependency(target_key);
        }

        tracing::debug!("{} `{}` -> {} dependencies", key, decl.name, node.dependency_count());
        self.graph.insert_if_absent(node);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolKind;
    use crate::test_utils::UnitBuilder;
    use crate::types::CType;

    fn build(unit: &crate::test_utils::MemoryUnit, config: &RelationConfig) -> SymbolGraph {
        let mut graph = SymbolGraph::new();
        SymbolGraphBuilder::new(&mut graph, config).add_unit(unit);
        graph.finalize(|_| true);
        graph
    }

    #[test]
    fn test_call_chain() {
        let mut unit = UnitBuilder::new("chain.c");
        let h = unit.function("h", 1).define();
        let g = unit.function("g", 2).define();
        let f = unit.function("f", 3).define();
        unit.reference(g, h);
        unit.reference(f, g);
        let unit = unit.build();

        let graph = build(&unit, &RelationConfig::default());
        assert_eq!(graph.node_count(), 3);
        let f = graph.node(&SymbolKey::new("_Z1fv")).unwrap();
        assert_eq!(f.dependencies, vec![SymbolKey::new("_Z1gv")]);
        assert_eq!(f.defining_file, unit.main_key());
    }

    #[test]
    fn test_prototype_then_definition_is_one_node() {
        let mut unit = UnitBuilder::new("main.c");
        let header = unit.header("api.h", false);
        let proto = unit.function("area", 1).params(vec![CType::int()]).in_file(header).declare();
        unit.function("area", 4).params(vec![CType::int()]).define();
        let caller = unit.function("report", 9).define();
        unit.reference(caller, proto);
        let unit = unit.build();

        let graph = build(&unit, &RelationConfig::default());
        let report = graph.node(&SymbolKey::new("_Z6reportv")).unwrap();
        assert_eq!(report.dependencies, vec![SymbolKey::new("_Z4areai")]);
        // the prototype resolved to the definition's key, so no external leaf
        assert!(!graph.is_external(&SymbolKey::new("_Z4areai")));
        assert_eq!(graph.node(&SymbolKey::new("_Z4areai")).unwrap().defining_file, unit.main_key());
    }

    #[test]
    fn test_undefined_callee_is_external_leaf() {
        let mut unit = UnitBuilder::new("main.c");
        let stdio = unit.header("stdio.h", true);
        let printf = unit.function("printf", 300).in_file(stdio).variadic().declare();
        let greet = unit.function("greet", 2).define();
        unit.reference(greet, printf);
        let unit = unit.build();

        let graph = build(&unit, &RelationConfig::default());
        let key = SymbolKey::new("_Z6printfz");
        assert!(graph.is_external(&key));
        assert!(graph.node(&key).is_none());
        assert_eq!(graph.display_name(&key), Some("printf"));
        assert_eq!(graph.external(&key).unwrap().kind, SymbolKind::Function);
    }

    #[test]
    fn test_system_header_definitions_are_skipped() {
        let mut unit = UnitBuilder::new("main.c");
        let sys = unit.header("inline.h", true);
        unit.function("fast_abs", 10).in_file(sys).define();
        let unit = unit.build();

        let mut graph = SymbolGraph::new();
        let outcome = SymbolGraphBuilder::new(&mut graph, &RelationConfig::default()).add_unit(&unit);
        assert_eq!(outcome.definitions, 0);
        assert_eq!(outcome.skipped_declarations, 1);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_non_symbol_references_and_recursion_are_ignored() {
        let mut unit = UnitBuilder::new("main.c");
        let counter = unit.variable("counter", 1);
        let fact = unit.function("fact", 2).params(vec![CType::int()]).define();
        unit.reference(fact, counter);
        unit.reference(fact, fact);
        let unit = unit.build();

        let graph = build(&unit, &RelationConfig::default());
        assert!(graph.node(&SymbolKey::new("_Z4facti")).unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_type_references_follow_config() {
        let mut unit = UnitBuilder::new("main.c");
        let point = unit.record("Point", 1).define();
        let norm = unit.function("norm", 5).define();
        unit.type_reference(norm, point);
        let unit = unit.build();

        let default = build(&unit, &RelationConfig::default());
        assert!(default.node(&SymbolKey::new("_Z4normv")).unwrap().dependencies.is_empty());

        let config = RelationConfig { include_type_references: true };
        let with_types = build(&unit, &config);
        assert_eq!(
            with_types.node(&SymbolKey::new("_Z4normv")).unwrap().dependencies,
            vec![SymbolKey::new("_ZTS5Point")]
        );
    }

    #[test]
    fn test_duplicate_edges_kept_but_counted_once() {
        let mut unit = UnitBuilder::new("main.c");
        let log = unit.function("log", 1).define();
        let run = unit.function("run", 2).define();
        unit.reference(run, log);
        unit.reference(run, log);
        let unit = unit.build();

        let graph = build(&unit, &RelationConfig::default());
        let run = graph.node(&SymbolKey::new("_Z3runv")).unwrap();
        assert_eq!(run.dependencies.len(), 2);
        assert_eq!(run.dependency_count(), 1);
    }

    #[test]
    fn test_merge_keeps_first_definition() {
        let file_a = FileKey::new(1, 10);
        let file_b = FileKey::new(1, 11);
        let key = SymbolKey::new("_Z6helperv");

        let mut first = SymbolGraph::new();
        first.insert_if_absent(SymbolNode::new(key.clone(), "helper", SymbolKind::Function, file_a));
        let mut second = SymbolGraph::new();
        second.insert_if_absent(SymbolNode::new(key.clone(), "helper", SymbolKind::Function, file_b));

        assert_eq!(first.merge(second), 1);
        assert_eq!(first.node(&key).unwrap().defining_file, file_a);
    }

    #[test]
    fn test_finalize_drops_unknown_files_and_resolved_externals() {
        let known = FileKey::new(1, 1);
        let unknown = FileKey::new(1, 2);
        let mut graph = SymbolGraph::new();
        graph.note_external(
            SymbolKey::new("_Z1av"),
            ExternalSymbol { name: "a".to_string(), kind: SymbolKind::Function },
        );
        graph.insert_if_absent(SymbolNode::new(SymbolKey::new("_Z1av"), "a", SymbolKind::Function, known));
        graph.insert_if_absent(SymbolNode::new(SymbolKey::new("_Z1bv"), "b", SymbolKind::Function, unknown));

        let dropped = graph.finalize(|file| *file == known);
        assert_eq!(dropped, 1);
        assert!(graph.contains(&SymbolKey::new("_Z1av")));
        assert!(graph.external(&SymbolKey::new("_Z1av")).is_none());
    }
}
