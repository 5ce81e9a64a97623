//! File inclusion graph and its builder

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::decl::{InclusionEvent, TranslationUnit};
use crate::model::{FileKey, FileNode};

/// Files entered from system-header locations. Members are excluded from
/// every user-facing view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemHeaderSet {
    files: IndexSet<FileKey>,
}

impl SystemHeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FileKey) -> bool {
        self.files.insert(key)
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.files.contains(key)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileKey> {
        self.files.iter()
    }

    pub fn extend(&mut self, other: &SystemHeaderSet) {
        self.files.extend(other.files.iter().copied());
    }
}

/// Directed multigraph of files: `a -> b` when `a` includes `b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InclusionGraph {
    files: IndexMap<FileKey, FileNode>,
}

impl InclusionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for `key`, inserted with `display_name` on first sight.
    pub fn find_or_insert(&mut self, key: FileKey, display_name: &Path) -> &mut FileNode {
        self.files
            .entry(key)
            .or_insert_with(|| FileNode::new(key, display_name))
    }

    pub fn node(&self, key: &FileKey) -> Option<&FileNode> {
        self.files.get(key)
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.files.contains_key(key)
    }

    pub fn display_name(&self, key: &FileKey) -> Option<&Path> {
        self.files.get(key).map(|node| node.display_name.as_path())
    }

    /// File nodes in first-insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &FileNode> {
        self.files.values()
    }

    pub fn node_count(&self) -> usize {
        self.files.len()
    }

    /// Number of inclusion edges, repeats counted.
    pub fn edge_count(&self) -> usize {
        self.files.values().map(|node| node.inclusions.len()).sum()
    }

    /// Fold another graph in: nodes are found-or-inserted, inclusions appended.
    pub fn merge(&mut self, other: InclusionGraph) {
        for (key, node) in other.files {
            let target = self.find_or_insert(key, &node.display_name);
            target.inclusions.extend(node.inclusions);
        }
    }
}

/// What happened to one inclusion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Edge appended to the including file.
    Recorded,
    /// Directive inside a system header; only the classification was kept.
    SystemInternal,
    /// The including location has no backing file.
    Dropped,
}

/// Consumes inclusion events of translation units.
pub struct InclusionGraphBuilder<'a> {
    graph: &'a mut InclusionGraph,
    system_headers: &'a mut SystemHeaderSet,
}

impl<'a> InclusionGraphBuilder<'a> {
    pub fn new(graph: &'a mut InclusionGraph, system_headers: &'a mut SystemHeaderSet) -> Self {
        InclusionGraphBuilder { graph, system_headers }
    }

    /// Register the unit's main file and replay its inclusion events.
    /// Returns the number of dropped events.
    pub fn add_unit<U>(&mut self, unit: &U) -> usize
    where
        U: TranslationUnit + ?Sized,
    {
        self.graph.find_or_insert(unit.main_file(), unit.main_path());

        let mut dropped = 0;
        for event in unit.inclusion_events() {
            if self.add_event(unit, event) == EventOutcome::Dropped {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn add_event<U>(&mut self, unit: &U, event: &InclusionEvent) -> EventOutcome
    where
        U: TranslationUnit + ?Sized,
    {
        let parent = match event.including.file_key() {
            Ok(parent) => parent,
            Err(err) => {
                tracing::debug!("Dropping inclusion of {}: {}", event.included_path.display(), err);
                return EventOutcome::Dropped;
            }
        };
        let Some(parent_path) = unit.file_path(parent) else {
            tracing::debug!("Dropping inclusion of {}: including file {} is unknown", event.included_path.display(), parent);
            return EventOutcome::Dropped;
        };

        if unit.is_in_system_header(&event.including) {
            self.system_headers.insert(parent);
            self.system_headers.insert(event.included);
            return EventOutcome::SystemInternal;
        }

        if event.included_is_system {
            self.system_headers.insert(event.included);
        }

        self.graph.find_or_insert(event.included, &event.included_path);
        self.graph
            .find_or_insert(parent, parent_path)
            .append_inclusion(event.included);
        tracing::debug!("{} includes {}", parent_path.display(), event.included_path.display());
        EventOutcome::Recorded
    }
}
