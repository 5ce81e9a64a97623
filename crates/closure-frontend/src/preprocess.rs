//! Include resolution.
//!
//! Starting at the main file, every `#include` directive is resolved against
//! the configured search paths and the included file is parsed, depth first,
//! in the order a preprocessor would enter it. Conditionals are not
//! evaluated: a directive inside any `#if` branch counts. Each file is parsed
//! at most once per translation unit, so include guards are unnecessary and
//! mutually including files terminate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use closure_core::{FileKey, FrontendConfig, InclusionEvent, SourceLocation};
use indexmap::IndexMap;
use tree_sitter::{Node, Tree};

use crate::error::{FrontendError, Result};
use crate::parser_pool::{ParseRequest, ParserPool};

/// A file reached while preprocessing a unit.
#[derive(Debug)]
pub struct SourceFile {
    pub key: FileKey,
    pub path: PathBuf,
    pub is_system: bool,
    pub content: String,
    /// `None` for system headers that were not followed.
    pub tree: Option<Tree>,
    /// Resolved `#include` directives, by start byte of the directive.
    pub includes: HashMap<usize, FileKey>,
}

/// Every file of a unit plus its inclusion events.
#[derive(Debug)]
pub struct Preprocessed {
    pub main: FileKey,
    pub files: IndexMap<FileKey, SourceFile>,
    pub events: Vec<InclusionEvent>,
}

impl Preprocessed {
    pub fn main_file(&self) -> Option<&SourceFile> {
        self.files.get(&self.main)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IncludeSpec {
    /// `#include "name"`
    Quoted(String),
    /// `#include <name>`
    Angled(String),
}

struct Directive {
    start_byte: usize,
    location: (u32, u32),
    spec: IncludeSpec,
}

pub struct Preprocessor<'a> {
    pool: &'a ParserPool,
    config: &'a FrontendConfig,
}

impl<'a> Preprocessor<'a> {
    pub fn new(pool: &'a ParserPool, config: &'a FrontendConfig) -> Self {
        Preprocessor { pool, config }
    }

    /// Parse `main` and every file it transitively includes.
    pub fn run(&self, main: &Path) -> Result<Preprocessed> {
        if !main.is_file() {
            return Err(FrontendError::NotFound(main.to_path_buf()));
        }
        let key = FileKey::for_path(main).map_err(|source| FrontendError::Io {
            path: main.to_path_buf(),
            source,
        })?;

        let mut unit = Preprocessed {
            main: key,
            files: IndexMap::new(),
            events: Vec::new(),
        };
        self.enter(&mut unit, key, main.to_path_buf(), false, true)?;
        Ok(unit)
    }

    fn enter(&self, unit: &mut Preprocessed, key: FileKey, path: PathBuf, is_system: bool, parse: bool) -> Result<()> {
        if !parse {
            unit.files.insert(key, SourceFile {
                key,
                path,
                is_system,
                content: String::new(),
                tree: None,
                includes: HashMap::new(),
            });
            return Ok(());
        }

        let bytes = std::fs::read(&path).map_err(|source| FrontendError::Io {
            path: path.clone(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|_| FrontendError::Utf8 { path: path.clone() })?;
        let parsed = self.pool.parse_blocking(ParseRequest {
            content,
            path: path.clone(),
        })?;
        if parsed.tree.root_node().has_error() {
            tracing::debug!("{} has syntax errors; continuing with a partial tree", path.display());
        }

        let mut directives = Vec::new();
        collect_directives(parsed.tree.root_node(), &parsed.content, &mut directives);

        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        unit.files.insert(key, SourceFile {
            key,
            path,
            is_system,
            content: parsed.content,
            tree: Some(parsed.tree),
            includes: HashMap::new(),
        });

        for directive in directives {
            let Some((included_path, included_is_system)) = self.resolve(&directive.spec, &directory, is_system) else {
                tracing::warn!(
                    "Unresolved include {:?} in {}:{}",
                    directive.spec,
                    unit.files[&key].path.display(),
                    directive.location.0
                );
                continue;
            };
            let included = match FileKey::for_path(&included_path) {
                Ok(included) => included,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", included_path.display(), e);
                    continue;
                }
            };

            unit.events.push(InclusionEvent {
                including: SourceLocation::new(key, directive.location.0, directive.location.1),
                included,
                included_path: included_path.clone(),
                included_is_system,
            });
            if let Some(file) = unit.files.get_mut(&key) {
                file.includes.insert(directive.start_byte, included);
            }

            if unit.files.contains_key(&included) {
                continue;
            }
            let parse = !included_is_system || self.config.follow_system_headers;
            if let Err(e) = self.enter(unit, included, included_path, included_is_system, parse) {
                tracing::warn!("Skipping included file: {}", e);
            }
        }
        Ok(())
    }

    /// Locate an included file. Returns its path and whether it is a system header.
    fn resolve(&self, spec: &IncludeSpec, including_dir: &Path, including_is_system: bool) -> Option<(PathBuf, bool)> {
        let name = match spec {
            IncludeSpec::Quoted(name) => {
                let candidate = including_dir.join(name);
                if candidate.is_file() {
                    return Some((candidate, including_is_system));
                }
                name
            }
            IncludeSpec::Angled(name) => name,
        };

        let user = self.config.include_dirs.iter().map(|dir| (dir, false));
        let system = self.config.system_include_dirs.iter().map(|dir| (dir, true));
        user.chain(system)
            .map(|(dir, is_system)| (dir.join(name), is_system))
            .find(|(candidate, _)| candidate.is_file())
    }
}

/// `#include` directives in document order, including those nested in
/// conditional blocks and function bodies.
fn collect_directives(root: Node, source: &str, out: &mut Vec<Directive>) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.kind() == "preproc_include" {
            if let Some(spec) = node.child_by_field_name("path").and_then(|path| include_spec(path, source)) {
                let position = node.start_position();
                out.push(Directive {
                    start_byte: node.start_byte(),
                    location: (position.row as u32 + 1, position.column as u32 + 1),
                    spec,
                });
            } else {
                tracing::debug!("Ignoring computed include at line {}", node.start_position().row + 1);
            }
        } else if cursor.goto_first_child() {
            continue;
        }

        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn include_spec(path: Node, source: &str) -> Option<IncludeSpec> {
    let text = path.utf8_text(source.as_bytes()).ok()?;
    let inner = text.get(1..text.len().checked_sub(1)?)?.to_string();
    match path.kind() {
        "string_literal" => Some(IncludeSpec::Quoted(inner)),
        "system_lib_string" => Some(IncludeSpec::Angled(inner)),
        _ => None,
    }
}
