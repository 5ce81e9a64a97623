//! Closure core: relation graphs, symbol identity and closure queries

pub mod closure;
pub mod config;
pub mod decl;
pub mod error;
pub mod graph;
pub mod identity;
pub mod inclusion;
pub mod model;
pub mod report;
pub mod selector;
pub mod symbols;
pub mod types;


#[cfg(test)]
pub mod test_utils;

pub use closure::{ClosureEngine, closure_of};
pub use config::{CONFIG_FILE, ClosureConfig, FrontendConfig, RelationConfig};
pub use decl::{DeclId, DeclKind, Declaration, InclusionEvent, Reference, ReferenceKind, SourceLocation, TranslationUnit};
pub use error::{ClosureError, Result};
pub use graph::{BuildStats, RelationGraphs, build_graphs};
pub use identity::{ItaniumMangler, NameMangler, signature_of};
pub use inclusion::{InclusionGraph, InclusionGraphBuilder, SystemHeaderSet};
pub use model::{ClosureResult, ExternalSymbol, FileKey, FileNode, SymbolKey, SymbolKind, SymbolNode};
pub use report::{ClosureReport, InclusionTree, render_symbol_list};
pub use selector::{ListedSymbol, list_symbols, select};
pub use symbols::{SymbolGraph, SymbolGraphBuilder};
pub use types::{Builtin, CType, FunctionType, RecordTag};
