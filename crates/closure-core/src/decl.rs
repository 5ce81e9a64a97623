//! Front-end contracts: declarations, locations, inclusion events and the
//! translation-unit visitor the builders consume.
//!
//! A front-end parses one translation unit and exposes it through
//! [`TranslationUnit`]. The core never looks at syntax; everything it needs
//! (declaration kinds, canonical types, locations, resolved references and
//! `#include` events) comes through this module's types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClosureError, Result};
use crate::model::{FileKey, SymbolKind};
use crate::types::{CType, FunctionType, RecordTag};

/// Index of a declaration inside its translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where something physically lives. `file` is `None` for builtin or
/// synthetic locations that have no backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Option<FileKey>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: FileKey, line: u32, column: u32) -> Self {
        SourceLocation { file: Some(file), line, column }
    }

    pub fn builtin() -> Self {
        SourceLocation { file: None, line: 0, column: 0 }
    }

    /// The backing file, or [`ClosureError::UnresolvedLocation`].
    pub fn file_key(&self) -> Result<FileKey> {
        self.file.ok_or(ClosureError::UnresolvedLocation)
    }
}

/// What a declaration declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclKind {
    Function(FunctionType),
    Record(RecordTag),
    Typedef(CType),
    Variable(CType),
    Enum,
    Enumerator,
}

impl DeclKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeclKind::Function(_) => "function",
            DeclKind::Record(_) => "record",
            DeclKind::Typedef(_) => "typedef",
            DeclKind::Variable(_) => "variable",
            DeclKind::Enum => "enum",
            DeclKind::Enumerator => "enumerator",
        }
    }

    /// The symbol kind, for the declarations that can be symbols.
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            DeclKind::Function(_) => Some(SymbolKind::Function),
            DeclKind::Record(_) => Some(SymbolKind::Record),
            _ => None,
        }
    }
}

/// A single declaration of a translation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclId,
    pub name: String,
    pub kind: DeclKind,
    pub location: SourceLocation,
    /// Function whose body declares this entity, for block-scope declarations.
    pub enclosing: Option<DeclId>,
    /// Has a body (functions) or a member list (records).
    pub is_definition: bool,
}

impl Declaration {
    pub fn is_symbol(&self) -> bool {
        self.kind.symbol_kind().is_some()
    }
}

/// How a declaration is referenced from a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// A named value use: call, address-of, variable or enumerator read.
    Value,
    /// A type use: parameter/return types, local declarations, casts, `sizeof`, fields.
    Type,
}

/// A resolved reference found inside a declaration's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub target: DeclId,
    pub kind: ReferenceKind,
}

/// One `#include`-like directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionEvent {
    /// Location of the directive.
    pub including: SourceLocation,
    pub included: FileKey,
    pub included_path: PathBuf,
    /// The front-end classifies the included file itself as a system header.
    pub included_is_system: bool,
}

/// A parsed translation unit, as seen by the builders.
///
/// Implementations must keep `declarations()` in document order with nested
/// declarations following their parent, and must resolve references to
/// declarations of the same unit.
pub trait TranslationUnit {
    /// Key of the directly compiled source file.
    fn main_file(&self) -> FileKey;

    /// Path of the main file as given to the front-end.
    fn main_path(&self) -> &Path;

    /// Every declaration of the unit, in document order.
    fn declarations(&self) -> &[Declaration];

    fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations().get(id.index())
    }

    fn is_in_main_file(&self, location: &SourceLocation) -> bool {
        location.file == Some(self.main_file())
    }

    fn is_in_system_header(&self, location: &SourceLocation) -> bool;

    /// Display path of a file known to this unit.
    fn file_path(&self, key: FileKey) -> Option<&Path>;

    /// Inclusion directives in the order the preprocessor met them.
    fn inclusion_events(&self) -> &[InclusionEvent];

    /// References made inside `decl`'s body, at any depth.
    ///
    /// The iterator is single-pass; calling again starts a fresh walk.
    fn references<'a>(&'a self, decl: &'a Declaration) -> Box<dyn Iterator<Item = Reference> + 'a>;
}
