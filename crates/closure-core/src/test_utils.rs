//! Test utilities: in-memory translation units with synthetic file keys

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::decl::{
    DeclId, DeclKind, Declaration, InclusionEvent, Reference, ReferenceKind, SourceLocation, TranslationUnit,
};
use crate::model::FileKey;
use crate::types::{CType, FunctionType, RecordTag};

/// A translation unit assembled by hand.
#[derive(Debug, Clone)]
pub struct MemoryUnit {
    main: FileKey,
    main_path: PathBuf,
    /// Path and system flag of every file the unit knows.
    files: IndexMap<FileKey, (PathBuf, bool)>,
    declarations: Vec<Declaration>,
    references: Vec<Vec<Reference>>,
    events: Vec<InclusionEvent>,
}

impl MemoryUnit {
    pub fn main_key(&self) -> FileKey {
        self.main
    }

    pub fn key_of(&self, path: &str) -> FileKey {
        FileKey::synthetic(path)
    }
}

impl TranslationUnit for MemoryUnit {
    fn main_file(&self) -> FileKey {
        self.main
    }

    fn main_path(&self) -> &Path {
        &self.main_path
    }

    fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    fn is_in_system_header(&self, location: &SourceLocation) -> bool {
        location
            .file
            .and_then(|key| self.files.get(&key))
            .is_some_and(|(_, system)| *system)
    }

    fn file_path(&self, key: FileKey) -> Option<&Path> {
        self.files.get(&key).map(|(path, _)| path.as_path())
    }

    fn inclusion_events(&self) -> &[InclusionEvent] {
        &self.events
    }

    fn references<'a>(&'a self, decl: &'a Declaration) -> Box<dyn Iterator<Item = Reference> + 'a> {
        match self.references.get(decl.id.index()) {
            Some(references) => Box::new(references.iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }
}

/// Builder for [`MemoryUnit`]. Declarations get ids in call order.
pub struct UnitBuilder {
    unit: MemoryUnit,
}

impl UnitBuilder {
    pub fn new(main_path: &str) -> Self {
        let main = FileKey::synthetic(main_path);
        let mut files = IndexMap::new();
        files.insert(main, (PathBuf::from(main_path), false));
        UnitBuilder {
            unit: MemoryUnit {
                main,
                main_path: PathBuf::from(main_path),
                files,
                declarations: Vec::new(),
                references: Vec::new(),
                events: Vec::new(),
            },
        }
    }

    pub fn main_key(&self) -> FileKey {
        self.unit.main
    }

    /// Register a header; returns its key.
    pub fn header(&mut self, path: &str, is_system: bool) -> FileKey {
        let key = FileKey::synthetic(path);
        self.unit.files.insert(key, (PathBuf::from(path), is_system));
        key
    }

    /// `#include` of `to` at `line` of `from`.
    pub fn include(&mut self, from: FileKey, to: FileKey, line: u32) {
        let (path, is_system) = self.unit.files.get(&to).cloned().expect("include target registered");
        self.unit.events.push(InclusionEvent {
            including: SourceLocation::new(from, line, 1),
            included: to,
            included_path: path,
            included_is_system: is_system,
        });
    }

    pub fn function(&mut self, name: &str, line: u32) -> DeclBuilder<'_> {
        let kind = PendingKind::Function(FunctionType {
            ret: Box::new(CType::int()),
            params: Vec::new(),
            variadic: false,
        });
        DeclBuilder::new(self, name, line, kind)
    }

    pub fn record(&mut self, name: &str, line: u32) -> DeclBuilder<'_> {
        DeclBuilder::new(self, name, line, PendingKind::Record(RecordTag::Struct))
    }

    /// File-scope `int name;` in the main file.
    pub fn variable(&mut self, name: &str, line: u32) -> DeclId {
        let location = SourceLocation::new(self.unit.main, line, 1);
        self.push(name, DeclKind::Variable(CType::int()), location, None, true)
    }

    /// `typedef int name;` in the main file.
    pub fn typedef(&mut self, name: &str, line: u32) -> DeclId {
        let location = SourceLocation::new(self.unit.main, line, 1);
        self.push(name, DeclKind::Typedef(CType::int()), location, None, true)
    }

    /// A value reference from `from`'s body to `to`.
    pub fn reference(&mut self, from: DeclId, to: DeclId) {
        self.unit.references[from.index()].push(Reference { target: to, kind: ReferenceKind::Value });
    }

    /// A type reference from `from` to `to`.
    pub fn type_reference(&mut self, from: DeclId, to: DeclId) {
        self.unit.references[from.index()].push(Reference { target: to, kind: ReferenceKind::Type });
    }

    pub fn build(self) -> MemoryUnit {
        self.unit
    }

    fn push(
        &mut self,
        name: &str,
        kind: DeclKind,
        location: SourceLocation,
        enclosing: Option<DeclId>,
        is_definition: bool,
    ) -> DeclId {
        let id = DeclId(self.unit.declarations.len() as u32);
        self.unit.declarations.push(Declaration {
            id,
            name: name.to_string(),
            kind,
            location,
            enclosing,
            is_definition,
        });
        self.unit.references.push(Vec::new());
        id
    }
}

enum PendingKind {
    Function(FunctionType),
    Record(RecordTag),
}

/// A function or record under construction.
pub struct DeclBuilder<'a> {
    builder: &'a mut UnitBuilder,
    name: String,
    line: u32,
    file: FileKey,
    kind: PendingKind,
    enclosing: Option<DeclId>,
}

impl<'a> DeclBuilder<'a> {
    fn new(builder: &'a mut UnitBuilder, name: &str, line: u32, kind: PendingKind) -> Self {
        let file = builder.unit.main;
        DeclBuilder {
            builder,
            name: name.to_string(),
            line,
            file,
            kind,
            enclosing: None,
        }
    }

    pub fn params(mut self, params: Vec<CType>) -> Self {
        if let PendingKind::Function(signature) = &mut self.kind {
            signature.params = params;
        }
        self
    }

    pub fn returns(mut self, ret: CType) -> Self {
        if let PendingKind::Function(signature) = &mut self.kind {
            signature.ret = Box::new(ret);
        }
        self
    }

    pub fn variadic(mut self) -> Self {
        if let PendingKind::Function(signature) = &mut self.kind {
            signature.variadic = true;
        }
        self
    }

    pub fn union(mut self) -> Self {
        self.kind = PendingKind::Record(RecordTag::Union);
        self
    }

    pub fn in_file(mut self, file: FileKey) -> Self {
        self.file = file;
        self
    }

    /// Declared at block scope inside `function`.
    pub fn inside(mut self, function: DeclId) -> Self {
        self.enclosing = Some(function);
        self
    }

    /// With a body or member list.
    pub fn define(self) -> DeclId {
        self.finish(true)
    }

    /// Prototype or forward declaration.
    pub fn declare(self) -> DeclId {
        self.finish(false)
    }

    fn finish(self, is_definition: bool) -> DeclId {
        let kind = match self.kind {
            PendingKind::Function(signature) => DeclKind::Function(signature),
            PendingKind::Record(tag) => DeclKind::Record(tag),
        };
        let location = SourceLocation::new(self.file, self.line, 1);
        self.builder.push(&self.name, kind, location, self.enclosing, is_definition)
    }
}
