//! Declaration pass.
//!
//! Walks the main file in document order, entering included files at their
//! `#include` directive, and records functions, records, typedefs, enums,
//! enumerators and file-scope variables. Canonical types are computed from
//! C declarator syntax with typedefs resolved through the names seen so far.
//! Bodies are queued for the reference pass.

use std::collections::{HashMap, HashSet};

use closure_core::{Builtin, CType, DeclId, DeclKind, Declaration, FileKey, FunctionType, RecordTag, SourceLocation};
use tree_sitter::Node;

use crate::preprocess::Preprocessed;

/// File-scope name tables.
#[derive(Debug, Default)]
pub(crate) struct FileScope {
    /// Ordinary identifiers: functions, variables and enumerators.
    pub values: HashMap<String, DeclId>,
    /// `struct`/`union` tags.
    pub tags: HashMap<String, DeclId>,
    pub typedefs: HashMap<String, CType>,
}

pub(crate) enum BodyKind<'t> {
    Function { definition: Node<'t> },
    Record { body: Node<'t> },
}

/// A declaration whose references still have to be collected.
pub(crate) struct PendingBody<'t> {
    pub owner: DeclId,
    pub file: FileKey,
    pub source: &'t str,
    pub kind: BodyKind<'t>,
}

#[derive(Default)]
pub(crate) struct Collected<'t> {
    pub declarations: Vec<Declaration>,
    pub scope: FileScope,
    pub bodies: Vec<PendingBody<'t>>,
    /// Block-scope record definitions by file and start byte.
    pub local_records: HashMap<(FileKey, usize), DeclId>,
}

#[derive(Clone, Copy)]
struct Ctx<'t> {
    file: FileKey,
    source: &'t str,
}

pub(crate) fn collect(unit: &Preprocessed) -> Collected<'_> {
    let mut collector = Collector {
        unit,
        out: Collected::default(),
        walked: HashSet::new(),
    };
    collector.walk_file(unit.main);
    collector.out
}

struct Collector<'t> {
    unit: &'t Preprocessed,
    out: Collected<'t>,
    walked: HashSet<FileKey>,
}

impl<'t> Collector<'t> {
    fn walk_file(&mut self, key: FileKey) {
        if !self.walked.insert(key) {
            return;
        }
        let unit = self.unit;
        let Some(file) = unit.files.get(&key) else {
            return;
        };
        let Some(tree) = &file.tree else {
            return;
        };
        let ctx = Ctx {
            file: key,
            source: &file.content,
        };
        self.walk_items(ctx, tree.root_node());
    }

    fn walk_items(&mut self, ctx: Ctx<'t>, node: Node<'t>) {
        for child in named_children(node) {
            self.walk_item(ctx, child);
        }
    }

    fn walk_item(&mut self, ctx: Ctx<'t>, node: Node<'t>) {
        match node.kind() {
            "function_definition" => self.function_definition(ctx, node),
            "declaration" => self.declaration(ctx, node, None),
            "type_definition" => self.type_definition(ctx, node, None),
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                self.type_specifier(ctx, node, None, None, true);
            }
            "preproc_include" => self.enter_include(ctx, node),
            "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" | "preproc_elifdef" | "declaration_list" => {
                self.walk_items(ctx, node)
            }
            // `extern "C" { ... }` or `extern "C" int f(void);`
            "linkage_specification" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_item(ctx, body);
                }
            }
            _ => {}
        }
    }

    fn enter_include(&mut self, ctx: Ctx<'t>, directive: Node<'t>) {
        let target = self
            .unit
            .files
            .get(&ctx.file)
            .and_then(|file| file.includes.get(&directive.start_byte()))
            .copied();
        if let Some(target) = target {
            self.walk_file(target);
        }
    }

    fn function_definition(&mut self, ctx: Ctx<'t>, node: Node<'t>) {
        let (Some(type_node), Some(declarator)) = (node.child_by_field_name("type"), node.child_by_field_name("declarator"))
        else {
            return;
        };
        let base = self.qualified_type(ctx, node, type_node, None, None);
        let (name, ty) = self.apply_declarator(ctx, Some(declarator), base);
        let (Some(name), CType::Function(signature)) = (name, ty) else {
            tracing::debug!("Skipping unsupported function definition at line {}", node.start_position().row + 1);
            return;
        };

        let name = text(name, ctx.source).to_string();
        let id = self.push(ctx, node, &name, DeclKind::Function(signature), None, true);
        self.register_value(&name, id, true);
        self.out.bodies.push(PendingBody {
            owner: id,
            file: ctx.file,
            source: ctx.source,
            kind: BodyKind::Function { definition: node },
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.local_items(ctx, body, id);
        }
    }

    fn declaration(&mut self, ctx: Ctx<'t>, node: Node<'t>, enclosing: Option<DeclId>) {
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let base = self.qualified_type(ctx, node, type_node, enclosing, None);
        let is_extern = has_storage_class(node, ctx.source, "extern");

        for declarator in field_children(node, "declarator") {
            let (name, ty) = self.apply_declarator(ctx, Some(declarator), base.clone());
            let Some(name) = name.map(|name| text(name, ctx.source).to_string()) else {
                continue;
            };
            match ty {
                // block-scope prototypes name the file-scope function
                CType::Function(signature) => {
                    let id = self.push(ctx, node, &name, DeclKind::Function(signature), None, false);
                    self.register_value(&name, id, false);
                }
                ty if enclosing.is_none() => {
                    let id = self.push(ctx, node, &name, DeclKind::Variable(ty), None, !is_extern);
                    self.register_value(&name, id, true);
                }
                _ => {}
            }
        }
    }

    fn type_definition(&mut self, ctx: Ctx<'t>, node: Node<'t>, enclosing: Option<DeclId>) {
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let declarators = field_children(node, "declarator");
        // `typedef struct { ... } Name;` names the record
        let alias = declarators
            .iter()
            .find(|declarator| declarator.kind() == "type_identifier")
            .map(|declarator| text(*declarator, ctx.source));
        let base = self.qualified_type(ctx, node, type_node, enclosing, alias);
        if enclosing.is_some() {
            return;
        }

        for declarator in declarators {
            let (name, ty) = self.apply_declarator(ctx, Some(declarator), base.clone());
            let Some(name) = name.map(|name| text(name, ctx.source).to_string()) else {
                continue;
            };
            self.push(ctx, node, &name, DeclKind::Typedef(ty.clone()), None, true);
            self.out.scope.typedefs.insert(name, ty);
        }
    }

    /// Block-scope records and prototypes inside a function body.
    fn local_items(&mut self, ctx: Ctx<'t>, body: Node<'t>, function: DeclId) {
        // (node, parent is a block) pairs; depth lives on the heap
        let mut stack: Vec<(Node<'t>, bool)> = Vec::new();
        push_children(&mut stack, body);
        while let Some((node, in_block)) = stack.pop() {
            match node.kind() {
                "declaration" => self.declaration(ctx, node, Some(function)),
                "type_definition" => self.type_definition(ctx, node, Some(function)),
                "struct_specifier" | "union_specifier" | "enum_specifier" => {
                    self.type_specifier(ctx, node, Some(function), None, in_block);
                }
                "function_definition" => {}
                _ => push_children(&mut stack, node),
            }
        }
    }

    fn qualified_type(
        &mut self,
        ctx: Ctx<'t>,
        owner: Node<'t>,
        type_node: Node<'t>,
        enclosing: Option<DeclId>,
        alias: Option<&str>,
    ) -> CType {
        let (is_const, is_volatile) = qualifiers(owner, ctx.source);
        self.type_specifier(ctx, type_node, enclosing, alias, false)
            .qualified(is_const, is_volatile)
    }

    fn type_specifier(
        &mut self,
        ctx: Ctx<'t>,
        node: Node<'t>,
        enclosing: Option<DeclId>,
        alias: Option<&str>,
        standalone: bool,
    ) -> CType {
        let source = ctx.source;
        match node.kind() {
            "primitive_type" => {
                let name = text(node, source);
                Builtin::from_name(name)
                    .map(CType::Builtin)
                    .unwrap_or_else(|| CType::Named(name.to_string()))
            }
            "sized_type_specifier" => CType::Builtin(sized_builtin(node, source)),
            "type_identifier" => {
                let name = text(node, source);
                self.out
                    .scope
                    .typedefs
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| CType::Named(name.to_string()))
            }
            "struct_specifier" => self.record_specifier(ctx, node, RecordTag::Struct, enclosing, alias, standalone),
            "union_specifier" => self.record_specifier(ctx, node, RecordTag::Union, enclosing, alias, standalone),
            "enum_specifier" => self.enum_specifier(ctx, node, enclosing),
            "macro_type_specifier" => {
                let name = node.child_by_field_name("name").map(|name| text(name, source)).unwrap_or_default();
                CType::Named(name.to_string())
            }
            _ => CType::Named(text(node, source).to_string()),
        }
    }

    fn record_specifier(
        &mut self,
        ctx: Ctx<'t>,
        node: Node<'t>,
        tag: RecordTag,
        enclosing: Option<DeclId>,
        alias: Option<&str>,
        standalone: bool,
    ) -> CType {
        let body = node.child_by_field_name("body");
        let name = match node.child_by_field_name("name") {
            Some(name) => text(name, ctx.source).to_string(),
            None if body.is_some() => alias.unwrap_or_default().to_string(),
            None => String::new(),
        };

        if !name.is_empty() && (body.is_some() || standalone) {
            let id = self.push(ctx, node, &name, DeclKind::Record(tag), enclosing, body.is_some());
            match enclosing {
                Some(_) => {
                    self.out.local_records.insert((ctx.file, node.start_byte()), id);
                }
                None => self.register_tag(&name, id, body.is_some()),
            }
            if let Some(body) = body {
                self.out.bodies.push(PendingBody {
                    owner: id,
                    file: ctx.file,
                    source: ctx.source,
                    kind: BodyKind::Record { body },
                });
            }
        }
        if let Some(body) = body {
            self.nested_specifiers(ctx, body, enclosing);
        }
        CType::Record { tag, name }
    }

    /// Records defined inside a member list. C gives their tags the
    /// enclosing scope, not the outer record.
    fn nested_specifiers(&mut self, ctx: Ctx<'t>, body: Node<'t>, enclosing: Option<DeclId>) {
        for field in named_children(body) {
            match field.kind() {
                "field_declaration" => {
                    if let Some(type_node) = field.child_by_field_name("type") {
                        self.type_specifier(ctx, type_node, enclosing, None, false);
                    }
                }
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" | "preproc_elifdef" => {
                    self.nested_specifiers(ctx, field, enclosing)
                }
                _ => {}
            }
        }
    }

    fn enum_specifier(&mut self, ctx: Ctx<'t>, node: Node<'t>, enclosing: Option<DeclId>) -> CType {
        let name = node
            .child_by_field_name("name")
            .map(|name| text(name, ctx.source).to_string())
            .unwrap_or_default();
        // block-scope enumerators are bound by the reference pass
        if let (Some(body), None) = (node.child_by_field_name("body"), enclosing) {
            self.push(ctx, node, &name, DeclKind::Enum, None, true);
            for enumerator in named_children(body) {
                if enumerator.kind() != "enumerator" {
                    continue;
                }
                if let Some(constant) = enumerator.child_by_field_name("name") {
                    let constant = text(constant, ctx.source).to_string();
                    let id = self.push(ctx, enumerator, &constant, DeclKind::Enumerator, None, true);
                    self.register_value(&constant, id, true);
                }
            }
        }
        CType::Enum(name)
    }

    /// Wrap `base` in the constructors of `declarator`, outermost first.
    /// Returns the declared name, if any, and the resulting type.
    fn apply_declarator(&mut self, ctx: Ctx<'t>, declarator: Option<Node<'t>>, base: CType) -> (Option<Node<'t>>, CType) {
        let Some(node) = declarator else {
            return (None, base);
        };
        match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" => (Some(node), base),
            "pointer_declarator" | "abstract_pointer_declarator" => {
                let (is_const, is_volatile) = qualifiers(node, ctx.source);
                let pointer = CType::pointer_to(base).qualified(is_const, is_volatile);
                self.apply_declarator(ctx, node.child_by_field_name("declarator"), pointer)
            }
            "array_declarator" | "abstract_array_declarator" => {
                let size = node
                    .child_by_field_name("size")
                    .and_then(|size| parse_size(text(size, ctx.source)));
                let array = CType::Array {
                    element: Box::new(base),
                    size,
                };
                self.apply_declarator(ctx, node.child_by_field_name("declarator"), array)
            }
            "function_declarator" | "abstract_function_declarator" => {
                let (params, variadic) = match node.child_by_field_name("parameters") {
                    Some(list) => self.parameter_list(ctx, list),
                    None => (Vec::new(), false),
                };
                let function = CType::Function(FunctionType {
                    ret: Box::new(base),
                    params,
                    variadic,
                });
                self.apply_declarator(ctx, node.child_by_field_name("declarator"), function)
            }
            "parenthesized_declarator" | "abstract_parenthesized_declarator" | "attributed_declarator" => {
                self.apply_declarator(ctx, node.named_child(0), base)
            }
            "init_declarator" => self.apply_declarator(ctx, node.child_by_field_name("declarator"), base),
            _ => (None, base),
        }
    }

    fn parameter_list(&mut self, ctx: Ctx<'t>, list: Node<'t>) -> (Vec<CType>, bool) {
        let mut params = Vec::new();
        let mut variadic = false;
        let mut cursor = list.walk();
        let children: Vec<Node<'t>> = list.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "parameter_declaration" => {
                    let Some(type_node) = child.child_by_field_name("type") else {
                        continue;
                    };
                    let base = self.qualified_type(ctx, child, type_node, None, None);
                    let (_, ty) = self.apply_declarator(ctx, child.child_by_field_name("declarator"), base);
                    params.push(ty);
                }
                "variadic_parameter" | "..." => variadic = true,
                _ => {}
            }
        }
        // `(void)` declares no parameters
        if params.len() == 1 && !variadic && params[0] == CType::Builtin(Builtin::Void) {
            params.clear();
        }
        (params, variadic)
    }

    fn push(
        &mut self,
        ctx: Ctx<'t>,
        node: Node<'t>,
        name: &str,
        kind: DeclKind,
        enclosing: Option<DeclId>,
        is_definition: bool,
    ) -> DeclId {
        let id = DeclId(self.out.declarations.len() as u32);
        let position = node.start_position();
        self.out.declarations.push(Declaration {
            id,
            name: name.to_string(),
            kind,
            location: SourceLocation::new(ctx.file, position.row as u32 + 1, position.column as u32 + 1),
            enclosing,
            is_definition,
        });
        id
    }

    /// Definitions replace earlier entries; other declarations only fill gaps.
    fn register_value(&mut self, name: &str, id: DeclId, replace: bool) {
        register(&mut self.out.scope.values, name, id, replace);
    }

    fn register_tag(&mut self, name: &str, id: DeclId, replace: bool) {
        register(&mut self.out.scope.tags, name, id, replace);
    }
}

fn register(table: &mut HashMap<String, DeclId>, name: &str, id: DeclId, replace: bool) {
    if replace {
        table.insert(name.to_string(), id);
    } else {
        table.entry(name.to_string()).or_insert(id);
    }
}

pub(crate) fn text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// Push the named children of `node` so they pop in document order.
fn push_children<'t>(stack: &mut Vec<(Node<'t>, bool)>, node: Node<'t>) {
    let in_block = node.kind() == "compound_statement";
    stack.extend(named_children(node).into_iter().rev().map(|child| (child, in_block)));
}

pub(crate) fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node.children_by_field_name(field, &mut cursor).collect();
    children
}

/// `const`/`volatile` among the direct children of `node`.
fn qualifiers(node: Node, source: &str) -> (bool, bool) {
    let mut is_const = false;
    let mut is_volatile = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_qualifier" {
            match text(child, source) {
                "const" => is_const = true,
                "volatile" => is_volatile = true,
                _ => {}
            }
        }
    }
    (is_const, is_volatile)
}

fn has_storage_class(node: Node, source: &str, class: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| child.kind() == "storage_class_specifier" && text(child, source) == class);
    found
}

/// `unsigned long`, `short int`, `long double` and friends.
fn sized_builtin(node: Node, source: &str) -> Builtin {
    let mut unsigned = false;
    let mut signed = false;
    let mut longs = 0;
    let mut short = false;
    let mut base = None;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "unsigned" => unsigned = true,
            "signed" => signed = true,
            "long" => longs += 1,
            "short" => short = true,
            "primitive_type" => base = Some(text(child, source)),
            _ => {}
        }
    }

    match base {
        Some("char") if unsigned => Builtin::UnsignedChar,
        Some("char") if signed => Builtin::SignedChar,
        Some("char") => Builtin::Char,
        Some("double") if longs > 0 => Builtin::LongDouble,
        Some("double") => Builtin::Double,
        _ if short && unsigned => Builtin::UnsignedShort,
        _ if short => Builtin::Short,
        _ => match (longs, unsigned) {
            (0, false) => Builtin::Int,
            (0, true) => Builtin::UnsignedInt,
            (1, false) => Builtin::Long,
            (1, true) => Builtin::UnsignedLong,
            (_, false) => Builtin::LongLong,
            (_, true) => Builtin::UnsignedLongLong,
        },
    }
}

fn parse_size(literal: &str) -> Option<u64> {
    let digits = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("16"), Some(16));
        assert_eq!(parse_size("0x10"), Some(16));
        assert_eq!(parse_size("8u"), Some(8));
        assert_eq!(parse_size("N"), None);
    }
}
