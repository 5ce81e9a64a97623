//! Reference pass.
//!
//! Walks every queued body at full depth with a stack of block scopes.
//! Parameters, locals, block-scope tags and typedefs shadow file-scope names;
//! block-scope function prototypes do not, since they name the file-scope
//! function. Identifiers that survive shadowing are resolved against the
//! file-scope tables of the whole unit, so calls to functions declared
//! later in the file still resolve.

use std::collections::{HashMap, HashSet};

use closure_core::{DeclId, FileKey, Reference, ReferenceKind};
use tree_sitter::Node;

use crate::declarations::{BodyKind, Collected, PendingBody, field_children, named_children, text};

#[derive(Default)]
struct BlockScope {
    values: HashSet<String>,
    tags: HashMap<String, DeclId>,
    /// Local typedef names and the record they name, if any.
    typedefs: HashMap<String, Option<DeclId>>,
}

/// Pending work of a walk, kept on the heap rather than the call stack.
enum Frame<'t> {
    Visit(Node<'t>),
    /// Initializers and array sizes of a declarator; the declared name is skipped.
    Declarator(Node<'t>),
    BindValue(Node<'t>),
    BindTypedef(String, Option<DeclId>),
    EnterScope,
    ExitScope,
}

/// References of every declaration, indexed by declaration id.
pub(crate) fn resolve(collected: &Collected<'_>) -> Vec<Vec<Reference>> {
    let mut references = vec![Vec::new(); collected.declarations.len()];
    for body in &collected.bodies {
        let mut walker = ReferenceWalker::new(collected, body);
        match body.kind {
            BodyKind::Function { definition } => walker.function(definition),
            BodyKind::Record { body } => walker.run(vec![Frame::Visit(body)]),
        }
        references[body.owner.index()] = walker.out;
    }
    references
}

struct ReferenceWalker<'c, 't> {
    collected: &'c Collected<'t>,
    file: FileKey,
    source: &'t str,
    scopes: Vec<BlockScope>,
    stack: Vec<Frame<'t>>,
    out: Vec<Reference>,
}

impl<'c, 't> ReferenceWalker<'c, 't> {
    fn new(collected: &'c Collected<'t>, body: &PendingBody<'t>) -> Self {
        ReferenceWalker {
            collected,
            file: body.file,
            source: body.source,
            scopes: Vec::new(),
            stack: Vec::new(),
            out: Vec::new(),
        }
    }

    fn function(&mut self, definition: Node<'t>) {
        let mut frames = Vec::new();
        if let Some(type_node) = definition.child_by_field_name("type") {
            frames.push(Frame::Visit(type_node));
        }

        frames.push(Frame::EnterScope);
        if let Some(parameters) = definition
            .child_by_field_name("declarator")
            .and_then(innermost_function_declarator)
            .and_then(|declarator| declarator.child_by_field_name("parameters"))
        {
            for parameter in named_children(parameters) {
                if parameter.kind() != "parameter_declaration" {
                    continue;
                }
                if let Some(type_node) = parameter.child_by_field_name("type") {
                    frames.push(Frame::Visit(type_node));
                }
                if let Some(name) = parameter.child_by_field_name("declarator").and_then(declarator_name) {
                    frames.push(Frame::BindValue(name));
                }
            }
        }
        if let Some(body) = definition.child_by_field_name("body") {
            frames.push(Frame::Visit(body));
        }
        frames.push(Frame::ExitScope);
        self.run(frames);
    }

    /// Execute `frames` in order, along with everything they schedule.
    fn run(&mut self, frames: Vec<Frame<'t>>) {
        self.schedule(frames);
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Visit(node) => self.visit(node),
                Frame::Declarator(declarator) => self.declarator(declarator),
                Frame::BindValue(name) => self.bind_value(name),
                Frame::BindTypedef(name, record) => {
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.typedefs.insert(name, record);
                    }
                }
                Frame::EnterScope => self.scopes.push(BlockScope::default()),
                Frame::ExitScope => {
                    self.scopes.pop();
                }
            }
        }
    }

    /// Queue `frames` to run next, first element first.
    fn schedule(&mut self, frames: Vec<Frame<'t>>) {
        self.stack.extend(frames.into_iter().rev());
    }

    fn visit_children(&mut self, node: Node<'t>) {
        self.schedule(named_children(node).into_iter().map(Frame::Visit).collect());
    }

    fn visit(&mut self, node: Node<'t>) {
        match node.kind() {
            "compound_statement" | "for_statement" => {
                let mut frames = vec![Frame::EnterScope];
                frames.extend(named_children(node).into_iter().map(Frame::Visit));
                frames.push(Frame::ExitScope);
                self.schedule(frames);
            }
            "declaration" => self.local_declaration(node),
            "type_definition" => self.local_typedef(node),
            "struct_specifier" | "union_specifier" => self.record_use(node),
            "enum_specifier" => self.enum_use(node),
            "type_identifier" => {
                if let Some(record) = self.typedef_record(text(node, self.source)) {
                    self.push(record, ReferenceKind::Type);
                }
            }
            "identifier" => self.value_use(node),
            "preproc_if" | "preproc_ifdef" | "preproc_elif" | "preproc_elifdef" => {
                // macro names in conditions are not C entities
                let skipped: Vec<_> = ["condition", "name"]
                    .iter()
                    .filter_map(|field| node.child_by_field_name(field))
                    .map(|child| child.id())
                    .collect();
                let frames = named_children(node)
                    .into_iter()
                    .filter(|child| !skipped.contains(&child.id()))
                    .map(Frame::Visit)
                    .collect();
                self.schedule(frames);
            }
            "field_identifier" | "statement_identifier" | "primitive_type" | "sized_type_specifier"
            | "string_literal" | "concatenated_string" | "char_literal" | "number_literal" | "comment"
            | "preproc_def" | "preproc_function_def" | "preproc_call" | "preproc_include"
            | "function_definition" => {}
            _ => self.visit_children(node),
        }
    }

    fn local_declaration(&mut self, node: Node<'t>) {
        let mut frames = Vec::new();
        if let Some(type_node) = node.child_by_field_name("type") {
            frames.push(Frame::Visit(type_node));
        }
        for declarator in field_children(node, "declarator") {
            if declares_function(declarator) {
                continue;
            }
            if let Some(name) = declarator_name(declarator) {
                frames.push(Frame::BindValue(name));
            }
            frames.push(Frame::Declarator(declarator));
        }
        self.schedule(frames);
    }

    fn declarator(&mut self, declarator: Node<'t>) {
        let mut frames = Vec::new();
        match declarator.kind() {
            "init_declarator" => {
                if let Some(inner) = declarator.child_by_field_name("declarator") {
                    frames.push(Frame::Declarator(inner));
                }
                if let Some(value) = declarator.child_by_field_name("value") {
                    frames.push(Frame::Visit(value));
                }
            }
            "array_declarator" => {
                if let Some(size) = declarator.child_by_field_name("size") {
                    frames.push(Frame::Visit(size));
                }
                if let Some(inner) = declarator.child_by_field_name("declarator") {
                    frames.push(Frame::Declarator(inner));
                }
            }
            "pointer_declarator" | "parenthesized_declarator" | "attributed_declarator" => {
                if let Some(inner) = declarator
                    .child_by_field_name("declarator")
                    .or_else(|| declarator.named_child(0))
                {
                    frames.push(Frame::Declarator(inner));
                }
            }
            "function_declarator" => {
                // `int (*handler)(struct Event *)`: parameter types only
                if let Some(parameters) = declarator.child_by_field_name("parameters") {
                    for parameter in named_children(parameters) {
                        if let Some(type_node) = parameter.child_by_field_name("type") {
                            frames.push(Frame::Visit(type_node));
                        }
                    }
                }
                if let Some(inner) = declarator.child_by_field_name("declarator") {
                    frames.push(Frame::Declarator(inner));
                }
            }
            _ => {}
        }
        self.schedule(frames);
    }

    fn local_typedef(&mut self, node: Node<'t>) {
        let mut frames = Vec::new();
        let mut record = None;
        if let Some(type_node) = node.child_by_field_name("type") {
            frames.push(Frame::Visit(type_node));
            record = self.named_record(type_node);
        }
        for declarator in field_children(node, "declarator") {
            if let Some(name) = declarator_name(declarator) {
                frames.push(Frame::BindTypedef(text(name, self.source).to_string(), record));
            }
        }
        self.schedule(frames);
    }

    fn record_use(&mut self, node: Node<'t>) {
        let body = node.child_by_field_name("body");
        let local = body.and_then(|_| self.collected.local_records.get(&(self.file, node.start_byte())).copied());
        match (local, node.child_by_field_name("name")) {
            (Some(id), name) => {
                if let (Some(name), Some(scope)) = (name, self.scopes.last_mut()) {
                    scope.tags.insert(text(name, self.source).to_string(), id);
                }
                self.push(id, ReferenceKind::Type);
            }
            (None, Some(name)) => {
                if let Some(id) = self.tag(text(name, self.source)) {
                    self.push(id, ReferenceKind::Type);
                }
            }
            (None, None) => {}
        }
        if let Some(body) = body {
            self.visit_children(body);
        }
    }

    fn enum_use(&mut self, node: Node<'t>) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut frames = Vec::new();
        for enumerator in named_children(body) {
            if let Some(value) = enumerator.child_by_field_name("value") {
                frames.push(Frame::Visit(value));
            }
            // file-scope enumerators already live in the unit tables
            if self.scopes.is_empty() {
                continue;
            }
            if let Some(name) = enumerator.child_by_field_name("name") {
                frames.push(Frame::BindValue(name));
            }
        }
        self.schedule(frames);
    }

    fn value_use(&mut self, node: Node<'t>) {
        let name = text(node, self.source);
        if self.scopes.iter().any(|scope| scope.values.contains(name)) {
            return;
        }
        if let Some(&id) = self.collected.scope.values.get(name) {
            self.push(id, ReferenceKind::Value);
        }
    }

    fn bind_value(&mut self, name: Node<'t>) {
        let name = text(name, self.source).to_string();
        if let Some(scope) = self.scopes.last_mut() {
            scope.values.insert(name);
        }
    }

    /// Record named by a `struct X`, `union X` or typedef-name type node.
    fn named_record(&self, type_node: Node<'t>) -> Option<DeclId> {
        match type_node.kind() {
            "struct_specifier" | "union_specifier" => {
                if type_node.child_by_field_name("body").is_some() {
                    if let Some(&id) = self.collected.local_records.get(&(self.file, type_node.start_byte())) {
                        return Some(id);
                    }
                }
                self.tag(text(type_node.child_by_field_name("name")?, self.source))
            }
            "type_identifier" => self.typedef_record(text(type_node, self.source)),
            _ => None,
        }
    }

    fn tag(&self, name: &str) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.tags.get(name).copied())
            .or_else(|| self.collected.scope.tags.get(name).copied())
    }

    fn typedef_record(&self, name: &str) -> Option<DeclId> {
        if let Some(local) = self.scopes.iter().rev().find_map(|scope| scope.typedefs.get(name)) {
            return *local;
        }
        let (_, record) = self.collected.scope.typedefs.get(name)?.underlying_record()?;
        self.tag(record)
    }

    fn push(&mut self, target: DeclId, kind: ReferenceKind) {
        self.out.push(Reference { target, kind });
    }
}

/// The declared identifier of a (possibly nested) declarator.
fn declarator_name(declarator: Node<'_>) -> Option<Node<'_>> {
    match declarator.kind() {
        "identifier" | "field_identifier" | "type_identifier" => Some(declarator),
        "parenthesized_declarator" | "attributed_declarator" => declarator_name(declarator.named_child(0)?),
        _ => declarator_name(declarator.child_by_field_name("declarator")?),
    }
}

/// Whether the entity a declarator declares is a function: the constructor
/// closest to the name is a function declarator.
fn declares_function(declarator: Node<'_>) -> bool {
    let mut node = declarator;
    let mut closest = None;
    loop {
        let inner = match node.kind() {
            "identifier" => break,
            "parenthesized_declarator" | "attributed_declarator" => node.named_child(0),
            "init_declarator" => node.child_by_field_name("declarator"),
            kind => {
                closest = Some(kind);
                node.child_by_field_name("declarator")
            }
        };
        match inner {
            Some(inner) => node = inner,
            None => return false,
        }
    }
    closest == Some("function_declarator")
}

/// The function declarator whose parameters belong to the defined function.
fn innermost_function_declarator(declarator: Node<'_>) -> Option<Node<'_>> {
    let mut node = declarator;
    let mut found = None;
    loop {
        if node.kind() == "function_declarator" {
            found = Some(node);
        }
        let inner = match node.kind() {
            "parenthesized_declarator" | "attributed_declarator" => node.named_child(0),
            _ => node.child_by_field_name("declarator"),
        };
        match inner {
            Some(inner) => node = inner,
            None => return found,
        }
    }
}
