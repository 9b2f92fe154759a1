//! Declaration spaces.
//!
//! Collects, for every module, namespace and type, the names it declares.
//! Extension and conformance members are filed under the type they extend.

use orca_core::{Ast, BuiltinType, DiagnosticSet, NodeId, NodeKind};
use std::collections::HashMap;

use crate::error::ErrorCode;

/// A type that can own members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    /// A product type or trait declaration.
    Decl(NodeId),
    /// A built-in type extended by the program.
    Builtin(BuiltinType),
}

/// Names declared in one scope, in declaration order.
pub(crate) type NameTable = HashMap<String, Vec<NodeId>>;

/// Every declaration space of a program.
#[derive(Debug, Default)]
pub(crate) struct Declarations {
    /// Module-level names, in module order.
    pub modules: Vec<(NodeId, NameTable)>,
    pub namespaces: HashMap<NodeId, NameTable>,
    pub members: HashMap<TypeKey, NameTable>,
    /// Initializers of each product type, explicit or memberwise.
    pub initializers: HashMap<NodeId, Vec<NodeId>>,
    pub subscripts: HashMap<TypeKey, Vec<NodeId>>,
    /// Stored properties of each product type, in declaration order.
    pub stored: HashMap<NodeId, Vec<NodeId>>,
    /// The declaration lexically containing each declaration.
    pub parents: HashMap<NodeId, NodeId>,
    /// The type each extension or conformance applies to.
    pub extension_keys: HashMap<NodeId, TypeKey>,
    /// The binding declaring each variable.
    pub var_bindings: HashMap<NodeId, NodeId>,
    pending_extensions: Vec<NodeId>,
}

impl Declarations {
    /// Collect the declarations of every module in `ast`.
    pub fn collect(ast: &Ast, diagnostics: &mut DiagnosticSet) -> Self {
        let mut d = Self::default();

        for &module in ast.modules() {
            let NodeKind::Module(m) = ast.kind(module) else {
                continue;
            };
            let mut names = NameTable::new();
            for &unit in &m.units {
                let NodeKind::TranslationUnit(tu) = ast.kind(unit) else {
                    continue;
                };
                for &decl in &tu.decls {
                    d.parents.insert(decl, module);
                    d.declare(ast, decl, &mut names);
                    d.collect_nested(ast, decl);
                }
            }
            d.modules.push((module, names));
        }

        // Extension subjects are looked up once every type name is known.
        let mut pending = std::mem::take(&mut d.pending_extensions);
        while !pending.is_empty() {
            for ext in pending {
                d.collect_extension(ast, ext);
            }
            pending = std::mem::take(&mut d.pending_extensions);
        }

        d.report_duplicates(ast, diagnostics);
        d
    }

    /// Record the names `decl` introduces in `names`.
    fn declare(&mut self, ast: &Ast, decl: NodeId, names: &mut NameTable) {
        match ast.kind(decl) {
            NodeKind::Binding(b) => {
                let mut vars = Vec::new();
                pattern_vars(ast, b.pattern, &mut vars);
                for var in vars {
                    self.var_bindings.insert(var, decl);
                    if let Some(name) = ast.kind(var).identifier() {
                        names.entry(name.value.clone()).or_default().push(var);
                    }
                }
            }
            NodeKind::Extension(_) | NodeKind::Conformance(_) => {
                self.pending_extensions.push(decl);
            }
            NodeKind::Initializer(_) => {}
            kind => {
                if let Some(name) = kind.identifier() {
                    names.entry(name.value.clone()).or_default().push(decl);
                }
            }
        }
    }

    /// Collect the members of `decl` if it is a container.
    fn collect_nested(&mut self, ast: &Ast, decl: NodeId) {
        match ast.kind(decl) {
            NodeKind::Namespace(ns) => {
                let mut names = self.namespaces.remove(&decl).unwrap_or_default();
                for &member in &ns.members {
                    self.parents.insert(member, decl);
                    self.declare(ast, member, &mut names);
                    self.collect_nested(ast, member);
                }
                self.namespaces.insert(decl, names);
            }
            NodeKind::ProductType(ty) => {
                for &g in &ty.generics {
                    self.parents.insert(g, decl);
                }
                self.collect_members(ast, decl, TypeKey::Decl(decl), &ty.members);
                if let Some(init) = ty.memberwise_init {
                    self.parents.insert(init, decl);
                    self.initializers.entry(decl).or_default().push(init);
                    self.collect_nested(ast, init);
                }
            }
            NodeKind::Trait(t) => {
                self.collect_members(ast, decl, TypeKey::Decl(decl), &t.members);
            }
            NodeKind::Function(f) => {
                for &p in f.generics.iter().chain(&f.parameters) {
                    self.parents.insert(p, decl);
                }
            }
            NodeKind::Method(m) => {
                for &p in m.generics.iter().chain(&m.parameters).chain(&m.impls) {
                    self.parents.insert(p, decl);
                }
            }
            NodeKind::Initializer(i) => {
                for &p in &i.parameters {
                    self.parents.insert(p, decl);
                }
            }
            NodeKind::Subscript(s) => {
                for &p in &s.parameters {
                    self.parents.insert(p, decl);
                }
            }
            _ => {}
        }
    }

    /// File `members` of the container `owner` under `key`.
    fn collect_members(&mut self, ast: &Ast, owner: NodeId, key: TypeKey, members: &[NodeId]) {
        let mut names = self.members.remove(&key).unwrap_or_default();
        for &member in members {
            self.parents.insert(member, owner);
            match ast.kind(member) {
                NodeKind::Initializer(_) => {
                    if let TypeKey::Decl(ty) = key {
                        self.initializers.entry(ty).or_default().push(member);
                    }
                }
                NodeKind::Subscript(s) => {
                    self.subscripts.entry(key).or_default().push(member);
                    if let Some(name) = &s.identifier {
                        names.entry(name.value.clone()).or_default().push(member);
                    }
                }
                NodeKind::Binding(b) => {
                    let mut vars = Vec::new();
                    pattern_vars(ast, b.pattern, &mut vars);
                    if let (TypeKey::Decl(ty), NodeKind::ProductType(_)) = (key, ast.kind(owner)) {
                        self.stored.entry(ty).or_default().extend(vars.iter().copied());
                    }
                    self.declare(ast, member, &mut names);
                }
                _ => self.declare(ast, member, &mut names),
            }
            self.collect_nested(ast, member);
        }
        self.members.insert(key, names);
    }

    fn collect_extension(&mut self, ast: &Ast, ext: NodeId) {
        let (subject, members) = match ast.kind(ext) {
            NodeKind::Extension(e) => (e.subject, &e.members),
            NodeKind::Conformance(c) => (c.subject, &c.members),
            _ => return,
        };
        let Some(key) = self.subject_key(ast, ext, subject) else {
            // Reported when the subject is resolved during checking.
            return;
        };
        self.extension_keys.insert(ext, key);
        self.collect_members(ast, ext, key, members);
    }

    /// Resolve the subject of an extension by name.
    pub fn subject_key(&self, ast: &Ast, ext: NodeId, subject: NodeId) -> Option<TypeKey> {
        let NodeKind::NameType(name) = ast.kind(subject) else {
            return None;
        };
        let name = &name.name.value;
        if let Some(builtin) = BuiltinType::from_name(name) {
            return Some(TypeKey::Builtin(builtin));
        }
        let parent = *self.parents.get(&ext)?;
        self.lookup_in_chain(ast, parent, name)
            .into_iter()
            .find_map(|d| match ast.kind(d) {
                NodeKind::ProductType(_) | NodeKind::Trait(_) => Some(TypeKey::Decl(d)),
                _ => None,
            })
    }

    /// Look `name` up in `scope` and the scopes enclosing it, innermost first.
    ///
    /// Modules other than the one containing `scope` are searched last,
    /// most recently added first.
    pub fn lookup_in_chain(&self, ast: &Ast, scope: NodeId, name: &str) -> Vec<NodeId> {
        let mut current = Some(scope);
        let mut home = None;
        while let Some(s) = current {
            let found = match ast.kind(s) {
                NodeKind::Namespace(_) => self.namespaces.get(&s),
                NodeKind::ProductType(_) | NodeKind::Trait(_) => {
                    self.members.get(&TypeKey::Decl(s))
                }
                NodeKind::Extension(_) | NodeKind::Conformance(_) => self
                    .extension_keys
                    .get(&s)
                    .and_then(|key| self.members.get(key)),
                NodeKind::Module(_) => {
                    home = Some(s);
                    self.module_names(s)
                }
                _ => None,
            };
            if let Some(decls) = found.and_then(|t| t.get(name)) {
                return decls.clone();
            }
            current = self.parents.get(&s).copied();
        }
        for (module, names) in self.modules.iter().rev() {
            if Some(*module) == home {
                continue;
            }
            if let Some(decls) = names.get(name) {
                return decls.clone();
            }
        }
        Vec::new()
    }

    fn module_names(&self, module: NodeId) -> Option<&NameTable> {
        self.modules
            .iter()
            .find(|(m, _)| *m == module)
            .map(|(_, names)| names)
    }

    /// The member named `name` of the type `key`.
    pub fn member(&self, key: TypeKey, name: &str) -> Option<NodeId> {
        self.members.get(&key)?.get(name)?.first().copied()
    }

    fn report_duplicates(&self, ast: &Ast, diagnostics: &mut DiagnosticSet) {
        let tables = self
            .modules
            .iter()
            .map(|(_, t)| t)
            .chain(self.namespaces.values())
            .chain(self.members.values());
        for table in tables {
            for (name, decls) in table {
                let Some((&first, rest)) = decls.split_first() else {
                    continue;
                };
                for &dup in rest {
                    let diagnostic = ErrorCode::DuplicateDeclaration
                        .at(name_site(ast, dup), format!("duplicate declaration of `{name}`"))
                        .with_note(name_site(ast, first).clone(), "previously declared here");
                    diagnostics.insert(diagnostic);
                }
            }
        }
    }
}

/// The site of the name a declaration introduces, or of the whole declaration.
pub(crate) fn name_site(ast: &Ast, decl: NodeId) -> &orca_core::SourceRange {
    ast.kind(decl)
        .identifier()
        .map_or_else(|| ast.site(decl), |i| &i.site)
}

/// Collect the variables bound by the pattern at `pattern`, in source order.
pub(crate) fn pattern_vars(ast: &Ast, pattern: NodeId, out: &mut Vec<NodeId>) {
    match ast.kind(pattern) {
        NodeKind::BindingPattern(p) => pattern_vars(ast, p.subpattern, out),
        NodeKind::NamePattern(p) => out.push(p.var),
        NodeKind::TuplePattern(p) => {
            for &e in &p.elements {
                pattern_vars(ast, e, out);
            }
        }
        _ => {}
    }
}
