//! Name resolution and type inference.
//!
//! Declarations are checked in source order. Signatures are computed on
//! demand and memoized, so a body may use a declaration that appears later in
//! the program. Bodies of translation units inherited from a base AST are not
//! checked again; only their signatures are computed.

use orca_core::ast::{Argument, CallExpr, Identifier, InfixExpr, NameExpr};
use orca_core::{
    Ast, BuiltinType, DeclReference, DiagnosticSet, NodeId, NodeKind, SourceRange, Type,
};
use std::collections::{HashMap, HashSet};

use crate::error::ErrorCode;
use crate::scope::{name_site, Declarations, TypeKey};

/// Functions every program can call without declaring them.
const BUILTIN_FUNCTIONS: &[&str] = &["print"];

/// Where an expression or type is checked.
#[derive(Debug, Clone)]
struct Context {
    /// The innermost declaration; names are looked up from here outwards.
    scope: NodeId,
    /// The type of `self` and `Self`.
    self_type: Option<Type>,
    /// Generic parameters in scope.
    generics: Vec<NodeId>,
    /// The type `return` statements must produce.
    return_type: Option<Type>,
}

/// The state of one type-checking run.
pub(crate) struct Checker<'a> {
    ast: &'a Ast,
    decls: Declarations,
    references: HashMap<NodeId, DeclReference>,
    types: HashMap<NodeId, Type>,
    subjects: HashMap<NodeId, Type>,
    diagnostics: DiagnosticSet,
    locals: Vec<HashMap<String, NodeId>>,
    in_progress: HashSet<NodeId>,
    checked_bindings: HashSet<NodeId>,
}

impl<'a> Checker<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        let mut diagnostics = DiagnosticSet::new();
        let decls = Declarations::collect(ast, &mut diagnostics);
        Self {
            ast,
            decls,
            references: HashMap::new(),
            types: HashMap::new(),
            subjects: HashMap::new(),
            diagnostics,
            locals: Vec::new(),
            in_progress: HashSet::new(),
            checked_bindings: HashSet::new(),
        }
    }

    /// Check every translation unit that is not inherited.
    pub fn check_program(&mut self) {
        let ast = self.ast;
        for unit in ast.translation_units() {
            if ast.is_inherited(unit) {
                continue;
            }
            let NodeKind::TranslationUnit(tu) = ast.kind(unit) else {
                continue;
            };
            for &decl in &tu.decls {
                self.check_decl(decl);
            }
        }
    }

    /// Consume the checker, returning the reference table, the type table and
    /// the diagnostics.
    pub fn finish(
        self,
    ) -> (
        HashMap<NodeId, DeclReference>,
        HashMap<NodeId, Type>,
        DiagnosticSet,
    ) {
        (self.references, self.types, self.diagnostics)
    }

    fn error(&mut self, code: ErrorCode, site: &SourceRange, message: impl Into<String>) {
        self.diagnostics.insert(code.at(site, message));
    }

    /// Report a mismatch unless `found` can be used as `expected`.
    fn expect(&mut self, expected: &Type, found: &Type, node: NodeId) {
        if !found.is_compatible(expected) {
            let ast = self.ast;
            let message = format!(
                "expected `{}`, found `{}`",
                expected.describe(ast),
                found.describe(ast)
            );
            self.error(ErrorCode::TypeMismatch, ast.site(node), message);
        }
    }

    // ===== Contexts =====

    /// The context in which the signature and body of `decl` are checked.
    fn context_of(&mut self, decl: NodeId) -> Context {
        let ast = self.ast;
        let mut ctx = Context {
            scope: decl,
            self_type: None,
            generics: Vec::new(),
            return_type: None,
        };
        let mut current = Some(decl);
        while let Some(d) = current {
            match ast.kind(d) {
                NodeKind::Function(f) => ctx.generics.extend(&f.generics),
                NodeKind::Method(m) => ctx.generics.extend(&m.generics),
                NodeKind::ProductType(p) => {
                    ctx.generics.extend(&p.generics);
                    ctx.self_type.get_or_insert(Type::Product(d));
                }
                NodeKind::Trait(_) => {
                    ctx.self_type.get_or_insert(Type::Parameter(d));
                }
                NodeKind::Extension(_) | NodeKind::Conformance(_) if ctx.self_type.is_none() => {
                    ctx.self_type = Some(self.extension_subject(d));
                }
                _ => {}
            }
            current = self.decls.parents.get(&d).copied();
        }
        ctx
    }

    /// The type an extension or conformance applies to.
    fn extension_subject(&mut self, ext: NodeId) -> Type {
        if let Some(t) = self.subjects.get(&ext) {
            return t.clone();
        }
        let ast = self.ast;
        let subject = match ast.kind(ext) {
            NodeKind::Extension(e) => e.subject,
            NodeKind::Conformance(c) => c.subject,
            _ => return Type::Error,
        };
        let ty = match self.decls.parents.get(&ext).copied() {
            Some(parent) => {
                let ctx = self.context_of(parent);
                self.resolve_type(subject, &ctx)
            }
            None => Type::Error,
        };
        self.subjects.insert(ext, ty.clone());
        ty
    }

    // ===== Types =====

    fn resolve_type(&mut self, node: NodeId, ctx: &Context) -> Type {
        let ast = self.ast;
        let ty = match ast.kind(node) {
            NodeKind::NameType(n) => self.resolve_type_name(node, &n.name, ctx),
            NodeKind::TupleType(t) => {
                let elements: Vec<_> = t
                    .elements
                    .iter()
                    .map(|&e| self.resolve_type(e, ctx))
                    .collect();
                tuple_type(elements)
            }
            _ => Type::Error,
        };
        self.types.insert(node, ty.clone());
        ty
    }

    fn resolve_type_name(&mut self, node: NodeId, name: &Identifier, ctx: &Context) -> Type {
        let ast = self.ast;
        if name.value == "Self" {
            return match &ctx.self_type {
                Some(t) => t.clone(),
                None => {
                    self.error(
                        ErrorCode::UndefinedName,
                        &name.site,
                        "`Self` is only available inside a type",
                    );
                    Type::Error
                }
            };
        }

        let generic = ctx.generics.iter().copied().find(|&g| {
            ast.kind(g)
                .identifier()
                .is_some_and(|i| i.value == name.value)
        });
        if let Some(g) = generic {
            self.references.insert(node, DeclReference::Direct(g));
            return Type::Parameter(g);
        }

        if let Some(b) = BuiltinType::from_name(&name.value) {
            self.references
                .insert(node, DeclReference::Builtin(b.name().to_string()));
            return Type::Builtin(b);
        }

        let found = self.decls.lookup_in_chain(ast, ctx.scope, &name.value);
        let Some(&decl) = found.first() else {
            self.error(
                ErrorCode::UndefinedName,
                &name.site,
                format!("undefined type `{}`", name.value),
            );
            return Type::Error;
        };
        let ty = match ast.kind(decl) {
            NodeKind::ProductType(_) => Type::Product(decl),
            NodeKind::Trait(_) => Type::Trait(decl),
            NodeKind::AssociatedType(_) | NodeKind::GenericParameter(_) => Type::Parameter(decl),
            NodeKind::TypeAlias(_) => self.alias_type(decl),
            _ => {
                self.error(
                    ErrorCode::UndefinedName,
                    &name.site,
                    format!("`{}` does not name a type", name.value),
                );
                return Type::Error;
            }
        };
        self.references.insert(node, DeclReference::Direct(decl));
        ty
    }

    fn alias_type(&mut self, alias: NodeId) -> Type {
        if let Some(t) = self.types.get(&alias) {
            return t.clone();
        }
        let ast = self.ast;
        let NodeKind::TypeAlias(a) = ast.kind(alias) else {
            return Type::Error;
        };
        if !self.in_progress.insert(alias) {
            self.error(
                ErrorCode::TypeMismatch,
                name_site(ast, alias),
                format!("type alias `{}` refers to itself", a.identifier.value),
            );
            return Type::Error;
        }
        let ctx = self.context_of(alias);
        let ty = self.resolve_type(a.aliased, &ctx);
        self.in_progress.remove(&alias);
        self.types.insert(alias, ty.clone());
        ty
    }

    /// The declared type of `decl`, computed once.
    fn signature(&mut self, decl: NodeId) -> Type {
        if let Some(t) = self.types.get(&decl) {
            return t.clone();
        }
        if !self.in_progress.insert(decl) {
            return Type::Error;
        }
        let ast = self.ast;
        let ty = match ast.kind(decl) {
            NodeKind::Parameter(p) => match p.annotation {
                Some(annotation) => {
                    let ctx = self.context_of(decl);
                    self.resolve_type(annotation, &ctx)
                }
                None => self.memberwise_parameter_type(decl),
            },
            NodeKind::Function(f) => self.function_type(decl, &f.parameters, f.output),
            NodeKind::Method(m) => self.function_type(decl, &m.parameters, m.output),
            NodeKind::Initializer(i) => {
                let inputs = i.parameters.iter().map(|&p| self.signature(p)).collect();
                let output = self.context_of(decl).self_type.unwrap_or(Type::Error);
                Type::Function {
                    inputs,
                    output: Box::new(output),
                }
            }
            NodeKind::Subscript(s) => {
                let inputs = s.parameters.iter().map(|&p| self.signature(p)).collect();
                let ctx = self.context_of(decl);
                let output = self.resolve_type(s.output, &ctx);
                Type::Function {
                    inputs,
                    output: Box::new(output),
                }
            }
            NodeKind::Var(_) => self.var_type(decl),
            _ => Type::Error,
        };
        self.in_progress.remove(&decl);
        self.types.insert(decl, ty.clone());
        ty
    }

    fn function_type(&mut self, decl: NodeId, parameters: &[NodeId], output: Option<NodeId>) -> Type {
        let inputs = parameters.iter().map(|&p| self.signature(p)).collect();
        let output = match output {
            Some(o) => {
                let ctx = self.context_of(decl);
                self.resolve_type(o, &ctx)
            }
            None => Type::void(),
        };
        Type::Function {
            inputs,
            output: Box::new(output),
        }
    }

    /// A memberwise initializer parameter has the type of its stored property.
    fn memberwise_parameter_type(&mut self, param: NodeId) -> Type {
        let ast = self.ast;
        let Some(&init) = self.decls.parents.get(&param) else {
            return Type::Error;
        };
        let NodeKind::Initializer(i) = ast.kind(init) else {
            return Type::Error;
        };
        let Some(&owner) = self.decls.parents.get(&init) else {
            return Type::Error;
        };
        let var = i
            .parameters
            .iter()
            .position(|&p| p == param)
            .and_then(|index| self.decls.stored.get(&owner)?.get(index).copied());
        var.map_or(Type::Error, |v| self.signature(v))
    }

    /// The type of a global or member variable, checking its binding if needed.
    fn var_type(&mut self, var: NodeId) -> Type {
        let Some(&binding) = self.decls.var_bindings.get(&var) else {
            return Type::Error;
        };
        let ctx = self.context_of(binding);
        let saved = std::mem::take(&mut self.locals);
        self.check_binding(binding, &ctx, false);
        self.locals = saved;
        self.types.get(&var).cloned().unwrap_or(Type::Error)
    }

    /// The type of a declaration used as a value.
    fn value_type(&mut self, decl: NodeId) -> Type {
        match self.ast.kind(decl) {
            NodeKind::ProductType(_) => Type::Metatype(Box::new(Type::Product(decl))),
            NodeKind::Trait(_) => Type::Metatype(Box::new(Type::Trait(decl))),
            NodeKind::TypeAlias(_) => Type::Metatype(Box::new(self.alias_type(decl))),
            NodeKind::AssociatedType(_) | NodeKind::GenericParameter(_) => {
                Type::Metatype(Box::new(Type::Parameter(decl)))
            }
            NodeKind::Namespace(_) => Type::Namespace(decl),
            _ => self.signature(decl),
        }
    }

    /// The member table owning the members of values of type `ty`.
    fn type_key(&self, ty: &Type) -> Option<TypeKey> {
        match ty {
            Type::Product(d) | Type::Trait(d) => Some(TypeKey::Decl(*d)),
            Type::Parameter(d) if matches!(self.ast.kind(*d), NodeKind::Trait(_)) => {
                Some(TypeKey::Decl(*d))
            }
            Type::Builtin(b) => Some(TypeKey::Builtin(*b)),
            _ => None,
        }
    }

    /// Whether `decl` is a member of a type rather than a free declaration.
    fn is_member(&self, decl: NodeId) -> bool {
        let ast = self.ast;
        if matches!(
            ast.kind(decl),
            NodeKind::ProductType(_)
                | NodeKind::Trait(_)
                | NodeKind::TypeAlias(_)
                | NodeKind::AssociatedType(_)
                | NodeKind::Namespace(_)
        ) {
            return false;
        }
        let owner = self.decls.var_bindings.get(&decl).copied().unwrap_or(decl);
        self.decls.parents.get(&owner).is_some_and(|&p| {
            matches!(
                ast.kind(p),
                NodeKind::ProductType(_)
                    | NodeKind::Trait(_)
                    | NodeKind::Extension(_)
                    | NodeKind::Conformance(_)
            )
        })
    }

    // ===== Declarations =====

    fn check_decl(&mut self, decl: NodeId) {
        let ast = self.ast;
        match ast.kind(decl) {
            NodeKind::Namespace(ns) => {
                for &m in &ns.members {
                    self.check_decl(m);
                }
            }
            NodeKind::ProductType(p) => {
                for &m in &p.members {
                    self.check_decl(m);
                }
                if let Some(init) = p.memberwise_init {
                    self.signature(init);
                }
            }
            NodeKind::Extension(e) => {
                self.extension_subject(decl);
                for &m in &e.members {
                    self.check_decl(m);
                }
            }
            NodeKind::Conformance(c) => {
                self.extension_subject(decl);
                let ctx = self.context_of(decl);
                for &t in &c.conformances {
                    let ty = self.resolve_type(t, &ctx);
                    if !matches!(ty, Type::Trait(_) | Type::Error) {
                        let message = format!("`{}` is not a trait", ty.describe(ast));
                        self.error(ErrorCode::TypeMismatch, ast.site(t), message);
                    }
                }
                for &m in &c.members {
                    self.check_decl(m);
                }
            }
            NodeKind::Trait(t) => {
                for &m in &t.members {
                    self.check_decl(m);
                }
            }
            NodeKind::TypeAlias(_) => {
                self.alias_type(decl);
            }
            NodeKind::Function(f) => {
                let output = output_of(self.signature(decl));
                if let Some(body) = f.body {
                    self.check_body(decl, &f.parameters, output, body);
                }
            }
            NodeKind::Method(m) => {
                let output = output_of(self.signature(decl));
                for &variant in &m.impls {
                    if let NodeKind::MethodImpl(i) = ast.kind(variant) {
                        self.check_body(decl, &m.parameters, output.clone(), i.body);
                    }
                }
            }
            NodeKind::Initializer(i) => {
                self.signature(decl);
                if let Some(body) = i.body {
                    self.check_body(decl, &i.parameters, Type::void(), body);
                }
            }
            NodeKind::Subscript(s) => {
                let output = output_of(self.signature(decl));
                if let Some(body) = s.body {
                    self.check_body(decl, &s.parameters, output, body);
                }
            }
            NodeKind::Binding(_) => {
                let ctx = self.context_of(decl);
                self.check_binding(decl, &ctx, false);
            }
            _ => {}
        }
    }

    fn check_body(&mut self, decl: NodeId, parameters: &[NodeId], output: Type, body: NodeId) {
        let ast = self.ast;
        let mut ctx = self.context_of(decl);
        ctx.return_type = Some(output);

        let frame = parameters
            .iter()
            .filter_map(|&p| ast.kind(p).identifier().map(|i| (i.value.clone(), p)))
            .collect();
        let saved = std::mem::replace(&mut self.locals, vec![frame]);
        self.check_stmt(body, &ctx);
        self.locals = saved;
    }

    fn check_binding(&mut self, binding: NodeId, ctx: &Context, local: bool) {
        if !self.checked_bindings.insert(binding) {
            return;
        }
        let ast = self.ast;
        let NodeKind::Binding(b) = ast.kind(binding) else {
            return;
        };
        let NodeKind::BindingPattern(p) = ast.kind(b.pattern) else {
            return;
        };

        let annotation = p.annotation.map(|a| self.resolve_type(a, ctx));
        let initializer = b.initializer.map(|e| (e, self.check_expr(e, ctx)));
        if let (Some(expected), Some((e, found))) = (&annotation, &initializer) {
            self.expect(expected, found, *e);
        }

        let ty = annotation
            .or(initializer.map(|(_, t)| t))
            .unwrap_or(Type::Error);
        self.types.insert(b.pattern, ty.clone());
        self.bind_pattern(p.subpattern, ty, local);
    }

    /// Give the variables of `pattern` their types, destructuring tuples.
    fn bind_pattern(&mut self, pattern: NodeId, ty: Type, local: bool) {
        let ast = self.ast;
        match ast.kind(pattern) {
            NodeKind::NamePattern(n) => {
                if local {
                    if let (Some(frame), Some(name)) =
                        (self.locals.last_mut(), ast.kind(n.var).identifier())
                    {
                        frame.insert(name.value.clone(), n.var);
                    }
                }
                self.types.insert(n.var, ty);
            }
            NodeKind::TuplePattern(t) => {
                let n = t.elements.len();
                let parts = match ty {
                    Type::Tuple(parts) if parts.len() == n => parts,
                    Type::Error => vec![Type::Error; n],
                    other => {
                        let message = format!(
                            "cannot destructure a value of type `{}` into {n} elements",
                            other.describe(ast)
                        );
                        self.error(ErrorCode::TypeMismatch, ast.site(pattern), message);
                        vec![Type::Error; n]
                    }
                };
                for (&e, part) in t.elements.iter().zip(parts) {
                    self.bind_pattern(e, part, local);
                }
            }
            NodeKind::BindingPattern(p) => self.bind_pattern(p.subpattern, ty, local),
            _ => {}
        }
    }

    // ===== Statements =====

    fn check_stmt(&mut self, stmt: NodeId, ctx: &Context) {
        let ast = self.ast;
        match ast.kind(stmt) {
            NodeKind::Brace(b) => {
                self.locals.push(HashMap::new());
                for &s in &b.stmts {
                    self.check_stmt(s, ctx);
                }
                self.locals.pop();
            }
            NodeKind::Return(r) => {
                let expected = ctx.return_type.clone().unwrap_or(Type::Error);
                match r.value {
                    Some(value) => {
                        let found = self.check_expr(value, ctx);
                        self.expect(&expected, &found, value);
                    }
                    None if !Type::void().is_compatible(&expected) => {
                        let message =
                            format!("missing return value of type `{}`", expected.describe(ast));
                        self.error(ErrorCode::TypeMismatch, &r.introducer, message);
                    }
                    None => {}
                }
            }
            NodeKind::ExprStmt(e) => {
                self.check_expr(e.expr, ctx);
            }
            NodeKind::Assign(a) => {
                let target = self.check_expr(a.lhs, ctx);
                let value = self.check_expr(a.rhs, ctx);
                self.expect(&target, &value, a.rhs);
            }
            NodeKind::While(w) => {
                self.check_condition(w.condition, ctx);
                self.check_stmt(w.body, ctx);
            }
            NodeKind::If(i) => {
                self.check_condition(i.condition, ctx);
                self.check_stmt(i.success, ctx);
                if let Some(failure) = i.failure {
                    self.check_stmt(failure, ctx);
                }
            }
            NodeKind::DeclStmt(d) => self.check_binding(d.decl, ctx, true),
            _ => {}
        }
    }

    fn check_condition(&mut self, condition: NodeId, ctx: &Context) {
        let ty = self.check_expr(condition, ctx);
        self.expect(&Type::Builtin(BuiltinType::Bool), &ty, condition);
    }

    // ===== Expressions =====

    fn check_expr(&mut self, expr: NodeId, ctx: &Context) -> Type {
        let ast = self.ast;
        let ty = match ast.kind(expr) {
            NodeKind::IntegerLiteral(_) => Type::Builtin(BuiltinType::Int),
            NodeKind::FloatLiteral(_) => Type::Builtin(BuiltinType::Float),
            NodeKind::StringLiteral(_) => Type::Builtin(BuiltinType::String),
            NodeKind::BooleanLiteral(_) => Type::Builtin(BuiltinType::Bool),
            NodeKind::Name(n) => self.check_name(expr, n, ctx),
            NodeKind::Call(c) => self.check_call(expr, c, ctx),
            NodeKind::SubscriptCall(c) => self.check_subscript(expr, c, ctx),
            NodeKind::Infix(i) => self.check_infix(expr, i, ctx),
            NodeKind::Tuple(t) => {
                let elements: Vec<_> = t.elements.iter().map(|&e| self.check_expr(e, ctx)).collect();
                tuple_type(elements)
            }
            _ => Type::Error,
        };
        self.types.insert(expr, ty.clone());
        ty
    }

    fn check_name(&mut self, node: NodeId, n: &NameExpr, ctx: &Context) -> Type {
        match n.domain {
            Some(domain) => {
                let domain = self.check_expr(domain, ctx);
                self.check_member(node, &domain, &n.name)
            }
            None => self.check_unqualified(node, &n.name, ctx),
        }
    }

    fn check_unqualified(&mut self, node: NodeId, name: &Identifier, ctx: &Context) -> Type {
        let ast = self.ast;
        if name.value == "self" {
            return match &ctx.self_type {
                Some(t) => t.clone(),
                None => {
                    self.error(
                        ErrorCode::UndefinedName,
                        &name.site,
                        "`self` is only available inside a type",
                    );
                    Type::Error
                }
            };
        }

        let local = self
            .locals
            .iter()
            .rev()
            .find_map(|frame| frame.get(&name.value))
            .copied();
        if let Some(decl) = local {
            self.references.insert(node, DeclReference::Direct(decl));
            return self.signature(decl);
        }

        let found = self.decls.lookup_in_chain(ast, ctx.scope, &name.value);
        if let Some(&decl) = found.first() {
            let reference = if self.is_member(decl) {
                DeclReference::Member(decl)
            } else {
                DeclReference::Direct(decl)
            };
            self.references.insert(node, reference);
            return self.value_type(decl);
        }

        if BUILTIN_FUNCTIONS.contains(&name.value.as_str()) {
            self.references
                .insert(node, DeclReference::Builtin(name.value.clone()));
            // Accepts one argument of any type.
            return Type::Function {
                inputs: vec![Type::Error],
                output: Box::new(Type::void()),
            };
        }
        if let Some(b) = BuiltinType::from_name(&name.value) {
            self.references
                .insert(node, DeclReference::Builtin(name.value.clone()));
            return Type::Metatype(Box::new(Type::Builtin(b)));
        }

        self.error(
            ErrorCode::UndefinedName,
            &name.site,
            format!("undefined name `{}`", name.value),
        );
        Type::Error
    }

    fn check_member(&mut self, node: NodeId, domain: &Type, name: &Identifier) -> Type {
        let ast = self.ast;
        match domain {
            Type::Error => return Type::Error,
            Type::Namespace(ns) => {
                let found = self
                    .decls
                    .namespaces
                    .get(ns)
                    .and_then(|names| names.get(&name.value))
                    .and_then(|decls| decls.first())
                    .copied();
                if let Some(decl) = found {
                    self.references.insert(node, DeclReference::Direct(decl));
                    return self.value_type(decl);
                }
            }
            other => match self.type_key(other) {
                Some(key) => {
                    if let Some(decl) = self.decls.member(key, &name.value) {
                        self.references.insert(node, DeclReference::Member(decl));
                        return self.value_type(decl);
                    }
                }
                // Unconstrained generic parameters have no known members.
                None if matches!(other, Type::Parameter(_)) => return Type::Error,
                None => {}
            },
        }
        let message = format!(
            "`{}` has no member `{}`",
            domain.describe(ast),
            name.value
        );
        self.error(ErrorCode::UndefinedMember, &name.site, message);
        Type::Error
    }

    fn check_call(&mut self, node: NodeId, call: &CallExpr, ctx: &Context) -> Type {
        let ast = self.ast;
        let callee = self.check_expr(call.callee, ctx);
        let args: Vec<_> = call
            .arguments
            .iter()
            .map(|a| self.check_expr(a.value, ctx))
            .collect();

        match callee {
            Type::Metatype(inner) => match *inner {
                Type::Product(ty) => self.check_construction(node, call, ty, &args),
                Type::Error => Type::Error,
                other => {
                    let message = format!("cannot construct a value of type `{}`", other.describe(ast));
                    self.error(ErrorCode::NotCallable, ast.site(call.callee), message);
                    Type::Error
                }
            },
            Type::Function { inputs, output } => {
                self.check_arguments(node, &call.arguments, &inputs, &args);
                *output
            }
            Type::Error => Type::Error,
            other => {
                let message = format!("cannot call a value of type `{}`", other.describe(ast));
                self.error(ErrorCode::NotCallable, ast.site(call.callee), message);
                Type::Error
            }
        }
    }

    /// Check a call to a product type, resolving the initializer it calls.
    fn check_construction(&mut self, node: NodeId, call: &CallExpr, ty: NodeId, args: &[Type]) -> Type {
        let ast = self.ast;
        let inits = self.decls.initializers.get(&ty).cloned().unwrap_or_default();
        let init = inits
            .iter()
            .copied()
            .find(|&i| matches!(ast.kind(i), NodeKind::Initializer(d) if d.parameters.len() == args.len()))
            .or_else(|| inits.first().copied());
        let Some(init) = init else {
            let message = format!("`{}` has no initializer", Type::Product(ty).describe(ast));
            self.error(ErrorCode::NotCallable, ast.site(call.callee), message);
            return Type::Product(ty);
        };

        self.references
            .insert(call.callee, DeclReference::Constructor(init));
        if let Type::Function { inputs, .. } = self.signature(init) {
            self.check_arguments(node, &call.arguments, &inputs, args);
        }
        Type::Product(ty)
    }

    fn check_arguments(&mut self, node: NodeId, arguments: &[Argument], inputs: &[Type], args: &[Type]) {
        let ast = self.ast;
        if inputs.len() != args.len() {
            let message = format!(
                "expected {} argument{}, found {}",
                inputs.len(),
                if inputs.len() == 1 { "" } else { "s" },
                args.len()
            );
            self.error(ErrorCode::ArityMismatch, ast.site(node), message);
            return;
        }
        for ((argument, found), expected) in arguments.iter().zip(args).zip(inputs) {
            self.expect(expected, found, argument.value);
        }
    }

    fn check_subscript(&mut self, node: NodeId, call: &CallExpr, ctx: &Context) -> Type {
        let ast = self.ast;
        let callee = self.check_expr(call.callee, ctx);
        let args: Vec<_> = call
            .arguments
            .iter()
            .map(|a| self.check_expr(a.value, ctx))
            .collect();
        if matches!(callee, Type::Error | Type::Parameter(_)) {
            return Type::Error;
        }

        let candidates = self
            .type_key(&callee)
            .and_then(|key| self.decls.subscripts.get(&key))
            .cloned()
            .unwrap_or_default();
        let subscript = candidates
            .iter()
            .copied()
            .find(|&s| matches!(ast.kind(s), NodeKind::Subscript(d) if d.parameters.len() == args.len()))
            .or_else(|| candidates.first().copied());
        let Some(subscript) = subscript else {
            let message = format!("`{}` has no subscript", callee.describe(ast));
            self.error(ErrorCode::UndefinedMember, ast.site(call.callee), message);
            return Type::Error;
        };

        match self.signature(subscript) {
            Type::Function { inputs, output } => {
                self.check_arguments(node, &call.arguments, &inputs, &args);
                *output
            }
            _ => Type::Error,
        }
    }

    fn check_infix(&mut self, node: NodeId, infix: &InfixExpr, ctx: &Context) -> Type {
        let ast = self.ast;
        let lhs = self.check_expr(infix.lhs, ctx);
        let rhs = self.check_expr(infix.rhs, ctx);
        let op = &infix.operator.value;

        match (&lhs, &rhs) {
            (Type::Error, _) | (_, Type::Error) => return Type::Error,
            (Type::Builtin(l), Type::Builtin(r)) => {
                if let Some(result) = builtin_infix(op, *l, *r) {
                    self.references
                        .insert(node, DeclReference::Builtin(op.clone()));
                    return Type::Builtin(result);
                }
            }
            _ => {}
        }

        // User-defined operators are members of the left operand's type.
        if let Some(decl) = self.type_key(&lhs).and_then(|k| self.decls.member(k, op)) {
            self.references.insert(node, DeclReference::Member(decl));
            return match self.signature(decl) {
                Type::Function { inputs, output } => {
                    if let [operand] = inputs.as_slice() {
                        self.expect(operand, &rhs, infix.rhs);
                    } else {
                        let message = format!("operator `{op}` must take exactly one operand");
                        self.error(ErrorCode::ArityMismatch, &infix.operator.site, message);
                    }
                    *output
                }
                _ => Type::Error,
            };
        }
        if matches!(lhs, Type::Parameter(_)) {
            return Type::Error;
        }

        let message = format!(
            "operator `{op}` cannot be applied to `{}` and `{}`",
            lhs.describe(ast),
            rhs.describe(ast)
        );
        self.error(ErrorCode::TypeMismatch, &infix.operator.site, message);
        Type::Error
    }
}

/// The result type of a built-in operator, if `op` applies to the operands.
fn builtin_infix(op: &str, lhs: BuiltinType, rhs: BuiltinType) -> Option<BuiltinType> {
    use BuiltinType::{Bool, Float, Int};

    if lhs != rhs {
        return None;
    }
    match (op, lhs) {
        ("+", Int | Float | BuiltinType::String) | ("-" | "*" | "/" | "%", Int | Float) => Some(lhs),
        ("==" | "!=", _) => Some(Bool),
        ("<" | "<=" | ">" | ">=", Int | Float | BuiltinType::String) => Some(Bool),
        ("&&" | "||", Bool) => Some(Bool),
        _ => None,
    }
}

/// The empty tuple is `Void`.
fn tuple_type(elements: Vec<Type>) -> Type {
    if elements.is_empty() {
        Type::void()
    } else {
        Type::Tuple(elements)
    }
}

fn output_of(signature: Type) -> Type {
    match signature {
        Type::Function { output, .. } => *output,
        _ => Type::Error,
    }
}
