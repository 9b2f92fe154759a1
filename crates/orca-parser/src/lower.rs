//! Lowering of the surface tree into the arena AST.

use orca_core::ast::{
    Argument, AssignStmt, AssociatedTypeDecl, BindingDecl, BindingPattern, BraceStmt, CallExpr,
    ConformanceDecl, DeclStmt, ExprStmt, ExtensionDecl, FunctionDecl, GenericParameterDecl,
    IfStmt, InfixExpr, InitializerDecl, LiteralExpr, MethodDecl, MethodImplDecl,
    NameExpr, NamePattern, NameTypeExpr, NamespaceDecl, OperatorDecl, ParameterDecl,
    ProductTypeDecl, ReturnStmt, SubscriptDecl, TraitDecl, TranslationUnit, TupleExpr,
    TuplePattern, TupleTypeExpr, TypeAliasDecl, VarDecl, WhileStmt,
};
use orca_core::{Ast, Identifier, NodeId, NodeKind, SourceFile, SourceRange};

use crate::parser::{index_to_byte_span, SpannedToken};
use crate::syntax::{
    Arg, Binding, Decl, Expr, FunBody, Ident, Param, Pattern, Spanned, Stmt, TokSpan, TypeExpr,
};

/// Builds arena nodes for one source file.
pub(crate) struct Lowerer<'a, 'src> {
    ast: &'a mut Ast,
    file: SourceFile,
    tokens: &'a [SpannedToken<'src>],
}

impl<'a, 'src> Lowerer<'a, 'src> {
    pub(crate) fn new(ast: &'a mut Ast, file: SourceFile, tokens: &'a [SpannedToken<'src>]) -> Self {
        Self { ast, file, tokens }
    }

    /// Lower a whole file into a translation unit.
    pub(crate) fn translation_unit(&mut self, decls: &[Spanned<Decl<'src>>]) -> NodeId {
        let decls = decls.iter().map(|d| self.decl(d)).collect();
        let site = self.file.whole_range();
        self.ast
            .insert(NodeKind::TranslationUnit(TranslationUnit { decls }), site)
    }

    fn range(&self, span: TokSpan) -> SourceRange {
        let (start, end) = index_to_byte_span(self.tokens, span.start, span.end);
        SourceRange::new(self.file.clone(), start, end)
    }

    fn ident(&self, ident: &Ident<'_>) -> Identifier {
        Identifier::new(ident.name, self.range(ident.span))
    }

    fn decls(&mut self, decls: &[Spanned<Decl<'src>>]) -> Vec<NodeId> {
        decls.iter().map(|d| self.decl(d)).collect()
    }

    fn decl(&mut self, decl: &Spanned<Decl<'src>>) -> NodeId {
        let site = self.range(decl.span);
        let kind = match &decl.node {
            Decl::Namespace {
                keyword,
                name,
                members,
            } => NodeKind::Namespace(NamespaceDecl {
                introducer: self.range(*keyword),
                identifier: self.ident(name),
                members: self.decls(members),
            }),
            Decl::ProductType {
                keyword,
                name,
                generics,
                members,
            } => {
                let generics = self.generics(generics);
                let members = self.decls(members);
                let memberwise_init = self.memberwise_init(&members);
                NodeKind::ProductType(ProductTypeDecl {
                    introducer: self.range(*keyword),
                    identifier: self.ident(name),
                    generics,
                    members,
                    memberwise_init,
                })
            }
            Decl::AssociatedType { keyword, name } => {
                NodeKind::AssociatedType(AssociatedTypeDecl {
                    introducer: self.range(*keyword),
                    identifier: self.ident(name),
                })
            }
            Decl::Extension {
                keyword,
                subject,
                members,
            } => NodeKind::Extension(ExtensionDecl {
                introducer: self.range(*keyword),
                subject: self.type_expr(subject),
                members: self.decls(members),
            }),
            Decl::Conformance {
                keyword,
                subject,
                traits,
                members,
            } => NodeKind::Conformance(ConformanceDecl {
                introducer: self.range(*keyword),
                subject: self.type_expr(subject),
                conformances: traits.iter().map(|t| self.type_expr(t)).collect(),
                members: self.decls(members),
            }),
            Decl::Trait {
                keyword,
                name,
                members,
            } => NodeKind::Trait(TraitDecl {
                introducer: self.range(*keyword),
                identifier: self.ident(name),
                members: self.decls(members),
            }),
            Decl::TypeAlias {
                keyword,
                name,
                aliased,
            } => NodeKind::TypeAlias(TypeAliasDecl {
                introducer: self.range(*keyword),
                identifier: self.ident(name),
                aliased: self.type_expr(aliased),
            }),
            Decl::Operator {
                keyword,
                notation,
                name,
            } => NodeKind::Operator(OperatorDecl {
                introducer: self.range(*keyword),
                notation: notation.node,
                notation_site: self.range(notation.span),
                identifier: self.ident(name),
            }),
            Decl::Function {
                keyword,
                name,
                generics,
                params,
                output,
                body,
            } => {
                let introducer = self.range(*keyword);
                let identifier = self.ident(name);
                let generics = self.generics(generics);
                let parameters = self.params(params);
                let output = output.as_ref().map(|t| self.type_expr(t));
                match body {
                    Some(FunBody::Bundle(impls)) => {
                        let impls = impls
                            .iter()
                            .map(|variant| {
                                let (effect, body) = &variant.node;
                                let kind = NodeKind::MethodImpl(MethodImplDecl {
                                    introducer: self.range(effect.span),
                                    effect: effect.node,
                                    body: self.stmt(body),
                                });
                                let site = self.range(variant.span);
                                self.ast.insert(kind, site)
                            })
                            .collect();
                        NodeKind::Method(MethodDecl {
                            introducer,
                            identifier,
                            generics,
                            parameters,
                            output,
                            impls,
                        })
                    }
                    Some(FunBody::Block(block)) => NodeKind::Function(FunctionDecl {
                        introducer,
                        identifier,
                        generics,
                        parameters,
                        output,
                        body: Some(self.stmt(block)),
                    }),
                    None => NodeKind::Function(FunctionDecl {
                        introducer,
                        identifier,
                        generics,
                        parameters,
                        output,
                        body: None,
                    }),
                }
            }
            Decl::Init {
                keyword,
                params,
                body,
            } => NodeKind::Initializer(InitializerDecl {
                introducer: self.range(*keyword),
                parameters: self.params(params),
                body: body.as_ref().map(|b| self.stmt(b)),
                is_memberwise: false,
            }),
            Decl::Subscript {
                keyword,
                name,
                params,
                output,
                body,
            } => NodeKind::Subscript(SubscriptDecl {
                introducer: self.range(*keyword),
                identifier: name.as_ref().map(|n| self.ident(n)),
                parameters: self.params(params),
                output: self.type_expr(output),
                body: body.as_ref().map(|b| self.stmt(b)),
            }),
            Decl::Binding(binding) => return self.binding(binding, site),
        };
        self.ast.insert(kind, site)
    }

    fn generics(&mut self, generics: &[Ident<'_>]) -> Vec<NodeId> {
        generics
            .iter()
            .map(|g| {
                let identifier = self.ident(g);
                let site = identifier.site.clone();
                self.ast.insert(
                    NodeKind::GenericParameter(GenericParameterDecl { identifier }),
                    site,
                )
            })
            .collect()
    }

    fn params(&mut self, params: &[Param<'src>]) -> Vec<NodeId> {
        params
            .iter()
            .map(|p| {
                let identifier = self.ident(&p.name);
                let annotation = p.annotation.as_ref().map(|t| self.type_expr(t));
                let site = match &p.annotation {
                    Some(t) => self.range(p.name.span.to(t.span)),
                    None => identifier.site.clone(),
                };
                self.ast
                    .insert(NodeKind::Parameter(ParameterDecl { identifier, annotation }), site)
            })
            .collect()
    }

    /// Synthesize a memberwise initializer unless `members` declares one.
    ///
    /// Its parameters mirror the stored variables in declaration order and
    /// live in the synthesized file.
    fn memberwise_init(&mut self, members: &[NodeId]) -> Option<NodeId> {
        if members
            .iter()
            .any(|&m| matches!(self.ast.kind(m), NodeKind::Initializer(_)))
        {
            return None;
        }

        let mut names = Vec::new();
        for &member in members {
            if let NodeKind::Binding(binding) = self.ast.kind(member) {
                collect_var_names(self.ast, binding.pattern, &mut names);
            }
        }

        let parameters = names
            .into_iter()
            .map(|name| {
                let identifier = Identifier::new(name, SourceRange::synthesized());
                self.ast.insert(
                    NodeKind::Parameter(ParameterDecl {
                        identifier,
                        annotation: None,
                    }),
                    SourceRange::synthesized(),
                )
            })
            .collect();

        Some(self.ast.insert(
            NodeKind::Initializer(InitializerDecl {
                introducer: SourceRange::synthesized(),
                parameters,
                body: None,
                is_memberwise: true,
            }),
            SourceRange::synthesized(),
        ))
    }

    fn binding(&mut self, binding: &Binding<'src>, site: SourceRange) -> NodeId {
        let pattern_span = binding
            .annotation
            .as_ref()
            .map_or(binding.pattern.span, |a| a.span);
        let pattern_site = self.range(binding.introducer.span.to(pattern_span));
        let kind = BindingPattern {
            introducer: self.range(binding.introducer.span),
            kind: binding.introducer.node,
            subpattern: self.pattern(&binding.pattern),
            annotation: binding.annotation.as_ref().map(|t| self.type_expr(t)),
        };
        let pattern = self.ast.insert(NodeKind::BindingPattern(kind), pattern_site);
        let initializer = binding.initializer.as_ref().map(|e| self.expr(e));
        self.ast.insert(
            NodeKind::Binding(BindingDecl {
                pattern,
                initializer,
            }),
            site,
        )
    }

    fn pattern(&mut self, pattern: &Spanned<Pattern<'src>>) -> NodeId {
        let site = self.range(pattern.span);
        let kind = match &pattern.node {
            Pattern::Name(name) => {
                let identifier = self.ident(name);
                let var_site = identifier.site.clone();
                let var = self.ast.insert(NodeKind::Var(VarDecl { identifier }), var_site);
                NodeKind::NamePattern(NamePattern { var })
            }
            Pattern::Tuple(elements) => NodeKind::TuplePattern(TuplePattern {
                elements: elements.iter().map(|p| self.pattern(p)).collect(),
            }),
            Pattern::Wildcard => NodeKind::Wildcard,
        };
        self.ast.insert(kind, site)
    }

    fn type_expr(&mut self, ty: &Spanned<TypeExpr<'src>>) -> NodeId {
        let site = self.range(ty.span);
        let kind = match &ty.node {
            TypeExpr::Name(name) => NodeKind::NameType(NameTypeExpr {
                name: self.ident(name),
            }),
            TypeExpr::Tuple(elements) => NodeKind::TupleType(TupleTypeExpr {
                elements: elements.iter().map(|t| self.type_expr(t)).collect(),
            }),
        };
        self.ast.insert(kind, site)
    }

    fn stmt(&mut self, stmt: &Spanned<Stmt<'src>>) -> NodeId {
        let site = self.range(stmt.span);
        let kind = match &stmt.node {
            Stmt::Brace(stmts) => NodeKind::Brace(BraceStmt {
                stmts: stmts.iter().map(|s| self.stmt(s)).collect(),
            }),
            Stmt::Return { keyword, value } => NodeKind::Return(ReturnStmt {
                introducer: self.range(*keyword),
                value: value.as_ref().map(|e| self.expr(e)),
            }),
            Stmt::While {
                keyword,
                condition,
                body,
            } => NodeKind::While(WhileStmt {
                introducer: self.range(*keyword),
                condition: self.expr(condition),
                body: self.stmt(body),
            }),
            Stmt::If {
                keyword,
                condition,
                success,
                failure,
            } => NodeKind::If(IfStmt {
                introducer: self.range(*keyword),
                condition: self.expr(condition),
                success: self.stmt(success),
                else_introducer: failure.as_ref().map(|(k, _)| self.range(*k)),
                failure: failure.as_ref().map(|(_, s)| self.stmt(s)),
            }),
            Stmt::Assign { lhs, rhs } => NodeKind::Assign(AssignStmt {
                lhs: self.expr(lhs),
                rhs: self.expr(rhs),
            }),
            Stmt::Expr(expr) => NodeKind::ExprStmt(ExprStmt {
                expr: self.expr(expr),
            }),
            Stmt::Binding(binding) => {
                let decl = self.binding(binding, site.clone());
                NodeKind::DeclStmt(DeclStmt { decl })
            }
        };
        self.ast.insert(kind, site)
    }

    fn args(&mut self, args: &[Arg<'src>]) -> Vec<Argument> {
        args.iter()
            .map(|a| Argument {
                label: a.label.as_ref().map(|l| self.ident(l)),
                value: self.expr(&a.value),
            })
            .collect()
    }

    fn expr(&mut self, expr: &Spanned<Expr<'src>>) -> NodeId {
        let site = self.range(expr.span);
        let kind = match &expr.node {
            Expr::Int(s) => NodeKind::IntegerLiteral(LiteralExpr {
                value: (*s).to_string(),
            }),
            Expr::Float(s) => NodeKind::FloatLiteral(LiteralExpr {
                value: (*s).to_string(),
            }),
            Expr::String(s) => NodeKind::StringLiteral(LiteralExpr {
                value: (*s).to_string(),
            }),
            Expr::Bool(b) => NodeKind::BooleanLiteral(*b),
            Expr::Name { domain, name } => NodeKind::Name(NameExpr {
                domain: domain.as_ref().map(|d| self.expr(d)),
                name: self.ident(name),
            }),
            Expr::Call { callee, args } => NodeKind::Call(CallExpr {
                callee: self.expr(callee),
                arguments: self.args(args),
            }),
            Expr::Subscript { callee, args } => NodeKind::SubscriptCall(CallExpr {
                callee: self.expr(callee),
                arguments: self.args(args),
            }),
            Expr::Infix { lhs, op, rhs } => NodeKind::Infix(InfixExpr {
                lhs: self.expr(lhs),
                operator: self.ident(op),
                rhs: self.expr(rhs),
            }),
            Expr::Tuple(elements) => NodeKind::Tuple(TupleExpr {
                elements: elements.iter().map(|e| self.expr(e)).collect(),
            }),
        };
        self.ast.insert(kind, site)
    }
}

/// Collect the names a pattern binds, in source order.
fn collect_var_names(ast: &Ast, pattern: NodeId, names: &mut Vec<String>) {
    match ast.kind(pattern) {
        NodeKind::Var(v) => names.push(v.identifier.value.clone()),
        kind => {
            for child in kind.children() {
                // Annotations are type expressions and bind nothing.
                if !matches!(ast.kind(child), NodeKind::NameType(_) | NodeKind::TupleType(_)) {
                    collect_var_names(ast, child, names);
                }
            }
        }
    }
}
