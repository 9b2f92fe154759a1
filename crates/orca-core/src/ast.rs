//! The abstract syntax tree.
//!
//! Nodes live in an append-only arena and refer to each other by [`NodeId`].
//! Every node carries a [`SourceRange`]; compiler-synthesized nodes point into
//! the synthesized pseudo-file (see [`SourceRange::synthesized`]).
//!
//! An [`Ast`] may extend a shared base AST. Reads of base nodes are forwarded
//! to the base, writes only ever append to the extension.

use crate::source::SourceRange;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// The identity of a node in an [`Ast`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The position of the node in its arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A name with the range it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// The name.
    pub value: String,
    /// Where the name was written.
    pub site: SourceRange,
}

impl Identifier {
    /// Create a new identifier.
    pub fn new(value: impl Into<String>, site: SourceRange) -> Self {
        Self {
            value: value.into(),
            site,
        }
    }
}

/// The introducer of a binding pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingIntroducer {
    /// `let`
    Let,
    /// `var`
    Var,
    /// `inout`
    Inout,
    /// `sink`
    Sink,
}

/// The effect of one implementation of a method bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessEffect {
    /// `let`
    Let,
    /// `inout`
    Inout,
    /// `set`
    Set,
    /// `sink`
    Sink,
}

/// The notation of an operator declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorNotation {
    /// `infix`
    Infix,
    /// `prefix`
    Prefix,
    /// `postfix`
    Postfix,
}

/// A set of translation units compiled together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    /// Module name.
    pub name: String,
    /// The translation units, one per source file.
    pub units: Vec<NodeId>,
}

/// The contents of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    /// Top-level declarations.
    pub decls: Vec<NodeId>,
}

/// `namespace N { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
    pub members: Vec<NodeId>,
}

/// `type T<G> { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductTypeDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
    pub generics: Vec<NodeId>,
    pub members: Vec<NodeId>,
    /// The compiler-synthesized memberwise initializer, when the type
    /// declares no initializer of its own.
    pub memberwise_init: Option<NodeId>,
}

/// `extension T { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDecl {
    pub introducer: SourceRange,
    pub subject: NodeId,
    pub members: Vec<NodeId>,
}

/// `conformance T: P { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceDecl {
    pub introducer: SourceRange,
    pub subject: NodeId,
    pub conformances: Vec<NodeId>,
    pub members: Vec<NodeId>,
}

/// `trait P { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
    pub members: Vec<NodeId>,
}

/// `type A` inside a trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedTypeDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
}

/// `typealias A = T`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAliasDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
    pub aliased: NodeId,
}

/// `operator infix +`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDecl {
    pub introducer: SourceRange,
    pub notation: OperatorNotation,
    pub notation_site: SourceRange,
    pub identifier: Identifier,
}

/// `fun f<G>(a: T) -> R { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
    pub generics: Vec<NodeId>,
    pub parameters: Vec<NodeId>,
    pub output: Option<NodeId>,
    pub body: Option<NodeId>,
}

/// `fun m() -> R { let { ... } inout { ... } }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub introducer: SourceRange,
    pub identifier: Identifier,
    pub generics: Vec<NodeId>,
    pub parameters: Vec<NodeId>,
    pub output: Option<NodeId>,
    pub impls: Vec<NodeId>,
}

/// One variant of a method bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImplDecl {
    pub introducer: SourceRange,
    pub effect: AccessEffect,
    pub body: NodeId,
}

/// `init(a: T) { ... }`, or a synthesized memberwise initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub introducer: SourceRange,
    pub parameters: Vec<NodeId>,
    pub body: Option<NodeId>,
    pub is_memberwise: bool,
}

/// `subscript s(i: Int): T { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptDecl {
    pub introducer: SourceRange,
    pub identifier: Option<Identifier>,
    pub parameters: Vec<NodeId>,
    pub output: NodeId,
    pub body: Option<NodeId>,
}

/// `let <pattern> = <expr>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDecl {
    pub pattern: NodeId,
    pub initializer: Option<NodeId>,
}

/// A name introduced by a binding pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub identifier: Identifier,
}

/// A function, initializer or subscript parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDecl {
    pub identifier: Identifier,
    pub annotation: Option<NodeId>,
}

/// A generic parameter `<T>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameterDecl {
    pub identifier: Identifier,
}

/// A literal; the value is its source spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralExpr {
    pub value: String,
}

/// A name, possibly qualified by a domain: `x`, `a.b`, `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExpr {
    pub domain: Option<NodeId>,
    pub name: Identifier,
}

/// An argument of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub label: Option<Identifier>,
    pub value: NodeId,
}

/// `f(a, b)` or `a[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: NodeId,
    pub arguments: Vec<Argument>,
}

/// `a + b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfixExpr {
    pub lhs: NodeId,
    pub operator: Identifier,
    pub rhs: NodeId,
}

/// `(a, b)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleExpr {
    pub elements: Vec<NodeId>,
}

/// A type written by name: `Int`, `Self`, `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTypeExpr {
    pub name: Identifier,
}

/// `(A, B)` in type position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleTypeExpr {
    pub elements: Vec<NodeId>,
}

/// `{ ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceStmt {
    pub stmts: Vec<NodeId>,
}

/// `return e`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStmt {
    pub introducer: SourceRange,
    pub value: Option<NodeId>,
}

/// An expression evaluated for its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprStmt {
    pub expr: NodeId,
}

/// `a = b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignStmt {
    pub lhs: NodeId,
    pub rhs: NodeId,
}

/// `while c { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStmt {
    pub introducer: SourceRange,
    pub condition: NodeId,
    pub body: NodeId,
}

/// `if c { ... } else { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub introducer: SourceRange,
    pub condition: NodeId,
    pub success: NodeId,
    pub else_introducer: Option<SourceRange>,
    pub failure: Option<NodeId>,
}

/// A local declaration in statement position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclStmt {
    pub decl: NodeId,
}

/// `let <pattern>: T`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPattern {
    pub introducer: SourceRange,
    pub kind: BindingIntroducer,
    pub subpattern: NodeId,
    pub annotation: Option<NodeId>,
}

/// A pattern introducing one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    pub var: NodeId,
}

/// `(a, b)` in pattern position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuplePattern {
    pub elements: Vec<NodeId>,
}

/// The kind of a node, and its kind-specific contents.
///
/// The set of kinds is closed: every tree walk matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NodeKind {
    // Structure
    Module(ModuleDecl),
    TranslationUnit(TranslationUnit),

    // Declarations
    Namespace(NamespaceDecl),
    ProductType(ProductTypeDecl),
    Extension(ExtensionDecl),
    Conformance(ConformanceDecl),
    Trait(TraitDecl),
    AssociatedType(AssociatedTypeDecl),
    TypeAlias(TypeAliasDecl),
    Operator(OperatorDecl),
    Function(FunctionDecl),
    Method(MethodDecl),
    MethodImpl(MethodImplDecl),
    Initializer(InitializerDecl),
    Subscript(SubscriptDecl),
    Binding(BindingDecl),
    Var(VarDecl),
    Parameter(ParameterDecl),
    GenericParameter(GenericParameterDecl),

    // Expressions
    IntegerLiteral(LiteralExpr),
    FloatLiteral(LiteralExpr),
    StringLiteral(LiteralExpr),
    BooleanLiteral(bool),
    Name(NameExpr),
    Call(CallExpr),
    SubscriptCall(CallExpr),
    Infix(InfixExpr),
    Tuple(TupleExpr),

    // Type expressions
    NameType(NameTypeExpr),
    TupleType(TupleTypeExpr),

    // Statements
    Brace(BraceStmt),
    Return(ReturnStmt),
    ExprStmt(ExprStmt),
    Assign(AssignStmt),
    While(WhileStmt),
    If(IfStmt),
    DeclStmt(DeclStmt),

    // Patterns
    BindingPattern(BindingPattern),
    NamePattern(NamePattern),
    TuplePattern(TuplePattern),
    Wildcard,
}

impl NodeKind {
    /// The children of this node, in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::Module(m) => m.units.clone(),
            Self::TranslationUnit(u) => u.decls.clone(),
            Self::Namespace(d) => d.members.clone(),
            Self::ProductType(d) => d
                .generics
                .iter()
                .chain(&d.members)
                .chain(&d.memberwise_init)
                .copied()
                .collect(),
            Self::Extension(d) => std::iter::once(d.subject).chain(d.members.iter().copied()).collect(),
            Self::Conformance(d) => std::iter::once(d.subject)
                .chain(d.conformances.iter().copied())
                .chain(d.members.iter().copied())
                .collect(),
            Self::Trait(d) => d.members.clone(),
            Self::AssociatedType(_) | Self::Operator(_) | Self::Var(_) => Vec::new(),
            Self::GenericParameter(_) => Vec::new(),
            Self::TypeAlias(d) => vec![d.aliased],
            Self::Function(d) => d
                .generics
                .iter()
                .chain(&d.parameters)
                .chain(&d.output)
                .chain(&d.body)
                .copied()
                .collect(),
            Self::Method(d) => d
                .generics
                .iter()
                .chain(&d.parameters)
                .chain(&d.output)
                .chain(&d.impls)
                .copied()
                .collect(),
            Self::MethodImpl(d) => vec![d.body],
            Self::Initializer(d) => d.parameters.iter().chain(&d.body).copied().collect(),
            Self::Subscript(d) => d
                .parameters
                .iter()
                .chain(std::iter::once(&d.output))
                .chain(&d.body)
                .copied()
                .collect(),
            Self::Binding(d) => std::iter::once(d.pattern).chain(d.initializer).collect(),
            Self::Parameter(d) => d.annotation.into_iter().collect(),
            Self::IntegerLiteral(_)
            | Self::FloatLiteral(_)
            | Self::StringLiteral(_)
            | Self::BooleanLiteral(_) => Vec::new(),
            Self::Name(e) => e.domain.into_iter().collect(),
            Self::Call(e) | Self::SubscriptCall(e) => std::iter::once(e.callee)
                .chain(e.arguments.iter().map(|a| a.value))
                .collect(),
            Self::Infix(e) => vec![e.lhs, e.rhs],
            Self::Tuple(e) => e.elements.clone(),
            Self::NameType(_) => Vec::new(),
            Self::TupleType(t) => t.elements.clone(),
            Self::Brace(s) => s.stmts.clone(),
            Self::Return(s) => s.value.into_iter().collect(),
            Self::ExprStmt(s) => vec![s.expr],
            Self::Assign(s) => vec![s.lhs, s.rhs],
            Self::While(s) => vec![s.condition, s.body],
            Self::If(s) => [s.condition, s.success]
                .into_iter()
                .chain(s.failure)
                .collect(),
            Self::DeclStmt(s) => vec![s.decl],
            Self::BindingPattern(p) => std::iter::once(p.subpattern).chain(p.annotation).collect(),
            Self::NamePattern(p) => vec![p.var],
            Self::TuplePattern(p) => p.elements.clone(),
            Self::Wildcard => Vec::new(),
        }
    }

    /// Whether this node declares an entity.
    pub const fn is_declaration(&self) -> bool {
        matches!(
            self,
            Self::Namespace(_)
                | Self::ProductType(_)
                | Self::Extension(_)
                | Self::Conformance(_)
                | Self::Trait(_)
                | Self::AssociatedType(_)
                | Self::TypeAlias(_)
                | Self::Operator(_)
                | Self::Function(_)
                | Self::Method(_)
                | Self::MethodImpl(_)
                | Self::Initializer(_)
                | Self::Subscript(_)
                | Self::Binding(_)
                | Self::Var(_)
                | Self::Parameter(_)
                | Self::GenericParameter(_)
        )
    }

    /// The name a declaration introduces, if it has one.
    pub const fn identifier(&self) -> Option<&Identifier> {
        match self {
            Self::Namespace(d) => Some(&d.identifier),
            Self::ProductType(d) => Some(&d.identifier),
            Self::Trait(d) => Some(&d.identifier),
            Self::AssociatedType(d) => Some(&d.identifier),
            Self::TypeAlias(d) => Some(&d.identifier),
            Self::Operator(d) => Some(&d.identifier),
            Self::Function(d) => Some(&d.identifier),
            Self::Method(d) => Some(&d.identifier),
            Self::Subscript(d) => d.identifier.as_ref(),
            Self::Var(d) => Some(&d.identifier),
            Self::Parameter(d) => Some(&d.identifier),
            Self::GenericParameter(d) => Some(&d.identifier),
            _ => None,
        }
    }

    /// A short name of the kind, for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Module(_) => "module",
            Self::TranslationUnit(_) => "translation unit",
            Self::Namespace(_) => "namespace",
            Self::ProductType(_) => "product type",
            Self::Extension(_) => "extension",
            Self::Conformance(_) => "conformance",
            Self::Trait(_) => "trait",
            Self::AssociatedType(_) => "associated type",
            Self::TypeAlias(_) => "type alias",
            Self::Operator(_) => "operator",
            Self::Function(_) => "function",
            Self::Method(_) => "method",
            Self::MethodImpl(_) => "method implementation",
            Self::Initializer(_) => "initializer",
            Self::Subscript(_) => "subscript",
            Self::Binding(_) => "binding",
            Self::Var(_) => "variable",
            Self::Parameter(_) => "parameter",
            Self::GenericParameter(_) => "generic parameter",
            Self::IntegerLiteral(_) => "integer literal",
            Self::FloatLiteral(_) => "float literal",
            Self::StringLiteral(_) => "string literal",
            Self::BooleanLiteral(_) => "boolean literal",
            Self::Name(_) => "name",
            Self::Call(_) => "call",
            Self::SubscriptCall(_) => "subscript call",
            Self::Infix(_) => "infix expression",
            Self::Tuple(_) => "tuple",
            Self::NameType(_) => "type name",
            Self::TupleType(_) => "tuple type",
            Self::Brace(_) => "brace statement",
            Self::Return(_) => "return statement",
            Self::ExprStmt(_) => "expression statement",
            Self::Assign(_) => "assignment",
            Self::While(_) => "while loop",
            Self::If(_) => "conditional",
            Self::DeclStmt(_) => "declaration statement",
            Self::BindingPattern(_) => "binding pattern",
            Self::NamePattern(_) => "name pattern",
            Self::TuplePattern(_) => "tuple pattern",
            Self::Wildcard => "wildcard",
        }
    }
}

/// A node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// What the node is.
    pub kind: NodeKind,
    /// Where the node was written.
    pub site: SourceRange,
}

/// Controls a [`Ast::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Visit the children of this node.
    Continue,
    /// Do not visit the children of this node.
    SkipChildren,
    /// End the walk.
    Stop,
}

/// A node arena, optionally layered on top of a shared base.
#[derive(Debug, Default)]
pub struct Ast {
    base: Option<Arc<Ast>>,
    base_len: usize,
    nodes: Vec<Node>,
    modules: Vec<NodeId>,
}

impl Ast {
    /// Create an empty AST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an AST that extends `base`.
    ///
    /// All nodes and modules of `base` are visible in the result; `base`
    /// itself is never modified.
    pub fn extending(base: Arc<Self>) -> Self {
        Self {
            base_len: base.len(),
            modules: base.modules.clone(),
            base: Some(base),
            nodes: Vec::new(),
        }
    }

    /// The number of nodes, including those of the base.
    pub fn len(&self) -> usize {
        self.base_len + self.nodes.len()
    }

    /// Whether the AST has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a node and return its identity.
    pub fn insert(&mut self, kind: NodeKind, site: SourceRange) -> NodeId {
        let id = NodeId(self.len() as u32);
        self.nodes.push(Node { kind, site });
        id
    }

    /// Register a module node as a root of the tree.
    pub fn add_module(&mut self, module: NodeId) {
        self.modules.push(module);
    }

    /// The module roots, in the order they were added.
    pub fn modules(&self) -> &[NodeId] {
        &self.modules
    }

    /// Get a node, if `id` belongs to this AST.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let i = id.index();
        if i < self.base_len {
            self.base.as_ref()?.get(id)
        } else {
            self.nodes.get(i - self.base_len)
        }
    }

    /// Whether `id` was inherited from the base AST.
    pub fn is_inherited(&self, id: NodeId) -> bool {
        id.index() < self.base_len
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self[id].kind
    }

    /// The source range of a node.
    pub fn site(&self, id: NodeId) -> &SourceRange {
        &self[id].site
    }

    /// The children of a node, in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// All translation units, module by module.
    pub fn translation_units(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.modules.iter().flat_map(move |&m| match self.kind(m) {
            NodeKind::Module(module) => module.units.clone(),
            _ => Vec::new(),
        })
    }

    /// Walk the subtree at `root` in pre-order.
    ///
    /// Returns `false` when the walk was stopped by the visitor.
    pub fn walk<F>(&self, root: NodeId, visitor: &mut F) -> bool
    where
        F: FnMut(NodeId, &Node) -> Walk,
    {
        match visitor(root, &self[root]) {
            Walk::Stop => false,
            Walk::SkipChildren => true,
            Walk::Continue => self
                .children(root)
                .into_iter()
                .all(|child| self.walk(child, visitor)),
        }
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id:?} does not belong to this AST"),
        }
    }
}
