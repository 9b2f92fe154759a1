//! The surface syntax tree produced by the token parser.
//!
//! Spans are token indices; [`crate::lower`] turns them into byte ranges
//! while building the arena AST.

use chumsky::span::SimpleSpan;
use orca_core::ast::{AccessEffect, BindingIntroducer, OperatorNotation};

/// A half-open range of token indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokSpan {
    /// First token.
    pub start: usize,
    /// One past the last token.
    pub end: usize,
}

impl TokSpan {
    /// Create a span.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The span from the start of `self` to the end of `other`.
    #[must_use]
    pub fn to(self, other: Self) -> Self {
        Self::new(self.start, other.end.max(self.start))
    }
}

impl From<SimpleSpan> for TokSpan {
    fn from(span: SimpleSpan) -> Self {
        Self::new(span.start, span.end)
    }
}

/// A value with its token span.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The value.
    pub node: T,
    /// Where it was written.
    pub span: TokSpan,
}

impl<T> Spanned<T> {
    /// Pair a value with a span.
    pub const fn new(node: T, span: TokSpan) -> Self {
        Self { node, span }
    }
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident<'src> {
    /// The name.
    pub name: &'src str,
    /// Where it was written.
    pub span: TokSpan,
}

/// A type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr<'src> {
    /// `Int`, `Self`, `T`
    Name(Ident<'src>),
    /// `(A, B)`
    Tuple(Vec<Spanned<TypeExpr<'src>>>),
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg<'src> {
    /// Optional label.
    pub label: Option<Ident<'src>>,
    /// The value.
    pub value: Spanned<Expr<'src>>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'src> {
    /// `42`
    Int(&'src str),
    /// `4.2`
    Float(&'src str),
    /// `"text"`, quotes included.
    String(&'src str),
    /// `true` / `false`
    Bool(bool),
    /// `x`, `self`, `a.b`
    Name {
        /// The qualifying expression, if any.
        domain: Option<Box<Spanned<Expr<'src>>>>,
        /// The name.
        name: Ident<'src>,
    },
    /// `f(a, b: c)`
    Call {
        /// What is called.
        callee: Box<Spanned<Expr<'src>>>,
        /// The arguments.
        args: Vec<Arg<'src>>,
    },
    /// `a[i]`
    Subscript {
        /// What is subscripted.
        callee: Box<Spanned<Expr<'src>>>,
        /// The arguments.
        args: Vec<Arg<'src>>,
    },
    /// `a + b`
    Infix {
        /// Left operand.
        lhs: Box<Spanned<Expr<'src>>>,
        /// The operator.
        op: Ident<'src>,
        /// Right operand.
        rhs: Box<Spanned<Expr<'src>>>,
    },
    /// `(a, b)`
    Tuple(Vec<Spanned<Expr<'src>>>),
}

/// A pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern<'src> {
    /// A variable.
    Name(Ident<'src>),
    /// `(a, b)`
    Tuple(Vec<Spanned<Pattern<'src>>>),
    /// `_`
    Wildcard,
}

/// `let <pattern>: T = e`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<'src> {
    /// The introducer.
    pub introducer: Spanned<BindingIntroducer>,
    /// What is bound.
    pub pattern: Spanned<Pattern<'src>>,
    /// The declared type.
    pub annotation: Option<Spanned<TypeExpr<'src>>>,
    /// The initial value.
    pub initializer: Option<Spanned<Expr<'src>>>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'src> {
    /// `{ ... }`
    Brace(Vec<Spanned<Stmt<'src>>>),
    /// `return e`
    Return {
        /// The `return` keyword.
        keyword: TokSpan,
        /// The returned value.
        value: Option<Spanned<Expr<'src>>>,
    },
    /// `while c { ... }`
    While {
        /// The `while` keyword.
        keyword: TokSpan,
        /// The condition.
        condition: Spanned<Expr<'src>>,
        /// The loop body, a brace statement.
        body: Box<Spanned<Stmt<'src>>>,
    },
    /// `if c { ... } else ...`
    If {
        /// The `if` keyword.
        keyword: TokSpan,
        /// The condition.
        condition: Spanned<Expr<'src>>,
        /// The success branch, a brace statement.
        success: Box<Spanned<Stmt<'src>>>,
        /// The `else` keyword and the failure branch.
        failure: Option<(TokSpan, Box<Spanned<Stmt<'src>>>)>,
    },
    /// `a = b`
    Assign {
        /// Assignee.
        lhs: Spanned<Expr<'src>>,
        /// Value.
        rhs: Spanned<Expr<'src>>,
    },
    /// An expression.
    Expr(Spanned<Expr<'src>>),
    /// A local binding.
    Binding(Binding<'src>),
}

/// A function, initializer or subscript parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param<'src> {
    /// The parameter name.
    pub name: Ident<'src>,
    /// The declared type.
    pub annotation: Option<Spanned<TypeExpr<'src>>>,
}

/// The body of a `fun` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum FunBody<'src> {
    /// A single brace statement.
    Block(Spanned<Stmt<'src>>),
    /// A method bundle: one block per access effect.
    Bundle(Vec<Spanned<(Spanned<AccessEffect>, Spanned<Stmt<'src>>)>>),
}

/// A declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl<'src> {
    /// `namespace N { ... }`
    Namespace {
        /// The keyword.
        keyword: TokSpan,
        /// The name.
        name: Ident<'src>,
        /// Members.
        members: Vec<Spanned<Decl<'src>>>,
    },
    /// `type T<G> { ... }`
    ProductType {
        /// The keyword.
        keyword: TokSpan,
        /// The name.
        name: Ident<'src>,
        /// Generic parameters.
        generics: Vec<Ident<'src>>,
        /// Members.
        members: Vec<Spanned<Decl<'src>>>,
    },
    /// `type A` inside a trait.
    AssociatedType {
        /// The keyword.
        keyword: TokSpan,
        /// The name.
        name: Ident<'src>,
    },
    /// `extension T { ... }`
    Extension {
        /// The keyword.
        keyword: TokSpan,
        /// The extended type.
        subject: Spanned<TypeExpr<'src>>,
        /// Members.
        members: Vec<Spanned<Decl<'src>>>,
    },
    /// `conformance T: P { ... }`
    Conformance {
        /// The keyword.
        keyword: TokSpan,
        /// The conforming type.
        subject: Spanned<TypeExpr<'src>>,
        /// The traits.
        traits: Vec<Spanned<TypeExpr<'src>>>,
        /// Members.
        members: Vec<Spanned<Decl<'src>>>,
    },
    /// `trait P { ... }`
    Trait {
        /// The keyword.
        keyword: TokSpan,
        /// The name.
        name: Ident<'src>,
        /// Requirements.
        members: Vec<Spanned<Decl<'src>>>,
    },
    /// `typealias A = T`
    TypeAlias {
        /// The keyword.
        keyword: TokSpan,
        /// The name.
        name: Ident<'src>,
        /// The aliased type.
        aliased: Spanned<TypeExpr<'src>>,
    },
    /// `operator infix +`
    Operator {
        /// The keyword.
        keyword: TokSpan,
        /// The notation.
        notation: Spanned<OperatorNotation>,
        /// The operator.
        name: Ident<'src>,
    },
    /// `fun f<G>(a: T) -> R { ... }`
    Function {
        /// The keyword.
        keyword: TokSpan,
        /// The name; an operator for operator implementations.
        name: Ident<'src>,
        /// Generic parameters.
        generics: Vec<Ident<'src>>,
        /// Parameters.
        params: Vec<Param<'src>>,
        /// Return type.
        output: Option<Spanned<TypeExpr<'src>>>,
        /// Body, absent for requirements.
        body: Option<FunBody<'src>>,
    },
    /// `init(a: T) { ... }`
    Init {
        /// The keyword.
        keyword: TokSpan,
        /// Parameters.
        params: Vec<Param<'src>>,
        /// Body.
        body: Option<Spanned<Stmt<'src>>>,
    },
    /// `subscript s(i: Int): T { ... }`
    Subscript {
        /// The keyword.
        keyword: TokSpan,
        /// Optional name.
        name: Option<Ident<'src>>,
        /// Parameters.
        params: Vec<Param<'src>>,
        /// Element type.
        output: Spanned<TypeExpr<'src>>,
        /// Body.
        body: Option<Spanned<Stmt<'src>>>,
    },
    /// `let x = e`
    Binding(Binding<'src>),
}
