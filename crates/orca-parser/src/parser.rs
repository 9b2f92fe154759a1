//! Token-based parser using the Logos lexer and Chumsky.
//!
//! ```text
//! Source (&str) → tokenize() → Vec<SpannedToken> → Chumsky parser → Vec<Spanned<Decl>>
//! ```
//!
//! The grammar is layered: type expressions, then expressions, then
//! statements, then declarations. Each layer only depends on the ones
//! before it, so only the layers that nest (braces, parentheses) are
//! recursive.

use chumsky::prelude::*;
use orca_core::ast::{AccessEffect, BindingIntroducer, OperatorNotation};

use crate::lexer::{tokenize, Token};
use crate::syntax::{
    Arg, Binding, Decl, Expr, FunBody, Ident, Param, Pattern, Spanned, Stmt, TokSpan, TypeExpr,
};

// ============================================================================
// Token Input Types
// ============================================================================

/// A spanned token - a token paired with its byte offset span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken<'src> {
    /// The token.
    pub token: Token<'src>,
    /// Byte offset span (start, end).
    pub span: (usize, usize),
}

impl<'src> SpannedToken<'src> {
    /// Create a new spanned token.
    pub const fn new(token: Token<'src>, start: usize, end: usize) -> Self {
        Self {
            token,
            span: (start, end),
        }
    }
}

/// The parser input.
type Tokens<'src> = &'src [SpannedToken<'src>];

/// Type alias for parser extra with our token type.
pub(crate) type TokExtra<'src> = extra::Err<Rich<'src, SpannedToken<'src>>>;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert raw tokens from the lexer to `SpannedToken`s for parsing.
pub fn make_tokens(source: &str) -> Vec<SpannedToken<'_>> {
    tokenize(source)
        .into_iter()
        .map(|(token, span)| SpannedToken::new(token, span.start, span.end))
        .collect()
}

/// Get the byte span of the token index span `start_idx..end_idx`.
///
/// An empty index span maps to an empty byte span at the start of its
/// token; indices past the end map to the end of the last token.
pub fn index_to_byte_span(
    tokens: &[SpannedToken<'_>],
    start_idx: usize,
    end_idx: usize,
) -> (usize, usize) {
    let eof = tokens.last().map_or(0, |t| t.span.1);
    let start = tokens.get(start_idx).map_or(eof, |t| t.span.0);
    let end = if end_idx > start_idx {
        tokens.get(end_idx - 1).map_or(eof, |t| t.span.1)
    } else {
        start
    };
    (start, end.max(start))
}

// ============================================================================
// Token Matchers (Primitives)
// ============================================================================

/// Match a keyword token and return its span.
macro_rules! tok_keyword {
    ($name:ident, $variant:ident) => {
        fn $name<'src>() -> impl Parser<'src, Tokens<'src>, TokSpan, TokExtra<'src>> + Clone {
            any()
                .filter(|t: &SpannedToken<'_>| matches!(t.token, Token::$variant))
                .map_with(|_, e| TokSpan::from(e.span()))
        }
    };
}

tok_keyword!(tok_namespace, Namespace);
tok_keyword!(tok_type, Type);
tok_keyword!(tok_extension, Extension);
tok_keyword!(tok_conformance, Conformance);
tok_keyword!(tok_trait, Trait);
tok_keyword!(tok_typealias, TypeAlias);
tok_keyword!(tok_operator, Operator);
tok_keyword!(tok_fun, Fun);
tok_keyword!(tok_init, Init);
tok_keyword!(tok_subscript, Subscript);
tok_keyword!(tok_return, Return);
tok_keyword!(tok_while, While);
tok_keyword!(tok_if, If);
tok_keyword!(tok_else, Else);
tok_keyword!(tok_underscore, Underscore);

/// Match punctuation tokens.
macro_rules! tok_punct {
    ($name:ident, $variant:ident) => {
        fn $name<'src>() -> impl Parser<'src, Tokens<'src>, (), TokExtra<'src>> + Clone {
            any()
                .filter(|t: &SpannedToken<'_>| matches!(t.token, Token::$variant))
                .to(())
        }
    };
}

tok_punct!(tok_lparen, LParen);
tok_punct!(tok_rparen, RParen);
tok_punct!(tok_lbrace, LBrace);
tok_punct!(tok_rbrace, RBrace);
tok_punct!(tok_lbracket, LBracket);
tok_punct!(tok_rbracket, RBracket);
tok_punct!(tok_comma, Comma);
tok_punct!(tok_colon, Colon);
tok_punct!(tok_semi, Semi);
tok_punct!(tok_dot, Dot);
tok_punct!(tok_arrow, Arrow);
tok_punct!(tok_assign, Assign);

/// Match an identifier.
fn tok_ident<'src>() -> impl Parser<'src, Tokens<'src>, Ident<'src>, TokExtra<'src>> + Clone {
    any()
        .filter(|t: &SpannedToken<'_>| matches!(t.token, Token::Ident(_)))
        .map_with(|t: SpannedToken<'src>, e| Ident {
            name: if let Token::Ident(s) = t.token { s } else { "" },
            span: TokSpan::from(e.span()),
        })
}

/// Match `self`, as an identifier.
fn tok_self<'src>() -> impl Parser<'src, Tokens<'src>, Ident<'src>, TokExtra<'src>> + Clone {
    any()
        .filter(|t: &SpannedToken<'_>| matches!(t.token, Token::SelfValue))
        .map_with(|_, e| Ident {
            name: "self",
            span: TokSpan::from(e.span()),
        })
}

/// Match one of the operators in `ops`.
fn tok_op<'src>(
    ops: &'static [&'static str],
) -> impl Parser<'src, Tokens<'src>, Ident<'src>, TokExtra<'src>> + Clone {
    any()
        .filter(move |t: &SpannedToken<'_>| {
            matches!(t.token, Token::Op(op) if ops.iter().any(|o| *o == op))
        })
        .map_with(|t: SpannedToken<'src>, e| Ident {
            name: if let Token::Op(s) = t.token { s } else { "" },
            span: TokSpan::from(e.span()),
        })
}

/// Match any operator.
fn tok_any_op<'src>() -> impl Parser<'src, Tokens<'src>, Ident<'src>, TokExtra<'src>> + Clone {
    any()
        .filter(|t: &SpannedToken<'_>| matches!(t.token, Token::Op(_)))
        .map_with(|t: SpannedToken<'src>, e| Ident {
            name: if let Token::Op(s) = t.token { s } else { "" },
            span: TokSpan::from(e.span()),
        })
}

/// Match a binding introducer.
fn tok_binding_introducer<'src>(
) -> impl Parser<'src, Tokens<'src>, Spanned<BindingIntroducer>, TokExtra<'src>> + Clone {
    any()
        .filter(|t: &SpannedToken<'_>| t.token.is_binding_introducer())
        .map_with(|t: SpannedToken<'src>, e| {
            let introducer = match t.token {
                Token::Var => BindingIntroducer::Var,
                Token::Inout => BindingIntroducer::Inout,
                Token::Sink => BindingIntroducer::Sink,
                _ => BindingIntroducer::Let,
            };
            Spanned::new(introducer, TokSpan::from(e.span()))
        })
}

/// Match the effect of a method implementation.
fn tok_access_effect<'src>(
) -> impl Parser<'src, Tokens<'src>, Spanned<AccessEffect>, TokExtra<'src>> + Clone {
    any()
        .filter(|t: &SpannedToken<'_>| {
            matches!(t.token, Token::Let | Token::Inout | Token::Set | Token::Sink)
        })
        .map_with(|t: SpannedToken<'src>, e| {
            let effect = match t.token {
                Token::Inout => AccessEffect::Inout,
                Token::Set => AccessEffect::Set,
                Token::Sink => AccessEffect::Sink,
                _ => AccessEffect::Let,
            };
            Spanned::new(effect, TokSpan::from(e.span()))
        })
}

/// Match an operator notation, a contextual keyword.
fn tok_notation<'src>(
) -> impl Parser<'src, Tokens<'src>, Spanned<OperatorNotation>, TokExtra<'src>> + Clone {
    tok_ident().try_map(|id, span| {
        let notation = match id.name {
            "infix" => OperatorNotation::Infix,
            "prefix" => OperatorNotation::Prefix,
            "postfix" => OperatorNotation::Postfix,
            _ => {
                return Err(Rich::custom(
                    span,
                    "expected `infix`, `prefix` or `postfix`",
                ))
            }
        };
        Ok(Spanned::new(notation, id.span))
    })
}

// ============================================================================
// Compound Parsers
// ============================================================================

/// Operator precedence levels, tightest first.
const PRECEDENCE: [&[&str]; 5] = [
    &["*", "/", "%"],
    &["+", "-"],
    &["==", "!=", "<", "<=", ">", ">="],
    &["&&"],
    &["||"],
];

/// Parse a type expression.
fn type_expr<'src>(
) -> impl Parser<'src, Tokens<'src>, Spanned<TypeExpr<'src>>, TokExtra<'src>> + Clone {
    recursive(|ty| {
        let tuple = ty
            .separated_by(tok_comma())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(tok_lparen(), tok_rparen())
            .map(TypeExpr::Tuple);

        choice((tok_ident().map(TypeExpr::Name), tuple))
            .map_with(|node, e| Spanned::new(node, TokSpan::from(e.span())))
    })
}

/// A postfix operation on an expression.
enum Postfix<'src> {
    Call(Vec<Arg<'src>>),
    Subscript(Vec<Arg<'src>>),
    Member(Ident<'src>),
}

/// Parse one precedence level of left-associative infix operators.
fn infix_level<'src, P>(
    operand: P,
    ops: &'static [&'static str],
) -> impl Parser<'src, Tokens<'src>, Spanned<Expr<'src>>, TokExtra<'src>> + Clone
where
    P: Parser<'src, Tokens<'src>, Spanned<Expr<'src>>, TokExtra<'src>> + Clone,
{
    operand.clone().foldl(
        tok_op(ops).then(operand).repeated(),
        |lhs: Spanned<Expr<'src>>, (op, rhs): (Ident<'src>, Spanned<Expr<'src>>)| {
            let span = lhs.span.to(rhs.span);
            Spanned::new(
                Expr::Infix {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            )
        },
    )
}

/// Parse an expression.
fn expr<'src>() -> impl Parser<'src, Tokens<'src>, Spanned<Expr<'src>>, TokExtra<'src>> + Clone {
    recursive(|expr| {
        let literal = any()
            .filter(|t: &SpannedToken<'_>| {
                matches!(
                    t.token,
                    Token::Int(_) | Token::Float(_) | Token::String(_) | Token::True | Token::False
                )
            })
            .map(|t: SpannedToken<'src>| match t.token {
                Token::Int(s) => Expr::Int(s),
                Token::Float(s) => Expr::Float(s),
                Token::String(s) => Expr::String(s),
                Token::True => Expr::Bool(true),
                _ => Expr::Bool(false),
            });

        let name = choice((tok_ident(), tok_self())).map(|name| Expr::Name { domain: None, name });

        // `(e)` is `e`; anything else in parentheses is a tuple.
        let parens = expr
            .clone()
            .separated_by(tok_comma())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(tok_lparen(), tok_rparen())
            .map(|mut elements: Vec<Spanned<Expr<'src>>>| {
                if elements.len() == 1 {
                    elements.remove(0).node
                } else {
                    Expr::Tuple(elements)
                }
            });

        let atom = choice((literal, name, parens))
            .map_with(|node, e| Spanned::new(node, TokSpan::from(e.span())));

        let arg = tok_ident()
            .then_ignore(tok_colon())
            .or_not()
            .then(expr.clone())
            .map(|(label, value)| Arg { label, value });
        let args = arg
            .separated_by(tok_comma())
            .allow_trailing()
            .collect::<Vec<_>>();

        let postfix = choice((
            args.clone()
                .delimited_by(tok_lparen(), tok_rparen())
                .map(Postfix::Call),
            args.delimited_by(tok_lbracket(), tok_rbracket())
                .map(Postfix::Subscript),
            tok_dot().ignore_then(tok_ident()).map(Postfix::Member),
        ))
        .map_with(|op, e| (op, TokSpan::from(e.span())));

        let postfixed = atom
            .foldl(
                postfix.repeated(),
                |lhs: Spanned<Expr<'src>>, (op, span): (Postfix<'src>, TokSpan)| {
                    let whole = lhs.span.to(span);
                    let node = match op {
                        Postfix::Call(args) => Expr::Call {
                            callee: Box::new(lhs),
                            args,
                        },
                        Postfix::Subscript(args) => Expr::Subscript {
                            callee: Box::new(lhs),
                            args,
                        },
                        Postfix::Member(name) => Expr::Name {
                            domain: Some(Box::new(lhs)),
                            name,
                        },
                    };
                    Spanned::new(node, whole)
                },
            )
            .boxed();

        let mut level = postfixed;
        for ops in PRECEDENCE {
            level = infix_level(level, ops).boxed();
        }
        level
    })
}

/// Parse a binding: `let <pattern> [: T] [= e]`.
fn binding<'src, E>(expr: E) -> impl Parser<'src, Tokens<'src>, Binding<'src>, TokExtra<'src>> + Clone
where
    E: Parser<'src, Tokens<'src>, Spanned<Expr<'src>>, TokExtra<'src>> + Clone,
{
    let pattern = recursive(|pattern| {
        let tuple = pattern
            .separated_by(tok_comma())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(tok_lparen(), tok_rparen())
            .map(Pattern::Tuple);

        choice((
            tok_ident().map(Pattern::Name),
            tok_underscore().to(Pattern::Wildcard),
            tuple,
        ))
        .map_with(|node, e| Spanned::new(node, TokSpan::from(e.span())))
    });

    tok_binding_introducer()
        .then(pattern)
        .then(tok_colon().ignore_then(type_expr()).or_not())
        .then(tok_assign().ignore_then(expr).or_not())
        .map(|(((introducer, pattern), annotation), initializer)| Binding {
            introducer,
            pattern,
            annotation,
            initializer,
        })
}

/// Parse a brace statement out of the statements `stmt` parses.
fn block<'src, S>(stmt: S) -> impl Parser<'src, Tokens<'src>, Spanned<Stmt<'src>>, TokExtra<'src>> + Clone
where
    S: Parser<'src, Tokens<'src>, Spanned<Stmt<'src>>, TokExtra<'src>> + Clone,
{
    stmt.then_ignore(tok_semi().or_not())
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(tok_lbrace(), tok_rbrace())
        .map_with(|stmts, e| Spanned::new(Stmt::Brace(stmts), TokSpan::from(e.span())))
}

/// Parse a statement.
fn stmt<'src>() -> impl Parser<'src, Tokens<'src>, Spanned<Stmt<'src>>, TokExtra<'src>> + Clone {
    let expr = expr().boxed();

    recursive(|stmt| {
        let block = block(stmt).boxed();

        let conditional = recursive(|conditional| {
            tok_if()
                .then(expr.clone())
                .then(block.clone())
                .then(tok_else().then(choice((block.clone(), conditional))).or_not())
                .map_with(|(((keyword, condition), success), failure), e| {
                    Spanned::new(
                        Stmt::If {
                            keyword,
                            condition,
                            success: Box::new(success),
                            failure: failure.map(|(keyword, branch)| (keyword, Box::new(branch))),
                        },
                        TokSpan::from(e.span()),
                    )
                })
        });

        let ret = tok_return()
            .then(expr.clone().or_not())
            .map(|(keyword, value)| Stmt::Return { keyword, value });

        let while_loop = tok_while()
            .then(expr.clone())
            .then(block.clone())
            .map(|((keyword, condition), body)| Stmt::While {
                keyword,
                condition,
                body: Box::new(body),
            });

        let local = binding(expr.clone()).map(Stmt::Binding);

        let assign_or_expr = expr
            .clone()
            .then(tok_assign().ignore_then(expr.clone()).or_not())
            .map(|(lhs, rhs)| match rhs {
                Some(rhs) => Stmt::Assign { lhs, rhs },
                None => Stmt::Expr(lhs),
            });

        choice((
            block,
            conditional,
            choice((ret, while_loop, local, assign_or_expr))
                .map_with(|node, e| Spanned::new(node, TokSpan::from(e.span()))),
        ))
    })
}

/// Parse a declaration.
fn decl<'src>() -> impl Parser<'src, Tokens<'src>, Spanned<Decl<'src>>, TokExtra<'src>> + Clone {
    let block = block(stmt()).boxed();

    let generics = tok_ident()
        .separated_by(tok_comma())
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(tok_op(&["<"]), tok_op(&[">"]))
        .or_not()
        .map(Option::unwrap_or_default);

    let param = tok_ident()
        .then(tok_colon().ignore_then(type_expr()).or_not())
        .map(|(name, annotation)| Param { name, annotation });
    let params = param
        .separated_by(tok_comma())
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(tok_lparen(), tok_rparen());

    // A bundle is tried first: `{ let {` cannot start a plain block.
    let bundle = tok_access_effect()
        .then(block.clone())
        .map_with(|pair, e| Spanned::new(pair, TokSpan::from(e.span())))
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(tok_lbrace(), tok_rbrace())
        .map(FunBody::Bundle);
    let fun_body = choice((bundle, block.clone().map(FunBody::Block)));

    let function = tok_fun()
        .then(choice((tok_ident(), tok_any_op())))
        .then(generics.clone())
        .then(params.clone())
        .then(tok_arrow().ignore_then(type_expr()).or_not())
        .then(fun_body.or_not())
        .map(
            |(((((keyword, name), generics), params), output), body)| Decl::Function {
                keyword,
                name,
                generics,
                params,
                output,
                body,
            },
        )
        .boxed();

    let init = tok_init()
        .then(params.clone())
        .then(block.clone().or_not())
        .map(|((keyword, params), body)| Decl::Init {
            keyword,
            params,
            body,
        })
        .boxed();

    let subscript = tok_subscript()
        .then(tok_ident().or_not())
        .then(params)
        .then_ignore(tok_colon())
        .then(type_expr())
        .then(block.or_not())
        .map(|((((keyword, name), params), output), body)| Decl::Subscript {
            keyword,
            name,
            params,
            output,
            body,
        })
        .boxed();

    let local = binding(expr()).map(Decl::Binding).boxed();

    let typealias = tok_typealias()
        .then(tok_ident())
        .then_ignore(tok_assign())
        .then(type_expr())
        .map(|((keyword, name), aliased)| Decl::TypeAlias {
            keyword,
            name,
            aliased,
        });

    let operator = tok_operator()
        .then(tok_notation())
        .then(tok_any_op())
        .map(|((keyword, notation), name)| Decl::Operator {
            keyword,
            notation,
            name,
        });

    let associated_type = tok_type()
        .then(tok_ident())
        .map(|(keyword, name)| Decl::AssociatedType { keyword, name });

    let requirements = choice((
        associated_type,
        function.clone(),
        init.clone(),
        subscript.clone(),
    ))
    .map_with(|node, e| Spanned::new(node, TokSpan::from(e.span())))
    .then_ignore(tok_semi().or_not())
    .repeated()
    .collect::<Vec<_>>()
    .delimited_by(tok_lbrace(), tok_rbrace());

    recursive(|decl| {
        let members = decl
            .then_ignore(tok_semi().or_not())
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(tok_lbrace(), tok_rbrace())
            .boxed();

        let namespace = tok_namespace()
            .then(tok_ident())
            .then(members.clone())
            .map(|((keyword, name), members)| Decl::Namespace {
                keyword,
                name,
                members,
            });

        let product_type = tok_type()
            .then(tok_ident())
            .then(generics)
            .then(members.clone())
            .map(|(((keyword, name), generics), members)| Decl::ProductType {
                keyword,
                name,
                generics,
                members,
            });

        let extension = tok_extension()
            .then(type_expr())
            .then(members.clone())
            .map(|((keyword, subject), members)| Decl::Extension {
                keyword,
                subject,
                members,
            });

        let conformance = tok_conformance()
            .then(type_expr())
            .then_ignore(tok_colon())
            .then(
                type_expr()
                    .separated_by(tok_comma())
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then(members)
            .map(|(((keyword, subject), traits), members)| Decl::Conformance {
                keyword,
                subject,
                traits,
                members,
            });

        let trait_decl = tok_trait()
            .then(tok_ident())
            .then(requirements)
            .map(|((keyword, name), members)| Decl::Trait {
                keyword,
                name,
                members,
            });

        choice((
            namespace,
            product_type,
            extension,
            conformance,
            trait_decl,
            typealias,
            operator,
            function,
            init,
            subscript,
            local,
        ))
        .map_with(|node, e| Spanned::new(node, TokSpan::from(e.span())))
    })
}

/// Parse a whole source file.
pub(crate) fn file_parser<'src>(
) -> impl Parser<'src, Tokens<'src>, Vec<Spanned<Decl<'src>>>, TokExtra<'src>> {
    decl()
        .then_ignore(tok_semi().or_not())
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}
