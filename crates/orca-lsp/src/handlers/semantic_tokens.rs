//! Semantic tokens handler for enhanced syntax highlighting.
//!
//! Tokens are derived from the syntax tree alone, so highlighting works
//! before and without type checking. The walk emits tokens for:
//! - Introducer keywords (`fun`, `let`, `return`, ...)
//! - Declared names, by kind of declaration
//! - Names and member accesses in expressions, by syntactic role
//! - Type names, argument labels, operators and literals
//! - Comments, which the tree drops and are recovered by relexing the file

use lsp_types::{
    SemanticToken, SemanticTokenModifier, SemanticTokenType, SemanticTokens,
    SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions, SemanticTokensResult,
    SemanticTokensServerCapabilities,
};
use orca_core::ast::BindingIntroducer;
use orca_core::{Ast, Identifier, NodeId, NodeKind, SourceFile, SourceRange};

use crate::query::find_translation_unit;

/// Token types we support, indexed by [`TokenKind`].
pub const TOKEN_TYPES: &[SemanticTokenType] = &[
    SemanticTokenType::NAMESPACE,
    SemanticTokenType::TYPE,
    SemanticTokenType::TYPE_PARAMETER,
    SemanticTokenType::PARAMETER,
    SemanticTokenType::VARIABLE,
    SemanticTokenType::PROPERTY,
    SemanticTokenType::FUNCTION,
    SemanticTokenType::METHOD,
    SemanticTokenType::KEYWORD,
    SemanticTokenType::MODIFIER,
    SemanticTokenType::COMMENT,
    SemanticTokenType::STRING,
    SemanticTokenType::NUMBER,
    SemanticTokenType::OPERATOR,
    SemanticTokenType::new("label"),
];

/// Token modifiers we support.
pub const TOKEN_MODIFIERS: &[SemanticTokenModifier] = &[
    SemanticTokenModifier::DECLARATION, // 0: the name a declaration introduces
    SemanticTokenModifier::READONLY,    // 1: names bound by `let`
];

/// Token modifier bits.
pub mod token_modifier {
    /// The name a declaration introduces.
    pub const DECLARATION: u32 = 1 << 0;
    /// A name bound by `let`.
    pub const READONLY: u32 = 1 << 1;
}

/// Get the semantic tokens legend for capability registration.
pub fn get_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.to_vec(),
        token_modifiers: TOKEN_MODIFIERS.to_vec(),
    }
}

/// Get the semantic tokens server capabilities.
pub fn get_capabilities() -> SemanticTokensServerCapabilities {
    SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
        legend: get_legend(),
        full: Some(SemanticTokensFullOptions::Bool(true)),
        range: None,
        work_done_progress_options: Default::default(),
    })
}

/// The category of a token; the discriminant is its index in [`TOKEN_TYPES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A namespace name.
    Namespace = 0,
    /// A type name.
    Type = 1,
    /// A generic parameter or associated type.
    TypeParameter = 2,
    /// A function parameter.
    Parameter = 3,
    /// A variable.
    Variable = 4,
    /// A stored member of a type.
    Property = 5,
    /// A free function.
    Function = 6,
    /// A member function.
    Method = 7,
    /// A keyword.
    Keyword = 8,
    /// An access effect or operator notation.
    Modifier = 9,
    /// A comment.
    Comment = 10,
    /// A string literal.
    String = 11,
    /// A numeric literal.
    Number = 12,
    /// An operator.
    Operator = 13,
    /// An argument label.
    Label = 14,
}

/// A classified range of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    /// Where the token is.
    pub range: SourceRange,
    /// What it is.
    pub kind: TokenKind,
    /// Bits of [`token_modifier`].
    pub modifiers: u32,
}

/// Handle a semantic tokens request.
pub fn handle_semantic_tokens(ast: &Ast, uri: &str) -> Option<SemanticTokensResult> {
    let tokens = compute_semantic_tokens(ast, uri);
    if tokens.is_empty() {
        None
    } else {
        Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data: encode(&tokens),
        }))
    }
}

/// The tokens of the document at `uri`, in source order.
pub fn compute_semantic_tokens(ast: &Ast, uri: &str) -> Vec<TokenSpan> {
    let Some(unit) = find_translation_unit(ast, uri) else {
        return Vec::new();
    };
    let mut collector = TokenCollector {
        ast,
        file: ast.site(unit).file.clone(),
        tokens: Vec::new(),
        in_type: false,
        readonly: false,
    };
    collector.node(unit, Role::Value);
    collector.comments();

    let mut tokens = collector.tokens;
    tokens.sort_by_key(|t| t.range.start);
    tokens.dedup_by_key(|t| t.range.start);
    tokens
}

/// Delta-encode tokens sorted by position.
///
/// Tokens spanning several lines are skipped.
pub fn encode(tokens: &[TokenSpan]) -> Vec<SemanticToken> {
    let mut data = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in tokens {
        let start = token.range.start_position();
        let end = token.range.end_position();
        if start.line != end.line {
            tracing::debug!("Skipping multi-line token at {}", token.range);
            continue;
        }

        let delta_line = start.line.saturating_sub(prev_line);
        let delta_start = if delta_line == 0 {
            start.column.saturating_sub(prev_start)
        } else {
            start.column
        };

        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: end.column - start.column,
            token_type: token.kind as u32,
            token_modifiers_bitset: token.modifiers,
        });

        prev_line = start.line;
        prev_start = start.column;
    }
    data
}

/// How an expression is used by its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Value,
    Callee,
}

struct TokenCollector<'a> {
    ast: &'a Ast,
    file: SourceFile,
    tokens: Vec<TokenSpan>,
    /// Whether declarations are members of a type.
    in_type: bool,
    /// Whether variables are bound by `let`.
    readonly: bool,
}

impl TokenCollector<'_> {
    fn emit(&mut self, range: &SourceRange, kind: TokenKind, modifiers: u32) {
        if range.file != self.file || range.is_empty() {
            return;
        }
        self.tokens.push(TokenSpan {
            range: range.clone(),
            kind,
            modifiers,
        });
    }

    fn keyword(&mut self, range: &SourceRange) {
        self.emit(range, TokenKind::Keyword, 0);
    }

    fn declared(&mut self, identifier: &Identifier, kind: TokenKind) {
        self.emit(&identifier.site, kind, token_modifier::DECLARATION);
    }

    fn nodes(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.node(id, Role::Value);
        }
    }

    /// Visit `ids` with `in_type` set as given.
    fn scoped(&mut self, ids: &[NodeId], in_type: bool) {
        let saved = std::mem::replace(&mut self.in_type, in_type);
        self.nodes(ids);
        self.in_type = saved;
    }

    fn member_kind(&self, member: TokenKind, free: TokenKind) -> TokenKind {
        if self.in_type {
            member
        } else {
            free
        }
    }

    fn comments(&mut self) {
        for span in orca_parser::lexer::comments(self.file.text()) {
            let range = SourceRange::new(self.file.clone(), span.start, span.end);
            self.emit(&range, TokenKind::Comment, 0);
        }
    }

    fn node(&mut self, id: NodeId, role: Role) {
        let ast = self.ast;
        let node = &ast[id];
        match &node.kind {
            NodeKind::Module(m) => self.nodes(&m.units),
            NodeKind::TranslationUnit(u) => self.scoped(&u.decls, false),
            NodeKind::Namespace(d) => {
                self.keyword(&d.introducer);
                self.declared(&d.identifier, TokenKind::Namespace);
                self.scoped(&d.members, false);
            }
            NodeKind::ProductType(d) => {
                self.keyword(&d.introducer);
                self.declared(&d.identifier, TokenKind::Type);
                self.nodes(&d.generics);
                self.scoped(&d.members, true);
            }
            NodeKind::Extension(d) => {
                self.keyword(&d.introducer);
                self.node(d.subject, Role::Value);
                self.scoped(&d.members, true);
            }
            NodeKind::Conformance(d) => {
                self.keyword(&d.introducer);
                self.node(d.subject, Role::Value);
                self.nodes(&d.conformances);
                self.scoped(&d.members, true);
            }
            NodeKind::Trait(d) => {
                self.keyword(&d.introducer);
                self.declared(&d.identifier, TokenKind::Type);
                self.scoped(&d.members, true);
            }
            NodeKind::AssociatedType(d) => {
                self.keyword(&d.introducer);
                self.declared(&d.identifier, TokenKind::TypeParameter);
            }
            NodeKind::TypeAlias(d) => {
                self.keyword(&d.introducer);
                self.declared(&d.identifier, TokenKind::Type);
                self.node(d.aliased, Role::Value);
            }
            NodeKind::Operator(d) => {
                self.keyword(&d.introducer);
                self.emit(&d.notation_site, TokenKind::Modifier, 0);
                self.declared(&d.identifier, TokenKind::Operator);
            }
            NodeKind::Function(d) => {
                self.keyword(&d.introducer);
                let kind = self.member_kind(TokenKind::Method, TokenKind::Function);
                self.declared(&d.identifier, kind);
                let signature: Vec<_> = d
                    .generics
                    .iter()
                    .chain(&d.parameters)
                    .chain(&d.output)
                    .chain(&d.body)
                    .copied()
                    .collect();
                self.scoped(&signature, false);
            }
            NodeKind::Method(d) => {
                self.keyword(&d.introducer);
                self.declared(&d.identifier, TokenKind::Method);
                let signature: Vec<_> = d
                    .generics
                    .iter()
                    .chain(&d.parameters)
                    .chain(&d.output)
                    .chain(&d.impls)
                    .copied()
                    .collect();
                self.scoped(&signature, false);
            }
            NodeKind::MethodImpl(d) => {
                self.emit(&d.introducer, TokenKind::Modifier, 0);
                self.node(d.body, Role::Value);
            }
            NodeKind::Initializer(d) => {
                self.keyword(&d.introducer);
                let signature: Vec<_> = d.parameters.iter().chain(&d.body).copied().collect();
                self.scoped(&signature, false);
            }
            NodeKind::Subscript(d) => {
                self.keyword(&d.introducer);
                if let Some(identifier) = &d.identifier {
                    self.declared(identifier, TokenKind::Method);
                }
                let signature: Vec<_> = d
                    .parameters
                    .iter()
                    .chain(std::iter::once(&d.output))
                    .chain(&d.body)
                    .copied()
                    .collect();
                self.scoped(&signature, false);
            }
            NodeKind::Binding(d) => {
                self.node(d.pattern, Role::Value);
                if let Some(initializer) = d.initializer {
                    self.node(initializer, Role::Value);
                }
            }
            NodeKind::BindingPattern(p) => {
                self.keyword(&p.introducer);
                let saved = std::mem::replace(&mut self.readonly, p.kind == BindingIntroducer::Let);
                self.node(p.subpattern, Role::Value);
                self.readonly = saved;
                if let Some(annotation) = p.annotation {
                    self.node(annotation, Role::Value);
                }
            }
            NodeKind::NamePattern(p) => self.node(p.var, Role::Value),
            NodeKind::TuplePattern(p) => self.nodes(&p.elements),
            NodeKind::Var(v) => {
                let kind = self.member_kind(TokenKind::Property, TokenKind::Variable);
                let readonly = if self.readonly {
                    token_modifier::READONLY
                } else {
                    0
                };
                self.emit(
                    &v.identifier.site,
                    kind,
                    token_modifier::DECLARATION | readonly,
                );
            }
            NodeKind::Parameter(d) => {
                self.declared(&d.identifier, TokenKind::Parameter);
                if let Some(annotation) = d.annotation {
                    self.node(annotation, Role::Value);
                }
            }
            NodeKind::GenericParameter(d) => self.declared(&d.identifier, TokenKind::TypeParameter),
            NodeKind::IntegerLiteral(_) | NodeKind::FloatLiteral(_) => {
                self.emit(&node.site, TokenKind::Number, 0);
            }
            NodeKind::StringLiteral(_) => self.emit(&node.site, TokenKind::String, 0),
            NodeKind::BooleanLiteral(_) => self.keyword(&node.site),
            NodeKind::Name(e) => {
                if let Some(domain) = e.domain {
                    self.node(domain, Role::Value);
                }
                let kind = match (e.name.value.as_str(), role, e.domain.is_some()) {
                    ("self", _, false) => TokenKind::Keyword,
                    (_, Role::Callee, true) => TokenKind::Method,
                    (_, Role::Callee, false) => TokenKind::Function,
                    (_, Role::Value, true) => TokenKind::Property,
                    (_, Role::Value, false) => TokenKind::Variable,
                };
                self.emit(&e.name.site, kind, 0);
            }
            NodeKind::Call(e) | NodeKind::SubscriptCall(e) => {
                let callee_role = if matches!(node.kind, NodeKind::Call(_)) {
                    Role::Callee
                } else {
                    Role::Value
                };
                self.node(e.callee, callee_role);
                for argument in &e.arguments {
                    if let Some(label) = &argument.label {
                        self.emit(&label.site, TokenKind::Label, 0);
                    }
                    self.node(argument.value, Role::Value);
                }
            }
            NodeKind::Infix(e) => {
                self.node(e.lhs, Role::Value);
                self.emit(&e.operator.site, TokenKind::Operator, 0);
                self.node(e.rhs, Role::Value);
            }
            NodeKind::Tuple(e) => self.nodes(&e.elements),
            NodeKind::NameType(t) => {
                let kind = if t.name.value == "Self" {
                    TokenKind::Keyword
                } else {
                    TokenKind::Type
                };
                self.emit(&t.name.site, kind, 0);
            }
            NodeKind::TupleType(t) => self.nodes(&t.elements),
            NodeKind::Brace(s) => self.scoped(&s.stmts, false),
            NodeKind::Return(s) => {
                self.keyword(&s.introducer);
                if let Some(value) = s.value {
                    self.node(value, Role::Value);
                }
            }
            NodeKind::ExprStmt(s) => self.node(s.expr, Role::Value),
            NodeKind::Assign(s) => {
                self.node(s.lhs, Role::Value);
                self.node(s.rhs, Role::Value);
            }
            NodeKind::While(s) => {
                self.keyword(&s.introducer);
                self.node(s.condition, Role::Value);
                self.node(s.body, Role::Value);
            }
            NodeKind::If(s) => {
                self.keyword(&s.introducer);
                self.node(s.condition, Role::Value);
                self.node(s.success, Role::Value);
                if let Some(introducer) = &s.else_introducer {
                    self.keyword(introducer);
                }
                if let Some(failure) = s.failure {
                    self.node(failure, Role::Value);
                }
            }
            NodeKind::DeclStmt(s) => self.node(s.decl, Role::Value),
            NodeKind::Wildcard => {
                tracing::debug!("No semantic token for {}", node.kind.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::LineColumn;
    use orca_parser::parse_module;
    use proptest::prelude::*;
    use std::sync::Arc;

    const URI: &str = "file:///main.orca";

    fn tokens(text: &str) -> Vec<TokenSpan> {
        let file = SourceFile::new(URI, text);
        let ast = parse_module(Arc::new(Ast::new()), "main", &[file]).unwrap();
        compute_semantic_tokens(&ast, URI)
    }

    fn classified(text: &str) -> Vec<(String, TokenKind)> {
        tokens(text)
            .into_iter()
            .map(|t| (t.range.text().to_string(), t.kind))
            .collect()
    }

    #[test]
    fn test_legend_matches_token_kinds() {
        assert_eq!(TOKEN_TYPES.len(), TokenKind::Label as usize + 1);
        assert_eq!(
            TOKEN_TYPES[TokenKind::Keyword as usize],
            SemanticTokenType::KEYWORD
        );
        assert_eq!(TOKEN_TYPES[TokenKind::Label as usize].as_str(), "label");
    }

    #[test]
    fn test_binding_tokens() {
        use TokenKind::{Keyword, Number, Variable};
        assert_eq!(
            classified("let x = 1"),
            vec![
                ("let".to_string(), Keyword),
                ("x".to_string(), Variable),
                ("1".to_string(), Number),
            ]
        );
        let x = &tokens("let x = 1")[1];
        assert_eq!(
            x.modifiers,
            token_modifier::DECLARATION | token_modifier::READONLY
        );
    }

    #[test]
    fn test_comment_tokens() {
        use TokenKind::{Comment, Keyword, Number, Variable};
        assert_eq!(
            classified("// answer\nlet x = 42 // why"),
            vec![
                ("// answer".to_string(), Comment),
                ("let".to_string(), Keyword),
                ("x".to_string(), Variable),
                ("42".to_string(), Number),
                ("// why".to_string(), Comment),
            ]
        );
    }

    #[test]
    fn test_function_tokens() {
        use TokenKind::{Function, Keyword, Label, Number, Operator, Parameter, Type, Variable};
        let source = "fun scale(factor: Float) -> Float { return factor * 2.0 }
let y = scale(factor: 1.5)";
        let expected = vec![
            ("fun", Keyword),
            ("scale", Function),
            ("factor", Parameter),
            ("Float", Type),
            ("Float", Type),
            ("return", Keyword),
            ("factor", Variable),
            ("*", Operator),
            ("2.0", Number),
            ("let", Keyword),
            ("y", Variable),
            ("scale", Function),
            ("factor", Label),
            ("1.5", Number),
        ];
        let actual = classified(source);
        let actual: Vec<_> = actual.iter().map(|(t, k)| (t.as_str(), *k)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_member_tokens() {
        let source = "type P {
            var x: Int
            fun get() -> Int { let { return self.x } inout { return x } }
        }
        fun f(p: P) -> Int { return p.get() }";
        let tokens = classified(source);
        assert!(tokens.contains(&("P".to_string(), TokenKind::Type)));
        assert!(tokens.contains(&("x".to_string(), TokenKind::Property)));
        assert!(tokens.contains(&("get".to_string(), TokenKind::Method)));
        assert!(tokens.contains(&("self".to_string(), TokenKind::Keyword)));
        assert!(tokens.contains(&("inout".to_string(), TokenKind::Modifier)));
    }

    #[test]
    fn test_tokens_are_in_source_order() {
        let source = "namespace N { type T<G> { let a: G; let b: Int } }
operator infix +
trait Q { type A; fun f() -> A }
fun g(n: Int) -> Bool {
    var i = 0
    while i < n { i = i + 1 }
    if i == n { return true } else { return false }
}";
        let tokens = tokens(source);
        assert!(!tokens.is_empty());
        let starts: Vec<LineColumn> = tokens.iter().map(|t| t.range.start_position()).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_encoding() {
        let file = SourceFile::new(URI, "let x = 1\n  let yy = x");
        let span = |start, end, kind| TokenSpan {
            range: SourceRange::new(file.clone(), start, end),
            kind,
            modifiers: 0,
        };
        let encoded = encode(&[
            span(0, 3, TokenKind::Keyword),
            span(4, 5, TokenKind::Variable),
            span(12, 15, TokenKind::Keyword),
            span(16, 18, TokenKind::Variable),
        ]);
        let deltas: Vec<_> = encoded
            .iter()
            .map(|t| (t.delta_line, t.delta_start, t.length, t.token_type))
            .collect();
        assert_eq!(
            deltas,
            vec![(0, 0, 3, 8), (0, 4, 1, 4), (1, 2, 3, 8), (0, 4, 2, 4)]
        );
    }

    #[test]
    fn test_other_documents_have_no_tokens() {
        let file = SourceFile::new(URI, "let x = 1");
        let ast = parse_module(Arc::new(Ast::new()), "main", &[file]).unwrap();
        assert!(handle_semantic_tokens(&ast, "file:///other.orca").is_none());
        assert!(handle_semantic_tokens(&ast, URI).is_some());
    }

    proptest! {
        #[test]
        fn prop_deltas_accumulate_to_positions(
            mut positions in prop::collection::vec((0u32..40, 0u32..60), 0..50)
        ) {
            positions.sort_unstable();
            positions.dedup();
            let line = "x".repeat(70);
            let text = vec![line; 40].join("\n");
            let file = SourceFile::new(URI, text);
            let spans: Vec<_> = positions
                .iter()
                .map(|&(l, c)| {
                    let start = file.offset(LineColumn::new(l, c)).unwrap();
                    TokenSpan {
                        range: SourceRange::new(file.clone(), start, start + 3),
                        kind: TokenKind::Variable,
                        modifiers: 0,
                    }
                })
                .collect();

            let (mut line, mut column) = (0, 0);
            let mut decoded = Vec::new();
            for token in encode(&spans) {
                line += token.delta_line;
                column = if token.delta_line == 0 { column + token.delta_start } else { token.delta_start };
                decoded.push((line, column));
                prop_assert_eq!(token.length, 3);
            }
            prop_assert_eq!(decoded, positions);
        }
    }
}
