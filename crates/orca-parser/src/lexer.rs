//! Lexer for orca source, generated by Logos.

use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Token types produced by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token<'src> {
    /// A line comment, `//` included.
    /// Priority 10 beats `Op` on a bare `//`.
    #[regex(r"//[^\n]*", priority = 10)]
    Comment(&'src str),

    // ===== Literals =====
    /// A floating point literal like `4.25`.
    #[regex(r"[0-9]+\.[0-9]+")]
    Float(&'src str),

    /// An integer literal.
    #[regex(r"[0-9]+")]
    Int(&'src str),

    /// A double-quoted string, quotes included.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String(&'src str),

    // ===== Keywords =====
    /// `namespace`
    #[token("namespace")]
    Namespace,
    /// `type`
    #[token("type")]
    Type,
    /// `extension`
    #[token("extension")]
    Extension,
    /// `conformance`
    #[token("conformance")]
    Conformance,
    /// `trait`
    #[token("trait")]
    Trait,
    /// `typealias`
    #[token("typealias")]
    TypeAlias,
    /// `operator`
    #[token("operator")]
    Operator,
    /// `fun`
    #[token("fun")]
    Fun,
    /// `init`
    #[token("init")]
    Init,
    /// `subscript`
    #[token("subscript")]
    Subscript,
    /// `let`
    #[token("let")]
    Let,
    /// `var`
    #[token("var")]
    Var,
    /// `inout`
    #[token("inout")]
    Inout,
    /// `sink`
    #[token("sink")]
    Sink,
    /// `set`
    #[token("set")]
    Set,
    /// `return`
    #[token("return")]
    Return,
    /// `while`
    #[token("while")]
    While,
    /// `if`
    #[token("if")]
    If,
    /// `else`
    #[token("else")]
    Else,
    /// `true`
    #[token("true")]
    True,
    /// `false`
    #[token("false")]
    False,
    /// `self`
    #[token("self")]
    SelfValue,
    /// `_`
    #[token("_", priority = 3)]
    Underscore,

    // ===== Punctuation =====
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `,`
    #[token(",")]
    Comma,
    /// `:`
    #[token(":")]
    Colon,
    /// `;`
    #[token(";")]
    Semi,
    /// `.`
    #[token(".")]
    Dot,
    /// `->`
    #[token("->", priority = 10)]
    Arrow,
    /// `=`
    #[token("=", priority = 10)]
    Assign,

    /// Any other operator, e.g. `+`, `==`, `&&`.
    /// Lowest priority: `=`, `->` and `//` take precedence on equal length.
    #[regex(r"[-+*/%<>=!&|^~]+", priority = 1)]
    Op(&'src str),

    /// An identifier.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'src str),

    /// A character the lexer does not recognize.
    Error,
}

impl Token<'_> {
    /// Whether this token introduces a binding (`let`, `var`, `inout`, `sink`).
    pub const fn is_binding_introducer(&self) -> bool {
        matches!(self, Self::Let | Self::Var | Self::Inout | Self::Sink)
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Comment(s)
            | Self::Float(s)
            | Self::Int(s)
            | Self::String(s)
            | Self::Op(s)
            | Self::Ident(s) => s,
            Self::Namespace => "namespace",
            Self::Type => "type",
            Self::Extension => "extension",
            Self::Conformance => "conformance",
            Self::Trait => "trait",
            Self::TypeAlias => "typealias",
            Self::Operator => "operator",
            Self::Fun => "fun",
            Self::Init => "init",
            Self::Subscript => "subscript",
            Self::Let => "let",
            Self::Var => "var",
            Self::Inout => "inout",
            Self::Sink => "sink",
            Self::Set => "set",
            Self::Return => "return",
            Self::While => "while",
            Self::If => "if",
            Self::Else => "else",
            Self::True => "true",
            Self::False => "false",
            Self::SelfValue => "self",
            Self::Underscore => "_",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Semi => ";",
            Self::Dot => ".",
            Self::Arrow => "->",
            Self::Assign => "=",
            Self::Error => "<error>",
        };
        f.write_str(text)
    }
}

/// Tokenize source code into a vector of (token, byte range) pairs.
///
/// Comments are dropped. Unrecognized characters produce [`Token::Error`] so
/// that the parser reports them at the right place.
pub fn tokenize(source: &str) -> Vec<(Token<'_>, Range<usize>)> {
    lex(source)
        .filter(|(token, _)| !matches!(token, Token::Comment(_)))
        .collect()
}

/// The byte ranges of the comments in `source`.
pub fn comments(source: &str) -> Vec<Range<usize>> {
    lex(source)
        .filter_map(|(token, span)| matches!(token, Token::Comment(_)).then_some(span))
        .collect()
}

fn lex(source: &str) -> impl Iterator<Item = (Token<'_>, Range<usize>)> {
    let mut lexer = Token::lexer(source);
    std::iter::from_fn(move || {
        let result = lexer.next()?;
        let span = lexer.span();
        Some((result.unwrap_or(Token::Error), span))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token<'_>> {
        tokenize(source).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenize_binding() {
        assert_eq!(
            kinds("let x = 1"),
            vec![Token::Let, Token::Ident("x"), Token::Assign, Token::Int("1")]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("1.5 42"), vec![Token::Float("1.5"), Token::Int("42")]);
        assert_eq!(
            kinds("p.x"),
            vec![Token::Ident("p"), Token::Dot, Token::Ident("x")]
        );
    }

    #[test]
    fn test_tokenize_operators_prefer_longest_match() {
        assert_eq!(
            kinds("a == b -> c = d"),
            vec![
                Token::Ident("a"),
                Token::Op("=="),
                Token::Ident("b"),
                Token::Arrow,
                Token::Ident("c"),
                Token::Assign,
                Token::Ident("d"),
            ]
        );
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        assert_eq!(
            kinds("fun funny self selfish _ _x"),
            vec![
                Token::Fun,
                Token::Ident("funny"),
                Token::SelfValue,
                Token::Ident("selfish"),
                Token::Underscore,
                Token::Ident("_x"),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("let // note\nx");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1], (Token::Ident("x"), 12..13));
    }

    #[test]
    fn test_comments_are_collected() {
        let source = "let x = 1 // one\n//\nlet s = \"// not a comment\"";
        let spans = comments(source);
        assert_eq!(spans.len(), 2);
        assert_eq!(&source[spans[0].clone()], "// one");
        assert_eq!(&source[spans[1].clone()], "//");
    }

    #[test]
    fn test_assign_and_arrow_are_not_operators() {
        assert_eq!(kinds("="), vec![Token::Assign]);
        assert_eq!(kinds("->"), vec![Token::Arrow]);
        assert_eq!(kinds("=>"), vec![Token::Op("=>")]);
        assert_eq!(kinds("a / b"), vec![Token::Ident("a"), Token::Op("/"), Token::Ident("b")]);
    }

    #[test]
    fn test_unknown_character_is_an_error_token() {
        assert_eq!(
            kinds("let # = 1"),
            vec![Token::Let, Token::Error, Token::Assign, Token::Int("1")]
        );
    }

    #[test]
    fn test_string_literal_keeps_quotes() {
        assert_eq!(kinds(r#""a \"b\"""#), vec![Token::String(r#""a \"b\"""#)]);
    }
}
