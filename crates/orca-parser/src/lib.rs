//! Orca parser using Logos and chumsky parser combinators.
//!
//! Source text is tokenized by a Logos lexer, parsed into a surface syntax
//! tree by a chumsky parser over the token slice, and lowered into the node
//! arena of [`orca_core::Ast`].
//!
//! # Example
//!
//! ```ignore
//! use orca_core::{Ast, SourceFile};
//! use orca_parser::parse_module;
//! use std::sync::Arc;
//!
//! let file = SourceFile::new("file:///main.orca", "let x = 1");
//! let ast = parse_module(Arc::new(Ast::new()), "main", &[file])?;
//! assert_eq!(ast.modules().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod lexer;
mod library;
mod lower;
mod parser;
mod syntax;

pub use error::{LibraryError, ParseError, ParseErrorKind};
pub use library::{
    collect_source_paths, load_sources, parse_library, LIBRARY_MARKER, LIBRARY_MODULE,
    SOURCE_EXTENSION,
};

use chumsky::Parser;
use orca_core::ast::ModuleDecl;
use orca_core::{Ast, DiagnosticSet, NodeId, NodeKind, SourceFile, SourceRange};
use std::sync::Arc;

use crate::lexer::Token;
use crate::lower::Lowerer;
use crate::parser::{file_parser, index_to_byte_span, make_tokens};

/// Parse `file` and append its translation unit to `ast`.
///
/// On failure `ast` is left unchanged.
pub fn parse_translation_unit(ast: &mut Ast, file: &SourceFile) -> Result<NodeId, DiagnosticSet> {
    let tokens = make_tokens(file.text());

    let mut errors: Vec<ParseError> = tokens
        .iter()
        .filter(|t| t.token == Token::Error)
        .map(|t| {
            let text = &file.text()[t.span.0..t.span.1];
            ParseError::new(ParseErrorKind::InvalidCharacter(text.to_string()), t.span)
        })
        .collect();

    let (decls, errs) = file_parser()
        .parse(tokens.as_slice())
        .into_output_errors();

    for e in errs {
        // Filtered matchers leave `found` unset, so classify by position.
        let kind = match tokens.get(e.span().start) {
            // Already reported by the lexer.
            Some(t) if t.token == Token::Error => continue,
            Some(t) => ParseErrorKind::UnexpectedToken(t.token.to_string()),
            None => ParseErrorKind::UnexpectedEof,
        };
        let span = index_to_byte_span(&tokens, e.span().start, e.span().end);
        errors.push(ParseError::new(kind, span));
    }

    match decls {
        Some(decls) if errors.is_empty() => {
            Ok(Lowerer::new(ast, file.clone(), &tokens).translation_unit(&decls))
        }
        _ => Err(errors.into_iter().map(|e| e.into_diagnostic(file)).collect()),
    }
}

/// Parse `files` into a new module named `name`, in an AST extending `base`.
///
/// `base` is not modified. Diagnostics of all files are reported together.
pub fn parse_module(
    base: Arc<Ast>,
    name: &str,
    files: &[SourceFile],
) -> Result<Ast, DiagnosticSet> {
    let mut ast = Ast::extending(base);
    let mut diagnostics = DiagnosticSet::new();
    let mut units = Vec::with_capacity(files.len());

    for file in files {
        match parse_translation_unit(&mut ast, file) {
            Ok(unit) => units.push(unit),
            Err(errors) => diagnostics.extend(errors),
        }
    }

    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let module = ast.insert(
        NodeKind::Module(ModuleDecl {
            name: name.to_string(),
            units,
        }),
        SourceRange::synthesized(),
    );
    ast.add_module(module);
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::ast::Walk;

    fn parse(text: &str) -> Result<Ast, DiagnosticSet> {
        let file = SourceFile::new("file:///main.orca", text);
        parse_module(Arc::new(Ast::new()), "main", &[file])
    }

    #[test]
    fn test_binding_sites() {
        let ast = parse("let x = 1").unwrap();
        let unit = ast.translation_units().next().unwrap();
        let NodeKind::TranslationUnit(tu) = ast.kind(unit) else {
            panic!("expected a translation unit");
        };
        let binding = tu.decls[0];
        assert_eq!(ast.site(binding).text(), "let x = 1");

        let mut vars = Vec::new();
        ast.walk(binding, &mut |_, node| {
            if let NodeKind::Var(v) = &node.kind {
                vars.push((v.identifier.value.clone(), node.site.text().to_string()));
            }
            Walk::Continue
        });
        assert_eq!(vars, vec![("x".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_memberwise_init_is_synthesized() {
        let ast = parse("type Point { let x: Int; let y: Int }").unwrap();
        let unit = ast.translation_units().next().unwrap();
        let NodeKind::TranslationUnit(tu) = ast.kind(unit) else {
            panic!("expected a translation unit");
        };
        let NodeKind::ProductType(point) = ast.kind(tu.decls[0]) else {
            panic!("expected a product type");
        };
        let init = point.memberwise_init.unwrap();
        assert!(ast.site(init).is_synthesized());
        let NodeKind::Initializer(init) = ast.kind(init) else {
            panic!("expected an initializer");
        };
        assert!(init.is_memberwise);
        let names: Vec<_> = init
            .parameters
            .iter()
            .filter_map(|&p| ast.kind(p).identifier().map(|i| i.value.clone()))
            .collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_explicit_init_suppresses_memberwise_init() {
        let ast = parse("type Unit { init() {} }").unwrap();
        let unit = ast.translation_units().next().unwrap();
        let NodeKind::TranslationUnit(tu) = ast.kind(unit) else {
            panic!("expected a translation unit");
        };
        let NodeKind::ProductType(ty) = ast.kind(tu.decls[0]) else {
            panic!("expected a product type");
        };
        assert!(ty.memberwise_init.is_none());
    }

    #[test]
    fn test_errors_are_diagnostics() {
        let diagnostics = parse("let = 1\n").unwrap_err();
        let first = diagnostics.iter().next().unwrap();
        assert_eq!(first.code, "P0001");
        assert_eq!(first.site.text(), "=");

        let diagnostics = parse("let x = 1\nlet = 2\nlet y = 3").unwrap_err();
        let first = diagnostics.iter().next().unwrap();
        assert_eq!(first.code, "P0001");
        assert_eq!(first.site.text(), "=");
        assert_eq!(first.site.start_position().line, 1);

        let diagnostics = parse("let x = (1").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.code == "P0002"));

        let diagnostics = parse("let x = 1 # 2").unwrap_err();
        assert!(diagnostics.iter().all(|d| d.code == "P0003"));
    }

    #[test]
    fn test_module_extends_base() {
        let library = Arc::new(parse("fun answer() -> Int { return 42 }").unwrap());
        let file = SourceFile::new("file:///main.orca", "let x = answer()");
        let ast = parse_module(library.clone(), "main", &[file]).unwrap();

        assert_eq!(ast.modules().len(), 2);
        assert_eq!(library.modules().len(), 1);
        assert!(ast.len() > library.len());
        assert_eq!(ast.translation_units().count(), 2);
    }
}
