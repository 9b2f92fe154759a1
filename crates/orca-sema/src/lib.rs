//! Type checking for orca.
//!
//! This crate resolves every name of a program to its declaration and infers
//! the types of expressions:
//!
//! - Scoped lookup through blocks, types, namespaces and modules
//! - Member access, including members added by extensions
//! - Constructor calls through explicit or memberwise initializers
//! - Built-in types, functions and operators
//!
//! # Error Codes
//!
//! | Code | Description |
//! |------|-------------|
//! | E1001 | Undefined name |
//! | E1002 | Undefined member |
//! | E1003 | Type mismatch |
//! | E1004 | Wrong number of arguments |
//! | E1005 | Not callable |
//! | E1006 | Duplicate declaration |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod checker;
mod error;
mod scope;

pub use error::ErrorCode;

use orca_core::{Ast, DiagnosticSet, TypedProgram};
use std::sync::Arc;
use tracing::debug;

use crate::checker::Checker;

/// Type check every module of `ast`.
///
/// Translation units inherited from a base AST contribute their declarations
/// but their bodies are assumed to have been checked already.
pub fn type_check(ast: Arc<Ast>) -> Result<TypedProgram, DiagnosticSet> {
    let mut checker = Checker::new(&ast);
    checker.check_program();
    let (references, types, diagnostics) = checker.finish();

    if diagnostics.contains_error() {
        debug!(errors = diagnostics.len(), "type checking failed");
        return Err(diagnostics);
    }
    debug!(references = references.len(), "type checking succeeded");
    Ok(TypedProgram::new(ast, references, types))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::ast::Walk;
    use orca_core::{BuiltinType, DeclReference, NodeId, NodeKind, SourceFile, Type};
    use orca_parser::parse_module;

    fn parse(text: &str) -> Ast {
        let file = SourceFile::new("file:///main.orca", text);
        parse_module(Arc::new(Ast::new()), "main", &[file]).unwrap()
    }

    fn check(text: &str) -> Result<TypedProgram, DiagnosticSet> {
        type_check(Arc::new(parse(text)))
    }

    /// Every name expression spelled `name`, in source order.
    fn names(ast: &Ast, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        for unit in ast.translation_units() {
            ast.walk(unit, &mut |id, node| {
                if let NodeKind::Name(n) = &node.kind {
                    if n.name.value == name {
                        found.push(id);
                    }
                }
                Walk::Continue
            });
        }
        found
    }

    fn referenced_kind(program: &TypedProgram, reference: &DeclReference) -> &'static str {
        match reference {
            DeclReference::Direct(d) | DeclReference::Member(d) | DeclReference::Constructor(d) => {
                program.ast().kind(*d).name()
            }
            DeclReference::Builtin(_) => "builtin",
        }
    }

    #[test]
    fn test_resolves_functions_and_parameters() {
        let program =
            check("fun double(n: Int) -> Int { return n * 2 }\nlet x = double(21)").unwrap();
        let ast = program.ast().clone();

        let call = names(&ast, "double")[0];
        let reference = program.reference(call).unwrap();
        assert!(matches!(reference, DeclReference::Direct(_)));
        assert_eq!(referenced_kind(&program, reference), "function");

        let n = names(&ast, "n")[0];
        assert_eq!(
            referenced_kind(&program, program.reference(n).unwrap()),
            "parameter"
        );
        assert_eq!(program.type_of(n), Some(&Type::Builtin(BuiltinType::Int)));
    }

    #[test]
    fn test_constructor_reference_targets_memberwise_init() {
        let program =
            check("type Point { let x: Int; let y: Int }\nlet p = Point(1, 2)\nlet q = p.x").unwrap();
        let ast = program.ast().clone();

        let callee = names(&ast, "Point")[0];
        let Some(DeclReference::Constructor(init)) = program.reference(callee) else {
            panic!("expected a constructor reference");
        };
        assert!(ast.site(*init).is_synthesized());

        let member = names(&ast, "x")[0];
        let Some(DeclReference::Member(var)) = program.reference(member) else {
            panic!("expected a member reference");
        };
        assert_eq!(ast.site(*var).text(), "x");
    }

    #[test]
    fn test_builtins() {
        let program = check("fun main() { print(1 + 2) }").unwrap();
        let ast = program.ast().clone();
        let print = names(&ast, "print")[0];
        assert_eq!(
            program.reference(print),
            Some(&DeclReference::Builtin("print".to_string()))
        );
        assert!(program.reference_count() >= 2);
    }

    #[test]
    fn test_undefined_name() {
        let diagnostics = check("let x = 1\nlet z = y").unwrap_err();
        let error = diagnostics.iter().find(|d| d.code == "E1001").unwrap();
        assert_eq!(error.site.text(), "y");
    }

    #[test]
    fn test_type_mismatch() {
        let diagnostics = check("let x: Int = true").unwrap_err();
        let error = diagnostics.iter().next().unwrap();
        assert_eq!(error.code, "E1003");
        assert_eq!(error.site.text(), "true");
    }

    #[test]
    fn test_arity_and_callability() {
        let diagnostics = check("fun f(a: Int) {}\nlet y = f(1, 2)").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.code == "E1004"));

        let diagnostics = check("let a = 1\nlet b = a(2)").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.code == "E1005"));
    }

    #[test]
    fn test_undefined_member() {
        let diagnostics = check("type P { var x: Int }\nfun f(p: P) -> Int { return p.y }").unwrap_err();
        let error = diagnostics.iter().find(|d| d.code == "E1002").unwrap();
        assert_eq!(error.site.text(), "y");
    }

    #[test]
    fn test_members_and_self() {
        let source = "type Counter {
            var n: Int
            fun value() -> Int {
                let { return n }
                inout { self.n = n + 1; return self.n }
            }
        }
        extension Counter { fun twice() -> Int { return value() * 2 } }
        fun use(c: Counter) -> Int { return c.twice() }";
        let program = check(source).unwrap();
        let ast = program.ast().clone();

        let value = names(&ast, "value")[0];
        let Some(DeclReference::Member(method)) = program.reference(value) else {
            panic!("expected a member reference");
        };
        assert!(matches!(ast.kind(*method), NodeKind::Method(_)));

        let twice = names(&ast, "twice")[0];
        assert!(matches!(
            program.reference(twice),
            Some(DeclReference::Member(_))
        ));
    }

    #[test]
    fn test_locals_shadow_and_scope() {
        let source = "let x = 1
        fun f() -> Bool {
            let x = true
            if x { let y = 2 }
            return x
        }";
        let program = check(source).unwrap();
        let ast = program.ast().clone();
        let uses = names(&ast, "x");
        assert_eq!(uses.len(), 2);
        assert!(uses
            .iter()
            .all(|&u| program.type_of(u) == Some(&Type::Builtin(BuiltinType::Bool))));

        let diagnostics = check("fun f() { if true { let y = 2 }\nprint(y) }").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.code == "E1001"));
    }

    #[test]
    fn test_namespaces_and_aliases() {
        let source = "namespace Geometry { let origin = 0 }
        typealias Count = Int
        let o: Count = Geometry.origin";
        let program = check(source).unwrap();
        let ast = program.ast().clone();
        let origin = names(&ast, "origin")[0];
        assert!(matches!(
            program.reference(origin),
            Some(DeclReference::Direct(_))
        ));
    }

    #[test]
    fn test_library_bodies_are_not_rechecked() {
        let library = Arc::new(parse(
            "fun answer() -> Int { return 42 }\nfun broken() -> Int { return true }",
        ));
        let file = SourceFile::new("file:///doc.orca", "let x: Int = answer()");
        let ast = parse_module(library.clone(), "doc", &[file]).unwrap();
        let program = type_check(Arc::new(ast)).unwrap();

        let call = names(program.ast(), "answer")[0];
        let Some(DeclReference::Direct(answer)) = program.reference(call) else {
            panic!("expected a direct reference");
        };
        assert!(program.ast().is_inherited(*answer));

        assert!(type_check(library).is_err());
    }

    #[test]
    fn test_duplicates_fail_checking() {
        let diagnostics = check("type A {}\ntype A {}").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.code == "E1006"));
    }
}
