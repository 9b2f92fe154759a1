//! Go-to-definition handler.
//!
//! Provides navigation from a position to the declaration it names:
//! - A declaration's own name → the declaration itself
//! - A name or type name → the declaration it resolves to
//! - A type used as a callee → the initializer it calls
//! - A call → whatever its callee resolves to

use lsp_types::{GotoDefinitionResponse, Position};
use orca_core::ast::Walk;
use orca_core::{Ast, DeclReference, NodeId, NodeKind, SourcePosition, SourceRange, TypedProgram};

use super::utils::{source_position, to_location};
use crate::query::find_enclosing_node;

/// Where a declaration is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// The whole declaration.
    pub range: SourceRange,
    /// The part of the declaration a cursor should be placed on.
    pub selection: SourceRange,
}

/// Handle a go-to-definition request.
pub fn handle_goto_definition(
    program: &TypedProgram,
    uri: &str,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let position = source_position(program.ast(), uri, position)?;
    let definition = resolve_definition(program, &position)?;
    let location = to_location(&definition.selection)?;
    Some(GotoDefinitionResponse::Scalar(location))
}

/// Resolve the declaration named at `position`.
pub fn resolve_definition(program: &TypedProgram, position: &SourcePosition) -> Option<Definition> {
    let ast = program.ast();
    let node = find_enclosing_node(ast, position)?;
    resolve_node(program, node)
}

fn resolve_node(program: &TypedProgram, node: NodeId) -> Option<Definition> {
    let ast = program.ast();
    let kind = ast.kind(node);
    if kind.is_declaration() {
        return Some(declaration(ast, node));
    }

    match kind {
        NodeKind::Call(call) | NodeKind::SubscriptCall(call) => {
            resolve_node(program, call.callee)
        }
        NodeKind::Name(_) | NodeKind::NameType(_) | NodeKind::Infix(_) => {
            match program.reference(node) {
                Some(DeclReference::Direct(decl) | DeclReference::Member(decl)) => {
                    Some(declaration(ast, *decl))
                }
                Some(DeclReference::Constructor(init)) => Some(initializer(ast, *init)),
                Some(DeclReference::Builtin(name)) => {
                    tracing::debug!("No definition for builtin {}", name);
                    None
                }
                None => {
                    tracing::debug!("Unresolved {} at {}", kind.name(), ast.site(node));
                    None
                }
            }
        }
        _ => None,
    }
}

/// The location of a declaration, selecting its name when it has one.
fn declaration(ast: &Ast, decl: NodeId) -> Definition {
    let node = &ast[decl];
    let selection = match &node.kind {
        NodeKind::Initializer(d) => &d.introducer,
        NodeKind::MethodImpl(d) => &d.introducer,
        NodeKind::Extension(d) => ast.site(d.subject),
        NodeKind::Conformance(d) => ast.site(d.subject),
        kind => kind.identifier().map_or(&node.site, |i| &i.site),
    };
    Definition {
        range: node.site.clone(),
        selection: selection.clone(),
    }
}

/// The location of an initializer.
///
/// A synthesized memberwise initializer has no source, so the type that
/// owns it stands in for it.
fn initializer(ast: &Ast, init: NodeId) -> Definition {
    if ast.site(init).is_synthesized() {
        if let Some(owner) = memberwise_owner(ast, init) {
            return declaration(ast, owner);
        }
    }
    declaration(ast, init)
}

/// The product type whose memberwise initializer is `init`.
fn memberwise_owner(ast: &Ast, init: NodeId) -> Option<NodeId> {
    let mut owner = None;
    for &module in ast.modules() {
        ast.walk(module, &mut |id, node| match &node.kind {
            NodeKind::ProductType(d) if d.memberwise_init == Some(init) => {
                owner = Some(id);
                Walk::Stop
            }
            _ => Walk::Continue,
        });
        if owner.is_some() {
            break;
        }
    }
    owner
}
