//! Position and document lookups in an AST.

use orca_core::ast::Walk;
use orca_core::{Ast, NodeId, NodeKind, SourcePosition};

/// Find the smallest node whose range covers `position`.
///
/// Modules are searched in order and the first module with a match wins.
/// Synthesized nodes are descended into but never returned. Among covering
/// nodes the one with the shortest range is kept; on equal lengths the
/// deeper or later node replaces the earlier one.
pub fn find_enclosing_node(ast: &Ast, position: &SourcePosition) -> Option<NodeId> {
    for &module in ast.modules() {
        let mut best: Option<(NodeId, usize)> = None;
        ast.walk(module, &mut |id, node| {
            let site = &node.site;
            if site.is_synthesized() {
                return Walk::Continue;
            }
            if site.file != position.file || site.start > position.offset {
                return Walk::SkipChildren;
            }
            if site.covers(position) && best.map_or(true, |(_, len)| site.len() <= len) {
                best = Some((id, site.len()));
            }
            Walk::Continue
        });
        if let Some((id, _)) = best {
            return Some(id);
        }
    }
    None
}

/// Find the translation unit of the file at `uri`.
///
/// URIs are compared as strings; callers pass canonical URIs.
pub fn find_translation_unit(ast: &Ast, uri: &str) -> Option<NodeId> {
    let mut found = None;
    for &module in ast.modules() {
        ast.walk(module, &mut |id, node| match &node.kind {
            NodeKind::Module(_) => Walk::Continue,
            NodeKind::TranslationUnit(_) if node.site.file.uri() == uri => {
                found = Some(id);
                Walk::Stop
            }
            _ => Walk::SkipChildren,
        });
        if found.is_some() {
            break;
        }
    }
    found
}
