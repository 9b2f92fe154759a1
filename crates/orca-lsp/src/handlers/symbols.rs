//! Document symbols handler for the outline view.
//!
//! Lists the declarations of a document as a tree:
//! - Namespaces, types, extensions and traits with their members
//! - Functions, methods, initializers and subscripts
//! - One symbol per variable introduced by a binding

use lsp_types::{DocumentSymbol, DocumentSymbolResponse, SymbolKind};
use orca_core::ast::Walk;
use orca_core::{Ast, NodeId, NodeKind, SourceRange};

use super::utils::to_range;
use crate::query::find_translation_unit;

/// Handle a document symbols request.
pub fn handle_document_symbols(ast: &Ast, uri: &str) -> Option<DocumentSymbolResponse> {
    let symbols = list_document_symbols(ast, uri);
    if symbols.is_empty() {
        None
    } else {
        Some(DocumentSymbolResponse::Nested(symbols))
    }
}

/// The symbol tree of the document at `uri`.
pub fn list_document_symbols(ast: &Ast, uri: &str) -> Vec<DocumentSymbol> {
    let Some(unit) = find_translation_unit(ast, uri) else {
        return Vec::new();
    };
    match ast.kind(unit) {
        NodeKind::TranslationUnit(tu) => collect(ast, &tu.decls, false),
        _ => Vec::new(),
    }
}

fn collect(ast: &Ast, decls: &[NodeId], in_type: bool) -> Vec<DocumentSymbol> {
    let mut symbols = Vec::new();
    for &decl in decls {
        decl_symbols(ast, decl, in_type, &mut symbols);
    }
    symbols
}

/// Append the symbols of `decl` to `out`.
fn decl_symbols(ast: &Ast, decl: NodeId, in_type: bool, out: &mut Vec<DocumentSymbol>) {
    let site = ast.site(decl);
    if site.is_synthesized() {
        return;
    }

    let symbol = match ast.kind(decl) {
        NodeKind::Namespace(d) => Symbol::new(&d.identifier.value, SymbolKind::NAMESPACE, site)
            .selection(&d.identifier.site)
            .children(collect(ast, &d.members, false)),
        NodeKind::ProductType(d) => Symbol::new(&d.identifier.value, SymbolKind::STRUCT, site)
            .selection(&d.identifier.site)
            .children(collect(ast, &d.members, true)),
        NodeKind::Extension(d) => {
            let subject = ast.site(d.subject);
            Symbol::new(subject.text(), SymbolKind::NAMESPACE, site)
                .detail("extension")
                .selection(subject)
                .children(collect(ast, &d.members, true))
        }
        NodeKind::Conformance(d) => {
            let subject = ast.site(d.subject);
            let traits: Vec<_> = d.conformances.iter().map(|&c| ast.site(c).text()).collect();
            Symbol::new(
                &format!("{}: {}", subject.text(), traits.join(", ")),
                SymbolKind::NAMESPACE,
                site,
            )
            .detail("conformance")
            .selection(subject)
            .children(collect(ast, &d.members, true))
        }
        NodeKind::Trait(d) => Symbol::new(&d.identifier.value, SymbolKind::INTERFACE, site)
            .selection(&d.identifier.site)
            .children(collect(ast, &d.members, true)),
        NodeKind::AssociatedType(d) => {
            Symbol::new(&d.identifier.value, SymbolKind::TYPE_PARAMETER, site)
                .selection(&d.identifier.site)
        }
        NodeKind::TypeAlias(d) => Symbol::new(&d.identifier.value, SymbolKind::CLASS, site)
            .detail(ast.site(d.aliased).text())
            .selection(&d.identifier.site),
        NodeKind::Operator(d) => Symbol::new(&d.identifier.value, SymbolKind::OPERATOR, site)
            .detail(d.notation_site.text())
            .selection(&d.identifier.site),
        NodeKind::Function(d) => {
            let kind = if in_type {
                SymbolKind::METHOD
            } else {
                SymbolKind::FUNCTION
            };
            Symbol::new(&d.identifier.value, kind, site).selection(&d.identifier.site)
        }
        // Implementations of a method are not listed on their own.
        NodeKind::Method(d) => Symbol::new(&d.identifier.value, SymbolKind::METHOD, site)
            .selection(&d.identifier.site),
        NodeKind::Initializer(d) => {
            Symbol::new("init", SymbolKind::CONSTRUCTOR, site).selection(&d.introducer)
        }
        NodeKind::Subscript(d) => match &d.identifier {
            Some(identifier) => Symbol::new(&identifier.value, SymbolKind::METHOD, site)
                .detail("subscript")
                .selection(&identifier.site),
            None => Symbol::new("subscript", SymbolKind::METHOD, site).selection(&d.introducer),
        },
        NodeKind::Binding(d) => {
            let kind = if in_type {
                SymbolKind::FIELD
            } else {
                SymbolKind::VARIABLE
            };
            ast.walk(d.pattern, &mut |_, node| {
                if let NodeKind::Var(var) = &node.kind {
                    let symbol = Symbol::new(&var.identifier.value, kind, site)
                        .selection(&var.identifier.site);
                    out.extend(symbol.build());
                }
                Walk::Continue
            });
            return;
        }
        other => {
            tracing::warn!("Skipping {} in document symbols", other.name());
            return;
        }
    };
    out.extend(symbol.build());
}

/// A symbol under construction.
struct Symbol<'a> {
    name: String,
    detail: Option<String>,
    kind: SymbolKind,
    range: &'a SourceRange,
    selection: &'a SourceRange,
    children: Vec<DocumentSymbol>,
}

impl<'a> Symbol<'a> {
    fn new(name: &str, kind: SymbolKind, range: &'a SourceRange) -> Self {
        Self {
            name: name.to_string(),
            detail: None,
            kind,
            range,
            selection: range,
            children: Vec::new(),
        }
    }

    fn detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    fn selection(mut self, selection: &'a SourceRange) -> Self {
        self.selection = selection;
        self
    }

    fn children(mut self, children: Vec<DocumentSymbol>) -> Self {
        self.children = children;
        self
    }

    /// The protocol symbol, unless its selection lies outside its range.
    #[allow(deprecated)] // DocumentSymbol::deprecated field is deprecated but required
    fn build(self) -> Option<DocumentSymbol> {
        if !self.range.contains(self.selection) {
            tracing::warn!(
                "Dropping symbol {}: selection {:?} is outside {:?}",
                self.name,
                self.selection,
                self.range
            );
            return None;
        }
        Some(DocumentSymbol {
            name: self.name,
            detail: self.detail,
            kind: self.kind,
            tags: None,
            deprecated: None,
            range: to_range(self.range),
            selection_range: to_range(self.selection),
            children: if self.children.is_empty() {
                None
            } else {
                Some(self.children)
            },
        })
    }
}
