//! Conversions between orca locations and protocol locations.

use lsp_types::{Location, Position, Range};
use orca_core::{Ast, LineColumn, SourcePosition, SourceRange};

use crate::query::find_translation_unit;

/// Convert a line/column pair to a protocol position.
pub const fn to_position(position: LineColumn) -> Position {
    Position {
        line: position.line,
        character: position.column,
    }
}

/// Convert a source range to a protocol range.
pub fn to_range(range: &SourceRange) -> Range {
    Range::new(
        to_position(range.start_position()),
        to_position(range.end_position()),
    )
}

/// Convert a source range to a protocol location.
///
/// Synthesized ranges have no location.
pub fn to_location(range: &SourceRange) -> Option<Location> {
    if range.is_synthesized() {
        return None;
    }
    let uri = range.file.uri().parse::<lsp_types::Uri>().ok()?;
    Some(Location::new(uri, to_range(range)))
}

/// Resolve a protocol position in the document `uri` to a source position.
///
/// Returns `None` when the document is not part of `ast` or the position
/// lies outside of its text.
pub fn source_position(ast: &Ast, uri: &str, position: Position) -> Option<SourcePosition> {
    let unit = find_translation_unit(ast, uri)?;
    let file = ast.site(unit).file.clone();
    SourcePosition::from_line_column(file, LineColumn::new(position.line, position.character))
}
