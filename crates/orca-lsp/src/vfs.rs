//! In-memory document text.
//!
//! Documents are stored as ropes so that ranged edits do not copy the whole
//! text. The rest of the server sees a document through [`Document::text`].

use lsp_types::{Position, TextDocumentContentChangeEvent};
use ropey::Rope;

/// The text and version of an open document.
#[derive(Debug, Clone)]
pub struct Document {
    /// The document content as a rope for efficient editing.
    content: Rope,
    /// The version supplied by the client.
    version: i32,
}

impl Document {
    /// Create a new document with the given content.
    pub fn new(content: &str, version: i32) -> Self {
        Self {
            content: Rope::from_str(content),
            version,
        }
    }

    /// Get the document content as a string.
    pub fn text(&self) -> String {
        self.content.to_string()
    }

    /// Get the document version.
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Apply `changes` in order and move to `version`.
    ///
    /// A change without a range replaces the whole text.
    pub fn apply_changes(&mut self, changes: &[TextDocumentContentChangeEvent], version: i32) {
        for change in changes {
            match change.range {
                Some(range) => {
                    let start = self.char_index(range.start);
                    let end = self.char_index(range.end).max(start);
                    self.content.remove(start..end);
                    self.content.insert(start, &change.text);
                }
                None => self.content = Rope::from_str(&change.text),
            }
        }
        if version < self.version {
            tracing::warn!(
                "Document version went backwards: {} -> {}",
                self.version,
                version
            );
        }
        self.version = version;
    }

    /// The char index of a UTF-16 position, clamped to the text.
    fn char_index(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.content.len_lines() {
            return self.content.len_chars();
        }
        let line_start = self.content.line_to_char(line);
        let line_len = self.content.line(line).len_utf16_cu();
        let column = (position.character as usize).min(line_len);
        let cu = self.content.char_to_utf16_cu(line_start) + column;
        self.content.utf16_cu_to_char(cu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Range;

    fn edit(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(
                Position::new(start.0, start.1),
                Position::new(end.0, end.1),
            )),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_full_change() {
        let mut doc = Document::new("let x = 1", 1);
        doc.apply_changes(
            &[TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: "let y = 2".to_string(),
            }],
            2,
        );
        assert_eq!(doc.text(), "let y = 2");
        assert_eq!(doc.version(), 2);
    }

    #[test]
    fn test_ranged_changes() {
        let mut doc = Document::new("let x = 1\nlet y = x\n", 1);
        doc.apply_changes(&[edit((1, 8), (1, 9), "x + 1"), edit((0, 4), (0, 5), "z")], 2);
        assert_eq!(doc.text(), "let z = 1\nlet y = x + 1\n");
    }

    #[test]
    fn test_utf16_columns() {
        // "é" is one UTF-16 unit, "𝕏" is two.
        let mut doc = Document::new("let s = \"é𝕏\"", 1);
        doc.apply_changes(&[edit((0, 12), (0, 12), "!")], 2);
        assert_eq!(doc.text(), "let s = \"é𝕏!\"");
    }

    #[test]
    fn test_out_of_range_positions_clamp() {
        let mut doc = Document::new("let x = 1", 1);
        doc.apply_changes(&[edit((5, 0), (9, 0), "\nlet y = 2")], 2);
        assert_eq!(doc.text(), "let x = 1\nlet y = 2");
    }
}
