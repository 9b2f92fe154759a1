//! Source files and locations.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// URI of the pseudo-file holding compiler-synthesized code.
pub const SYNTHESIZED_URI: &str = "synthesized://orca";

static SYNTHESIZED: LazyLock<SourceFile> = LazyLock::new(|| SourceFile {
    inner: Arc::new(SourceFileInner {
        uri: Arc::from(SYNTHESIZED_URI),
        text: Arc::from(""),
        lines: LineIndex::new(""),
        synthesized: true,
    }),
});

/// Returns the canonical `file://` URI of an absolute path.
///
/// Percent-encoding is normalized and a trailing slash is removed, so two
/// spellings of the same path produce the same string.
pub fn file_uri(path: &Path) -> Option<String> {
    let url = url::Url::from_file_path(path).ok()?;
    let mut uri = url.to_string();
    while uri.ends_with('/') && uri.len() > "file:///".len() {
        uri.pop();
    }
    Some(uri)
}

/// A zero-based line and column, the column counted in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineColumn {
    /// Line number (0-based).
    pub line: u32,
    /// Column in UTF-16 code units (0-based).
    pub column: u32,
}

impl LineColumn {
    /// Create a new line/column pair.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A line index for efficient offset-to-position conversion.
///
/// Building the index is O(n) in the source length; lookups binary search
/// the line starts and only scan the one line they land on.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line (including line 0 at offset 0).
    line_starts: Vec<usize>,
    /// Total length of the source in bytes.
    len: usize,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Convert a byte offset of `source` to a line/column position.
    ///
    /// Offsets past the end are clamped; offsets inside a multi-byte
    /// character are moved back to its first byte.
    pub fn line_column(&self, source: &str, offset: usize) -> LineColumn {
        let mut offset = offset.min(self.len);
        while offset > 0 && !source.is_char_boundary(offset) {
            offset -= 1;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts[line];
        let column = source[line_start..offset].encode_utf16().count();

        LineColumn::new(line as u32, column as u32)
    }

    /// Convert a line/column position to a byte offset of `source`.
    ///
    /// Returns `None` when the line does not exist. A column past the end of
    /// its line is clamped to the line end, as the protocol requires.
    pub fn offset(&self, source: &str, position: LineColumn) -> Option<usize> {
        let line = position.line as usize;
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.len, |next| next - 1);
        let end = if end > start && source.as_bytes().get(end - 1) == Some(&b'\r') {
            end - 1
        } else {
            end
        };

        let mut units = 0u32;
        for (i, ch) in source[start..end].char_indices() {
            if units >= position.column {
                return Some(start + i);
            }
            units += ch.len_utf16() as u32;
        }
        Some(end)
    }

    /// Get the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

struct SourceFileInner {
    uri: Arc<str>,
    text: Arc<str>,
    lines: LineIndex,
    synthesized: bool,
}

/// An immutable source file: its URI, its text and a line index.
///
/// Cloning is cheap. Two files are equal when their URIs are equal.
#[derive(Clone)]
pub struct SourceFile {
    inner: Arc<SourceFileInner>,
}

impl SourceFile {
    /// Create a source file.
    pub fn new(uri: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        Self {
            inner: Arc::new(SourceFileInner {
                uri: uri.into(),
                text,
                lines,
                synthesized: false,
            }),
        }
    }

    /// The pseudo-file of compiler-synthesized code.
    pub fn synthesized() -> Self {
        SYNTHESIZED.clone()
    }

    /// The URI of this file.
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// The full text of this file.
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Whether this is the synthesized pseudo-file.
    pub fn is_synthesized(&self) -> bool {
        self.inner.synthesized
    }

    /// The line index of this file.
    pub fn line_index(&self) -> &LineIndex {
        &self.inner.lines
    }

    /// Convert a byte offset to a line/column position.
    pub fn line_column(&self, offset: usize) -> LineColumn {
        self.inner.lines.line_column(&self.inner.text, offset)
    }

    /// Convert a line/column position to a byte offset.
    pub fn offset(&self, position: LineColumn) -> Option<usize> {
        self.inner.lines.offset(&self.inner.text, position)
    }

    /// A range covering the whole file.
    pub fn whole_range(&self) -> SourceRange {
        SourceRange::new(self.clone(), 0, self.inner.text.len())
    }
}

impl PartialEq for SourceFile {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.synthesized == other.inner.synthesized
                && self.inner.uri == other.inner.uri)
    }
}

impl Eq for SourceFile {}

impl Hash for SourceFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.uri.hash(state);
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceFile").field(&self.uri()).finish()
    }
}

/// A position in a source file, as a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// The file.
    pub file: SourceFile,
    /// Byte offset in the file.
    pub offset: usize,
}

impl SourcePosition {
    /// Create a new position.
    pub const fn new(file: SourceFile, offset: usize) -> Self {
        Self { file, offset }
    }

    /// Create a position from a line/column pair.
    pub fn from_line_column(file: SourceFile, position: LineColumn) -> Option<Self> {
        let offset = file.offset(position)?;
        Some(Self { file, offset })
    }
}

/// A half-open byte range `[start, end)` in a source file.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourceRange {
    /// The file.
    pub file: SourceFile,
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl SourceRange {
    /// Create a new range.
    pub fn new(file: SourceFile, start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        Self { file, start, end }
    }

    /// The empty range of the synthesized pseudo-file.
    pub fn synthesized() -> Self {
        Self::new(SourceFile::synthesized(), 0, 0)
    }

    /// Whether this range lies in the synthesized pseudo-file.
    pub fn is_synthesized(&self) -> bool {
        self.file.is_synthesized()
    }

    /// Length in bytes.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range is empty.
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `position` falls inside this range.
    pub fn covers(&self, position: &SourcePosition) -> bool {
        self.file == position.file && self.start <= position.offset && position.offset < self.end
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &Self) -> bool {
        self.file == other.file && self.start <= other.start && other.end <= self.end
    }

    /// A range from the start of this one to the end of `other`.
    #[must_use]
    pub fn extended_to(&self, other: &Self) -> Self {
        Self::new(self.file.clone(), self.start, other.end.max(self.start))
    }

    /// The text covered by this range.
    pub fn text(&self) -> &str {
        self.file
            .text()
            .get(self.start..self.end)
            .unwrap_or_default()
    }

    /// Line/column of the start of this range.
    pub fn start_position(&self) -> LineColumn {
        self.file.line_column(self.start)
    }

    /// Line/column of the end of this range.
    pub fn end_position(&self) -> LineColumn {
        self.file.line_column(self.end)
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]", self.file.uri(), self.start, self.end)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.start_position();
        write!(
            f,
            "{}:{}:{}",
            self.file.uri(),
            start.line + 1,
            start.column + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_line_index_offset_to_position() {
        let source = "line1\nline2\nline3";
        let index = LineIndex::new(source);

        assert_eq!(index.line_column(source, 0), LineColumn::new(0, 0));
        assert_eq!(index.line_column(source, 5), LineColumn::new(0, 5));
        assert_eq!(index.line_column(source, 6), LineColumn::new(1, 0));
        assert_eq!(index.line_column(source, 12), LineColumn::new(2, 0));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_line_index_counts_utf16_units() {
        let source = "let é = \"😀\"\nx";
        let index = LineIndex::new(source);

        // `😀` is two UTF-16 units but four bytes.
        let after_emoji = source.find('😀').unwrap() + '😀'.len_utf8();
        assert_eq!(index.line_column(source, after_emoji), LineColumn::new(0, 11));
        assert_eq!(
            index.offset(source, LineColumn::new(0, 11)),
            Some(after_emoji)
        );
    }

    #[test]
    fn test_offset_clamps_column_to_line_end() {
        let source = "ab\r\ncd";
        let index = LineIndex::new(source);

        assert_eq!(index.offset(source, LineColumn::new(0, 40)), Some(2));
        assert_eq!(index.offset(source, LineColumn::new(1, 1)), Some(5));
        assert_eq!(index.offset(source, LineColumn::new(2, 0)), None);
    }

    #[test]
    fn test_range_covers_is_half_open() {
        let file = SourceFile::new("file:///a.orca", "let x = 1");
        let range = SourceRange::new(file.clone(), 4, 5);

        assert!(range.covers(&SourcePosition::new(file.clone(), 4)));
        assert!(!range.covers(&SourcePosition::new(file.clone(), 5)));
        assert_eq!(range.text(), "x");

        let other = SourceFile::new("file:///b.orca", "let x = 1");
        assert!(!range.covers(&SourcePosition::new(other, 4)));
    }

    #[test]
    fn test_synthesized_file_is_shared() {
        let a = SourceRange::synthesized();
        assert!(a.is_synthesized());
        assert_eq!(a.file, SourceFile::synthesized());
        assert_ne!(a.file, SourceFile::new(SYNTHESIZED_URI, ""));
    }

    #[test]
    fn test_file_uri_normalizes_encoding() {
        let uri = file_uri(Path::new("/tmp/my project/a.orca")).unwrap();
        assert_eq!(uri, "file:///tmp/my%20project/a.orca");
    }

    proptest! {
        #[test]
        fn prop_offset_roundtrips_on_char_boundaries(source in "[a-zé\n]{0,40}", pick in 0usize..64) {
            let index = LineIndex::new(&source);
            let boundaries: Vec<usize> = source
                .char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(source.len()))
                .collect();
            let offset = boundaries[pick % boundaries.len()];
            let position = index.line_column(&source, offset);
            prop_assert_eq!(index.offset(&source, position), Some(offset));
        }
    }
}
