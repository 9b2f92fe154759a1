//! User-facing diagnostics.

use crate::source::SourceRange;
use std::fmt;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Prevents the program from being compiled.
    Error,
    /// Worth reporting, but not fatal.
    Warning,
    /// Additional information.
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Note => write!(f, "note"),
        }
    }
}

/// A location related to a diagnostic, e.g. a previous declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedNote {
    /// Where.
    pub site: SourceRange,
    /// What.
    pub message: String,
}

/// A compile error, warning or note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Stable code, e.g. `E1001`.
    pub code: &'static str,
    /// The range the diagnostic applies to.
    pub site: SourceRange,
    /// Human-readable message.
    pub message: String,
    /// Related locations.
    pub notes: Vec<RelatedNote>,
}

impl Diagnostic {
    /// Create an error.
    pub fn error(code: &'static str, site: SourceRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            site,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Create a warning.
    pub fn warning(code: &'static str, site: SourceRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, site, message)
        }
    }

    /// Attach a related location.
    #[must_use]
    pub fn with_note(mut self, site: SourceRange, message: impl Into<String>) -> Self {
        self.notes.push(RelatedNote {
            site,
            message: message.into(),
        });
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}]: {}",
            self.site, self.severity, self.code, self.message
        )
    }
}

/// An ordered set of diagnostics.
///
/// Inserting a diagnostic equal to one already present has no effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticSet {
    elements: Vec<Diagnostic>,
}

impl DiagnosticSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a diagnostic. Returns `false` if it was already present.
    pub fn insert(&mut self, diagnostic: Diagnostic) -> bool {
        if self.elements.contains(&diagnostic) {
            return false;
        }
        self.elements.push(diagnostic);
        true
    }

    /// Insert every diagnostic of `other`.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in other {
            self.insert(diagnostic);
        }
    }

    /// Whether at least one diagnostic is an error.
    pub fn contains_error(&self) -> bool {
        self.elements.iter().any(Diagnostic::is_error)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.elements.iter()
    }

    /// Number of diagnostics.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// `Ok(())` if there are no errors, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.contains_error() {
            Err(self)
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for DiagnosticSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.elements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DiagnosticSet {}

impl FromIterator<Diagnostic> for DiagnosticSet {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl From<Diagnostic> for DiagnosticSet {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            elements: vec![diagnostic],
        }
    }
}

impl IntoIterator for DiagnosticSet {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiagnosticSet {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;

    #[test]
    fn test_set_ignores_duplicates() {
        let file = SourceFile::new("file:///a.orca", "x");
        let site = SourceRange::new(file, 0, 1);
        let mut set = DiagnosticSet::new();

        assert!(set.insert(Diagnostic::error("E1001", site.clone(), "undefined name 'x'")));
        assert!(!set.insert(Diagnostic::error("E1001", site.clone(), "undefined name 'x'")));
        assert!(set.insert(Diagnostic::warning("E1001", site, "undefined name 'x'")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_into_result_only_fails_on_errors() {
        let file = SourceFile::new("file:///a.orca", "x");
        let site = SourceRange::new(file, 0, 1);

        let warnings: DiagnosticSet = [Diagnostic::warning("W0001", site.clone(), "meh")]
            .into_iter()
            .collect();
        assert!(warnings.into_result().is_ok());

        let errors = DiagnosticSet::from(Diagnostic::error("E1003", site, "type mismatch"));
        let err = errors.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "file:///a.orca:1:1: error[E1003]: type mismatch"
        );
    }
}
