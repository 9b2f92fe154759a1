//! Diagnostics handler for reporting compile errors.

use lsp_types::{
    DiagnosticRelatedInformation, DiagnosticSeverity, DocumentDiagnosticReport,
    DocumentDiagnosticReportResult, FullDocumentDiagnosticReport, NumberOrString,
    RelatedFullDocumentDiagnosticReport,
};
use orca_core::{Diagnostic, DiagnosticSet, Severity};

use super::utils::{to_location, to_range};

/// The `source` of every diagnostic the server reports.
pub const SOURCE: &str = "orca";

/// Build a full diagnostic report.
pub fn full_report(items: Vec<lsp_types::Diagnostic>) -> DocumentDiagnosticReportResult {
    DocumentDiagnosticReportResult::Report(DocumentDiagnosticReport::Full(
        RelatedFullDocumentDiagnosticReport {
            related_documents: None,
            full_document_diagnostic_report: FullDocumentDiagnosticReport {
                result_id: None,
                items,
            },
        },
    ))
}

/// The diagnostics of `set` that lie in the document at `uri`.
pub fn diagnostics_for(set: &DiagnosticSet, uri: &str) -> Vec<lsp_types::Diagnostic> {
    set.iter()
        .filter(|d| d.site.file.uri() == uri)
        .map(to_lsp_diagnostic)
        .collect()
}

/// Convert a compile diagnostic to an LSP diagnostic.
pub fn to_lsp_diagnostic(diagnostic: &Diagnostic) -> lsp_types::Diagnostic {
    let related: Vec<_> = diagnostic
        .notes
        .iter()
        .filter_map(|note| {
            Some(DiagnosticRelatedInformation {
                location: to_location(&note.site)?,
                message: note.message.clone(),
            })
        })
        .collect();

    lsp_types::Diagnostic {
        range: to_range(&diagnostic.site),
        severity: Some(match diagnostic.severity {
            Severity::Error => DiagnosticSeverity::ERROR,
            Severity::Warning => DiagnosticSeverity::WARNING,
            Severity::Note => DiagnosticSeverity::INFORMATION,
        }),
        code: Some(NumberOrString::String(diagnostic.code.to_string())),
        source: Some(SOURCE.to_string()),
        message: diagnostic.message.clone(),
        related_information: if related.is_empty() {
            None
        } else {
            Some(related)
        },
        tags: None,
        code_description: None,
        data: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::{SourceFile, SourceRange};
    use lsp_types::Position;

    #[test]
    fn test_conversion() {
        let file = SourceFile::new("file:///main.orca", "type A {}\ntype A {}");
        let diagnostic = Diagnostic::error(
            "E1006",
            SourceRange::new(file.clone(), 15, 16),
            "duplicate declaration of `A`",
        )
        .with_note(SourceRange::new(file, 5, 6), "previously declared here")
        .with_note(SourceRange::synthesized(), "synthesized");

        let converted = to_lsp_diagnostic(&diagnostic);
        assert_eq!(converted.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(converted.code, Some(NumberOrString::String("E1006".into())));
        assert_eq!(converted.source.as_deref(), Some(SOURCE));
        assert_eq!(converted.range.start, Position::new(1, 5));

        let related = converted.related_information.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].location.range.start, Position::new(0, 5));
    }

    #[test]
    fn test_only_diagnostics_of_the_document_are_reported() {
        let main = SourceFile::new("file:///main.orca", "let x = y");
        let library = SourceFile::new("file:///lib/core.orca", "let a = b");
        let mut set = DiagnosticSet::new();
        set.insert(Diagnostic::error("E1001", SourceRange::new(main, 8, 9), "undefined name `y`"));
        set.insert(Diagnostic::error("E1001", SourceRange::new(library, 8, 9), "undefined name `b`"));

        let items = diagnostics_for(&set, "file:///main.orca");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].message, "undefined name `y`");
        assert!(diagnostics_for(&set, "file:///other.orca").is_empty());
    }

    #[test]
    fn test_full_report() {
        let DocumentDiagnosticReportResult::Report(DocumentDiagnosticReport::Full(report)) =
            full_report(Vec::new())
        else {
            panic!("expected a full report");
        };
        assert!(report.full_document_diagnostic_report.items.is_empty());
    }
}
