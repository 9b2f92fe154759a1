//! Loading a shared library from disk.
//!
//! A library is every `*.orca` file below a root directory, parsed into a
//! single module named [`LIBRARY_MODULE`]. Files are visited in path order so
//! that node identities do not depend on directory iteration order.

use orca_core::{file_uri, Ast, SourceFile};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LibraryError;
use crate::parse_module;

/// The file marking a directory as a library root.
pub const LIBRARY_MARKER: &str = "orca-library.toml";

/// The extension of orca source files.
pub const SOURCE_EXTENSION: &str = "orca";

/// The name of the module holding the library.
pub const LIBRARY_MODULE: &str = "library";

/// Collect the source files below `root`, sorted by path.
pub fn collect_source_paths(root: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    fn visit(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LibraryError> {
        let entries = fs::read_dir(dir).map_err(|source| LibraryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| LibraryError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.is_dir() {
                visit(&path, out)?;
            } else if path.extension().is_some_and(|e| e == SOURCE_EXTENSION) {
                out.push(path);
            }
        }
        Ok(())
    }

    if !root.is_dir() {
        return Err(LibraryError::NotFound(root.to_path_buf()));
    }
    let mut paths = Vec::new();
    visit(root, &mut paths)?;
    paths.sort();
    Ok(paths)
}

/// Read the sources below `root` in parallel.
pub fn load_sources(root: &Path) -> Result<Vec<SourceFile>, LibraryError> {
    collect_source_paths(root)?
        .par_iter()
        .map(|path| {
            let text = fs::read_to_string(path).map_err(|source| LibraryError::Io {
                path: path.clone(),
                source,
            })?;
            let uri = file_uri(path).ok_or_else(|| LibraryError::InvalidPath(path.clone()))?;
            Ok(SourceFile::new(uri, text))
        })
        .collect()
}

/// Parse the library rooted at `root`.
pub fn parse_library(root: &Path) -> Result<Ast, LibraryError> {
    let root = fs::canonicalize(root).map_err(|_| LibraryError::NotFound(root.to_path_buf()))?;
    let files = load_sources(&root)?;
    parse_module(Arc::new(Ast::new()), LIBRARY_MODULE, &files)
        .map_err(|diagnostics| LibraryError::Diagnostics { root, diagnostics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::NodeKind;

    fn write(dir: &Path, name: &str, text: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_sources_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.orca", "let b = 2");
        write(dir.path(), "a/z.orca", "let z = 26");
        write(dir.path(), "notes.txt", "not orca");
        write(dir.path(), LIBRARY_MARKER, "");

        let paths = collect_source_paths(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a/z.orca"), PathBuf::from("b.orca")]);
    }

    #[test]
    fn test_parse_library_builds_one_module() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core.orca", "type Point { let x: Int; let y: Int }");
        write(dir.path(), "math.orca", "fun twice(n: Int) -> Int { return n * 2 }");

        let ast = parse_library(dir.path()).unwrap();
        assert_eq!(ast.modules().len(), 1);
        let NodeKind::Module(module) = ast.kind(ast.modules()[0]) else {
            panic!("expected a module");
        };
        assert_eq!(module.name, LIBRARY_MODULE);
        assert_eq!(module.units.len(), 2);
        assert!(ast.site(module.units[0]).file.uri().ends_with("core.orca"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        assert!(matches!(
            parse_library(&missing),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn test_library_with_errors_reports_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.orca", "let = 1");
        let Err(LibraryError::Diagnostics { diagnostics, .. }) = parse_library(dir.path()) else {
            panic!("expected diagnostics");
        };
        assert!(diagnostics.contains_error());
    }
}
