//! Discovery of shared include fragments (`*.inc`).

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, SourceError, SourceWarning};
use crate::records::IncludeCatalog;
use crate::source::{upper_stem, walk_dir};

/// File extension of include fragments.
pub const INCLUDE_EXTENSION: &str = "inc";

/// Catalog every include fragment below `dir`, keyed by uppercased file stem.
///
/// When two fragments share a stem the first in path order is kept.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if `dir` cannot be read.
pub fn discover_includes(dir: &Path) -> Result<(IncludeCatalog, Vec<SourceWarning>)> {
    std::fs::metadata(dir).map_err(|e| SourceError::io(dir, e))?;

    let mut files = Vec::new();
    let mut warnings = Vec::new();
    walk_dir(
        dir,
        &|p: &Path| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(INCLUDE_EXTENSION))
        },
        &mut files,
        &mut warnings,
    );
    files.sort();

    let mut catalog = IncludeCatalog::new();
    for path in files {
        let stem = upper_stem(&path);
        if !catalog.insert(&stem, path.clone()) {
            warn!(file = %path.display(), name = %stem, "Duplicate include fragment, keeping first");
            warnings.push(SourceWarning::duplicate(path, &stem));
        }
    }

    debug!(directory = %dir.display(), includes = catalog.len(), "Discovered include fragments");
    Ok((catalog, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discovers_fragments_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("inc/sub")).unwrap();
        fs::write(dir.path().join("inc/ekavl.inc"), "DCL X;").unwrap();
        fs::write(dir.path().join("inc/sub/EKCOMM.INC"), "DCL Y;").unwrap();
        fs::write(dir.path().join("inc/notes.txt"), "").unwrap();

        let (catalog, warnings) = discover_includes(dir.path()).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("EKAVL"));
        assert!(catalog.contains("ekcomm"));
        assert!(!catalog.contains("NOTES"));
    }

    #[test]
    fn duplicate_stems_keep_first_and_warn() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/same.inc"), "").unwrap();
        fs::write(dir.path().join("b/same.inc"), "").unwrap();

        let (catalog, warnings) = discover_includes(dir.path()).unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("SAME").unwrap().ends_with("a/same.inc"));
        assert_eq!(warnings.len(), 1);
    }
}
