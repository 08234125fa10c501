//! The record source contract and the shared directory scan.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     parse_directory                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  Walk (sequential):   collect matching files, sorted     │
//! │  Parse (parallel):    rayon::par_iter() over the files   │
//! │  Merge (sequential):  key by logical name, keep warnings │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Result, SourceError, SourceWarning, SourceWarningKind};

/// Records parsed from one directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryRecords<R> {
    /// Records keyed by logical name.
    pub records: BTreeMap<String, R>,
    /// Per-file problems that did not stop the scan.
    pub warnings: Vec<SourceWarning>,
    /// Number of files that matched the source's extensions.
    pub files_scanned: usize,
}

impl<R> Default for DirectoryRecords<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            warnings: Vec::new(),
            files_scanned: 0,
        }
    }
}

impl<R> DirectoryRecords<R> {
    /// Number of records kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A format-specific extractor: `source text -> structured record`.
///
/// Implementations only need [`parse`](RecordSource::parse), the file
/// extensions they accept and the logical key of a record; the directory
/// scan is shared.
pub trait RecordSource: Send + Sync {
    /// Record produced for one file.
    type Record: Send;

    /// Lowercase file extensions this source reads.
    fn extensions(&self) -> &[&str];

    /// Parse one file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be read and
    /// [`SourceError::Malformed`] if it is not a valid record.
    fn parse(&self, path: &Path) -> Result<Self::Record>;

    /// Logical name a record is keyed by in a directory scan.
    fn key(&self, path: &Path, record: &Self::Record) -> String;

    /// Whether `path` has one of this source's extensions, ignoring case.
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }

    /// Parse every matching file below `dir`.
    ///
    /// Files are parsed in parallel. A file that fails to parse becomes a
    /// [`SourceWarning`]; when two files map to the same logical name the
    /// later one in path order wins and a warning is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if `dir` itself cannot be read.
    fn parse_directory(&self, dir: &Path) -> Result<DirectoryRecords<Self::Record>> {
        let metadata = std::fs::metadata(dir).map_err(|e| SourceError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(SourceError::malformed(dir, "not a directory"));
        }

        let mut out = DirectoryRecords::default();
        let mut files = Vec::new();
        walk_dir(dir, &|p| self.accepts(p), &mut files, &mut out.warnings);
        files.sort();
        out.files_scanned = files.len();
        debug!(directory = %dir.display(), files = files.len(), "Scanning record sources");

        let parsed: Vec<(PathBuf, Result<Self::Record>)> = files
            .into_par_iter()
            .map(|path| {
                let result = self.parse(&path);
                (path, result)
            })
            .collect();

        for (path, result) in parsed {
            match result {
                Ok(record) => {
                    let key = self.key(&path, &record);
                    if out.records.insert(key.clone(), record).is_some() {
                        warn!(file = %path.display(), name = %key, "Duplicate logical name, keeping later file");
                        out.warnings.push(SourceWarning::duplicate(path, &key));
                    }
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to parse record source");
                    out.warnings.push(e.into());
                }
            }
        }

        Ok(out)
    }
}

/// Recursively collect files below `dir` that satisfy `accept`.
///
/// Hidden entries are skipped. Unreadable directories and entries become
/// warnings rather than errors.
pub(crate) fn walk_dir(
    dir: &Path,
    accept: &dyn Fn(&Path) -> bool,
    files: &mut Vec<PathBuf>,
    warnings: &mut Vec<SourceWarning>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(
                directory = %dir.display(),
                error = %e,
                "Cannot read directory, skipping"
            );
            warnings.push(SourceWarning::new(
                dir.to_path_buf(),
                SourceWarningKind::IoError,
                e.to_string(),
            ));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    directory = %dir.display(),
                    error = %e,
                    "Failed to read directory entry, skipping"
                );
                continue;
            }
        };

        let path = entry.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with('.'))
        {
            continue;
        }

        if path.is_dir() {
            walk_dir(&path, accept, files, warnings);
        } else if path.is_file() && accept(&path) {
            files.push(path);
        }
    }
}

/// Read a source file as text. Invalid UTF-8 sequences are replaced.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| SourceError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Uppercased file stem of `path`, or an empty string.
pub(crate) fn upper_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_uppercase)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct LineCount;

    impl RecordSource for LineCount {
        type Record = (String, usize);

        fn extensions(&self) -> &[&str] {
            &["txt"]
        }

        fn parse(&self, path: &Path) -> Result<Self::Record> {
            let text = read_text(path)?;
            if text.is_empty() {
                return Err(SourceError::malformed(path, "empty"));
            }
            Ok((upper_stem(path), text.lines().count()))
        }

        fn key(&self, _path: &Path, record: &Self::Record) -> String {
            record.0.clone()
        }
    }

    #[test]
    fn parse_directory_skips_hidden_and_collects_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        fs::write(dir.path().join("B.TXT"), "one\n").unwrap();
        fs::write(dir.path().join("empty.txt"), "").unwrap();
        fs::write(dir.path().join("ignored.md"), "x").unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden/c.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/d.txt"), "x\ny\nz\n").unwrap();

        let result = LineCount.parse_directory(dir.path()).unwrap();

        assert_eq!(result.files_scanned, 4);
        assert_eq!(
            result.records.keys().collect::<Vec<_>>(),
            ["A", "B", "D"]
        );
        assert_eq!(result.records["D"].1, 3);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, SourceWarningKind::Malformed);
    }

    #[test]
    fn parse_directory_reports_duplicate_names() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        fs::create_dir(dir.path().join("y")).unwrap();
        fs::write(dir.path().join("x/same.txt"), "1\n").unwrap();
        fs::write(dir.path().join("y/same.txt"), "1\n2\n").unwrap();

        let result = LineCount.parse_directory(dir.path()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.records["SAME"].1, 2);
        assert_eq!(result.warnings[0].kind, SourceWarningKind::DuplicateName);
    }

    #[test]
    fn parse_directory_on_missing_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = LineCount
            .parse_directory(&dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
