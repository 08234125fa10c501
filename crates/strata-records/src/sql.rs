//! Discovery of standalone SQL scripts (`*.sql`).
//!
//! Only file metadata is read. Statement content is not analysed; tables
//! enter the graph through the embedded SQL of procedural programs.

use std::path::Path;

use tracing::trace;

use crate::error::Result;
use crate::records::SqlFileRecord;
use crate::source::{read_text, upper_stem, RecordSource};

/// Extractor for SQL script files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlSource;

impl SqlSource {
    /// Record for one script's text.
    #[must_use]
    pub fn parse_text(&self, path: &Path, text: &str) -> SqlFileRecord {
        let record = SqlFileRecord {
            name: upper_stem(path),
            file_path: path.to_path_buf(),
            line_count: text.lines().count(),
        };
        trace!(script = %record.name, lines = record.line_count, "Parsed SQL script");
        record
    }
}

impl RecordSource for SqlSource {
    type Record = SqlFileRecord;

    fn extensions(&self) -> &[&str] {
        &["sql"]
    }

    fn parse(&self, path: &Path) -> Result<SqlFileRecord> {
        let text = read_text(path)?;
        Ok(self.parse_text(path, &text))
    }

    fn key(&self, _path: &Path, record: &SqlFileRecord) -> String {
        record.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scripts_are_keyed_by_uppercased_stem() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ddl")).unwrap();
        fs::write(
            dir.path().join("ddl/create_accounts.sql"),
            "CREATE TABLE ACCOUNTS (\n  ID INT\n);\n",
        )
        .unwrap();
        fs::write(dir.path().join("ddl/Cleanup.SQL"), "DELETE FROM TMP;").unwrap();
        fs::write(dir.path().join("ddl/readme.txt"), "").unwrap();

        let scanned = SqlSource.parse_directory(dir.path()).unwrap();

        assert!(scanned.warnings.is_empty());
        assert_eq!(scanned.files_scanned, 2);
        let names: Vec<&str> = scanned.records.keys().map(String::as_str).collect();
        assert_eq!(names, ["CLEANUP", "CREATE_ACCOUNTS"]);
        assert_eq!(scanned.records["CREATE_ACCOUNTS"].line_count, 3);
    }

    #[test]
    fn empty_script_has_no_lines() {
        let record = SqlSource.parse_text(Path::new("sql/empty.sql"), "");
        assert_eq!(record.name, "EMPTY");
        assert_eq!(record.line_count, 0);
    }
}
