//! Procedural source extraction (`*.pl1`, `*.pli`).
//!
//! Pattern based, not a compiler front end: calls, includes, procedure and
//! entry declarations, and the tables touched by embedded SQL.

use std::path::Path;

use regex::Regex;
use tracing::trace;

use crate::error::Result;
use crate::records::{ProgramRecord, SqlOperation};
use crate::source::{read_text, upper_stem, RecordSource};

/// Extractor for procedural source programs.
#[derive(Debug, Clone)]
pub struct Pl1Source {
    block_comment: Regex,
    call: Regex,
    include: Regex,
    procedure: Regex,
    main_procedure: Regex,
    entry: Regex,
    exec_sql: Regex,
    sql: Vec<(SqlOperation, Regex)>,
}

impl Pl1Source {
    /// Compile the extraction patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Pattern`](crate::SourceError::Pattern) if a
    /// pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            block_comment: Regex::new(r"(?s)/\*.*?\*/")?,
            call: Regex::new(r"(?i)CALL\s+(\w+)\s*[(;]")?,
            include: Regex::new(r"(?i)%INCLUDE\s+(\w+)")?,
            procedure: Regex::new(r"(?i)#PROC\((\w+)\)")?,
            main_procedure: Regex::new(r"(?i)#PROC\((\w+)\)\s+OPTIONS\(MAIN\)")?,
            entry: Regex::new(r"(?i)DCL\s+(\w+)\s+ENTRY")?,
            exec_sql: Regex::new(r"(?i)EXEC\s+SQL")?,
            sql: vec![
                (SqlOperation::Select, Regex::new(r"(?i)FROM\s+(\w+)")?),
                (SqlOperation::Update, Regex::new(r"(?i)UPDATE\s+(\w+)")?),
                (SqlOperation::Insert, Regex::new(r"(?i)INSERT\s+INTO\s+(\w+)")?),
                (SqlOperation::Delete, Regex::new(r"(?i)DELETE\s+FROM\s+(\w+)")?),
            ],
        })
    }

    /// Extract a program record from source text.
    #[must_use]
    pub fn parse_text(&self, path: &Path, text: &str) -> ProgramRecord {
        let name = self
            .main_procedure
            .captures(text)
            .and_then(|c| c.get(1))
            .map_or_else(|| upper_stem(path), |m| m.as_str().to_uppercase());

        let mut record = ProgramRecord::new(name, path);
        record.line_count = text.lines().count();
        record.procedures = captured_upper(&self.procedure, text);
        record.includes = captured_upper(&self.include, text);
        record.entries = captured_upper(&self.entry, text);

        let uncommented = self.block_comment.replace_all(text, " ");
        record.calls = captured_upper(&self.call, &uncommented);

        for statement in self.sql_statements(text) {
            for (operation, pattern) in &self.sql {
                for table in captured_upper(pattern, &statement) {
                    record
                        .sql_operations
                        .entry(table)
                        .or_default()
                        .insert(*operation);
                }
            }
        }

        trace!(
            program = %record.name,
            calls = record.calls.len(),
            includes = record.includes.len(),
            tables = record.sql_operations.len(),
            "Parsed program"
        );
        record
    }

    /// Embedded SQL statements: from an `EXEC SQL` line up to the first line
    /// containing `;`, joined with spaces. Comment lines are ignored.
    /// A statement may also open and close on the same line.
    fn sql_statements(&self, text: &str) -> Vec<String> {
        let mut statements = Vec::new();
        let mut current: Option<Vec<&str>> = None;

        for line in text.lines() {
            let stripped = line.trim();
            if stripped.starts_with("/*") || stripped.starts_with('*') {
                continue;
            }
            if self.exec_sql.is_match(line) {
                if line.contains(';') {
                    statements.push(line.to_string());
                    current = None;
                } else {
                    current = Some(vec![line]);
                }
                continue;
            }
            if let Some(lines) = current.as_mut() {
                lines.push(line);
                if line.contains(';') {
                    statements.push(lines.join(" "));
                    current = None;
                }
            }
        }

        statements
    }
}

impl RecordSource for Pl1Source {
    type Record = ProgramRecord;

    fn extensions(&self) -> &[&str] {
        &["pl1", "pli"]
    }

    fn parse(&self, path: &Path) -> Result<ProgramRecord> {
        let text = read_text(path)?;
        Ok(self.parse_text(path, &text))
    }

    fn key(&self, _path: &Path, record: &ProgramRecord) -> String {
        record.name.clone()
    }
}

fn captured_upper(pattern: &Regex, text: &str) -> std::collections::BTreeSet<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    const PROGRAM: &str = r"
#PROC(ADAQOSL) OPTIONS(MAIN);
  %INCLUDE EKAVL;
  %include ekcomm;
  DCL ADAQ010 ENTRY;
  /* CALL COMMENTED(X); */
  CALL ADAQ010(A, B);
  call adaq020;
  #PROC(LOCALP);
  EXEC SQL DECLARE C1 CURSOR FOR
      SELECT COL1
      FROM T_ACCOUNT
      WHERE X = 1;
  EXEC SQL
      UPDATE T_ACCOUNT SET COL1 = 2;
  EXEC SQL
      INSERT INTO T_AUDIT VALUES (1);
  EXEC SQL
      DELETE FROM T_TEMP;
";

    fn parse(text: &str, file: &str) -> ProgramRecord {
        Pl1Source::new().unwrap().parse_text(&PathBuf::from(file), text)
    }

    #[test]
    fn extracts_program_structure() {
        let record = parse(PROGRAM, "src/adaqosl.pl1");

        assert_eq!(record.name, "ADAQOSL");
        assert_eq!(
            record.procedures.iter().collect::<Vec<_>>(),
            ["ADAQOSL", "LOCALP"]
        );
        assert_eq!(record.includes.iter().collect::<Vec<_>>(), ["EKAVL", "EKCOMM"]);
        assert_eq!(record.entries.iter().collect::<Vec<_>>(), ["ADAQ010"]);
        assert_eq!(record.calls.iter().collect::<Vec<_>>(), ["ADAQ010", "ADAQ020"]);
    }

    #[test]
    fn extracts_sql_operations_per_table() {
        let record = parse(PROGRAM, "src/adaqosl.pl1");

        let account = &record.sql_operations["T_ACCOUNT"];
        assert!(account.contains(&SqlOperation::Select));
        assert!(account.contains(&SqlOperation::Update));
        assert_eq!(account.len(), 2);
        assert!(record.sql_operations["T_AUDIT"].contains(&SqlOperation::Insert));

        // DELETE FROM also reads as FROM
        let temp = &record.sql_operations["T_TEMP"];
        assert!(temp.contains(&SqlOperation::Delete));
        assert!(temp.contains(&SqlOperation::Select));
    }

    #[rstest]
    #[case::no_main_procedure("CALL X;\n", "src/foobar.pl1", "FOOBAR")]
    #[case::main_procedure_wins("#PROC(FOOBAR2) OPTIONS(MAIN);\n", "src/foobar.pl1", "FOOBAR2")]
    #[case::lowercase_main("#proc(inner) options(main);\n", "x/Lower.pli", "INNER")]
    fn program_name_resolution(#[case] text: &str, #[case] file: &str, #[case] expected: &str) {
        assert_eq!(parse(text, file).name, expected);
    }

    #[test]
    fn single_line_sql_statement_is_closed() {
        let text = "EXEC SQL SELECT A INTO :A FROM T_ONE;\nCALL X;\nEXEC SQL\n DELETE FROM T_TWO;\n";
        let record = parse(text, "p.pl1");
        assert_eq!(
            record.sql_operations.keys().collect::<Vec<_>>(),
            ["T_ONE", "T_TWO"]
        );
    }

    #[test]
    fn sql_block_skips_comment_lines() {
        let text = "EXEC SQL\n* FROM T_COMMENT\n  SELECT A FROM T_REAL;\n";
        let record = parse(text, "p.pl1");
        assert!(record.sql_operations.contains_key("T_REAL"));
        assert!(!record.sql_operations.contains_key("T_COMMENT"));
    }
}
