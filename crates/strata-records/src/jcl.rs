//! Batch job control extraction (`*.jcl`).

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;

use crate::error::Result;
use crate::records::JclRecord;
use crate::source::{read_text, upper_stem, RecordSource};

/// Utility programs that never resolve to estate source.
pub const SYSTEM_PROGRAMS: &[&str] = &[
    "IEFBR14", "IDCAMS", "IEBGENER", "SORT", "DSNTEP2", "DSNTIAD", "IKJEFT01", "IEBCOPY",
    "IEBUPDTE",
];

const SYSTEM_DD_NAMES: &[&str] = &[
    "STEPLIB", "SYSPRINT", "SYSOUT", "SYSIN", "SYSTSPRT", "SYSUDUMP", "SYSTSIN", "SYSABEND",
];

/// Extractor for JCL members.
#[derive(Debug, Clone)]
pub struct JclSource {
    exec_pgm: Regex,
    run_program: Regex,
    call: Regex,
    exec_proc: Regex,
    step: Regex,
    dd: Regex,
}

impl JclSource {
    /// Compile the extraction patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Pattern`](crate::SourceError::Pattern) if a
    /// pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            exec_pgm: Regex::new(r"(?i)//\w+\s+EXEC\s+PGM=(\w+)")?,
            run_program: Regex::new(r"(?i)RUN\s+PROGRAM\((\w+)\)")?,
            call: Regex::new(r#"(?i)CALL\s+['"]?(\w+)['"]?"#)?,
            exec_proc: Regex::new(r"(?i)//\w+\s+EXEC\s+(?:PROC=)?(\w+)")?,
            step: Regex::new(r"(?i)^//(\w+)\s+EXEC\s+")?,
            dd: Regex::new(r"(?i)^//(\w+)\s+DD\s+")?,
        })
    }

    /// Extract a JCL record from member text.
    #[must_use]
    pub fn parse_text(&self, path: &Path, text: &str) -> JclRecord {
        let mut record = JclRecord::new(upper_stem(path), path);
        record.line_count = text.lines().count();

        let statements: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with("//*"))
            .collect::<Vec<_>>()
            .join("\n");

        record.programs_called = [&self.exec_pgm, &self.run_program, &self.call]
            .into_iter()
            .flat_map(|pattern| captures(pattern, &statements))
            .filter(|p| !SYSTEM_PROGRAMS.contains(&p.as_str()))
            .collect();

        for line in statements.lines() {
            if !line.to_uppercase().contains("PGM=") {
                if let Some(proc_name) = first_capture(&self.exec_proc, line) {
                    if !proc_name.starts_with("STEP") {
                        record.procs_called.insert(proc_name);
                    }
                }
            }
            if let Some(step) = first_capture(&self.step, line) {
                record.steps.insert(step);
            }
            if let Some(dd) = first_capture(&self.dd, line) {
                if !SYSTEM_DD_NAMES.contains(&dd.as_str()) {
                    record.datasets.insert(dd);
                }
            }
        }

        record
    }
}

impl RecordSource for JclSource {
    type Record = JclRecord;

    fn extensions(&self) -> &[&str] {
        &["jcl"]
    }

    fn parse(&self, path: &Path) -> Result<JclRecord> {
        let text = read_text(path)?;
        Ok(self.parse_text(path, &text))
    }

    fn key(&self, _path: &Path, record: &JclRecord) -> String {
        record.name.clone()
    }
}

fn captures(pattern: &Regex, text: &str) -> BTreeSet<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

fn first_capture(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}
