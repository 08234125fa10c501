//! Structured records for a batch estate, and the pattern-based extractors
//! that produce them.
//!
//! Each layer of the estate lives in its own artifact format with no native
//! linkage to the others:
//!
//! | Source | Extractor | Record |
//! |--------|-----------|--------|
//! | Scheduler export (Control-M XML or JSON) | [`ControlMSource`] | [`SchedulerExport`] |
//! | Procedural source (`*.pl1`, `*.pli`) | [`Pl1Source`] | [`ProgramRecord`] |
//! | Batch job control (`*.jcl`) | [`JclSource`] | [`JclRecord`] |
//! | Include fragments (`*.inc`) | [`discover_includes`] | [`IncludeCatalog`] |
//! | SQL scripts (`*.sql`) | [`SqlSource`] | [`SqlFileRecord`] |
//!
//! Extraction is pattern based, not a compiler front end. The graph builder
//! only ever sees the record shapes.
//!
//! ```no_run
//! use std::path::Path;
//! use strata_records::{Pl1Source, RecordSource};
//!
//! let source = Pl1Source::new()?;
//! let programs = source.parse_directory(Path::new("estate/src"))?;
//! for warning in &programs.warnings {
//!     eprintln!("{warning}");
//! }
//! println!("{} programs", programs.len());
//! # Ok::<(), strata_records::SourceError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controlm;
pub mod error;
pub mod includes;
pub mod jcl;
pub mod pl1;
pub mod records;
pub mod source;
pub mod sql;

pub use controlm::ControlMSource;
pub use error::{Result, SourceError, SourceWarning, SourceWarningKind};
pub use includes::discover_includes;
pub use jcl::JclSource;
pub use pl1::Pl1Source;
pub use records::{
    ConditionUsage, FolderRecord, InCondition, IncludeCatalog, JclRecord, JobRecord,
    OutCondition, ProgramRecord, SchedulerExport, SqlFileRecord, SqlOperation,
};
pub use source::{DirectoryRecords, RecordSource};
pub use sql::SqlSource;
