//! Structured record types produced by the record sources.
//!
//! These are the only shapes the graph builder depends on. Every name that
//! comes from a case-insensitive layer (programs, tables, includes, JCL
//! members) is stored uppercased.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_in_odate() -> String {
    "ODAT".to_string()
}

fn default_and_or() -> String {
    "A".to_string()
}

fn default_out_odate() -> String {
    "STAT".to_string()
}

fn default_sign() -> String {
    "+".to_string()
}

/// A condition a job waits on before it may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InCondition {
    /// Condition name.
    pub name: String,
    /// Date qualifier, `ODAT` when the export omits it.
    #[serde(default = "default_in_odate")]
    pub odate: String,
    /// `A` (and) or `O` (or).
    #[serde(default = "default_and_or")]
    pub and_or: String,
}

impl InCondition {
    /// Create an input condition with the default qualifiers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            odate: default_in_odate(),
            and_or: default_and_or(),
        }
    }
}

/// A condition a job sets (or deletes) when it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutCondition {
    /// Condition name.
    pub name: String,
    /// Date qualifier, `STAT` when the export omits it.
    #[serde(default = "default_out_odate")]
    pub odate: String,
    /// `+` adds the condition, `-` removes it.
    #[serde(default = "default_sign")]
    pub sign: String,
}

impl OutCondition {
    /// Create an output condition with the default qualifiers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            odate: default_out_odate(),
            sign: default_sign(),
        }
    }
}

/// One scheduler job definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job name, unique within an export.
    pub name: String,
    /// Owning folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Owning application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// Owning sub-application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_application: Option<String>,
    /// Free-text description; by convention `PROGNAME = explanation`.
    #[serde(default)]
    pub description: String,
    /// Member (JCL) the job submits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memname: Option<String>,
    /// Library holding the member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memlib: Option<String>,
    /// Scheduler task type (`Job`, `Command`, `Dummy`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasktype: Option<String>,
    /// Conditions the job waits on.
    #[serde(default)]
    pub in_conditions: Vec<InCondition>,
    /// Conditions the job sets.
    #[serde(default)]
    pub out_conditions: Vec<OutCondition>,
}

impl JobRecord {
    /// Create a job with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the folder/application/sub-application placement.
    #[must_use]
    pub fn placed(
        mut self,
        application: Option<&str>,
        sub_application: Option<&str>,
        folder: Option<&str>,
    ) -> Self {
        self.application = application.map(str::to_string);
        self.sub_application = sub_application.map(str::to_string);
        self.folder = folder.map(str::to_string);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the submitted member.
    #[must_use]
    pub fn with_memname(mut self, memname: impl Into<String>) -> Self {
        self.memname = Some(memname.into());
        self
    }

    /// Add a condition the job waits on.
    #[must_use]
    pub fn requires(mut self, condition: impl Into<String>) -> Self {
        self.in_conditions.push(InCondition::new(condition));
        self
    }

    /// Add a condition the job sets.
    #[must_use]
    pub fn produces(mut self, condition: impl Into<String>) -> Self {
        self.out_conditions.push(OutCondition::new(condition));
        self
    }
}

/// A scheduler folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    /// Folder name.
    pub name: String,
    /// Data center the folder is deployed to.
    #[serde(default)]
    pub datacenter: String,
    /// Target platform.
    #[serde(default)]
    pub platform: String,
}

/// Producers and consumers of one condition name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionUsage {
    /// Jobs that set the condition.
    pub producers: BTreeSet<String>,
    /// Jobs that wait on the condition.
    pub consumers: BTreeSet<String>,
}

/// The full scheduler export: folders and jobs keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerExport {
    /// Folders by name.
    #[serde(default)]
    pub folders: BTreeMap<String, FolderRecord>,
    /// Jobs by name.
    #[serde(default)]
    pub jobs: BTreeMap<String, JobRecord>,
}

impl SchedulerExport {
    /// Build an export from a list of jobs, replacing earlier jobs with the same name.
    #[must_use]
    pub fn from_jobs(jobs: impl IntoIterator<Item = JobRecord>) -> Self {
        Self {
            folders: BTreeMap::new(),
            jobs: jobs.into_iter().map(|j| (j.name.clone(), j)).collect(),
        }
    }

    /// Every condition name mentioned by any job, with its producers and consumers.
    #[must_use]
    pub fn condition_index(&self) -> BTreeMap<String, ConditionUsage> {
        let mut index: BTreeMap<String, ConditionUsage> = BTreeMap::new();
        for job in self.jobs.values() {
            for cond in &job.out_conditions {
                index
                    .entry(cond.name.clone())
                    .or_default()
                    .producers
                    .insert(job.name.clone());
            }
            for cond in &job.in_conditions {
                index
                    .entry(cond.name.clone())
                    .or_default()
                    .consumers
                    .insert(job.name.clone());
            }
        }
        index
    }

    /// Merge another export into this one; later records win.
    pub fn merge(&mut self, other: SchedulerExport) {
        self.folders.extend(other.folders);
        self.jobs.extend(other.jobs);
    }
}

/// Kind of table access found in an embedded SQL block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlOperation {
    /// `SELECT ... FROM table`
    Select,
    /// `INSERT INTO table`
    Insert,
    /// `UPDATE table`
    Update,
    /// `DELETE FROM table`
    Delete,
}

impl SqlOperation {
    /// All operations, in tag order.
    pub const ALL: [SqlOperation; 4] = [Self::Select, Self::Insert, Self::Update, Self::Delete];

    /// Uppercase SQL keyword for the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Parse a keyword, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A standalone SQL script found in the source tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlFileRecord {
    /// Uppercased file stem.
    pub name: String,
    /// Script location.
    pub file_path: PathBuf,
    /// Number of lines.
    #[serde(default)]
    pub line_count: usize,
}

/// One parsed procedural source program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    /// Self-declared program name (main procedure), or the file stem.
    pub name: String,
    /// Source file the record came from.
    pub file_path: PathBuf,
    /// Internal procedure names.
    #[serde(default)]
    pub procedures: BTreeSet<String>,
    /// Outbound call tokens.
    #[serde(default)]
    pub calls: BTreeSet<String>,
    /// Included fragment names.
    #[serde(default)]
    pub includes: BTreeSet<String>,
    /// Declared external entries.
    #[serde(default)]
    pub entries: BTreeSet<String>,
    /// Table name to the operations performed on it.
    #[serde(default)]
    pub sql_operations: BTreeMap<String, BTreeSet<SqlOperation>>,
    /// Number of source lines.
    #[serde(default)]
    pub line_count: usize,
}

impl ProgramRecord {
    /// Create an empty program record.
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    /// Uppercased stem of the source file, the secondary join key for resolution.
    #[must_use]
    pub fn file_stem(&self) -> Option<String> {
        self.file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_uppercase)
    }

    /// Add a call token.
    #[must_use]
    pub fn calling(mut self, callee: impl Into<String>) -> Self {
        self.calls.insert(callee.into());
        self
    }

    /// Add an include token.
    #[must_use]
    pub fn including(mut self, include: impl Into<String>) -> Self {
        self.includes.insert(include.into());
        self
    }

    /// Record an operation on a table.
    #[must_use]
    pub fn accessing(mut self, table: impl Into<String>, operation: SqlOperation) -> Self {
        self.sql_operations
            .entry(table.into())
            .or_default()
            .insert(operation);
        self
    }

    /// Distinct tables touched by the program.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.sql_operations.keys().map(String::as_str)
    }
}

/// One parsed batch job control member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JclRecord {
    /// Member name (file stem, uppercased).
    pub name: String,
    /// Source file.
    pub file_path: PathBuf,
    /// Programs executed, system utilities excluded.
    #[serde(default)]
    pub programs_called: BTreeSet<String>,
    /// Catalogued procedures executed.
    #[serde(default)]
    pub procs_called: BTreeSet<String>,
    /// DD names, system DD names excluded.
    #[serde(default)]
    pub datasets: BTreeSet<String>,
    /// Step names.
    #[serde(default)]
    pub steps: BTreeSet<String>,
    /// Number of lines.
    #[serde(default)]
    pub line_count: usize,
}

impl JclRecord {
    /// Create an empty JCL record.
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
            ..Self::default()
        }
    }
}

/// Every include fragment discovered on disk, keyed by uppercased file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeCatalog {
    entries: BTreeMap<String, PathBuf>,
}

impl IncludeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fragment. The stem is uppercased; the first path registered wins.
    pub fn insert(&mut self, stem: &str, path: PathBuf) -> bool {
        let key = stem.to_uppercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, path);
        true
    }

    /// Path of the fragment with this name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PathBuf> {
        self.entries.get(&name.to_uppercase())
    }

    /// Whether a fragment with this name exists, ignoring case.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fragments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(stem, path)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, PathBuf)> for IncludeCatalog {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for (stem, path) in iter {
            catalog.insert(&stem, path);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_index_collects_producers_and_consumers() {
        let export = SchedulerExport::from_jobs([
            JobRecord::new("J1").produces("C1"),
            JobRecord::new("J2").requires("C1").produces("C2"),
            JobRecord::new("J3").requires("C1"),
        ]);

        let index = export.condition_index();
        let c1 = &index["C1"];
        assert_eq!(c1.producers.iter().collect::<Vec<_>>(), ["J1"]);
        assert_eq!(c1.consumers.iter().collect::<Vec<_>>(), ["J2", "J3"]);
        assert!(index["C2"].consumers.is_empty());
    }

    #[test]
    fn condition_defaults_apply_when_deserializing() {
        let json = r#"{"name":"J1","in_conditions":[{"name":"C1"}],"out_conditions":[{"name":"C2"}]}"#;
        let job: JobRecord = serde_json::from_str(json).unwrap();

        assert_eq!(job.in_conditions[0].odate, "ODAT");
        assert_eq!(job.in_conditions[0].and_or, "A");
        assert_eq!(job.out_conditions[0].odate, "STAT");
        assert_eq!(job.out_conditions[0].sign, "+");
        assert!(job.folder.is_none());
    }

    #[test]
    fn sql_operation_parses_case_insensitively() {
        assert_eq!(SqlOperation::parse("select"), Some(SqlOperation::Select));
        assert_eq!(SqlOperation::parse("Delete"), Some(SqlOperation::Delete));
        assert_eq!(SqlOperation::parse("MERGE"), None);
    }

    #[test]
    fn program_file_stem_is_uppercased() {
        let program = ProgramRecord::new("FOOBAR2", "src/foobar.pl1");
        assert_eq!(program.file_stem().as_deref(), Some("FOOBAR"));
    }

    #[test]
    fn include_catalog_lookup_ignores_case_and_keeps_first() {
        let mut catalog = IncludeCatalog::new();
        assert!(catalog.insert("ekavl", PathBuf::from("inc/ekavl.inc")));
        assert!(!catalog.insert("EKAVL", PathBuf::from("other/EKAVL.inc")));

        assert!(catalog.contains("Ekavl"));
        assert_eq!(catalog.get("EKAVL"), Some(&PathBuf::from("inc/ekavl.inc")));
        assert_eq!(catalog.len(), 1);
    }
}
