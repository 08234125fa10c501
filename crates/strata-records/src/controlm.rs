//! Scheduler export extraction (Control-M XML, or its JSON record form).
//!
//! The XML is scanned with patterns rather than a parser: only `FOLDER`,
//! `SMART_FOLDER`, `JOB`, `INCOND` and `OUTCOND` elements and their
//! attributes matter, and exports in the wild are not always well formed.

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SourceError, SourceWarning};
use crate::records::{FolderRecord, InCondition, JobRecord, OutCondition, SchedulerExport};
use crate::source::{read_text, RecordSource};

/// Attribute list of an opening tag; quoted values may contain `>`.
const ATTRS: &str = r#"((?:[^>"']|"[^"]*"|'[^']*')*?)"#;

/// Extractor for scheduler exports.
#[derive(Debug, Clone)]
pub struct ControlMSource {
    comment: Regex,
    folder: Regex,
    job: Regex,
    incond: Regex,
    outcond: Regex,
    attribute: Regex,
    entity: Regex,
}

impl ControlMSource {
    /// Compile the extraction patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Pattern`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            folder: Regex::new(&format!(r"<(?:SMART_)?FOLDER\b{ATTRS}/?>"))?,
            job: Regex::new(&format!(r"(?s)<JOB\b{ATTRS}(?:/>|>(.*?)</JOB\s*>)"))?,
            incond: Regex::new(&format!(r"<INCOND\b{ATTRS}/?>"))?,
            outcond: Regex::new(&format!(r"<OUTCOND\b{ATTRS}/?>"))?,
            attribute: Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            entity: Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|amp|lt|gt|quot|apos);")?,
        })
    }

    /// Load an export from a file, or merge every export below a directory.
    ///
    /// # Errors
    ///
    /// Fails if the path cannot be read, or if a single file is malformed.
    /// Inside a directory, malformed files become warnings.
    pub fn load(&self, path: &Path) -> Result<(SchedulerExport, Vec<SourceWarning>)> {
        if path.is_dir() {
            let scanned = self.parse_directory(path)?;
            let mut export = SchedulerExport::default();
            for part in scanned.records.into_values() {
                export.merge(part);
            }
            info!(
                folders = export.folders.len(),
                jobs = export.jobs.len(),
                files = scanned.files_scanned,
                "Loaded scheduler exports"
            );
            Ok((export, scanned.warnings))
        } else {
            let export = self.parse(path)?;
            info!(
                folders = export.folders.len(),
                jobs = export.jobs.len(),
                "Loaded scheduler export"
            );
            Ok((export, Vec::new()))
        }
    }

    /// Extract folders and jobs from XML text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the text has neither a folder nor a job.
    pub fn parse_xml(&self, path: &Path, text: &str) -> Result<SchedulerExport> {
        let text = self.comment.replace_all(text, "");
        let mut export = SchedulerExport::default();

        // Byte offset of each folder's opening tag, for jobs without PARENT_FOLDER.
        let mut folder_starts: Vec<(usize, String)> = Vec::new();
        for caps in self.folder.captures_iter(&text) {
            let attrs = self.attributes(caps.get(1).map_or("", |m| m.as_str()));
            let Some(name) = non_empty(attr(&attrs, "FOLDER_NAME")) else {
                continue;
            };
            if let Some(whole) = caps.get(0) {
                folder_starts.push((whole.start(), name.clone()));
            }
            export.folders.insert(
                name.clone(),
                FolderRecord {
                    name,
                    datacenter: attr(&attrs, "DATACENTER").unwrap_or_default(),
                    platform: attr(&attrs, "PLATFORM").unwrap_or_default(),
                },
            );
        }

        let mut saw_job = false;
        for caps in self.job.captures_iter(&text) {
            saw_job = true;
            let attrs = self.attributes(caps.get(1).map_or("", |m| m.as_str()));
            let Some(name) = non_empty(attr(&attrs, "JOBNAME")) else {
                debug!(file = %path.display(), "Skipping JOB element without JOBNAME");
                continue;
            };
            let start = caps.get(0).map_or(0, |m| m.start());
            let folder = non_empty(attr(&attrs, "PARENT_FOLDER")).or_else(|| {
                folder_starts
                    .iter()
                    .rev()
                    .find(|(pos, _)| *pos < start)
                    .map(|(_, name)| name.clone())
            });

            let mut job = JobRecord {
                name: name.clone(),
                folder,
                application: non_empty(attr(&attrs, "APPLICATION")),
                sub_application: non_empty(attr(&attrs, "SUB_APPLICATION")),
                description: attr(&attrs, "DESCRIPTION").unwrap_or_default(),
                memname: non_empty(attr(&attrs, "MEMNAME")),
                memlib: non_empty(attr(&attrs, "MEMLIB")),
                tasktype: non_empty(attr(&attrs, "TASKTYPE")),
                in_conditions: Vec::new(),
                out_conditions: Vec::new(),
            };

            if let Some(body) = caps.get(2) {
                for cond in self.incond.captures_iter(body.as_str()) {
                    let a = self.attributes(cond.get(1).map_or("", |m| m.as_str()));
                    if let Some(cond_name) = non_empty(attr(&a, "NAME")) {
                        let mut c = InCondition::new(cond_name);
                        if let Some(odate) = non_empty(attr(&a, "ODATE")) {
                            c.odate = odate;
                        }
                        if let Some(and_or) = non_empty(attr(&a, "AND_OR")) {
                            c.and_or = and_or;
                        }
                        job.in_conditions.push(c);
                    }
                }
                for cond in self.outcond.captures_iter(body.as_str()) {
                    let a = self.attributes(cond.get(1).map_or("", |m| m.as_str()));
                    if let Some(cond_name) = non_empty(attr(&a, "NAME")) {
                        let mut c = OutCondition::new(cond_name);
                        if let Some(odate) = non_empty(attr(&a, "ODATE")) {
                            c.odate = odate;
                        }
                        if let Some(sign) = non_empty(attr(&a, "SIGN")) {
                            c.sign = sign;
                        }
                        job.out_conditions.push(c);
                    }
                }
            }

            export.jobs.insert(name, job);
        }

        if !saw_job && folder_starts.is_empty() {
            return Err(SourceError::malformed(
                path,
                "no FOLDER or JOB element found",
            ));
        }

        debug!(
            file = %path.display(),
            folders = export.folders.len(),
            jobs = export.jobs.len(),
            "Parsed scheduler export"
        );
        Ok(export)
    }

    fn attributes(&self, raw: &str) -> Vec<(String, String)> {
        self.attribute
            .captures_iter(raw)
            .filter_map(|c| {
                let key = c.get(1)?.as_str().to_string();
                let value = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
                Some((key, self.decode_entities(value)))
            })
            .collect()
    }

    /// Replace XML character entities with the characters they stand for.
    #[must_use]
    pub fn decode_entities(&self, value: &str) -> String {
        self.entity
            .replace_all(value, |caps: &regex::Captures<'_>| {
                let entity = &caps[1];
                match entity {
                    "amp" => "&".to_string(),
                    "lt" => "<".to_string(),
                    "gt" => ">".to_string(),
                    "quot" => "\"".to_string(),
                    "apos" => "'".to_string(),
                    _ => {
                        let code = if let Some(hex) = entity.strip_prefix("#x") {
                            u32::from_str_radix(hex, 16).ok()
                        } else {
                            entity[1..].parse::<u32>().ok()
                        };
                        code.and_then(char::from_u32)
                            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
                    }
                }
            })
            .into_owned()
    }
}

impl RecordSource for ControlMSource {
    type Record = SchedulerExport;

    fn extensions(&self) -> &[&str] {
        &["xml", "json"]
    }

    fn parse(&self, path: &Path) -> Result<SchedulerExport> {
        let text = read_text(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&text).map_err(|source| SourceError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else {
            self.parse_xml(path, &text)
        }
    }

    fn key(&self, path: &Path, _record: &SchedulerExport) -> String {
        path.display().to_string()
    }
}

fn attr(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.clone())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<DEFTABLE>
  <!-- <JOB JOBNAME="COMMENTED"/> -->
  <FOLDER FOLDER_NAME="F1" DATACENTER="DC1" PLATFORM="ZOS">
    <JOB JOBNAME="J1" PARENT_FOLDER="F1" APPLICATION="APP1" SUB_APPLICATION="SUB1"
         DESCRIPTION="ADAQOSL = load &amp; check &lt;daily&gt;" MEMNAME="J1JCL" TASKTYPE="Job">
      <INCOND NAME="START-J1" ODATE="PREV" AND_OR="O"/>
      <OUTCOND NAME="J1-OK" SIGN="+"/>
      <OUTCOND NAME="START-J1" SIGN="-" ODATE="PREV"/>
    </JOB>
    <JOB JOBNAME="J2" APPLICATION="APP1" DESCRIPTION="a &gt; b"/>
  </FOLDER>
</DEFTABLE>
"#;

    fn source() -> ControlMSource {
        ControlMSource::new().unwrap()
    }

    #[test]
    fn parses_folders_jobs_and_conditions() {
        let export = source().parse_xml(&PathBuf::from("x.xml"), EXPORT).unwrap();

        let folder = &export.folders["F1"];
        assert_eq!(folder.datacenter, "DC1");
        assert_eq!(folder.platform, "ZOS");

        let j1 = &export.jobs["J1"];
        assert_eq!(j1.folder.as_deref(), Some("F1"));
        assert_eq!(j1.application.as_deref(), Some("APP1"));
        assert_eq!(j1.sub_application.as_deref(), Some("SUB1"));
        assert_eq!(j1.description, "ADAQOSL = load & check <daily>");
        assert_eq!(j1.memname.as_deref(), Some("J1JCL"));
        assert_eq!(j1.in_conditions.len(), 1);
        assert_eq!(j1.in_conditions[0].odate, "PREV");
        assert_eq!(j1.in_conditions[0].and_or, "O");
        assert_eq!(j1.out_conditions.len(), 2);
        assert_eq!(j1.out_conditions[0].odate, "STAT");
        assert_eq!(j1.out_conditions[1].sign, "-");

        assert!(!export.jobs.contains_key("COMMENTED"));
    }

    #[test]
    fn job_without_parent_folder_uses_enclosing_folder() {
        let export = source().parse_xml(&PathBuf::from("x.xml"), EXPORT).unwrap();
        let j2 = &export.jobs["J2"];
        assert_eq!(j2.folder.as_deref(), Some("F1"));
        assert_eq!(j2.description, "a > b");
        assert!(j2.sub_application.is_none());
        assert!(j2.in_conditions.is_empty());
    }

    #[test]
    fn text_without_folders_or_jobs_is_malformed() {
        let err = source()
            .parse_xml(&PathBuf::from("empty.xml"), "<DEFTABLE></DEFTABLE>")
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(source().decode_entities("A&#38;B&#x41;"), "A&BA");
        assert_eq!(source().decode_entities("&#xFFFFFFFF;"), "&#xFFFFFFFF;");
    }
}
