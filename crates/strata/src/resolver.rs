//! Name resolution from declared program tokens to registered programs.
//!
//! Scheduler metadata and call sites name programs inconsistently: the
//! declared token often differs from the program's self-declared name, while
//! the source file name is a more reliable join key. Resolution is therefore
//! an ordered list of strategies, tried in sequence; the first hit wins.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use strata_records::ProgramRecord;
use tracing::debug;

/// Tokens in job descriptions that name utilities or markers, never programs.
pub const DEFAULT_SKIP_PROGRAMS: &[&str] = &[
    "DUMMY", "MFCMDLNE", "SCRIPT", "REXX", "IEFBR14", "FTP", "FTPLS", "IEBGENER", "ALLOC",
    "CONDCHK", "BACKUP", "UNLOAD", "DB2UTIL", "DSNTEP2", "IKJEFT01", "RZWRITER", "IOACND",
    "DB2LOAD",
];

/// One way of turning a token into a registered program name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveStrategy {
    /// The token is a registered program name.
    ExactName,
    /// The token is the (uppercased) file stem of a registered program.
    FileStem,
}

impl ResolveStrategy {
    /// Default resolution order.
    pub const DEFAULT_ORDER: [ResolveStrategy; 2] = [Self::ExactName, Self::FileStem];
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Registered program name.
    pub program: String,
    /// Strategy that matched.
    pub strategy: ResolveStrategy,
}

/// Registry of known programs with a secondary file-stem index.
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    names: BTreeSet<String>,
    stems: HashMap<String, String>,
    order: Vec<ResolveStrategy>,
}

impl ProgramRegistry {
    /// Index a program record set with the default strategy order.
    #[must_use]
    pub fn new(programs: &BTreeMap<String, ProgramRecord>) -> Self {
        Self::with_order(programs, &ResolveStrategy::DEFAULT_ORDER)
    }

    /// Index a program record set, resolving with the given strategies in order.
    #[must_use]
    pub fn with_order(
        programs: &BTreeMap<String, ProgramRecord>,
        order: &[ResolveStrategy],
    ) -> Self {
        let mut stems = HashMap::new();
        for (name, record) in programs {
            let Some(stem) = record.file_stem() else {
                continue;
            };
            if let Some(existing) = stems.get(&stem) {
                debug!(stem = %stem, kept = %existing, ignored = %name, "File stem shared by two programs");
                continue;
            }
            stems.insert(stem, name.clone());
        }

        Self {
            names: programs.keys().cloned().collect(),
            stems,
            order: order.to_vec(),
        }
    }

    /// Whether `name` is a registered program name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of registered programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolve a token (case-insensitively) to a registered program name.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<Resolution> {
        let token = token.trim().to_uppercase();
        if token.is_empty() {
            return None;
        }
        self.order.iter().find_map(|&strategy| {
            self.apply(strategy, &token).map(|program| Resolution {
                program,
                strategy,
            })
        })
    }

    fn apply(&self, strategy: ResolveStrategy, token: &str) -> Option<String> {
        match strategy {
            ResolveStrategy::ExactName => self.names.get(token).cloned(),
            ResolveStrategy::FileStem => self.stems.get(token).cloned(),
        }
    }
}

/// Denylist of description tokens that never denote a program.
#[derive(Debug, Clone)]
pub struct SkipList(BTreeSet<String>);

impl SkipList {
    /// The built-in denylist plus `extra` tokens.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: BTreeSet<String> = DEFAULT_SKIP_PROGRAMS
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        set.extend(extra.into_iter().map(|s| s.as_ref().trim().to_uppercase()));
        Self(set)
    }

    /// Whether `token` (uppercased) is denied.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::with_extra(std::iter::empty::<&str>())
    }
}

/// Candidate program token from a `PROGNAME = explanation` description.
///
/// Takes the text left of the first `=`, trimmed and uppercased. Returns
/// `None` when there is no `=`, the token is empty or contains whitespace,
/// or it is on the skip list.
#[must_use]
pub fn description_program(description: &str, skip: &SkipList) -> Option<String> {
    let (candidate, _) = description.split_once('=')?;
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.chars().any(char::is_whitespace) {
        return None;
    }
    let candidate = candidate.to_uppercase();
    (!skip.contains(&candidate)).then_some(candidate)
}
