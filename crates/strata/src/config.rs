//! Configuration: a YAML file, then environment overrides, then CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::EstatePaths;
use crate::error::{Error, Result};
use crate::query::{PathLimits, DEFAULT_MAX_PATH_HOPS, DEFAULT_PATH_SEARCH_BUDGET};
use crate::subgraph::DEFAULT_MAX_CALL_DEPTH;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "strata.yaml";

/// Default location of the SQLite graph store
pub const DEFAULT_STORE_PATH: &str = ".strata/graph.db";

/// Nodes written per store transaction
pub const DEFAULT_NODE_BATCH_SIZE: usize = 5000;

/// Edges written per store transaction
pub const DEFAULT_EDGE_BATCH_SIZE: usize = 10_000;

/// Environment variable overriding [`StrataConfig::store`]
pub const ENV_STORE: &str = "STRATA_STORE";

/// Environment variable overriding [`StrataConfig::scheduler_export`]
pub const ENV_SCHEDULER_EXPORT: &str = "STRATA_SCHEDULER_EXPORT";

/// Environment variable overriding [`StrataConfig::source_dir`]
pub const ENV_SOURCE_DIR: &str = "STRATA_SOURCE_DIR";

/// Settings for building, storing and querying a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Scheduler export file or directory
    pub scheduler_export: Option<PathBuf>,
    /// Procedural source tree
    pub source_dir: Option<PathBuf>,
    /// JCL member tree
    pub jcl_dir: Option<PathBuf>,
    /// SQLite graph store
    pub store: PathBuf,
    /// Also write the graph as a JSON document here
    pub json_output: Option<PathBuf>,
    /// Nodes per store transaction
    pub node_batch_size: usize,
    /// Edges per store transaction
    pub edge_batch_size: usize,
    /// Program hops followed by a drill-down
    pub max_call_depth: usize,
    /// Longest path returned by path search, in edges
    pub max_path_hops: usize,
    /// Edge expansions a single path search may perform
    pub path_search_budget: usize,
    /// Description tokens never treated as program names, on top of the built-in list
    pub extra_skip_programs: Vec<String>,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            scheduler_export: None,
            source_dir: None,
            jcl_dir: None,
            store: PathBuf::from(DEFAULT_STORE_PATH),
            json_output: None,
            node_batch_size: DEFAULT_NODE_BATCH_SIZE,
            edge_batch_size: DEFAULT_EDGE_BATCH_SIZE,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_path_hops: DEFAULT_MAX_PATH_HOPS,
            path_search_budget: DEFAULT_PATH_SEARCH_BUDGET,
            extra_skip_programs: Vec::new(),
        }
    }
}

impl StrataConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Load `path` if given, else `strata.yaml` in the working directory if it
    /// exists, else the defaults; then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded, or the
    /// default file exists but is invalid.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE_NAME).is_file() => {
                Self::load(Path::new(CONFIG_FILE_NAME))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(store) = non_empty(ENV_STORE) {
            debug!(store = %store, "Store overridden from environment");
            self.store = PathBuf::from(store);
        }
        if let Some(export) = non_empty(ENV_SCHEDULER_EXPORT) {
            self.scheduler_export = Some(PathBuf::from(export));
        }
        if let Some(dir) = non_empty(ENV_SOURCE_DIR) {
            self.source_dir = Some(PathBuf::from(dir));
        }
    }

    /// Reject settings no operation can run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("node_batch_size", self.node_batch_size),
            ("edge_batch_size", self.edge_batch_size),
            ("max_path_hops", self.max_path_hops),
            ("path_search_budget", self.path_search_budget),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{field} must be greater than zero")));
            }
        }
        Ok(())
    }

    /// Override [`StrataConfig::max_path_hops`], keeping the settings valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `hops` is zero; the setting is left unchanged.
    pub fn set_max_path_hops(&mut self, hops: usize) -> Result<()> {
        let previous = std::mem::replace(&mut self.max_path_hops, hops);
        self.validate().inspect_err(|_| self.max_path_hops = previous)
    }

    /// Record source locations.
    #[must_use]
    pub fn estate_paths(&self) -> EstatePaths {
        EstatePaths {
            scheduler_export: self.scheduler_export.clone(),
            source_dir: self.source_dir.clone(),
            jcl_dir: self.jcl_dir.clone(),
        }
    }

    /// Path search bounds.
    #[must_use]
    pub fn path_limits(&self) -> PathLimits {
        PathLimits {
            max_hops: self.max_path_hops,
            budget: self.path_search_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_gives_defaults() {
        let config = StrataConfig::from_yaml("{}").unwrap();
        assert_eq!(config, StrataConfig::default());
        assert_eq!(config.store, PathBuf::from(".strata/graph.db"));
        assert_eq!(config.max_call_depth, 2);
        assert_eq!(config.path_limits(), PathLimits::default());
    }

    #[test]
    fn fields_are_read() {
        let config = StrataConfig::from_yaml(
            "scheduler_export: exports/ctm.xml\n\
             source_dir: src\n\
             node_batch_size: 10\n\
             extra_skip_programs: [MYTOOL]\n",
        )
        .unwrap();

        assert_eq!(config.scheduler_export, Some(PathBuf::from("exports/ctm.xml")));
        assert_eq!(config.node_batch_size, 10);
        assert_eq!(config.edge_batch_size, DEFAULT_EDGE_BATCH_SIZE);
        assert_eq!(config.extra_skip_programs, vec!["MYTOOL".to_string()]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = StrataConfig::from_yaml("edge_batch_size: 0\n").unwrap_err();
        assert!(err.to_string().contains("edge_batch_size"));
    }

    #[test]
    fn unknown_types_are_config_errors() {
        let err = StrataConfig::from_yaml("max_call_depth: deep\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_STORE, "/tmp/other.db"),
            (ENV_SOURCE_DIR, "  "),
            (ENV_SCHEDULER_EXPORT, "ctm"),
        ]
        .into_iter()
        .collect();
        let mut config = StrataConfig {
            source_dir: Some(PathBuf::from("src")),
            ..StrataConfig::default()
        };

        config.apply_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.store, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.scheduler_export, Some(PathBuf::from("ctm")));
        assert_eq!(config.source_dir, Some(PathBuf::from("src")));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.yaml");
        std::fs::write(&path, "max_path_hops: 7\n").unwrap();

        let config = StrataConfig::load(&path).unwrap();
        assert_eq!(config.max_path_hops, 7);
    }

    #[test]
    fn load_names_the_file_in_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.yaml");
        std::fs::write(&path, "path_search_budget: 0\n").unwrap();

        let err = StrataConfig::load(&path).unwrap_err();
        assert!(matches!(&err, Error::Config(m) if m.contains("strata.yaml")));
        assert!(err.to_string().contains("path_search_budget"));
    }

    #[test]
    fn zero_max_path_hops_override_is_rejected() {
        let mut config = StrataConfig::default();

        let err = config.set_max_path_hops(0).unwrap_err();
        assert!(matches!(&err, Error::Config(m) if m.contains("max_path_hops")));
        assert_eq!(config.max_path_hops, DEFAULT_MAX_PATH_HOPS);

        config.set_max_path_hops(3).unwrap();
        assert_eq!(config.path_limits().max_hops, 3);
    }
}
