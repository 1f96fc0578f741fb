//! Configuration management for the component loader
//!
//! Handles configuration loading (TOML or JSON) and conversion into the scan
//! rules used during discovery. Callbacks are not part of the file format and
//! are supplied when the manager is constructed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::packaging::registry::discovery::{
    ScanRules, DEFAULT_MARKER_FILE, DEFAULT_MODULE_EXTENSION,
};
use crate::packaging::traits::Context;

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Root unit directories, discovered in this order
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Module loaded first in every unit that has it, unless a unit declares its own
    #[serde(default)]
    pub base_component: Option<String>,

    /// Unit name patterns to ignore (`*` matches one segment, shorter patterns cover subtrees)
    #[serde(default)]
    pub ignored_units: Vec<String>,

    /// Module names, or trailing parts of them, to ignore
    #[serde(default)]
    pub ignored_modules: Vec<String>,

    /// Log per-unit progress and the pass summary at info level
    #[serde(default = "default_true")]
    pub verbose: bool,

    /// File marking a directory as a unit
    #[serde(default = "default_marker_file")]
    pub marker_file: String,

    /// Extension of module files
    #[serde(default = "default_module_extension")]
    pub module_extension: String,

    /// Shared context forwarded to every callback and hook
    #[serde(default)]
    pub context: Context,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_true() -> bool {
    true
}

fn default_marker_file() -> String {
    DEFAULT_MARKER_FILE.to_string()
}

fn default_module_extension() -> String {
    DEFAULT_MODULE_EXTENSION.to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            base_component: None,
            ignored_units: Vec::new(),
            ignored_modules: Vec::new(),
            verbose: true,
            marker_file: default_marker_file(),
            module_extension: default_module_extension(),
            context: Context::new(),
            logging: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (e.g. "info", "component_loader=debug"). RUST_LOG wins when set.
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (needs the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

impl LoaderConfig {
    /// Configuration with the given roots and defaults for everything else
    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, picking the format from the file extension
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            Some("toml") => Self::from_toml_file(path),
            other => anyhow::bail!(
                "Unsupported config format {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ),
        }
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Discovery rules derived from this configuration
    pub fn scan_rules(&self) -> ScanRules {
        ScanRules {
            marker_file: self.marker_file.clone(),
            module_extension: self.module_extension.trim_start_matches('.').to_string(),
            ignored_units: self.ignored_units.clone(),
            ignored_modules: self.ignored_modules.clone(),
        }
    }
}
