//! Unit descriptors
//!
//! A descriptor carries a unit's dependencies, whether it is enabled and which
//! of its modules must load first. Descriptors come from two places: explicit
//! registration in a [`DescriptorRegistry`], or the TOML content of the unit's
//! marker file. An explicit registration wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::packaging::traits::{Context, PackagingError, Result};

/// Static metadata of a loadable unit (unit.toml structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    /// Fully qualified unit name (`app.api`)
    #[serde(default)]
    pub name: String,
    /// Units that must be loaded before this one
    #[serde(default)]
    pub depends: Vec<String>,
    /// Disabled units and their whole subtree are excluded from loading
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Module that must load before its siblings
    #[serde(default)]
    pub first_module: Option<String>,
}

fn default_true() -> bool {
    true
}

impl UnitDescriptor {
    /// Default descriptor: no dependencies, enabled, no first module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            enabled: true,
            first_module: None,
        }
    }

    /// Set the dependencies
    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the unit enabled or disabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the first module
    pub fn with_first_module(mut self, module: impl Into<String>) -> Self {
        self.first_module = Some(module.into());
        self
    }

    /// Load a descriptor from a marker file
    ///
    /// An empty (or whitespace-only) marker yields the default descriptor. A
    /// `name` inside the file must match `unit`.
    pub fn from_marker_file<P: AsRef<Path>>(path: P, unit: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PackagingError::InvalidDescriptor {
                unit: unit.to_string(),
                reason: format!("Failed to read marker file: {}", e),
            }
        })?;

        Self::from_toml_str(&contents, unit)
    }

    /// Parse a descriptor from TOML text
    pub fn from_toml_str(contents: &str, unit: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::new(unit));
        }

        let mut descriptor: UnitDescriptor =
            toml::from_str(contents).map_err(|e| PackagingError::InvalidDescriptor {
                unit: unit.to_string(),
                reason: format!("Failed to parse marker TOML: {}", e),
            })?;

        if descriptor.name.is_empty() {
            descriptor.name = unit.to_string();
        } else if descriptor.name != unit {
            return Err(PackagingError::InvalidDescriptor {
                unit: unit.to_string(),
                reason: format!("Declared name [{}] does not match", descriptor.name),
            });
        }

        Ok(descriptor)
    }

    /// Dependencies with duplicates removed, first occurrence kept
    pub fn normalized_depends(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.depends
            .iter()
            .filter(|dep| seen.insert(dep.as_str()))
            .cloned()
            .collect()
    }
}

/// Runs right before a unit loads, with the shared context
pub type ConfigLoader = dyn Fn(&Context) -> anyhow::Result<()> + Send + Sync;

struct Registration {
    descriptor: UnitDescriptor,
    config_loader: Option<Arc<ConfigLoader>>,
}

/// Explicit descriptor registrations keyed by unit name
#[derive(Default)]
pub struct DescriptorRegistry {
    registrations: HashMap<String, Registration>,
}

impl DescriptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any earlier one for the same unit
    pub fn register(&mut self, descriptor: UnitDescriptor) -> &mut Self {
        self.registrations.insert(
            descriptor.name.clone(),
            Registration {
                descriptor,
                config_loader: None,
            },
        );
        self
    }

    /// Register a descriptor together with its config loader
    pub fn register_with_config_loader<F>(
        &mut self,
        descriptor: UnitDescriptor,
        config_loader: F,
    ) -> &mut Self
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registrations.insert(
            descriptor.name.clone(),
            Registration {
                descriptor,
                config_loader: Some(Arc::new(config_loader)),
            },
        );
        self
    }

    /// Registered descriptor for a unit
    pub fn get(&self, unit: &str) -> Option<&UnitDescriptor> {
        self.registrations.get(unit).map(|r| &r.descriptor)
    }

    /// Registered config loader for a unit
    pub fn config_loader(&self, unit: &str) -> Option<Arc<ConfigLoader>> {
        self.registrations
            .get(unit)
            .and_then(|r| r.config_loader.clone())
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl std::fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut units: Vec<&String> = self.registrations.keys().collect();
        units.sort();
        f.debug_struct("DescriptorRegistry")
            .field("units", &units)
            .finish()
    }
}
