//! Packaging traits and error types
//!
//! Defines the load capability the host supplies, the shared context handed to
//! every callback, and the errors a load pass can fail with.

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Shared context forwarded to descriptor config loaders, ignore detectors,
/// module callbacks and hooks.
pub type Context = HashMap<String, serde_json::Value>;

/// Load capability supplied by the host runtime
///
/// `load` receives fully qualified names (`app.api` for a unit,
/// `app.api.routes` for a module). It must be safe to call more than once for
/// the same name.
pub trait Loader: Send + Sync {
    /// Whatever the host hands back for a loaded unit or module
    type Handle: 'static;

    /// Load the unit or module with the given fully qualified name
    fn load(&self, name: &str) -> anyhow::Result<Self::Handle>;
}

impl<L: Loader + ?Sized> Loader for std::sync::Arc<L> {
    type Handle = L::Handle;

    fn load(&self, name: &str) -> anyhow::Result<Self::Handle> {
        (**self).load(name)
    }
}

/// Decides whether a unit (`is_module == false`) or a module should be ignored
pub type IgnoreDetector = dyn Fn(&str, bool, &Context) -> bool + Send + Sync;

/// Invoked with every loaded module and its handle
pub type ModuleCallback<H> = dyn Fn(&str, &H, &Context) + Send + Sync;

/// A unit that cannot make progress, with the names it is still waiting on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledUnit {
    /// Unit name
    pub unit: String,
    /// Dependencies (and possibly the parent unit) not loaded yet
    pub waiting_on: Vec<String>,
}

impl std::fmt::Display for StalledUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> [{}]", self.unit, self.waiting_on.join(", "))
    }
}

/// Packaging errors
///
/// Every variant is terminal for the current load pass.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Provided root path [{}] is invalid", .0.display())]
    InvalidRootPath(PathBuf),

    #[error("Input unit name [{0}] is invalid")]
    InvalidUnitName(String),

    #[error("Invalid descriptor for unit [{unit}]: {reason}")]
    InvalidDescriptor { unit: String, reason: String },

    #[error("Component module [{module}] not found in [{unit}] unit")]
    ComponentModuleNotFound { module: String, unit: String },

    #[error("Input parameter [{instance}] is not an instance of [{expected}]")]
    InvalidHookType { expected: String, instance: String },

    #[error("There is a circular dependency between [{unit}] and [{other}] units")]
    CircularDependency { unit: String, other: String },

    #[error("Unit [{0}] has a dependency on itself")]
    SelfDependency(String),

    #[error("Unit [{unit}] has a dependency on its sub-unit [{child}]")]
    SubUnitDependency { unit: String, child: String },

    #[error("Provided dependency unit [{dependency}] specified in [{unit}] unit, does not exist")]
    DependencyNotFound { dependency: String, unit: String },

    #[error("Provided dependency unit [{dependency}] specified in [{unit}] unit, is ignored")]
    DependencyIgnored { dependency: String, unit: String },

    #[error("Provided dependency unit [{dependency}] specified in [{unit}] unit, is disabled")]
    DependencyDisabled { dependency: String, unit: String },

    #[error("Units could not be ordered, unresolved: {}", format_stalled(.0))]
    UnresolvedDependencies(Vec<StalledUnit>),

    #[error("Failed to load [{name}]: {source}")]
    LoadFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Discovery failed: {0}")]
    Discovery(String),
}

fn format_stalled(stalled: &[StalledUnit]) -> String {
    stalled
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<walkdir::Error> for PackagingError {
    fn from(e: walkdir::Error) -> Self {
        PackagingError::Discovery(e.to_string())
    }
}

impl From<std::io::Error> for PackagingError {
    fn from(e: std::io::Error) -> Self {
        PackagingError::Discovery(e.to_string())
    }
}

/// Result alias used across the packaging engine
pub type Result<T> = std::result::Result<T, PackagingError>;
