//! Unit registry and discovery
//!
//! Handles unit discovery, descriptors, and dependency resolution.

pub mod dependencies;
pub mod discovery;
pub mod manifest;

pub use dependencies::DependencyResolver;
pub use discovery::{
    ComponentTable, DiscoveryReport, DiscoveryScanner, RootComponents, ScanRules, UnitComponents,
    DEFAULT_MARKER_FILE, DEFAULT_MODULE_EXTENSION,
};
pub use manifest::{ConfigLoader, DescriptorRegistry, UnitDescriptor};
