//! Packaging engine
//!
//! Discovers units (directories holding a marker file) under one or more
//! roots, validates their declared dependencies, and loads them so that every
//! unit loads after its parent and after everything it depends on.
//!
//! ## Pieces
//!
//! - **Discovery**: [`DiscoveryScanner`] walks the roots and builds the component table
//! - **Resolution**: [`DependencyResolver`] validates dependencies and orders units
//! - **Loading**: [`ComponentLoader`] runs the per-unit load protocol
//! - **Orchestration**: [`PackagingManager`] drives one pass, exactly once
//! - **Extensibility**: [`HookRegistry`] and [`SingletonRegistry`]

pub mod hooks;
pub mod loader;
pub mod manager;
pub mod naming;
pub mod registry;
pub mod singleton;
pub mod traits;

pub use hooks::{HookHost, HookRegistry, PackagingHook};
pub use loader::ComponentLoader;
pub use manager::{LoadPhase, LoadPlan, PackagingManager};
pub use registry::{
    ComponentTable, DependencyResolver, DescriptorRegistry, DiscoveryReport, DiscoveryScanner,
    RootComponents, ScanRules, UnitComponents, UnitDescriptor,
};
pub use singleton::{ScopeKind, SingletonRegistry};
pub use traits::{
    Context, IgnoreDetector, Loader, ModuleCallback, PackagingError, Result, StalledUnit,
};
