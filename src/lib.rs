//! Component Loader - dependency-ordered startup loading of component units
//!
//! Applications made of many loosely coupled units (feature modules,
//! subsystems) lay them out as a directory tree. This crate discovers those
//! units, checks their declared dependencies, and loads them in an order where
//! every unit comes after its parent and its dependencies. What "loading" a
//! name means is up to the host, through the [`Loader`] trait.
//!
//! ## Layout
//!
//! 1. `config` - file-backed configuration (TOML or JSON)
//! 2. `packaging` - discovery, resolution, loading and the orchestrating manager
//! 3. `utils` - logging setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use component_loader::{Loader, LoaderConfig, PackagingManager};
//!
//! struct Host;
//!
//! impl Loader for Host {
//!     type Handle = ();
//!
//!     fn load(&self, name: &str) -> anyhow::Result<()> {
//!         println!("loading {}", name);
//!         Ok(())
//!     }
//! }
//!
//! let config = LoaderConfig::with_roots(["/srv/app"]);
//! let manager = PackagingManager::new(config, Host)?;
//! manager.load_components()?;
//! println!("{:?}", manager.loaded_units());
//! # Ok::<(), component_loader::PackagingError>(())
//! ```

pub mod config;
pub mod packaging;
pub mod utils;

pub use config::{LoaderConfig, LoggingConfig};
pub use packaging::{
    HookHost, LoadPhase, Loader, PackagingError, PackagingHook, PackagingManager, Result,
    SingletonRegistry,
};
