//! Component loading
//!
//! Performs the per-unit load protocol once a unit is ready.

#[allow(clippy::module_inception)]
pub mod loader;

pub use loader::ComponentLoader;
