//! Component loader implementation
//!
//! Loads one ready unit: the unit itself, its config loader, its first module,
//! then every remaining module, and finally records the unit as loaded.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use crate::packaging::hooks::{HookRegistry, PackagingHook};
use crate::packaging::naming;
use crate::packaging::registry::discovery::UnitComponents;
use crate::packaging::registry::manifest::{DescriptorRegistry, UnitDescriptor};
use crate::packaging::traits::{Context, Loader, ModuleCallback, PackagingError, Result};

/// Loader for ready units
pub struct ComponentLoader<'a, L: Loader> {
    loader: &'a L,
    descriptors: &'a HashMap<String, UnitDescriptor>,
    registry: &'a DescriptorRegistry,
    hooks: &'a HookRegistry<dyn PackagingHook>,
    loaded_units: &'a RwLock<Vec<String>>,
    context: &'a Context,
    base_component: Option<&'a str>,
    module_callback: Option<&'a ModuleCallback<L::Handle>>,
    verbose: bool,
}

impl<'a, L: Loader> ComponentLoader<'a, L> {
    /// Create a component loader
    ///
    /// `descriptors` holds the effective descriptor of every discovered unit,
    /// `registry` supplies config loaders, and every loaded unit is appended to
    /// `loaded_units`.
    pub fn new(
        loader: &'a L,
        descriptors: &'a HashMap<String, UnitDescriptor>,
        registry: &'a DescriptorRegistry,
        hooks: &'a HookRegistry<dyn PackagingHook>,
        loaded_units: &'a RwLock<Vec<String>>,
        context: &'a Context,
    ) -> Self {
        Self {
            loader,
            descriptors,
            registry,
            hooks,
            loaded_units,
            context,
            base_component: None,
            module_callback: None,
            verbose: true,
        }
    }

    /// Default first module, skipped for units that do not have it
    pub fn with_base_component(mut self, base_component: Option<&'a str>) -> Self {
        self.base_component = base_component;
        self
    }

    /// Callback invoked after every module load
    pub fn with_module_callback(mut self, callback: Option<&'a ModuleCallback<L::Handle>>) -> Self {
        self.module_callback = callback;
        self
    }

    /// Log per-unit progress at info instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load a unit and all of its modules
    pub fn load_unit(&self, unit: &UnitComponents) -> Result<()> {
        self.load_name(&unit.name)?;

        if let Some(config_loader) = self.registry.config_loader(&unit.name) {
            config_loader(self.context).map_err(|source| PackagingError::LoadFailed {
                name: unit.name.clone(),
                source,
            })?;
        }

        let first = self.first_module(unit)?;
        if let Some(first) = first {
            self.load_module(first)?;
        }

        for module in unit.modules.iter().filter(|m| Some(m.as_str()) != first) {
            self.load_module(module)?;
        }

        self.loaded_units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(unit.name.clone());

        if self.verbose {
            info!(unit = %unit.name, modules = unit.modules.len(), "unit loaded");
        } else {
            debug!(unit = %unit.name, modules = unit.modules.len(), "unit loaded");
        }

        self.hooks
            .broadcast(|hook| hook.on_unit_loaded(&unit.name, self.context));

        Ok(())
    }

    /// Resolve the module that must load before its siblings
    ///
    /// An explicit override must be present among the unit's modules; the
    /// default base component is only used when the unit has it.
    fn first_module<'u>(&self, unit: &'u UnitComponents) -> Result<Option<&'u str>> {
        let explicit = self
            .descriptors
            .get(&unit.name)
            .and_then(|d| d.first_module.as_deref());

        if let Some(component) = explicit {
            let module = naming::first_module_name(&unit.name, component);
            return match Self::find(unit, &module) {
                Some(found) => Ok(Some(found)),
                None => Err(PackagingError::ComponentModuleNotFound {
                    module,
                    unit: unit.name.clone(),
                }),
            };
        }

        Ok(self
            .base_component
            .map(|component| naming::first_module_name(&unit.name, component))
            .and_then(|module| Self::find(unit, &module)))
    }

    fn find<'u>(unit: &'u UnitComponents, module: &str) -> Option<&'u str> {
        unit.modules
            .iter()
            .find(|m| m.as_str() == module)
            .map(String::as_str)
    }

    fn load_module(&self, module: &str) -> Result<()> {
        let handle = self.load_name(module)?;
        debug!(module = %module, "module loaded");

        if let Some(callback) = self.module_callback {
            callback(module, &handle, self.context);
        }

        Ok(())
    }

    fn load_name(&self, name: &str) -> Result<L::Handle> {
        self.loader
            .load(name)
            .map_err(|source| PackagingError::LoadFailed {
                name: name.to_string(),
                source,
            })
    }
}
