//! Packaging manager for orchestrating a load pass
//!
//! Owns the configuration and callbacks, and runs discovery, dependency
//! validation and loading exactly once, however many threads ask for it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::packaging::hooks::{HookHost, HookRegistry, PackagingHook};
use crate::packaging::loader::ComponentLoader;
use crate::packaging::registry::{
    DependencyResolver, DescriptorRegistry, DiscoveryReport, DiscoveryScanner, RootComponents,
    ScanRules,
};
use crate::packaging::singleton::SingletonRegistry;
use crate::packaging::traits::{
    Context, IgnoreDetector, Loader, ModuleCallback, PackagingError, Result,
};

/// Lifecycle of the manager's load pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    NotStarted,
    Loading,
    Loaded,
}

/// Discovered components and the order they would load in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    /// Per-root component tables
    pub roots: Vec<RootComponents>,
    /// Unit names in load order
    pub order: Vec<String>,
}

/// Packaging manager
pub struct PackagingManager<L: Loader> {
    config: LoaderConfig,
    /// Absolute root directories, in configured order
    roots: Vec<PathBuf>,
    rules: ScanRules,
    loader: L,
    descriptors: DescriptorRegistry,
    ignore_detector: Option<Box<IgnoreDetector>>,
    module_callback: Option<Box<ModuleCallback<L::Handle>>>,
    hooks: HookRegistry<dyn PackagingHook>,
    /// Fast-path flag, set once the pass succeeded
    loaded: AtomicBool,
    load_lock: Mutex<()>,
    phase: RwLock<LoadPhase>,
    /// Append-only during a pass
    loaded_units: RwLock<Vec<String>>,
    components: RwLock<Vec<RootComponents>>,
}

impl<L: Loader> PackagingManager<L> {
    /// Create a manager
    ///
    /// Every configured root must be an existing directory, otherwise this
    /// fails with [`PackagingError::InvalidRootPath`].
    pub fn new(config: LoaderConfig, loader: L) -> Result<Self> {
        if config.roots.is_empty() {
            return Err(PackagingError::InvalidRootPath(PathBuf::new()));
        }

        let mut roots: Vec<PathBuf> = Vec::with_capacity(config.roots.len());
        let mut seen: Vec<PathBuf> = Vec::with_capacity(config.roots.len());
        for root in &config.roots {
            let invalid = || PackagingError::InvalidRootPath(root.clone());
            let canonical = std::fs::canonicalize(root)
                .ok()
                .filter(|path| path.is_dir())
                .ok_or_else(invalid)?;
            // Names derive from the configured path, symlinks are not resolved
            let absolute = std::path::absolute(root)
                .ok()
                .filter(|path| path.parent().is_some())
                .ok_or_else(invalid)?;

            if seen.contains(&canonical) {
                warn!(root = %root.display(), "root configured twice, ignoring duplicate");
                continue;
            }
            seen.push(canonical);
            roots.push(absolute);
        }

        let rules = config.scan_rules();

        Ok(Self {
            config,
            roots,
            rules,
            loader,
            descriptors: DescriptorRegistry::new(),
            ignore_detector: None,
            module_callback: None,
            hooks: HookRegistry::new(),
            loaded: AtomicBool::new(false),
            load_lock: Mutex::new(()),
            phase: RwLock::new(LoadPhase::NotStarted),
            loaded_units: RwLock::new(Vec::new()),
            components: RwLock::new(Vec::new()),
        })
    }

    /// Decide per unit or module whether it should be ignored
    pub fn with_ignore_detector<F>(mut self, detector: F) -> Self
    where
        F: Fn(&str, bool, &Context) -> bool + Send + Sync + 'static,
    {
        self.ignore_detector = Some(Box::new(detector));
        self
    }

    /// Run a callback after every module load, with the module's handle
    pub fn with_module_loader<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &L::Handle, &Context) + Send + Sync + 'static,
    {
        self.module_callback = Some(Box::new(callback));
        self
    }

    /// Use explicitly registered descriptors (they take precedence over marker files)
    pub fn with_descriptors(mut self, descriptors: DescriptorRegistry) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Register a hook shared through a singleton registry
    ///
    /// The hook is created at most once per registry and type; the shared
    /// instance is returned.
    pub fn register_shared_hook<T, F>(&self, registry: &SingletonRegistry, init: F) -> Arc<T>
    where
        T: PackagingHook + 'static,
        F: FnOnce() -> T,
    {
        let hook: Arc<T> = registry.get_or_init(init);
        self.register_hook(Arc::clone(&hook) as Arc<dyn PackagingHook>);
        hook
    }

    /// Discover, validate and load every unit
    ///
    /// Runs at most one successful pass. Concurrent callers block until the
    /// running pass finishes; later calls return immediately. A failed pass
    /// returns the manager to [`LoadPhase::NotStarted`], so it may be retried.
    pub fn load_components(&self) -> Result<()> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        self.set_phase(LoadPhase::Loading);
        match self.run_pass() {
            Ok(()) => {
                self.set_phase(LoadPhase::Loaded);
                self.loaded.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!("Load pass failed: {}", e);
                self.set_phase(LoadPhase::NotStarted);
                Err(e)
            }
        }
    }

    fn run_pass(&self) -> Result<()> {
        let started = Instant::now();
        self.log("Loading units...");

        self.loaded_units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let report = self.discover()?;
        *self.components.write().unwrap_or_else(PoisonError::into_inner) = report.roots.clone();

        let table = report.combined();
        let mut resolver = self.resolver(&report);
        resolver.validate(&table)?;

        let component_loader = ComponentLoader::new(
            &self.loader,
            &report.descriptors,
            &self.descriptors,
            &self.hooks,
            &self.loaded_units,
            &self.config.context,
        )
        .with_base_component(self.config.base_component.as_deref())
        .with_module_callback(self.module_callback.as_deref())
        .with_verbose(self.config.verbose);

        let order = resolver.resolve_and_load(&table, &component_loader)?;

        self.hooks
            .broadcast(|hook| hook.on_all_units_loaded(&self.config.context));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if self.config.verbose {
            info!(units = order.len(), elapsed_ms, "Total of {} units loaded", order.len());
        } else {
            debug!(units = order.len(), elapsed_ms, "Total of {} units loaded", order.len());
        }

        Ok(())
    }

    /// Discover units and compute their load order without loading anything
    pub fn plan(&self) -> Result<LoadPlan> {
        let report = self.discover()?;
        let table = report.combined();
        let mut resolver = self.resolver(&report);
        resolver.validate(&table)?;
        let order = resolver.plan(&table)?;

        Ok(LoadPlan {
            roots: report.roots,
            order,
        })
    }

    fn discover(&self) -> Result<DiscoveryReport> {
        DiscoveryScanner::new(&self.rules, &self.descriptors, &self.config.context)
            .with_ignore_detector(self.ignore_detector.as_deref())
            .scan(&self.roots)
    }

    fn resolver<'a>(&'a self, report: &'a DiscoveryReport) -> DependencyResolver<'a> {
        DependencyResolver::new(report, &self.rules, &self.config.context)
            .with_ignore_detector(self.ignore_detector.as_deref())
    }

    fn set_phase(&self, phase: LoadPhase) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn log(&self, message: &str) {
        if self.config.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    /// Loaded unit names in load order
    pub fn loaded_units(&self) -> Vec<String> {
        self.loaded_units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a unit has been loaded
    pub fn is_unit_loaded(&self, name: &str) -> bool {
        self.loaded_units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|unit| unit == name)
    }

    /// Copy of the shared context
    pub fn context(&self) -> Context {
        self.config.context.clone()
    }

    /// Current phase
    pub fn phase(&self) -> LoadPhase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-root component tables of the last pass
    pub fn components(&self) -> Vec<RootComponents> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Absolute root directories, as configured (symlinks kept)
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Configuration the manager was built with
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl<L: Loader + 'static> PackagingManager<L> {
    /// Shared manager instance of a singleton registry
    ///
    /// `init` only runs if the registry has no manager of this type yet.
    pub fn shared<F>(registry: &SingletonRegistry, init: F) -> Arc<Self>
    where
        F: FnOnce() -> Self,
    {
        registry.get_or_init(init)
    }
}

impl<L: Loader> HookHost for PackagingManager<L> {
    type Hook = dyn PackagingHook;

    fn hook_registry(&self) -> &HookRegistry<dyn PackagingHook> {
        &self.hooks
    }
}

impl<L: Loader> std::fmt::Debug for PackagingManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagingManager")
            .field("roots", &self.roots)
            .field("phase", &self.phase())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
