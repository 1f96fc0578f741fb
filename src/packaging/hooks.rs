//! Packaging hooks
//!
//! Observers registered on an owner (the [`PackagingManager`]) and notified of
//! lifecycle events in registration order.
//!
//! [`PackagingManager`]: crate::packaging::manager::PackagingManager

use std::any::{type_name, Any};
use std::sync::{Arc, PoisonError, RwLock};

use crate::packaging::traits::{Context, PackagingError, Result};

/// Hook notified while units are being loaded
///
/// Both methods default to doing nothing, so implementors override only the
/// events they care about.
pub trait PackagingHook: Send + Sync {
    /// Called after a unit and all of its modules have been loaded
    fn on_unit_loaded(&self, _unit: &str, _context: &Context) {}

    /// Called once after every unit of the pass has been loaded
    fn on_all_units_loaded(&self, _context: &Context) {}
}

/// Ordered collection of hooks of capability type `H`
pub struct HookRegistry<H: ?Sized> {
    hooks: RwLock<Vec<Arc<H>>>,
}

impl<H: ?Sized + Send + Sync + 'static> HookRegistry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Register a hook
    pub fn register(&self, hook: Arc<H>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Register a dynamically typed hook
    ///
    /// The instance must be a boxed `Arc<H>`. Anything else is rejected with
    /// [`PackagingError::InvalidHookType`].
    pub fn register_erased(&self, instance: Box<dyn Any + Send>) -> Result<()> {
        match instance.downcast::<Arc<H>>() {
            Ok(hook) => {
                self.register(*hook);
                Ok(())
            }
            Err(other) => Err(PackagingError::InvalidHookType {
                expected: type_name::<Arc<H>>().to_string(),
                instance: format!("value of an unrecognized type ({:?})", (*other).type_id()),
            }),
        }
    }

    /// Snapshot of registered hooks in registration order
    pub fn hooks(&self) -> Vec<Arc<H>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no hook is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `notify` on every hook in registration order
    ///
    /// Works on a snapshot, so a hook may register further hooks without
    /// deadlocking; those only see later events.
    pub fn broadcast<F: FnMut(&H)>(&self, mut notify: F) {
        for hook in self.hooks() {
            notify(&hook);
        }
    }
}

impl<H: ?Sized + Send + Sync + 'static> Default for HookRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> std::fmt::Debug for HookRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.hooks.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("HookRegistry").field("hooks", &count).finish()
    }
}

/// Owners that accept hooks
///
/// Implementors only expose their registry; registration and retrieval come
/// for free.
pub trait HookHost {
    /// Capability type accepted by this owner
    type Hook: ?Sized + Send + Sync + 'static;

    /// The owner's hook registry
    fn hook_registry(&self) -> &HookRegistry<Self::Hook>;

    /// Register a hook
    fn register_hook(&self, hook: Arc<Self::Hook>) {
        self.hook_registry().register(hook);
    }

    /// Register a dynamically typed hook, failing on a type mismatch
    fn register_erased_hook(&self, instance: Box<dyn Any + Send>) -> Result<()> {
        self.hook_registry().register_erased(instance)
    }

    /// Registered hooks in registration order
    fn hooks(&self) -> Vec<Arc<Self::Hook>> {
        self.hook_registry().hooks()
    }
}
