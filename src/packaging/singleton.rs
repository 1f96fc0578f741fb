//! Thread-safe singleton registry
//!
//! Holds at most one instance per scope. Two scoping policies exist:
//!
//! - **Unique**: one instance for a whole family. The family is named by a
//!   type, usually a trait object such as `dyn PackagingHook`; whichever
//!   implementation is created first is handed to every later request.
//! - **Per type**: one instance per concrete type.
//!
//! Creation uses the double-checked pattern: a read-locked lookup, and only on
//! a miss the creation lock, a second lookup, then construction.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// Scoping policy of a registered instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// One instance shared by the whole family
    Unique,
    /// One instance per concrete type
    PerType,
}

type ScopeKey = (ScopeKind, TypeId);

/// Registry of lazily created singleton instances
#[derive(Default)]
pub struct SingletonRegistry {
    instances: RwLock<HashMap<ScopeKey, Box<dyn Any + Send + Sync>>>,
    create_lock: Mutex<()>,
}

impl SingletonRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static SingletonRegistry {
        static GLOBAL: OnceLock<SingletonRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SingletonRegistry::new)
    }

    /// Get the instance of `T`, creating it with `init` on first use.
    pub fn get_or_init<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.get_or_insert_with((ScopeKind::PerType, TypeId::of::<T>()), type_name::<T>(), || {
            Arc::new(init())
        })
    }

    /// Get the single instance of family `F`, creating it with `init` on first use.
    ///
    /// Once any member of the family exists, `init` is never called again and
    /// every caller receives that member.
    pub fn get_or_init_unique<F, I>(&self, init: I) -> Arc<F>
    where
        F: ?Sized + Send + Sync + 'static,
        I: FnOnce() -> Arc<F>,
    {
        self.get_or_insert_with((ScopeKind::Unique, TypeId::of::<F>()), type_name::<F>(), init)
    }

    /// Check whether an instance exists for `T` under the given policy.
    pub fn contains<T: ?Sized + 'static>(&self, kind: ScopeKind) -> bool {
        self.read_instances().contains_key(&(kind, TypeId::of::<T>()))
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.read_instances().len()
    }

    /// Whether no instance has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_insert_with<T, I>(&self, key: ScopeKey, name: &str, init: I) -> Arc<T>
    where
        T: ?Sized + Send + Sync + 'static,
        I: FnOnce() -> Arc<T>,
    {
        if let Some(existing) = self.lookup::<T>(&key) {
            return existing;
        }

        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.lookup::<T>(&key) {
            return existing;
        }

        debug!(scope = ?key.0, type_name = name, "creating singleton instance");
        let instance = init();
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Box::new(Arc::clone(&instance)));
        instance
    }

    fn lookup<T: ?Sized + Send + Sync + 'static>(&self, key: &ScopeKey) -> Option<Arc<T>> {
        self.read_instances()
            .get(key)
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
    }

    fn read_instances(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<ScopeKey, Box<dyn Any + Send + Sync>>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("instances", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    trait Service: Send + Sync {
        fn label(&self) -> &'static str;
    }

    struct Base;
    struct Derived;

    impl Service for Base {
        fn label(&self) -> &'static str {
            "base"
        }
    }

    impl Service for Derived {
        fn label(&self) -> &'static str {
            "derived"
        }
    }

    #[test]
    fn test_per_type_returns_same_instance() {
        let registry = SingletonRegistry::new();
        let first = registry.get_or_init(|| Base);
        let second = registry.get_or_init(|| Base);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.contains::<Base>(ScopeKind::PerType));
    }

    #[test]
    fn test_per_type_distinct_types_get_distinct_instances() {
        let registry = SingletonRegistry::new();
        let _base = registry.get_or_init(|| Base);
        let _derived = registry.get_or_init(|| Derived);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unique_scope_shared_by_family() {
        let registry = SingletonRegistry::new();
        let first: Arc<dyn Service> =
            registry.get_or_init_unique(|| Arc::new(Base) as Arc<dyn Service>);
        let second: Arc<dyn Service> =
            registry.get_or_init_unique(|| Arc::new(Derived) as Arc<dyn Service>);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.label(), "base");
        assert!(registry.contains::<dyn Service>(ScopeKind::Unique));
        assert!(!registry.contains::<dyn Service>(ScopeKind::PerType));
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        let registry = Arc::new(SingletonRegistry::new());
        let constructed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let constructed = Arc::clone(&constructed);
                thread::spawn(move || {
                    registry.get_or_init(|| {
                        constructed.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        Base
                    })
                })
            })
            .collect();

        let instances: Vec<Arc<Base>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
