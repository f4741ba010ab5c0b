//! Process-wide cache of shared read-only resources.
//!
//! Large tables such as vocabularies are loaded once per name and handed out
//! as [`Arc`]s. The store itself only keeps weak references, so a resource is
//! released as soon as the last transition system, transition state or
//! feature function holding it is dropped.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use once_cell::sync::Lazy;

use crate::errors::Result;

type Entries = HashMap<(TypeId, String), Weak<dyn Any + Send + Sync>>;

static STORE: Lazy<Mutex<Entries>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn entries() -> MutexGuard<'static, Entries> {
    STORE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the process-wide resource cache
pub struct SharedStore;

impl SharedStore {
    /// Get the resource registered under `name`, loading it if necessary
    ///
    /// Concurrent callers asking for the same name and type receive the same
    /// `Arc`; `load` runs at most once while the resource is alive. A failed
    /// load leaves nothing behind in the store.
    pub fn get_or_load<T, F>(name: &str, load: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        let key = (TypeId::of::<T>(), name.to_string());
        // Loading under the lock keeps two callers from loading the same table.
        let mut entries = entries();
        if let Some(resource) = entries.get(&key).and_then(Weak::upgrade) {
            if let Ok(resource) = resource.downcast::<T>() {
                log::debug!("shared store hit for {}", name);
                return Ok(resource);
            }
        }
        entries.retain(|_, weak| weak.strong_count() > 0);

        let resource = Arc::new(load()?);
        let erased: Arc<dyn Any + Send + Sync> = resource.clone();
        entries.insert(key, Arc::downgrade(&erased));
        Ok(resource)
    }

    /// Whether a live resource of type `T` is registered under `name`
    pub fn contains<T: Any + Send + Sync>(name: &str) -> bool {
        entries()
            .get(&(TypeId::of::<T>(), name.to_string()))
            .map_or(false, |weak| weak.strong_count() > 0)
    }

    /// Release a handle obtained from [`SharedStore::get_or_load`]
    ///
    /// Returns `true` if this was the last handle and the resource was freed.
    pub fn release<T: Any + Send + Sync>(name: &str, resource: Arc<T>) -> bool {
        let key = (TypeId::of::<T>(), name.to_string());
        // The lock keeps get_or_load from handing out the resource in between.
        let mut entries = entries();
        drop(resource);
        let freed = entries
            .get(&key)
            .map_or(false, |weak| weak.strong_count() == 0);
        if freed {
            entries.remove(&key);
            log::debug!("released shared resource {}", name);
        }
        freed
    }
}
