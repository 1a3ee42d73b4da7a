//! Back stack entries.

use crate::bundle::Bundle;
use crate::destination::Destination;
use crate::lifecycle::{Lifecycle, LifecycleEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identity of a back stack entry.
///
/// Replacing an entry in place (single-top relaunch, state restoration)
/// preserves the id, so state keyed by it survives the swap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> EntryId {
        EntryId(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> EntryId {
        EntryId::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct EntryLifecycle {
    host: Lifecycle,
    max: Lifecycle,
}

/// One element of the back stack: a destination, the arguments it was
/// navigated with, and its lifecycle bookkeeping.
///
/// Entries are shared as `Arc<BackStackEntry>`; the mutable lifecycle fields
/// sit behind a mutex so snapshots handed to other threads stay readable.
pub struct BackStackEntry {
    id: EntryId,
    destination: Arc<Destination>,
    arguments: Option<Bundle>,
    lifecycle: Mutex<EntryLifecycle>,
    saved_state: Mutex<Option<Bundle>>,
    view_models: Option<Arc<ViewModelStoreProvider>>,
}

impl BackStackEntry {
    pub(crate) fn new(
        destination: Arc<Destination>,
        arguments: Option<Bundle>,
        host_lifecycle: Lifecycle,
        view_models: Option<Arc<ViewModelStoreProvider>>,
    ) -> Arc<BackStackEntry> {
        BackStackEntry::with_id(EntryId::new(), destination, arguments, None, host_lifecycle, view_models)
    }

    pub(crate) fn with_id(
        id: EntryId,
        destination: Arc<Destination>,
        arguments: Option<Bundle>,
        saved_state: Option<Bundle>,
        host_lifecycle: Lifecycle,
        view_models: Option<Arc<ViewModelStoreProvider>>,
    ) -> Arc<BackStackEntry> {
        Arc::new(BackStackEntry {
            id,
            destination,
            arguments,
            lifecycle: Mutex::new(EntryLifecycle {
                host: host_lifecycle,
                max: Lifecycle::Initialized,
            }),
            saved_state: Mutex::new(saved_state),
            view_models,
        })
    }

    /// Recreates an entry in place, keeping its identity but refreshing the
    /// arguments. Used by single-top relaunches.
    pub(crate) fn relaunched(
        old: &Arc<BackStackEntry>,
        arguments: Option<Bundle>,
    ) -> Arc<BackStackEntry> {
        let (host, max) = {
            let lifecycle = old.lifecycle.lock();
            (lifecycle.host, lifecycle.max)
        };
        Arc::new(BackStackEntry {
            id: old.id,
            destination: old.destination.clone(),
            arguments,
            lifecycle: Mutex::new(EntryLifecycle { host, max }),
            saved_state: Mutex::new(old.saved_state.lock().clone()),
            view_models: old.view_models.clone(),
        })
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn destination(&self) -> &Arc<Destination> {
        &self.destination
    }

    pub fn arguments(&self) -> Option<&Bundle> {
        self.arguments.as_ref()
    }

    /// The effective lifecycle state: capped by both the host state and the
    /// controller-assigned maximum.
    pub fn lifecycle_state(&self) -> Lifecycle {
        let lifecycle = self.lifecycle.lock();
        lifecycle.host.min(lifecycle.max)
    }

    pub fn max_lifecycle(&self) -> Lifecycle {
        self.lifecycle.lock().max
    }

    pub(crate) fn set_max_lifecycle(&self, state: Lifecycle) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.max == Lifecycle::Destroyed {
            if state != Lifecycle::Destroyed {
                log::warn!(
                    "ignoring lifecycle transition to {:?} for destroyed entry {}",
                    state,
                    self.id
                );
            }
            return;
        }
        lifecycle.max = state;
    }

    pub(crate) fn set_host_lifecycle(&self, state: Lifecycle) {
        self.lifecycle.lock().host = state;
    }

    /// Forwards a host lifecycle event to this entry.
    pub fn handle_lifecycle_event(&self, event: LifecycleEvent) {
        self.set_host_lifecycle(event.target_state());
    }

    /// UI state captured by the display layer, carried across save/restore.
    pub fn saved_state(&self) -> Option<Bundle> {
        self.saved_state.lock().clone()
    }

    pub fn set_saved_state(&self, state: Option<Bundle>) {
        *self.saved_state.lock() = state;
    }

    /// The keyed store for retained state scoped to this entry.
    pub fn view_model_store(&self) -> Option<Arc<Mutex<ViewModelStore>>> {
        self.view_models
            .as_ref()
            .map(|provider| provider.store_for(self.id))
    }
}

impl fmt::Debug for BackStackEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BackStackEntry")
            .field("id", &self.id)
            .field("destination", &self.destination.id())
            .field("max_lifecycle", &self.max_lifecycle())
            .finish()
    }
}

/// Retained state keyed by name, scoped to a single entry.
#[derive(Default)]
pub struct ViewModelStore {
    models: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ViewModelStore {
    pub fn put(&mut self, key: impl Into<String>, model: Arc<dyn Any + Send + Sync>) {
        self.models.insert(key.into(), model);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.models.get(key).cloned()
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ViewModelStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ViewModelStore")
            .field("keys", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Owns the per-entry [`ViewModelStore`]s for one controller.
#[derive(Default)]
pub struct ViewModelStoreProvider {
    stores: Mutex<HashMap<EntryId, Arc<Mutex<ViewModelStore>>>>,
}

impl ViewModelStoreProvider {
    pub fn store_for(&self, id: EntryId) -> Arc<Mutex<ViewModelStore>> {
        self.stores
            .lock()
            .entry(id)
            .or_insert_with(Default::default)
            .clone()
    }

    /// Drops and clears the store for an entry that is gone for good.
    pub fn clear(&self, id: EntryId) {
        if let Some(store) = self.stores.lock().remove(&id) {
            store.lock().clear();
        }
    }

    pub fn clear_all(&self) {
        let mut stores = self.stores.lock();
        for store in stores.values() {
            store.lock().clear();
        }
        stores.clear();
    }
}

#[test]
fn test_effective_state_is_capped_by_host() {
    use crate::destination::Destination;

    let dest = Arc::new(Destination::builder("screen").id("a").build().unwrap());
    let entry = BackStackEntry::new(dest, None, Lifecycle::Created, None);
    entry.set_max_lifecycle(Lifecycle::Resumed);
    assert_eq!(entry.max_lifecycle(), Lifecycle::Resumed);
    assert_eq!(entry.lifecycle_state(), Lifecycle::Created);

    entry.handle_lifecycle_event(LifecycleEvent::Resume);
    assert_eq!(entry.lifecycle_state(), Lifecycle::Resumed);
}

#[test]
fn test_destroyed_is_terminal() {
    use crate::destination::Destination;

    let dest = Arc::new(Destination::builder("screen").id("a").build().unwrap());
    let entry = BackStackEntry::new(dest, None, Lifecycle::Resumed, None);
    entry.set_max_lifecycle(Lifecycle::Destroyed);
    entry.set_max_lifecycle(Lifecycle::Resumed);
    assert_eq!(entry.max_lifecycle(), Lifecycle::Destroyed);
}

#[test]
fn test_view_model_store_survives_relaunch() {
    use crate::destination::Destination;

    let provider = Arc::new(ViewModelStoreProvider::default());
    let dest = Arc::new(Destination::builder("screen").id("a").build().unwrap());
    let entry = BackStackEntry::new(dest, None, Lifecycle::Resumed, Some(provider.clone()));

    let store = entry.view_model_store().unwrap();
    store.lock().put("counter", Arc::new(3_u32));

    let relaunched = BackStackEntry::relaunched(&entry, None);
    assert_eq!(relaunched.id(), entry.id());
    let restored = relaunched.view_model_store().unwrap();
    let counter = restored.lock().get("counter").unwrap();
    assert_eq!(*counter.downcast::<u32>().unwrap(), 3);
}
