//! Persisted controller state.
//!
//! The controller serializes to a [`SavedNavState`] blob; the embedder
//! decides how to encode and store it (`serde_json`, a platform state store,
//! …). Restoration happens in two phases: the blob is handed back with
//! `NavController::restore_state`, and the parts that need a live graph are
//! applied when the graph is set.

use crate::bundle::Bundle;
use crate::destination::Destination;
use crate::entry::{BackStackEntry, EntryId, ViewModelStoreProvider};
use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Serialized form of a single back stack entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub id: EntryId,
    pub destination_id: String,
    pub arguments: Option<Bundle>,
    pub saved_state: Option<Bundle>,
}

impl SavedEntry {
    pub(crate) fn capture(entry: &BackStackEntry) -> SavedEntry {
        SavedEntry {
            id: entry.id(),
            destination_id: entry.destination().id().to_string(),
            arguments: entry.arguments().cloned(),
            saved_state: entry.saved_state(),
        }
    }

    /// Token identifying the saved stack this entry leads; the first entry
    /// of a saved stack names the whole deque.
    pub(crate) fn token(&self) -> String {
        self.id.to_string()
    }

    pub(crate) fn instantiate(
        &self,
        destination: Arc<Destination>,
        host_lifecycle: Lifecycle,
        view_models: Option<Arc<ViewModelStoreProvider>>,
    ) -> Arc<BackStackEntry> {
        BackStackEntry::with_id(
            self.id,
            destination,
            self.arguments.clone(),
            self.saved_state.clone(),
            host_lifecycle,
            view_models,
        )
    }
}

/// Everything a controller needs to reconstruct itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedNavState {
    /// Per-navigator opaque state, keyed by navigator name.
    pub navigator_state: BTreeMap<String, Bundle>,
    /// The live back stack, bottom to top.
    pub back_stack: Vec<SavedEntry>,
    /// Destination id → token of the saved stack that restores it.
    pub saved_stack_tokens: BTreeMap<String, Option<String>>,
    /// Token → saved stack contents, bottom to top.
    pub saved_stacks: BTreeMap<String, Vec<SavedEntry>>,
    /// Whether an external deep link has already been dispatched.
    pub deep_link_handled: bool,
}

impl SavedNavState {
    pub fn is_empty(&self) -> bool {
        self.navigator_state.is_empty()
            && self.back_stack.is_empty()
            && self.saved_stack_tokens.is_empty()
            && self.saved_stacks.is_empty()
            && !self.deep_link_handled
    }
}

#[test]
fn test_round_trips_through_json() {
    let mut arguments = Bundle::new();
    arguments.insert("userId", 9);
    let entry = SavedEntry {
        id: EntryId::new(),
        destination_id: "profile".into(),
        arguments: Some(arguments),
        saved_state: None,
    };
    let mut state = SavedNavState::default();
    state.back_stack.push(entry.clone());
    state
        .saved_stack_tokens
        .insert("home".into(), Some(entry.token()));
    state
        .saved_stacks
        .insert(entry.token(), vec![entry]);

    let encoded = serde_json::to_string(&state).unwrap();
    let decoded: SavedNavState = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, state);
    assert!(!decoded.is_empty());
}
