//! Navigators.
//!
//! A navigator knows how to show one kind of destination. The controller
//! never talks to a concrete navigator type: everything goes through the
//! [`Navigator`] trait and the [`NavigatorProvider`] registry, keyed by the
//! navigator name each destination declares.
//!
//! Navigators receive a [`NavContext`] for every controller-driven call and
//! report structural changes back through it; they never mutate the combined
//! back stack directly.

use crate::bundle::Bundle;
use crate::controller::NavContext;
use crate::destination::{Destination, DestinationBuilder};
use crate::entry::BackStackEntry;
use crate::error::NavError;
use crate::options::NavOptions;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub const SCREEN_NAVIGATOR: &str = "screen";
pub const GRAPH_NAVIGATOR: &str = "graph";
pub const DIALOG_NAVIGATOR: &str = "dialog";

pub trait Navigator: Send {
    /// The name destinations use to select this navigator.
    fn name(&self) -> &str;

    /// A destination builder pre-bound to this navigator.
    fn create_destination(&self) -> DestinationBuilder {
        Destination::builder(self.name())
    }

    /// Shows the given entries, in order. Implementations accept each entry
    /// by pushing it through the context.
    fn navigate(
        &mut self,
        cx: &mut NavContext<'_>,
        entries: Vec<Arc<BackStackEntry>>,
        _options: Option<&NavOptions>,
        _extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        for entry in entries {
            cx.push(entry)?;
        }
        Ok(())
    }

    /// Pops `pop_up_to` (the current top entry) off this navigator's stack.
    fn pop_back_stack(
        &mut self,
        cx: &mut NavContext<'_>,
        pop_up_to: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        cx.pop(pop_up_to, save_state)
    }

    /// An entry at the top of the stack was relaunched in place.
    fn on_launch_single_top(&mut self, cx: &mut NavContext<'_>, entry: Arc<BackStackEntry>) {
        cx.relaunch(entry);
    }

    /// Opaque navigator state included in the persisted blob.
    fn on_save_state(&mut self) -> Option<Bundle> {
        None
    }

    fn on_restore_state(&mut self, _state: Bundle) {}
}

/// Registry of navigators, keyed by name.
#[derive(Default)]
pub struct NavigatorProvider {
    navigators: HashMap<String, Arc<Mutex<dyn Navigator>>>,
}

impl NavigatorProvider {
    pub fn add(&mut self, navigator: impl Navigator + 'static) {
        let name = navigator.name().to_string();
        self.navigators.insert(name, Arc::new(Mutex::new(navigator)));
    }

    pub fn get(&self, name: &str) -> Result<Arc<Mutex<dyn Navigator>>, NavError> {
        self.navigators
            .get(name)
            .cloned()
            .ok_or_else(|| NavError::NavigatorMissing {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.navigators.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.navigators.keys().cloned().collect();
        names.sort();
        names
    }
}

/// The controller-owned slice of back stack state for one navigator: the
/// entries it currently shows and the subset still animating.
///
/// Both lists live behind mutexes so snapshot reads stay safe from any
/// thread; all structural mutation happens on the controller's thread.
pub struct NavigatorState {
    back_stack: Mutex<Vec<Arc<BackStackEntry>>>,
    transitions: Mutex<Vec<Arc<BackStackEntry>>>,
}

impl NavigatorState {
    pub(crate) fn new() -> NavigatorState {
        NavigatorState {
            back_stack: Mutex::new(Vec::new()),
            transitions: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of this navigator's entries, bottom to top.
    pub fn back_stack(&self) -> Vec<Arc<BackStackEntry>> {
        self.back_stack.lock().clone()
    }

    /// Snapshot of the entries whose enter or exit transition has not been
    /// marked complete yet.
    pub fn transitions_in_progress(&self) -> Vec<Arc<BackStackEntry>> {
        self.transitions.lock().clone()
    }

    pub(crate) fn add_internal(&self, entry: Arc<BackStackEntry>) {
        self.back_stack.lock().push(entry);
    }

    pub(crate) fn add_transition(&self, entry: &Arc<BackStackEntry>) {
        let mut transitions = self.transitions.lock();
        if !transitions.iter().any(|e| Arc::ptr_eq(e, entry)) {
            transitions.push(entry.clone());
        }
    }

    pub(crate) fn remove_transition(&self, entry: &Arc<BackStackEntry>) {
        self.transitions.lock().retain(|e| !Arc::ptr_eq(e, entry));
    }

    pub(crate) fn contains_transition(&self, entry: &Arc<BackStackEntry>) -> bool {
        self.transitions
            .lock()
            .iter()
            .any(|e| Arc::ptr_eq(e, entry))
    }

    pub(crate) fn contains(&self, entry: &Arc<BackStackEntry>) -> bool {
        self.back_stack
            .lock()
            .iter()
            .any(|e| Arc::ptr_eq(e, entry))
    }

    /// The entry just below `entry` in this navigator's stack.
    pub(crate) fn previous_of(&self, entry: &Arc<BackStackEntry>) -> Option<Arc<BackStackEntry>> {
        let stack = self.back_stack.lock();
        let index = stack.iter().position(|e| Arc::ptr_eq(e, entry))?;
        if index == 0 {
            None
        } else {
            stack.get(index - 1).cloned()
        }
    }

    /// Removes `entry` and everything above it from the local stack.
    pub(crate) fn truncate_at(&self, entry: &Arc<BackStackEntry>) {
        let mut stack = self.back_stack.lock();
        if let Some(index) = stack.iter().position(|e| Arc::ptr_eq(e, entry)) {
            stack.truncate(index);
        }
    }

    /// Swaps in a relaunched entry with the same id.
    pub(crate) fn replace_by_id(&self, entry: &Arc<BackStackEntry>) {
        let mut stack = self.back_stack.lock();
        for slot in stack.iter_mut() {
            if slot.id() == entry.id() {
                *slot = entry.clone();
            }
        }
    }
}

/// Navigator for ordinary full-screen destinations.
///
/// Pushes and pops go through the transition APIs, so entries stay visible
/// until the display layer reports the animation finished via
/// `NavController::mark_transition_complete`.
pub struct ScreenNavigator {
    last_pop: bool,
}

impl ScreenNavigator {
    pub fn new() -> ScreenNavigator {
        ScreenNavigator { last_pop: false }
    }

    /// Whether the most recent operation was a pop, for the display layer to
    /// pick the animation direction.
    pub fn last_was_pop(&self) -> bool {
        self.last_pop
    }
}

impl Default for ScreenNavigator {
    fn default() -> ScreenNavigator {
        ScreenNavigator::new()
    }
}

impl Navigator for ScreenNavigator {
    fn name(&self) -> &str {
        SCREEN_NAVIGATOR
    }

    fn navigate(
        &mut self,
        cx: &mut NavContext<'_>,
        entries: Vec<Arc<BackStackEntry>>,
        _options: Option<&NavOptions>,
        _extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        self.last_pop = false;
        for entry in entries {
            cx.push_with_transition(entry)?;
        }
        Ok(())
    }

    fn pop_back_stack(
        &mut self,
        cx: &mut NavContext<'_>,
        pop_up_to: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        self.last_pop = true;
        cx.pop_with_transition(pop_up_to, save_state)
    }
}

/// Navigator for graph destinations: navigating to a graph resolves its
/// start destination chain and hands the leaf to that destination's own
/// navigator. The intervening graph entries are synthesized by the
/// controller when the leaf lands on the stack.
pub struct GraphNavigator;

impl Navigator for GraphNavigator {
    fn name(&self) -> &str {
        GRAPH_NAVIGATOR
    }

    fn navigate(
        &mut self,
        cx: &mut NavContext<'_>,
        entries: Vec<Arc<BackStackEntry>>,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        for entry in entries {
            let leaf = cx.find_start_destination(entry.destination())?;
            let args = leaf.add_in_default_args(entry.arguments());
            let leaf_entry = cx.create_entry(leaf.clone(), args);
            cx.navigate_nested(&leaf, vec![leaf_entry], options, extras)?;
        }
        Ok(())
    }
}

/// Navigator for floating dialog destinations.
pub struct DialogNavigator;

impl Navigator for DialogNavigator {
    fn name(&self) -> &str {
        DIALOG_NAVIGATOR
    }

    fn create_destination(&self) -> DestinationBuilder {
        Destination::builder(self.name()).floating()
    }

    fn pop_back_stack(
        &mut self,
        cx: &mut NavContext<'_>,
        pop_up_to: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        cx.pop_with_transition(pop_up_to.clone(), save_state)?;
        // the incoming dialog below is held in Started while the pop runs;
        // everything that was entering above the popped dialog can finish now
        let transitions = cx.transitions_in_progress(self.name());
        let pop_index = transitions
            .iter()
            .position(|e| Arc::ptr_eq(e, &pop_up_to))
            .map(|i| i as isize)
            .unwrap_or(-1);
        for (index, entry) in transitions.iter().enumerate() {
            if index as isize > pop_index {
                cx.mark_transition_complete(entry);
            }
        }
        Ok(())
    }
}

#[test]
fn test_provider_registry() {
    let mut provider = NavigatorProvider::default();
    provider.add(ScreenNavigator::new());
    provider.add(GraphNavigator);
    provider.add(DialogNavigator);

    assert!(provider.contains("screen"));
    assert!(provider.get("screen").is_ok());
    assert_eq!(provider.names(), vec!["dialog", "graph", "screen"]);
    match provider.get("bottom-sheet") {
        Err(NavError::NavigatorMissing { name }) => assert_eq!(name, "bottom-sheet"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_navigator_state_bookkeeping() {
    use crate::destination::Destination;
    use crate::lifecycle::Lifecycle;

    let state = NavigatorState::new();
    let dest = Arc::new(Destination::builder("screen").id("a").build().unwrap());
    let first = BackStackEntry::new(dest.clone(), None, Lifecycle::Resumed, None);
    let second = BackStackEntry::new(dest, None, Lifecycle::Resumed, None);
    state.add_internal(first.clone());
    state.add_internal(second.clone());

    assert!(Arc::ptr_eq(&state.previous_of(&second).unwrap(), &first));
    assert!(state.previous_of(&first).is_none());

    state.add_transition(&second);
    state.add_transition(&second);
    assert_eq!(state.transitions_in_progress().len(), 1);
    state.remove_transition(&second);
    assert!(!state.contains_transition(&second));

    state.truncate_at(&first);
    assert!(state.back_stack().is_empty());
}
