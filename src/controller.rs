//! The navigation controller.
//!
//! `NavController` owns the combined back stack and coordinates every
//! structural change to it: pushes, pops, single-top relaunches, state
//! save/restore and lifecycle propagation. Navigators never touch the
//! combined stack directly—each controller-driven call hands them a
//! [`NavContext`], the per-operation context through which all mutations
//! flow. When an operation completes, the controller settles entry
//! lifecycles and fans out immutable snapshots to listeners and channel
//! subscribers.

use crate::bundle::Bundle;
use crate::deep_link::{create_route, DeepLinkRequest, SyntheticStack};
use crate::destination::{Destination, Graph};
use crate::entry::{BackStackEntry, EntryId, ViewModelStoreProvider};
use crate::error::NavError;
use crate::lifecycle::{Lifecycle, LifecycleEvent};
use crate::navigator::{
    DialogNavigator, GraphNavigator, Navigator, NavigatorProvider, NavigatorState,
    ScreenNavigator,
};
use crate::options::NavOptions;
use crate::save_state::{SavedEntry, SavedNavState};
use crate::uri::Uri;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

type DestinationListener = Box<dyn FnMut(&Arc<Destination>, Option<&Bundle>) + Send>;

/// State carried by one in-flight navigation or pop operation.
#[derive(Default)]
pub(crate) struct NavOp {
    popped: bool,
    navigated: bool,
    single_top: bool,
    push: Option<PushScope>,
    pop: Option<PopScope>,
}

/// Present while a navigator is allowed to accept pushes.
struct PushScope {
    /// The destination originally navigated to; hierarchy synthesis anchors
    /// on it when it is a graph.
    node: Arc<Destination>,
    final_args: Option<Bundle>,
    /// During restoration: the full list of re-instantiated entries, used to
    /// reuse graph entries instead of minting fresh ones.
    restored: Vec<Arc<BackStackEntry>>,
    last_restored_index: usize,
}

/// Present while a navigator is expected to pop the top entry.
struct PopScope {
    save_state: bool,
    received_pop: bool,
    saved: VecDeque<SavedEntry>,
}

enum PopTarget {
    Id(String),
    Route(String),
}

impl PopTarget {
    fn describe(&self) -> &str {
        match self {
            PopTarget::Id(id) => id,
            PopTarget::Route(route) => route,
        }
    }
}

/// Operation context handed to navigators for every controller-driven call.
///
/// This is the only path by which a navigator can change the back stack, and
/// it is only valid for the duration of the call it was created for; pushes
/// attempted outside a navigation are logged and ignored.
pub struct NavContext<'a> {
    controller: &'a mut NavController,
    op: &'a mut NavOp,
}

impl<'a> NavContext<'a> {
    /// Accepts an entry onto the back stack.
    pub fn push(&mut self, entry: Arc<BackStackEntry>) -> Result<(), NavError> {
        self.controller.handle_push(self.op, entry)
    }

    /// Accepts an entry and marks it (and the entry it covers) as
    /// transitioning until the display layer reports completion.
    pub fn push_with_transition(&mut self, entry: Arc<BackStackEntry>) -> Result<(), NavError> {
        self.controller.handle_push_with_transition(self.op, entry)
    }

    /// Pops the given top entry off the back stack.
    pub fn pop(&mut self, entry: Arc<BackStackEntry>, save_state: bool) -> Result<(), NavError> {
        self.controller.handle_pop(self.op, entry, save_state)
    }

    /// Pops the given top entry, holding it (and the entry being revealed)
    /// in the transitioning set until completion is reported.
    pub fn pop_with_transition(
        &mut self,
        entry: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        self.controller.handle_pop_with_transition(self.op, entry, save_state)
    }

    /// Swaps a relaunched entry into the navigator's local stack.
    pub fn relaunch(&mut self, entry: Arc<BackStackEntry>) {
        self.controller
            .state_for(entry.destination().navigator_name())
            .replace_by_id(&entry);
    }

    /// Creates an entry bound to this controller's host lifecycle and
    /// view-model scope.
    pub fn create_entry(
        &mut self,
        destination: Arc<Destination>,
        args: Option<Bundle>,
    ) -> Arc<BackStackEntry> {
        BackStackEntry::new(
            destination,
            args,
            self.controller.host_state(),
            Some(self.controller.view_models.clone()),
        )
    }

    /// Resolves a graph destination's start chain down to its leaf.
    pub fn find_start_destination(
        &self,
        graph_dest: &Arc<Destination>,
    ) -> Result<Arc<Destination>, NavError> {
        self.controller
            .graph
            .as_ref()
            .ok_or(NavError::NoGraph)?
            .find_start_destination(graph_dest)
    }

    /// Continues the current operation through another destination's
    /// navigator.
    pub fn navigate_nested(
        &mut self,
        destination: &Arc<Destination>,
        entries: Vec<Arc<BackStackEntry>>,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        let name = destination.navigator_name().to_string();
        self.controller
            .navigate_with_navigator(self.op, &name, entries, options, extras)
    }

    /// Snapshot of the transitioning entries for a navigator.
    pub fn transitions_in_progress(&self, navigator_name: &str) -> Vec<Arc<BackStackEntry>> {
        self.controller
            .navigator_state
            .get(navigator_name)
            .map(|state| state.transitions_in_progress())
            .unwrap_or_default()
    }

    pub fn mark_transition_complete(&mut self, entry: &Arc<BackStackEntry>) {
        self.controller.complete_transition(entry, true);
    }

    /// Snapshot of the combined back stack.
    pub fn back_stack(&self) -> Vec<Arc<BackStackEntry>> {
        self.controller.back_stack_snapshot()
    }
}

/// The back stack engine.
pub struct NavController {
    graph: Option<Graph>,
    back_stack: Arc<Mutex<Vec<Arc<BackStackEntry>>>>,
    provider: NavigatorProvider,
    navigator_state: HashMap<String, NavigatorState>,
    child_to_parent: HashMap<EntryId, Arc<BackStackEntry>>,
    parent_to_child_count: HashMap<EntryId, usize>,
    entry_saved_state: HashMap<EntryId, bool>,
    back_stack_map: HashMap<String, Option<String>>,
    back_stack_states: HashMap<String, VecDeque<SavedEntry>>,
    view_models: Arc<ViewModelStoreProvider>,
    host_lifecycle: Lifecycle,
    lifecycle_attached: bool,
    deep_link_handled: bool,
    pending_navigator_state: Option<BTreeMap<String, Bundle>>,
    pending_back_stack: Option<Vec<SavedEntry>>,
    listeners: Vec<DestinationListener>,
    entries_to_dispatch: Vec<Arc<BackStackEntry>>,
    back_stack_subs: Vec<Sender<Vec<Arc<BackStackEntry>>>>,
    visible_subs: Vec<Sender<Vec<Arc<BackStackEntry>>>>,
    current_entry_subs: Vec<Sender<Arc<BackStackEntry>>>,
}

impl NavController {
    /// Creates a controller with the built-in screen, graph and dialog
    /// navigators registered.
    pub fn new() -> NavController {
        let mut provider = NavigatorProvider::default();
        provider.add(ScreenNavigator::new());
        provider.add(GraphNavigator);
        provider.add(DialogNavigator);
        NavController {
            graph: None,
            back_stack: Arc::new(Mutex::new(Vec::new())),
            provider,
            navigator_state: HashMap::new(),
            child_to_parent: HashMap::new(),
            parent_to_child_count: HashMap::new(),
            entry_saved_state: HashMap::new(),
            back_stack_map: HashMap::new(),
            back_stack_states: HashMap::new(),
            view_models: Arc::new(ViewModelStoreProvider::default()),
            host_lifecycle: Lifecycle::Created,
            lifecycle_attached: false,
            deep_link_handled: false,
            pending_navigator_state: None,
            pending_back_stack: None,
            listeners: Vec::new(),
            entries_to_dispatch: Vec::new(),
            back_stack_subs: Vec::new(),
            visible_subs: Vec::new(),
            current_entry_subs: Vec::new(),
        }
    }

    /// Registers an additional navigator.
    pub fn add_navigator(&mut self, navigator: impl Navigator + 'static) {
        let name = navigator.name().to_string();
        self.provider.add(navigator);
        self.state_for(&name);
    }

    pub fn navigator(&self, name: &str) -> Result<Arc<Mutex<dyn Navigator>>, NavError> {
        self.provider.get(name)
    }

    pub fn navigator_state(&self, name: &str) -> Option<&NavigatorState> {
        self.navigator_state.get(name)
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    pub fn view_models(&self) -> &Arc<ViewModelStoreProvider> {
        &self.view_models
    }

    // ---- graph installation ----

    /// Installs the navigation graph. Replacing an existing graph drops all
    /// saved stacks, pops everything off the old graph, then applies any
    /// pending restored state before navigating to the start destination.
    pub fn set_graph(&mut self, graph: Graph, start_args: Option<Bundle>) -> Result<(), NavError> {
        if let Some(old) = self.graph.clone() {
            let mut op = NavOp::default();
            let saved_keys: Vec<String> = self.back_stack_map.keys().cloned().collect();
            for id in saved_keys {
                self.clear_back_stack_internal(&mut op, &id)?;
            }
            self.pop_back_stack_internal(
                &mut op,
                &PopTarget::Id(old.id().to_string()),
                true,
                false,
            )?;
        }
        self.graph = Some(graph);
        self.on_graph_created(start_args)
    }

    fn on_graph_created(&mut self, start_args: Option<Bundle>) -> Result<(), NavError> {
        if let Some(pending) = self.pending_navigator_state.take() {
            for (name, bundle) in pending {
                if let Ok(navigator) = self.provider.get(&name) {
                    navigator.lock().on_restore_state(bundle);
                }
            }
        }
        if let Some(pending) = self.pending_back_stack.take() {
            for state in pending {
                let node = self.find_destination(&state.destination_id).ok_or_else(|| {
                    NavError::RestoreFailed {
                        id: state.destination_id.clone(),
                    }
                })?;
                let entry =
                    state.instantiate(node.clone(), self.host_state(), Some(self.view_models.clone()));
                self.state_for(node.navigator_name()).add_internal(entry.clone());
                self.back_stack.lock().push(entry.clone());
                if let Some(parent_id) = node.parent_id().map(str::to_string) {
                    if let Some(parent_entry) = self.get_back_stack_entry(&parent_id) {
                        self.link_child_to_parent(&entry, &parent_entry);
                    }
                }
            }
        }
        for name in self.provider.names() {
            self.state_for(&name);
        }

        let empty = self.back_stack.lock().is_empty();
        if empty {
            let root = self.graph.as_ref().ok_or(NavError::NoGraph)?.root().clone();
            self.navigate_internal(&root, start_args, None, None)
        } else {
            self.dispatch_on_destination_changed();
            Ok(())
        }
    }

    // ---- navigation ----

    /// Navigates to a destination or action by id, resolving actions against
    /// the current destination's hierarchy first.
    pub fn navigate_to(
        &mut self,
        target: &str,
        args: Option<Bundle>,
        options: Option<NavOptions>,
        extras: Option<Bundle>,
    ) -> Result<(), NavError> {
        let graph = self.graph.clone().ok_or(NavError::NoGraph)?;
        let current = self
            .current_destination()
            .unwrap_or_else(|| graph.root().clone());

        let mut action_hit = None;
        for node in graph.hierarchy(&current) {
            if let Some(action) = node.action(target) {
                action_hit = Some(action.clone());
                break;
            }
        }

        let mut final_options = options;
        let mut combined_args = args;
        let mut dest_id = target.to_string();
        let via_action = action_hit.is_some();
        if let Some(action) = action_hit {
            if final_options.is_none() {
                final_options = action.nav_options().cloned();
            }
            dest_id = action.destination_id().to_string();
            if let Some(defaults) = action.default_arguments() {
                let mut merged = defaults.clone();
                if let Some(args) = &combined_args {
                    merged.put_all(args);
                }
                combined_args = Some(merged);
            }
        }

        if dest_id.is_empty() {
            // an action may describe a pure pop
            if let Some(options) = &final_options {
                if let Some(route) = options.pop_up_to_route() {
                    self.pop_to_route(route, options.is_pop_up_to_inclusive(), false);
                    return Ok(());
                }
                if let Some(id) = options.pop_up_to_id() {
                    self.pop_to_id(id, options.is_pop_up_to_inclusive(), false);
                    return Ok(());
                }
            }
            return Err(NavError::DestinationNotFound { id: dest_id });
        }

        let node = match self.find_destination(&dest_id) {
            Some(node) => node,
            None if via_action => {
                return Err(NavError::ActionDestinationNotFound {
                    id: dest_id,
                    action: target.to_string(),
                })
            }
            None => return Err(NavError::DestinationNotFound { id: dest_id }),
        };
        self.navigate_internal(&node, combined_args, final_options.as_ref(), extras.as_ref())
    }

    /// Navigates to the destination best matching a deep link request.
    pub fn navigate_request(
        &mut self,
        request: DeepLinkRequest,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        let graph = self.graph.clone().ok_or(NavError::NoGraph)?;
        let found = graph
            .root()
            .match_deep_link(&request)
            .ok_or_else(|| NavError::NoDeepLinkMatch {
                request: request.describe(),
            })?;
        self.navigate_internal(&found.destination, found.matching_args, options, extras)
    }

    pub fn navigate_uri(
        &mut self,
        uri: Uri,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        self.navigate_request(DeepLinkRequest::from_uri(uri), options, extras)
    }

    /// Navigates to a destination addressed by route.
    pub fn navigate_route(
        &mut self,
        route: &str,
        options: Option<&NavOptions>,
    ) -> Result<(), NavError> {
        let uri = Uri::parse(&create_route(route))?;
        self.navigate_request(DeepLinkRequest::from_uri(uri), options, None)
    }

    fn navigate_internal(
        &mut self,
        node: &Arc<Destination>,
        args: Option<Bundle>,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        let mut op = NavOp::default();
        let final_args = node.add_in_default_args(args.as_ref());

        if let Some(options) = options {
            if let Some(route) = options.pop_up_to_route().map(str::to_string) {
                self.pop_back_stack_internal(
                    &mut op,
                    &PopTarget::Route(route),
                    options.is_pop_up_to_inclusive(),
                    options.should_pop_up_to_save_state(),
                )?;
            } else if let Some(id) = options.pop_up_to_id().map(str::to_string) {
                self.pop_back_stack_internal(
                    &mut op,
                    &PopTarget::Id(id),
                    options.is_pop_up_to_inclusive(),
                    options.should_pop_up_to_save_state(),
                )?;
            }
        }

        let restore = options.map(NavOptions::should_restore_state).unwrap_or(false)
            && self.back_stack_map.contains_key(node.id());
        if restore {
            self.restore_state_internal(&mut op, node.id(), final_args.as_ref(), options, extras)?;
        } else {
            let single_top = options
                .map(NavOptions::should_launch_single_top)
                .unwrap_or(false)
                && self.launch_single_top_internal(&mut op, node, final_args.as_ref())?;
            if single_top {
                op.single_top = true;
            } else {
                let entry = BackStackEntry::new(
                    node.clone(),
                    final_args.clone(),
                    self.host_state(),
                    Some(self.view_models.clone()),
                );
                op.push = Some(PushScope {
                    node: node.clone(),
                    final_args: final_args.clone(),
                    restored: Vec::new(),
                    last_restored_index: 0,
                });
                let result = self.navigate_with_navigator(
                    &mut op,
                    &node.navigator_name().to_string(),
                    vec![entry],
                    options,
                    extras,
                );
                op.push = None;
                result?;
            }
        }

        self.finish_op(op);
        Ok(())
    }

    fn navigate_with_navigator(
        &mut self,
        op: &mut NavOp,
        name: &str,
        entries: Vec<Arc<BackStackEntry>>,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<(), NavError> {
        let navigator = self.provider.get(name)?;
        let mut guard = navigator.lock();
        let mut cx = NavContext {
            controller: &mut *self,
            op: &mut *op,
        };
        guard.navigate(&mut cx, entries, options, extras)
    }

    fn finish_op(&mut self, op: NavOp) {
        if op.popped || op.navigated || op.single_top {
            self.dispatch_on_destination_changed();
        } else {
            self.update_back_stack_lifecycle();
        }
    }

    // ---- push handling ----

    fn handle_push(&mut self, op: &mut NavOp, entry: Arc<BackStackEntry>) -> Result<(), NavError> {
        let mut scope = match op.push.take() {
            Some(scope) => scope,
            None => {
                log::warn!(
                    "ignoring add of destination {} outside of a navigate call",
                    entry.destination().id()
                );
                return Ok(());
            }
        };
        op.navigated = true;

        let result = if scope.restored.is_empty() {
            self.add_entry_to_back_stack(
                op,
                &scope.node.clone(),
                scope.final_args.as_ref(),
                entry.clone(),
                &[],
            )
        } else {
            // reuse the re-instantiated graph entries between the previous
            // push and this one as hierarchy candidates
            let index = scope
                .restored
                .iter()
                .position(|e| Arc::ptr_eq(e, &entry))
                .unwrap_or(scope.last_restored_index);
            let candidates: Vec<_> =
                scope.restored[scope.last_restored_index..index].to_vec();
            scope.last_restored_index = index + 1;
            self.add_entry_to_back_stack(
                op,
                &entry.destination().clone(),
                scope.final_args.as_ref(),
                entry.clone(),
                &candidates,
            )
        };
        op.push = Some(scope);
        result?;

        self.state_for(entry.destination().navigator_name())
            .add_internal(entry);
        Ok(())
    }

    fn handle_push_with_transition(
        &mut self,
        op: &mut NavOp,
        entry: Arc<BackStackEntry>,
    ) -> Result<(), NavError> {
        {
            let state = self.state_for(entry.destination().navigator_name());
            if let Some(previous) = state.back_stack().last() {
                state.add_transition(previous);
            }
            state.add_transition(&entry);
        }
        self.handle_push(op, entry)
    }

    fn add_entry_to_back_stack(
        &mut self,
        op: &mut NavOp,
        node: &Arc<Destination>,
        final_args: Option<&Bundle>,
        entry: Arc<BackStackEntry>,
        restored: &[Arc<BackStackEntry>],
    ) -> Result<(), NavError> {
        let graph = self.graph.clone().ok_or(NavError::NoGraph)?;
        let new_dest = entry.destination().clone();

        if !new_dest.is_floating() {
            // floating destinations left on top don't survive navigation to
            // a regular destination
            loop {
                let top = self.back_stack.lock().last().cloned();
                match top {
                    Some(top) if top.destination().is_floating() => {
                        self.pop_back_stack_internal(
                            op,
                            &PopTarget::Id(top.destination().id().to_string()),
                            true,
                            false,
                        )?;
                    }
                    _ => break,
                }
            }
        }

        let mut hierarchy: VecDeque<Arc<BackStackEntry>> = VecDeque::new();
        if node.is_graph() {
            // walk from the new destination up to the graph being navigated
            let mut destination = new_dest.clone();
            loop {
                let parent = match graph.parent(&destination) {
                    Some(parent) => parent.clone(),
                    None => break,
                };
                let hier_entry = restored
                    .iter()
                    .rev()
                    .find(|e| Arc::ptr_eq(e.destination(), &parent))
                    .cloned()
                    .unwrap_or_else(|| {
                        BackStackEntry::new(
                            parent.clone(),
                            final_args.cloned(),
                            self.host_state(),
                            Some(self.view_models.clone()),
                        )
                    });
                hierarchy.push_front(hier_entry);
                // pop an orphaned copy of this graph off the top
                let orphan = {
                    let stack = self.back_stack.lock();
                    stack
                        .last()
                        .filter(|top| Arc::ptr_eq(top.destination(), &parent))
                        .cloned()
                };
                if let Some(orphan) = orphan {
                    self.pop_entry_from_back_stack(&orphan, false, None);
                }
                if Arc::ptr_eq(&parent, node) {
                    break;
                }
                destination = parent;
            }
        }

        // extend upward through ancestor graphs that aren't represented on
        // the stack yet
        let mut destination = hierarchy
            .front()
            .map(|e| e.destination().clone())
            .unwrap_or_else(|| new_dest.clone());
        loop {
            let parent = match graph.parent(&destination) {
                Some(parent) => parent.clone(),
                None => break,
            };
            let present = {
                let stack = self.back_stack.lock();
                stack.iter().any(|e| Arc::ptr_eq(e.destination(), &parent))
            };
            if present {
                break;
            }
            let hier_entry = restored
                .iter()
                .rev()
                .find(|e| Arc::ptr_eq(e.destination(), &parent))
                .cloned()
                .unwrap_or_else(|| {
                    BackStackEntry::new(
                        parent.clone(),
                        parent.add_in_default_args(final_args),
                        self.host_state(),
                        Some(self.view_models.clone()),
                    )
                });
            hierarchy.push_front(hier_entry);
            destination = parent;
        }

        let overlapping = hierarchy
            .front()
            .map(|e| e.destination().clone())
            .unwrap_or_else(|| new_dest.clone());

        // pop orphaned graph entries that don't contain the new subtree
        loop {
            let orphan = {
                let stack = self.back_stack.lock();
                stack
                    .last()
                    .filter(|top| {
                        top.destination().is_graph()
                            && top.destination().find_node(overlapping.id()).is_none()
                    })
                    .cloned()
            };
            match orphan {
                Some(orphan) => self.pop_entry_from_back_stack(&orphan, false, None),
                None => break,
            }
        }

        // the root graph entry always sits at the bottom of the stack
        let first = self
            .back_stack
            .lock()
            .first()
            .cloned()
            .or_else(|| hierarchy.front().cloned());
        let needs_root = first
            .map(|e| !Arc::ptr_eq(e.destination(), graph.root()))
            .unwrap_or(true);
        if needs_root {
            let root_entry = restored
                .iter()
                .rev()
                .find(|e| Arc::ptr_eq(e.destination(), graph.root()))
                .cloned()
                .unwrap_or_else(|| {
                    BackStackEntry::new(
                        graph.root().clone(),
                        graph.root().add_in_default_args(final_args),
                        self.host_state(),
                        Some(self.view_models.clone()),
                    )
                });
            hierarchy.push_front(root_entry);
        }

        for hier_entry in &hierarchy {
            self.state_for(hier_entry.destination().navigator_name())
                .add_internal(hier_entry.clone());
        }
        {
            let mut stack = self.back_stack.lock();
            stack.extend(hierarchy.iter().cloned());
            stack.push(entry.clone());
        }

        let mut linked: Vec<_> = hierarchy.into_iter().collect();
        linked.push(entry);
        for e in linked {
            if let Some(parent_id) = e.destination().parent_id().map(str::to_string) {
                if let Some(parent_entry) = self.get_back_stack_entry(&parent_id) {
                    self.link_child_to_parent(&e, &parent_entry);
                }
            }
        }
        Ok(())
    }

    // ---- pop handling ----

    /// Pops the current destination, if any.
    pub fn pop_back_stack(&mut self) -> bool {
        let current = match self.current_destination() {
            Some(destination) => destination,
            None => {
                log::warn!("ignoring pop: the back stack is empty");
                return false;
            }
        };
        self.pop_to_id(current.id(), true, false)
    }

    /// Pops destinations until `id` is found. Returns false (and leaves the
    /// stack untouched) when the id is not on the stack.
    pub fn pop_to_id(&mut self, id: &str, inclusive: bool, save_state: bool) -> bool {
        let mut op = NavOp::default();
        let popped = self
            .pop_back_stack_internal(&mut op, &PopTarget::Id(id.to_string()), inclusive, save_state)
            .unwrap_or(false);
        popped && self.dispatch_on_destination_changed()
    }

    /// Pops destinations until an entry matching `route` is found.
    pub fn pop_to_route(&mut self, route: &str, inclusive: bool, save_state: bool) -> bool {
        let mut op = NavOp::default();
        let popped = self
            .pop_back_stack_internal(
                &mut op,
                &PopTarget::Route(route.to_string()),
                inclusive,
                save_state,
            )
            .unwrap_or(false);
        popped && self.dispatch_on_destination_changed()
    }

    /// Hook for the system back affordance.
    pub fn navigate_up(&mut self) -> bool {
        self.pop_back_stack()
    }

    /// Pops a specific entry through its own navigator, e.g. a dialog being
    /// dismissed from anywhere in the floating chain. Entries above it on the
    /// back stack are popped as well.
    pub fn dismiss(&mut self, entry: &Arc<BackStackEntry>) -> Result<(), NavError> {
        let mut op = NavOp::default();
        let navigator = self.provider.get(entry.destination().navigator_name())?;
        let result = {
            let mut guard = navigator.lock();
            let mut cx = NavContext {
                controller: &mut *self,
                op: &mut op,
            };
            guard.pop_back_stack(&mut cx, entry.clone(), false)
        };
        result?;
        self.finish_op(op);
        Ok(())
    }

    fn pop_back_stack_internal(
        &mut self,
        op: &mut NavOp,
        target: &PopTarget,
        inclusive: bool,
        save_state: bool,
    ) -> Result<bool, NavError> {
        let snapshot = self.back_stack_snapshot();
        if snapshot.is_empty() {
            log::warn!("ignoring pop: the back stack is empty");
            return Ok(false);
        }
        let mut pop_navigators = Vec::new();
        let mut found = None;
        for entry in snapshot.iter().rev() {
            let destination = entry.destination();
            let matched = match target {
                PopTarget::Id(id) => destination.id() == id,
                PopTarget::Route(route) => destination.matches_route(route, entry.arguments()),
            };
            if inclusive || !matched {
                pop_navigators.push(destination.navigator_name().to_string());
            }
            if matched {
                found = Some(destination.clone());
                break;
            }
        }
        let found = match found {
            Some(found) => found,
            None => {
                log::warn!(
                    "ignoring pop to {}: destination is not on the back stack",
                    target.describe()
                );
                return Ok(false);
            }
        };
        self.execute_pop_operations(op, pop_navigators, &found, inclusive, save_state)
    }

    fn execute_pop_operations(
        &mut self,
        op: &mut NavOp,
        navigators: Vec<String>,
        found: &Arc<Destination>,
        inclusive: bool,
        save_state: bool,
    ) -> Result<bool, NavError> {
        let outer_pop = op.pop.take();
        op.pop = Some(PopScope {
            save_state,
            received_pop: false,
            saved: VecDeque::new(),
        });

        let mut popped_any = false;
        for name in navigators {
            if let Some(scope) = op.pop.as_mut() {
                scope.received_pop = false;
            }
            let top = match self.back_stack.lock().last().cloned() {
                Some(top) => top,
                None => break,
            };
            let navigator = self.provider.get(&name)?;
            let result = match navigator.try_lock() {
                Some(mut guard) => {
                    let mut cx = NavContext {
                        controller: &mut *self,
                        op: &mut *op,
                    };
                    guard.pop_back_stack(&mut cx, top, save_state)
                }
                // the navigator is busy in this very call chain; fall back
                // to the default pop behavior
                None => self.handle_pop(op, top, save_state),
            };
            result?;
            let received = op
                .pop
                .as_ref()
                .map(|scope| scope.received_pop)
                .unwrap_or(false);
            if received {
                popped_any = true;
            } else {
                break;
            }
        }

        let scope = op.pop.take().expect("pop scope disappeared mid-operation");
        op.pop = outer_pop;
        let saved = scope.saved;

        if save_state {
            if !inclusive {
                // the remaining target aliases the saved stack, along with
                // the graphs it is the start destination of
                let token = saved.front().map(SavedEntry::token);
                let mut node = Some(found.clone());
                while let Some(d) = node {
                    if self.back_stack_map.contains_key(d.id()) {
                        break;
                    }
                    self.back_stack_map.insert(d.id().to_string(), token.clone());
                    node = self.graph.as_ref().and_then(|g| {
                        g.parent(&d)
                            .filter(|p| p.start_destination_id() == Some(d.id()))
                            .cloned()
                    });
                }
            }
            if let Some(first) = saved.front().cloned() {
                let token = first.token();
                // the popped destination, and the graphs it is the start
                // destination of, map to this stack as well
                if let Some(first_dest) = self.find_destination(&first.destination_id) {
                    let mut node = Some(first_dest);
                    while let Some(d) = node {
                        if self.back_stack_map.contains_key(d.id()) {
                            break;
                        }
                        self.back_stack_map
                            .insert(d.id().to_string(), Some(token.clone()));
                        node = self.graph.as_ref().and_then(|g| {
                            g.parent(&d)
                                .filter(|p| p.start_destination_id() == Some(d.id()))
                                .cloned()
                        });
                    }
                }
                if self
                    .back_stack_map
                    .values()
                    .any(|v| v.as_deref() == Some(token.as_str()))
                {
                    self.back_stack_states.insert(token, saved);
                }
            }
        }
        Ok(popped_any)
    }

    fn handle_pop(
        &mut self,
        op: &mut NavOp,
        entry: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        match op.pop.take() {
            Some(mut scope) => {
                scope.received_pop = true;
                op.popped = true;
                self.pop_entry_from_back_stack(&entry, save_state, Some(&mut scope.saved));
                op.pop = Some(scope);
                self.state_for(entry.destination().navigator_name())
                    .truncate_at(&entry);
                Ok(())
            }
            None => {
                // a navigator popped outside a controller-driven pop (dialog
                // dismissal): pop everything above, then the entry itself
                let on_stack = {
                    let stack = self.back_stack.lock();
                    stack.iter().any(|e| Arc::ptr_eq(e, &entry))
                };
                if !on_stack {
                    log::warn!(
                        "ignoring pop of entry {}: it is not on the back stack",
                        entry.id()
                    );
                    return Ok(());
                }
                loop {
                    let top = self
                        .back_stack
                        .lock()
                        .last()
                        .cloned()
                        .expect("back stack emptied while popping to a known entry");
                    let done = Arc::ptr_eq(&top, &entry);
                    self.pop_entry_from_back_stack(&top, false, None);
                    self.state_for(top.destination().navigator_name())
                        .truncate_at(&top);
                    if done {
                        break;
                    }
                }
                op.popped = true;
                Ok(())
            }
        }
    }

    fn handle_pop_with_transition(
        &mut self,
        op: &mut NavOp,
        entry: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        self.entry_saved_state.insert(entry.id(), save_state);
        {
            let state = self.state_for(entry.destination().navigator_name());
            state.add_transition(&entry);
            if let Some(incoming) = state.previous_of(&entry) {
                state.add_transition(&incoming);
            }
        }
        self.handle_pop(op, entry, save_state)
    }

    fn pop_entry_from_back_stack(
        &mut self,
        pop_up_to: &Arc<BackStackEntry>,
        save_state: bool,
        saved: Option<&mut VecDeque<SavedEntry>>,
    ) {
        let entry = self
            .back_stack
            .lock()
            .pop()
            .expect("attempted to pop an entry from an empty back stack");
        assert!(
            Arc::ptr_eq(&entry, pop_up_to),
            "attempted to pop {:?}, which is not the top of the back stack",
            pop_up_to
        );

        let transitioning = self
            .navigator_state
            .get(entry.destination().navigator_name())
            .map(|state| state.contains_transition(&entry))
            .unwrap_or(false)
            || self.parent_to_child_count.contains_key(&entry.id());

        if entry.lifecycle_state().is_at_least(Lifecycle::Created) {
            if save_state {
                entry.set_max_lifecycle(Lifecycle::Created);
                if let Some(saved) = saved {
                    saved.push_front(SavedEntry::capture(&entry));
                }
            }
            if !transitioning {
                entry.set_max_lifecycle(Lifecycle::Destroyed);
                self.unlink_child_from_parent(&entry, true);
            } else {
                entry.set_max_lifecycle(Lifecycle::Created);
            }
        }
        if !save_state && !transitioning {
            self.view_models.clear(entry.id());
        }
    }

    // ---- single top ----

    fn launch_single_top_internal(
        &mut self,
        op: &mut NavOp,
        node: &Arc<Destination>,
        args: Option<&Bundle>,
    ) -> Result<bool, NavError> {
        let current = match self.current_entry() {
            Some(current) => current,
            None => return Ok(false),
        };
        let node_id = if node.is_graph() {
            self.graph
                .as_ref()
                .ok_or(NavError::NoGraph)?
                .find_start_destination(node)?
                .id()
                .to_string()
        } else {
            node.id().to_string()
        };
        if node_id != current.destination().id() {
            return Ok(false);
        }

        let node_index = {
            let stack = self.back_stack.lock();
            stack
                .iter()
                .rposition(|e| Arc::ptr_eq(e.destination(), node))
        };
        let node_index = match node_index {
            Some(index) => index,
            None => return Ok(false),
        };

        let olds: Vec<_> = self.back_stack.lock().split_off(node_index);
        let mut replacements = Vec::with_capacity(olds.len());
        for old in &olds {
            self.unlink_child_from_parent(old, true);
            let refreshed = old.destination().add_in_default_args(args);
            replacements.push(BackStackEntry::relaunched(old, refreshed));
        }
        {
            let mut stack = self.back_stack.lock();
            stack.extend(replacements.iter().cloned());
        }
        for entry in &replacements {
            if let Some(parent_id) = entry.destination().parent_id().map(str::to_string) {
                if let Some(parent_entry) = self.get_back_stack_entry(&parent_id) {
                    self.link_child_to_parent(entry, &parent_entry);
                }
            }
        }
        for entry in &replacements {
            let navigator = self.provider.get(entry.destination().navigator_name())?;
            match navigator.try_lock() {
                Some(mut guard) => {
                    let mut cx = NavContext {
                        controller: &mut *self,
                        op: &mut *op,
                    };
                    guard.on_launch_single_top(&mut cx, entry.clone());
                }
                None => {
                    self.state_for(entry.destination().navigator_name())
                        .replace_by_id(entry);
                }
            };
        }
        Ok(true)
    }

    // ---- saved stacks ----

    fn restore_state_internal(
        &mut self,
        op: &mut NavOp,
        id: &str,
        args: Option<&Bundle>,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<bool, NavError> {
        let token = match self.back_stack_map.get(id) {
            Some(token) => token.clone(),
            None => return Ok(false),
        };
        let token = match token {
            Some(token) => token,
            None => {
                self.back_stack_map.retain(|_, v| v.is_some());
                return Ok(false);
            }
        };
        // clear the mappings so the stack isn't restored twice
        self.back_stack_map
            .retain(|_, v| v.as_deref() != Some(token.as_str()));
        let states = self.back_stack_states.remove(&token).unwrap_or_default();
        let entries = self.instantiate_back_stack(&states)?;
        self.execute_restore_state(op, entries, args, options, extras)
    }

    fn instantiate_back_stack(
        &self,
        states: &VecDeque<SavedEntry>,
    ) -> Result<Vec<Arc<BackStackEntry>>, NavError> {
        let graph = self.graph.as_ref().ok_or(NavError::NoGraph)?;
        let mut entries = Vec::with_capacity(states.len());
        for state in states {
            let node = graph
                .node(&state.destination_id)
                .cloned()
                .ok_or_else(|| NavError::RestoreFailed {
                    id: state.destination_id.clone(),
                })?;
            entries.push(state.instantiate(
                node,
                self.host_state(),
                Some(self.view_models.clone()),
            ));
        }
        Ok(entries)
    }

    fn execute_restore_state(
        &mut self,
        op: &mut NavOp,
        entries: Vec<Arc<BackStackEntry>>,
        args: Option<&Bundle>,
        options: Option<&NavOptions>,
        extras: Option<&Bundle>,
    ) -> Result<bool, NavError> {
        // group runs of consecutive same-navigator leaf entries so each
        // navigator restores its slice as one atomic batch
        let mut groups: Vec<Vec<Arc<BackStackEntry>>> = Vec::new();
        for entry in entries.iter().filter(|e| !e.destination().is_graph()) {
            let same_navigator = groups
                .last()
                .and_then(|group| group.last())
                .map(|last| {
                    last.destination().navigator_name() == entry.destination().navigator_name()
                })
                .unwrap_or(false);
            if same_navigator {
                groups
                    .last_mut()
                    .expect("just checked a group exists")
                    .push(entry.clone());
            } else {
                groups.push(vec![entry.clone()]);
            }
        }

        let navigated_before = op.navigated;
        op.navigated = false;
        for group in groups {
            let name = group[0].destination().navigator_name().to_string();
            op.push = Some(PushScope {
                node: group[0].destination().clone(),
                final_args: args.cloned(),
                restored: entries.clone(),
                last_restored_index: 0,
            });
            let result = self.navigate_with_navigator(op, &name, group, options, extras);
            op.push = None;
            result?;
        }
        let navigated = op.navigated;
        op.navigated = navigated_before || navigated;
        Ok(navigated)
    }

    /// Restores then drops the saved stack for a destination id, discarding
    /// its state. Returns whether anything was cleared.
    pub fn clear_back_stack(&mut self, id: &str) -> Result<bool, NavError> {
        let mut op = NavOp::default();
        let cleared = self.clear_back_stack_internal(&mut op, id)?;
        if cleared {
            Ok(self.dispatch_on_destination_changed())
        } else {
            Ok(false)
        }
    }

    /// Route-addressed variant of [`NavController::clear_back_stack`].
    pub fn clear_back_stack_route(&mut self, route: &str) -> Result<bool, NavError> {
        let id = match self.find_destination_by_route(route) {
            Some(destination) => destination.id().to_string(),
            None => return Ok(false),
        };
        self.clear_back_stack(&id)
    }

    fn clear_back_stack_internal(&mut self, op: &mut NavOp, id: &str) -> Result<bool, NavError> {
        let restored = self.restore_state_internal(op, id, None, None, None)?;
        if !restored {
            return Ok(false);
        }
        self.pop_back_stack_internal(op, &PopTarget::Id(id.to_string()), true, false)
    }

    // ---- persistence ----

    /// Serializes everything needed to reconstruct this controller. Returns
    /// `None` when there is nothing worth saving.
    pub fn save_state(&mut self) -> Option<SavedNavState> {
        let mut state = SavedNavState::default();
        for name in self.provider.names() {
            if let Ok(navigator) = self.provider.get(&name) {
                if let Some(bundle) = navigator.lock().on_save_state() {
                    state.navigator_state.insert(name, bundle);
                }
            }
        }
        for entry in self.back_stack_snapshot() {
            state.back_stack.push(SavedEntry::capture(&entry));
        }
        for (id, token) in &self.back_stack_map {
            state.saved_stack_tokens.insert(id.clone(), token.clone());
        }
        for (token, entries) in &self.back_stack_states {
            state
                .saved_stacks
                .insert(token.clone(), entries.iter().cloned().collect());
        }
        state.deep_link_handled = self.deep_link_handled;
        if state.is_empty() {
            None
        } else {
            Some(state)
        }
    }

    /// Hands a previously saved blob back to the controller. The back stack
    /// itself is reconstructed when the graph is next set.
    pub fn restore_state(&mut self, state: SavedNavState) {
        self.pending_navigator_state = if state.navigator_state.is_empty() {
            None
        } else {
            Some(state.navigator_state)
        };
        self.pending_back_stack = if state.back_stack.is_empty() {
            None
        } else {
            Some(state.back_stack)
        };
        self.back_stack_map = state.saved_stack_tokens.into_iter().collect();
        self.back_stack_states = state
            .saved_stacks
            .into_iter()
            .map(|(token, entries)| (token, entries.into_iter().collect()))
            .collect();
        self.deep_link_handled = state.deep_link_handled;
    }

    // ---- deep link dispatch ----

    /// Matches an external request and synthesizes a back stack for it:
    /// pops to the root, then navigates the destination's hierarchy chain.
    /// Returns false when nothing matches.
    pub fn handle_deep_link(&mut self, request: &DeepLinkRequest) -> Result<bool, NavError> {
        let graph = match self.graph.clone() {
            Some(graph) => graph,
            None => return Ok(false),
        };
        let found = match graph.root().match_deep_link(request) {
            Some(found) => found,
            None => return Ok(false),
        };
        if !self.back_stack.lock().is_empty() {
            let mut op = NavOp::default();
            self.pop_back_stack_internal(&mut op, &PopTarget::Id(graph.id().to_string()), true, false)?;
        }
        let chain = graph.build_deep_link_ids(&found.destination);
        for id in &chain {
            let node = self
                .find_destination(id)
                .ok_or_else(|| NavError::DestinationNotFound { id: id.clone() })?;
            self.navigate_internal(&node, found.matching_args.clone(), None, None)?;
        }
        self.deep_link_handled = true;
        Ok(true)
    }

    /// Navigates a pre-validated synthetic stack, bottom to top.
    pub fn navigate_synthetic_stack(&mut self, stack: &SyntheticStack) -> Result<(), NavError> {
        let graph = self.graph.clone().ok_or(NavError::NoGraph)?;
        if !self.back_stack.lock().is_empty() {
            let mut op = NavOp::default();
            self.pop_back_stack_internal(&mut op, &PopTarget::Id(graph.id().to_string()), true, false)?;
        }
        for (id, args) in stack.requests() {
            let node = self
                .find_destination(id)
                .ok_or_else(|| NavError::DestinationNotFound { id: id.clone() })?;
            self.navigate_internal(&node, args.clone(), None, None)?;
        }
        Ok(())
    }

    pub fn deep_link_handled(&self) -> bool {
        self.deep_link_handled
    }

    // ---- transitions ----

    /// Called by the display layer when an entry's enter or exit animation
    /// has finished. Idempotent.
    pub fn mark_transition_complete(&mut self, entry: &Arc<BackStackEntry>) {
        self.complete_transition(entry, false);
    }

    /// Registers an entry as transitioning ahead of a predictive gesture,
    /// capping it at `Started`.
    pub fn prepare_for_transition(&mut self, entry: &Arc<BackStackEntry>) -> Result<(), NavError> {
        let on_stack = {
            let stack = self.back_stack.lock();
            stack.iter().any(|e| Arc::ptr_eq(e, entry))
        };
        if !on_stack {
            return Err(NavError::StaleEntry { id: entry.id() });
        }
        self.state_for(entry.destination().navigator_name())
            .add_transition(entry);
        if entry.max_lifecycle() > Lifecycle::Started {
            entry.set_max_lifecycle(Lifecycle::Started);
        }
        Ok(())
    }

    fn complete_transition(&mut self, entry: &Arc<BackStackEntry>, in_op: bool) {
        let name = entry.destination().navigator_name().to_string();
        let saved = self.entry_saved_state.remove(&entry.id()).unwrap_or(false);
        match self.navigator_state.get(&name) {
            Some(state) => state.remove_transition(entry),
            None => {
                log::warn!("ignoring transition completion for unknown navigator {}", name);
                return;
            }
        }
        let on_stack = {
            let stack = self.back_stack.lock();
            stack.iter().any(|e| Arc::ptr_eq(e, entry))
        };
        if !on_stack {
            self.unlink_child_from_parent(entry, in_op);
            if entry.lifecycle_state().is_at_least(Lifecycle::Created) {
                entry.set_max_lifecycle(Lifecycle::Destroyed);
            }
            let same_id_remains = {
                let stack = self.back_stack.lock();
                stack.iter().any(|e| e.id() == entry.id())
            };
            if !same_id_remains && !saved {
                self.view_models.clear(entry.id());
            }
            self.update_back_stack_lifecycle();
            self.emit_visible_entries();
        } else if !in_op {
            self.update_back_stack_lifecycle();
            self.emit_back_stack();
            self.emit_visible_entries();
        }
        // during an operation the pending updates happen when it finishes
    }

    // ---- parent/child links ----

    fn link_child_to_parent(&mut self, child: &Arc<BackStackEntry>, parent: &Arc<BackStackEntry>) {
        self.child_to_parent.insert(child.id(), parent.clone());
        *self.parent_to_child_count.entry(parent.id()).or_insert(0) += 1;
    }

    fn unlink_child_from_parent(
        &mut self,
        child: &Arc<BackStackEntry>,
        in_op: bool,
    ) -> Option<Arc<BackStackEntry>> {
        let parent = self.child_to_parent.remove(&child.id())?;
        if let Some(count) = self.parent_to_child_count.get_mut(&parent.id()) {
            *count -= 1;
            if *count == 0 {
                self.parent_to_child_count.remove(&parent.id());
                // a graph entry with no children left may finish its own
                // transition
                self.complete_transition(&parent, in_op);
            }
        }
        Some(parent)
    }

    // ---- lifecycle ----

    /// Forwards a host lifecycle event (window shown, app backgrounded, …)
    /// to the controller and every entry on the stack.
    pub fn handle_lifecycle_event(&mut self, event: LifecycleEvent) {
        self.lifecycle_attached = true;
        self.host_lifecycle = event.target_state();
        for entry in self.back_stack_snapshot() {
            entry.handle_lifecycle_event(event);
        }
    }

    pub(crate) fn host_state(&self) -> Lifecycle {
        if self.lifecycle_attached {
            self.host_lifecycle
        } else {
            Lifecycle::Created
        }
    }

    /// Settles every entry's maximum lifecycle from the stack shape: the top
    /// entry resumes (with its ancestor chain), entries under a floating
    /// destination start, everything else is capped at created. Transitioning
    /// entries hold at started until their transition completes.
    fn update_back_stack_lifecycle(&mut self) {
        let back_stack = self.back_stack_snapshot();
        if back_stack.is_empty() {
            return;
        }
        let graph = match self.graph.clone() {
            Some(graph) => graph,
            None => return,
        };

        let mut next_resumed = back_stack.last().map(|e| e.destination().clone());
        let mut next_started: Vec<Arc<Destination>> = Vec::new();
        if next_resumed
            .as_ref()
            .map(|d| d.is_floating())
            .unwrap_or(false)
        {
            // the destinations revealed beneath the floating top stay started
            for entry in back_stack.iter().rev().skip(1) {
                let destination = entry.destination().clone();
                let stop = !destination.is_floating() && !destination.is_graph();
                next_started.push(destination);
                if stop {
                    break;
                }
            }
        }

        let mut upward: HashMap<EntryId, Lifecycle> = HashMap::new();
        for entry in back_stack.iter().rev() {
            let current_max = entry.max_lifecycle();
            let destination = entry.destination();
            let resumed_match = next_resumed
                .as_ref()
                .map(|d| d.id() == destination.id())
                .unwrap_or(false);
            if resumed_match {
                if current_max != Lifecycle::Resumed {
                    let transitioning = self
                        .navigator_state
                        .get(destination.navigator_name())
                        .map(|state| state.contains_transition(entry))
                        .unwrap_or(false);
                    if transitioning {
                        upward.insert(entry.id(), Lifecycle::Started);
                    } else {
                        upward.insert(entry.id(), Lifecycle::Resumed);
                    }
                }
                next_resumed = graph.parent(destination).cloned();
            } else if !next_started.is_empty() && destination.id() == next_started[0].id() {
                let started = next_started.remove(0);
                if current_max == Lifecycle::Resumed {
                    entry.set_max_lifecycle(Lifecycle::Started);
                } else if current_max != Lifecycle::Started {
                    upward.insert(entry.id(), Lifecycle::Started);
                }
                if let Some(parent) = graph.parent(&started).cloned() {
                    if !next_started.iter().any(|d| d.id() == parent.id()) {
                        next_started.push(parent);
                    }
                }
            } else {
                entry.set_max_lifecycle(Lifecycle::Created);
            }
        }
        // upward transitions run bottom-up so parents settle before children
        for entry in &back_stack {
            if let Some(state) = upward.get(&entry.id()) {
                entry.set_max_lifecycle(*state);
            }
        }
    }

    fn populate_visible_entries(&self) -> Vec<Arc<BackStackEntry>> {
        let mut entries: Vec<Arc<BackStackEntry>> = Vec::new();
        for state in self.navigator_state.values() {
            for entry in state.transitions_in_progress() {
                let present = entries.iter().any(|e| Arc::ptr_eq(e, &entry));
                if !present && !entry.max_lifecycle().is_at_least(Lifecycle::Started) {
                    entries.push(entry);
                }
            }
        }
        for entry in self.back_stack_snapshot() {
            let present = entries.iter().any(|e| Arc::ptr_eq(e, &entry));
            if !present && entry.max_lifecycle().is_at_least(Lifecycle::Started) {
                entries.push(entry);
            }
        }
        entries
            .into_iter()
            .filter(|e| !e.destination().is_graph())
            .collect()
    }

    // ---- dispatch & observation ----

    fn dispatch_on_destination_changed(&mut self) -> bool {
        // graph entries never stay on top of the stack
        loop {
            let top = self.back_stack.lock().last().cloned();
            match top {
                Some(top) if top.destination().is_graph() => {
                    self.pop_entry_from_back_stack(&top, false, None);
                }
                _ => break,
            }
        }
        let last = self.back_stack.lock().last().cloned();
        if let Some(last) = &last {
            self.entries_to_dispatch.push(last.clone());
        }
        self.update_back_stack_lifecycle();

        let dispatch: Vec<_> = self.entries_to_dispatch.drain(..).collect();
        for entry in dispatch {
            let destination = entry.destination().clone();
            let args = entry.arguments().cloned();
            for listener in &mut self.listeners {
                listener(&destination, args.as_ref());
            }
            self.current_entry_subs.retain(|s| s.send(entry.clone()).is_ok());
        }
        self.emit_back_stack();
        self.emit_visible_entries();
        last.is_some()
    }

    fn emit_back_stack(&mut self) {
        let snapshot = self.back_stack_snapshot();
        self.back_stack_subs.retain(|s| s.send(snapshot.clone()).is_ok());
    }

    fn emit_visible_entries(&mut self) {
        let visible = self.populate_visible_entries();
        self.visible_subs.retain(|s| s.send(visible.clone()).is_ok());
    }

    /// Registers a closure invoked after every completed navigation.
    pub fn add_on_destination_changed(
        &mut self,
        listener: impl FnMut(&Arc<Destination>, Option<&Bundle>) + Send + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    /// Channel of back stack snapshots; the current snapshot is delivered
    /// immediately.
    pub fn subscribe_back_stack(&mut self) -> Receiver<Vec<Arc<BackStackEntry>>> {
        let (sender, receiver) = channel::unbounded();
        let _ = sender.send(self.back_stack_snapshot());
        self.back_stack_subs.push(sender);
        receiver
    }

    /// Channel of visible-entry snapshots; the current snapshot is delivered
    /// immediately.
    pub fn subscribe_visible_entries(&mut self) -> Receiver<Vec<Arc<BackStackEntry>>> {
        let (sender, receiver) = channel::unbounded();
        let _ = sender.send(self.populate_visible_entries());
        self.visible_subs.push(sender);
        receiver
    }

    /// Channel of the entry that became current after each navigation.
    pub fn subscribe_destination_changes(&mut self) -> Receiver<Arc<BackStackEntry>> {
        let (sender, receiver) = channel::unbounded();
        self.current_entry_subs.push(sender);
        receiver
    }

    // ---- queries ----

    pub fn current_destination(&self) -> Option<Arc<Destination>> {
        self.back_stack.lock().last().map(|e| e.destination().clone())
    }

    pub fn current_entry(&self) -> Option<Arc<BackStackEntry>> {
        self.back_stack.lock().last().cloned()
    }

    /// The entry the user would land on after a pop, skipping graph entries.
    pub fn previous_entry(&self) -> Option<Arc<BackStackEntry>> {
        let stack = self.back_stack.lock();
        stack
            .iter()
            .rev()
            .skip(1)
            .find(|e| !e.destination().is_graph())
            .cloned()
    }

    pub fn back_stack_snapshot(&self) -> Vec<Arc<BackStackEntry>> {
        self.back_stack.lock().clone()
    }

    pub fn visible_entries_snapshot(&self) -> Vec<Arc<BackStackEntry>> {
        self.populate_visible_entries()
    }

    /// The topmost entry for a destination id.
    pub fn get_back_stack_entry(&self, id: &str) -> Option<Arc<BackStackEntry>> {
        let stack = self.back_stack.lock();
        stack
            .iter()
            .rev()
            .find(|e| e.destination().id() == id)
            .cloned()
    }

    /// The topmost entry matching a route.
    pub fn get_back_stack_entry_by_route(&self, route: &str) -> Option<Arc<BackStackEntry>> {
        let stack = self.back_stack.lock();
        stack
            .iter()
            .rev()
            .find(|e| e.destination().matches_route(route, e.arguments()))
            .cloned()
    }

    fn find_destination(&self, id: &str) -> Option<Arc<Destination>> {
        self.graph.as_ref().and_then(|g| g.node(id)).cloned()
    }

    fn find_destination_by_route(&self, route: &str) -> Option<Arc<Destination>> {
        let graph = self.graph.as_ref()?;
        let uri = Uri::parse(&create_route(route)).ok()?;
        graph
            .root()
            .match_deep_link(&DeepLinkRequest::from_uri(uri))
            .map(|found| found.destination)
    }

    fn state_for(&mut self, name: &str) -> &NavigatorState {
        self.navigator_state
            .entry(name.to_string())
            .or_insert_with(NavigatorState::new)
    }
}

impl Default for NavController {
    fn default() -> NavController {
        NavController::new()
    }
}

#[cfg(test)]
use crate::deep_link::DeepLink;
#[cfg(test)]
use crate::destination::{screen, ArgType, GraphBuilder, NavAction, NavArgument};

#[cfg(test)]
fn demo_graph() -> Graph {
    let mut action_args = Bundle::new();
    action_args.insert("from", "action");
    let home = Destination::builder("screen")
        .id("home")
        .action(
            "open_settings",
            NavAction::new("settings").with_default_arguments(action_args),
        )
        .action("broken", NavAction::new("ghost"))
        .build()
        .unwrap();

    GraphBuilder::new("root", "home")
        .destination(home)
        .destination(
            Destination::builder("screen")
                .id("profile")
                .route("profile/{userId}")
                .argument("userId", NavArgument::new(ArgType::Int))
                .argument("tab", NavArgument::new(ArgType::String).with_default("posts"))
                .build()
                .unwrap(),
        )
        .destination(screen("settings"))
        .destination(
            Destination::builder("dialog")
                .id("confirm")
                .floating()
                .build()
                .unwrap(),
        )
        .destination(
            GraphBuilder::new("library", "list")
                .destination(screen("list"))
                .destination(
                    Destination::builder("screen")
                        .id("detail")
                        .argument("itemId", NavArgument::new(ArgType::Int))
                        .deep_link(DeepLink::from_uri_pattern("demo://lib/item/{itemId}").unwrap())
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap(),
        )
        .build_graph()
        .unwrap()
}

#[cfg(test)]
fn controller() -> NavController {
    let mut nc = NavController::new();
    nc.handle_lifecycle_event(LifecycleEvent::Resume);
    nc.set_graph(demo_graph(), None).unwrap();
    settle(&mut nc);
    nc
}

#[cfg(test)]
fn settle(nc: &mut NavController) {
    for entry in nc.back_stack_snapshot() {
        nc.mark_transition_complete(&entry);
    }
}

#[cfg(test)]
fn stack_ids(nc: &NavController) -> Vec<String> {
    nc.back_stack_snapshot()
        .iter()
        .map(|e| e.destination().id().to_string())
        .collect()
}

#[test]
fn test_set_graph_navigates_to_start() {
    let mut nc = NavController::new();
    nc.handle_lifecycle_event(LifecycleEvent::Resume);
    nc.set_graph(demo_graph(), None).unwrap();

    assert_eq!(stack_ids(&nc), vec!["root", "home"]);
    assert_eq!(nc.current_destination().unwrap().id(), "home");

    // held in Started until the enter transition finishes
    let home = nc.current_entry().unwrap();
    assert_eq!(home.max_lifecycle(), Lifecycle::Started);
    nc.mark_transition_complete(&home);
    assert_eq!(home.max_lifecycle(), Lifecycle::Resumed);

    // the graph entry resumes along with its settled leaf
    let root = nc.get_back_stack_entry("root").unwrap();
    assert_eq!(root.max_lifecycle(), Lifecycle::Resumed);
}

#[test]
fn test_navigate_pushes_in_order() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "settings"]);
    assert_eq!(nc.current_destination().unwrap().id(), "settings");
}

#[test]
fn test_nested_graph_builds_hierarchy() {
    let mut nc = controller();
    nc.navigate_to("library", None, None, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "library", "list"]);

    // the synthesized graph entry is linked as the leaf's parent
    let list = nc.current_entry().unwrap();
    let library = nc.get_back_stack_entry("library").unwrap();
    let parent = nc.child_to_parent.get(&list.id()).unwrap();
    assert!(Arc::ptr_eq(parent, &library));
}

#[test]
fn test_direct_navigation_fills_in_ancestors() {
    let mut nc = controller();
    nc.navigate_to("detail", None, None, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "library", "detail"]);
}

#[test]
fn test_pop_back_stack() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    settle(&mut nc);

    assert!(nc.pop_back_stack());
    assert_eq!(stack_ids(&nc), vec!["root", "home"]);

    // popping the last destination empties the stack entirely and reports
    // that nothing is current anymore
    assert!(!nc.pop_back_stack());
    assert!(nc.back_stack_snapshot().is_empty());
    assert!(!nc.pop_back_stack());
}

#[test]
fn test_pop_to_unknown_destination_is_ignored() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    assert!(!nc.pop_to_id("nowhere", false, false));
    assert_eq!(stack_ids(&nc), vec!["root", "home", "settings"]);
}

#[test]
fn test_previous_entry_skips_graphs() {
    let mut nc = controller();
    nc.navigate_to("library", None, None, None).unwrap();
    assert_eq!(nc.previous_entry().unwrap().destination().id(), "home");
}

#[test]
fn test_single_top_relaunch_preserves_identity() {
    let mut nc = controller();
    let mut args = Bundle::new();
    args.insert("userId", 1);
    nc.navigate_to("profile", Some(args), None, None).unwrap();
    settle(&mut nc);

    let original = nc.current_entry().unwrap();
    let store = original.view_model_store().unwrap();
    store.lock().put("draft", Arc::new("unsent reply".to_string()));

    let mut args = Bundle::new();
    args.insert("userId", 2);
    let options = NavOptions::builder().launch_single_top(true).build();
    nc.navigate_to("profile", Some(args), Some(options), None).unwrap();

    assert_eq!(stack_ids(&nc), vec!["root", "home", "profile"]);
    let relaunched = nc.current_entry().unwrap();
    assert!(!Arc::ptr_eq(&relaunched, &original));
    assert_eq!(relaunched.id(), original.id());
    assert_eq!(relaunched.arguments().unwrap().get_i64("userId"), Some(2));
    // retained state keyed by the entry id survives the swap
    let store = relaunched.view_model_store().unwrap();
    assert!(store.lock().get("draft").is_some());
}

#[test]
fn test_single_top_elsewhere_pushes_normally() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    let options = NavOptions::builder().launch_single_top(true).build();
    nc.navigate_to("home", None, Some(options), None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "settings", "home"]);
}

#[test]
fn test_pop_up_to_save_state_and_restore() {
    let mut nc = controller();
    let mut args = Bundle::new();
    args.insert("userId", 1);
    nc.navigate_to("profile", Some(args), None, None).unwrap();
    nc.navigate_to("settings", None, None, None).unwrap();
    settle(&mut nc);
    let profile_id = nc.get_back_stack_entry("profile").unwrap().id();

    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .save_state(true)
        .build();
    nc.navigate_to("library", None, Some(options), None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "library", "list"]);
    assert!(nc.back_stack_map.contains_key("profile"));
    assert_eq!(nc.back_stack_states.len(), 1);

    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .restore_state(true)
        .build();
    nc.navigate_to("profile", None, Some(options), None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "profile", "settings"]);
    assert!(nc.back_stack_states.is_empty());

    let restored = nc.get_back_stack_entry("profile").unwrap();
    assert_eq!(restored.id(), profile_id);
    assert_eq!(restored.arguments().unwrap().get_i64("userId"), Some(1));
}

#[test]
fn test_save_state_does_not_alias_non_start_ancestors() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    let mut args = Bundle::new();
    args.insert("userId", 4);
    nc.navigate_to("profile", Some(args), None, None).unwrap();
    settle(&mut nc);

    let options = NavOptions::builder()
        .pop_up_to_id("settings")
        .save_state(true)
        .build();
    nc.navigate_to("library", None, Some(options), None).unwrap();

    // settings is not root's start destination, so the saved stack is keyed
    // to settings alone and the root graph keeps its default resolution
    assert!(nc.back_stack_map.contains_key("settings"));
    assert!(!nc.back_stack_map.contains_key("root"));

    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .restore_state(true)
        .build();
    nc.navigate_to("root", None, Some(options), None).unwrap();
    assert_eq!(nc.current_destination().unwrap().id(), "home");
    assert!(nc.get_back_stack_entry("profile").is_none());
}

#[test]
fn test_restore_reuses_saved_graph_entries() {
    let mut nc = controller();
    nc.navigate_to("library", None, None, None).unwrap();
    settle(&mut nc);
    let library_id = nc.get_back_stack_entry("library").unwrap().id();
    let list_id = nc.get_back_stack_entry("list").unwrap().id();

    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .save_state(true)
        .build();
    nc.navigate_to("settings", None, Some(options), None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "settings"]);

    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .restore_state(true)
        .build();
    nc.navigate_to("library", None, Some(options), None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "library", "list"]);
    assert_eq!(nc.get_back_stack_entry("library").unwrap().id(), library_id);
    assert_eq!(nc.get_back_stack_entry("list").unwrap().id(), list_id);
}

#[test]
fn test_restore_failure_for_unknown_destination() {
    let mut nc = controller();
    let ghost = SavedEntry {
        id: EntryId::new(),
        destination_id: "ghost".into(),
        arguments: None,
        saved_state: None,
    };
    let mut blob = SavedNavState::default();
    blob.saved_stack_tokens
        .insert("profile".into(), Some(ghost.token()));
    blob.saved_stacks.insert(ghost.token(), vec![ghost]);
    nc.restore_state(blob);

    let options = NavOptions::builder().restore_state(true).build();
    let err = nc
        .navigate_to("profile", None, Some(options), None)
        .unwrap_err();
    assert!(matches!(err, NavError::RestoreFailed { id } if id == "ghost"));
}

#[test]
fn test_save_and_restore_across_controllers() {
    let mut nc = controller();
    let mut args = Bundle::new();
    args.insert("userId", 5);
    nc.navigate_to("profile", Some(args), None, None).unwrap();
    settle(&mut nc);
    let ids_before = stack_ids(&nc);
    let entry_ids: Vec<_> = nc.back_stack_snapshot().iter().map(|e| e.id()).collect();
    let blob = nc.save_state().unwrap();

    let encoded = serde_json::to_string(&blob).unwrap();
    let decoded: SavedNavState = serde_json::from_str(&encoded).unwrap();

    let mut revived = NavController::new();
    revived.handle_lifecycle_event(LifecycleEvent::Resume);
    revived.restore_state(decoded);
    revived.set_graph(demo_graph(), None).unwrap();

    assert_eq!(stack_ids(&revived), ids_before);
    let revived_ids: Vec<_> = revived.back_stack_snapshot().iter().map(|e| e.id()).collect();
    assert_eq!(revived_ids, entry_ids);
    let current = revived.current_entry().unwrap();
    assert_eq!(current.destination().id(), "profile");
    assert_eq!(current.arguments().unwrap().get_i64("userId"), Some(5));
}

#[test]
fn test_clear_back_stack() {
    let mut nc = controller();
    nc.navigate_to("profile", None, None, None).unwrap();
    settle(&mut nc);
    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .save_state(true)
        .build();
    nc.navigate_to("settings", None, Some(options), None).unwrap();
    assert!(nc.back_stack_map.contains_key("profile"));

    assert!(nc.clear_back_stack("profile").unwrap());
    assert_eq!(stack_ids(&nc), vec!["root", "home", "settings"]);
    assert!(!nc.back_stack_map.contains_key("profile"));
    assert!(nc.back_stack_states.is_empty());

    // nothing saved anymore
    assert!(!nc.clear_back_stack("profile").unwrap());
}

#[test]
fn test_dialog_lifecycle_and_dismiss() {
    let mut nc = controller();
    nc.navigate_to("confirm", None, None, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "confirm"]);

    let confirm = nc.current_entry().unwrap();
    let home = nc.get_back_stack_entry("home").unwrap();
    assert_eq!(confirm.max_lifecycle(), Lifecycle::Resumed);
    // the screen underneath stays started, not resumed
    assert_eq!(home.max_lifecycle(), Lifecycle::Started);

    nc.dismiss(&confirm).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home"]);
    assert_eq!(home.max_lifecycle(), Lifecycle::Resumed);

    // the dialog is held until its exit transition finishes
    assert_eq!(confirm.max_lifecycle(), Lifecycle::Created);
    nc.mark_transition_complete(&confirm);
    assert_eq!(confirm.max_lifecycle(), Lifecycle::Destroyed);
}

#[test]
fn test_navigating_over_a_dialog_pops_it() {
    let mut nc = controller();
    nc.navigate_to("confirm", None, None, None).unwrap();
    nc.navigate_to("settings", None, None, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "settings"]);
}

#[test]
fn test_route_navigation_parses_typed_args() {
    let mut nc = controller();
    nc.navigate_route("profile/7", None).unwrap();
    let entry = nc.current_entry().unwrap();
    assert_eq!(entry.destination().id(), "profile");
    let args = entry.arguments().unwrap();
    assert_eq!(args.get_i64("userId"), Some(7));
    // declared defaults fill in alongside the link-provided values
    assert_eq!(args.get_str("tab"), Some("posts"));
}

#[test]
fn test_actions_resolve_from_hierarchy() {
    let mut nc = controller();
    nc.navigate_to("open_settings", None, None, None).unwrap();
    let entry = nc.current_entry().unwrap();
    assert_eq!(entry.destination().id(), "settings");
    assert_eq!(entry.arguments().unwrap().get_str("from"), Some("action"));

    // actions resolve against the current hierarchy only
    settle(&mut nc);
    let err = nc.navigate_to("broken", None, None, None).unwrap_err();
    assert!(matches!(err, NavError::DestinationNotFound { ref id } if id == "broken"));

    // back on home the action exists but its target does not
    assert!(nc.pop_back_stack());
    let err = nc.navigate_to("broken", None, None, None).unwrap_err();
    assert!(matches!(
        err,
        NavError::ActionDestinationNotFound { ref id, .. } if id == "ghost"
    ));
    let err = nc.navigate_to("ghost", None, None, None).unwrap_err();
    assert!(matches!(err, NavError::DestinationNotFound { .. }));
}

#[test]
fn test_handle_deep_link_synthesizes_stack() {
    let mut nc = controller();
    let uri = Uri::parse("demo://lib/item/5").unwrap();
    let handled = nc.handle_deep_link(&DeepLinkRequest::from_uri(uri)).unwrap();
    assert!(handled);
    assert!(nc.deep_link_handled());

    assert_eq!(
        stack_ids(&nc),
        vec!["root", "home", "library", "list", "detail"]
    );
    let entry = nc.current_entry().unwrap();
    assert_eq!(entry.arguments().unwrap().get_i64("itemId"), Some(5));

    // popping walks back through the synthesized chain
    settle(&mut nc);
    assert!(nc.pop_back_stack());
    assert_eq!(nc.current_destination().unwrap().id(), "list");

    let uri = Uri::parse("demo://unrelated/path").unwrap();
    assert!(!nc.handle_deep_link(&DeepLinkRequest::from_uri(uri)).unwrap());
}

#[test]
fn test_synthetic_stack_navigation() {
    use crate::deep_link::SyntheticStackBuilder;

    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    let graph = nc.graph().unwrap().clone();
    let mut args = Bundle::new();
    args.insert("itemId", 9);
    let stack = SyntheticStackBuilder::new(&graph)
        .destination("detail", Some(args))
        .build()
        .unwrap();

    nc.navigate_synthetic_stack(&stack).unwrap();
    assert_eq!(
        stack_ids(&nc),
        vec!["root", "home", "library", "list", "detail"]
    );
    let entry = nc.current_entry().unwrap();
    assert_eq!(entry.arguments().unwrap().get_i64("itemId"), Some(9));
}

#[test]
fn test_listener_and_subscriptions() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut nc = controller();
    let sink = seen.clone();
    nc.add_on_destination_changed(move |destination, _args| {
        sink.lock().push(destination.id().to_string());
    });
    let stacks = nc.subscribe_back_stack();
    let changes = nc.subscribe_destination_changes();

    // the current snapshot arrives up front
    assert_eq!(stacks.recv().unwrap().len(), 2);

    nc.navigate_to("settings", None, None, None).unwrap();
    assert_eq!(seen.lock().as_slice(), ["settings".to_string()]);
    assert_eq!(changes.recv().unwrap().destination().id(), "settings");
    let latest = stacks.try_iter().last().unwrap();
    assert_eq!(latest.len(), 3);
}

#[test]
fn test_visible_entries_during_transition() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();

    // while the push animates, both the covered and the entering screen are
    // visible
    let visible = nc.visible_entries_snapshot();
    let ids: Vec<_> = visible.iter().map(|e| e.destination().id()).collect();
    assert_eq!(ids, vec!["home", "settings"]);

    settle(&mut nc);
    let visible = nc.visible_entries_snapshot();
    let ids: Vec<_> = visible.iter().map(|e| e.destination().id()).collect();
    assert_eq!(ids, vec!["settings"]);
}

#[test]
fn test_prepare_for_transition() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    settle(&mut nc);

    let settings = nc.current_entry().unwrap();
    assert_eq!(settings.max_lifecycle(), Lifecycle::Resumed);
    nc.prepare_for_transition(&settings).unwrap();
    assert_eq!(settings.max_lifecycle(), Lifecycle::Started);
    nc.mark_transition_complete(&settings);
    assert_eq!(settings.max_lifecycle(), Lifecycle::Resumed);

    nc.pop_back_stack();
    nc.mark_transition_complete(&settings);
    let err = nc.prepare_for_transition(&settings).unwrap_err();
    assert!(matches!(err, NavError::StaleEntry { .. }));
}

#[test]
fn test_mark_transition_complete_is_idempotent() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    let settings = nc.current_entry().unwrap();
    let store = settings.view_model_store().unwrap();
    store.lock().put("draft", Arc::new(1u32));

    // popped while its enter animation was still running, so the entry
    // stays alive until the display reports the animation finished
    nc.pop_back_stack();
    assert_eq!(settings.max_lifecycle(), Lifecycle::Created);
    nc.mark_transition_complete(&settings);
    assert_eq!(settings.max_lifecycle(), Lifecycle::Destroyed);
    assert!(store.lock().is_empty());

    // a second completion report changes nothing
    nc.mark_transition_complete(&settings);
    assert_eq!(settings.max_lifecycle(), Lifecycle::Destroyed);
    assert_eq!(stack_ids(&nc), vec!["root", "home"]);
}

#[cfg(test)]
struct PushyNavigator;

#[cfg(test)]
impl Navigator for PushyNavigator {
    fn name(&self) -> &str {
        "pushy"
    }

    fn pop_back_stack(
        &mut self,
        cx: &mut NavContext<'_>,
        pop_up_to: Arc<BackStackEntry>,
        save_state: bool,
    ) -> Result<(), NavError> {
        // tries to sneak a fresh entry in while popping
        let extra = cx.create_entry(pop_up_to.destination().clone(), None);
        cx.push(extra)?;
        cx.pop(pop_up_to, save_state)
    }
}

#[test]
fn test_out_of_band_push_is_ignored() {
    let graph = GraphBuilder::new("root", "home")
        .destination(screen("home"))
        .destination(Destination::builder("pushy").id("popup").build().unwrap())
        .build_graph()
        .unwrap();
    let mut nc = NavController::new();
    nc.add_navigator(PushyNavigator);
    nc.handle_lifecycle_event(LifecycleEvent::Resume);
    nc.set_graph(graph, None).unwrap();

    nc.navigate_to("popup", None, None, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["root", "home", "popup"]);

    assert!(nc.pop_back_stack());
    assert_eq!(stack_ids(&nc), vec!["root", "home"]);
}

#[test]
fn test_set_graph_replacement_resets_everything() {
    let mut nc = controller();
    nc.navigate_to("settings", None, None, None).unwrap();
    settle(&mut nc);

    let replacement = GraphBuilder::new("other", "start")
        .destination(screen("start"))
        .build_graph()
        .unwrap();
    nc.set_graph(replacement, None).unwrap();
    assert_eq!(stack_ids(&nc), vec!["other", "start"]);
    assert!(nc.back_stack_map.is_empty());
    assert!(nc.back_stack_states.is_empty());
}
