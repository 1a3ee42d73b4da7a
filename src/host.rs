//! Embedding glue between a UI layer and the controller.
//!
//! A [`NavHost`] owns the controller, feeds it host lifecycle events from a
//! channel, and forwards visible-entry snapshots to a [`NavDisplay`]. The
//! display decides what a snapshot looks like on screen; the host only makes
//! sure it always renders the latest one.

use crate::controller::NavController;
use crate::entry::BackStackEntry;
use crate::lifecycle::LifecycleEvent;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;

/// Rendering side of a host: receives the visible entries, bottom to top,
/// whenever they change.
pub trait NavDisplay: Send {
    fn show(&mut self, entries: &[Arc<BackStackEntry>]);
}

/// Drives a [`NavController`] from a host event loop.
pub struct NavHost {
    controller: NavController,
    lifecycle_events: Receiver<LifecycleEvent>,
    visible_entries: Receiver<Vec<Arc<BackStackEntry>>>,
    display: Box<dyn NavDisplay>,
}

impl NavHost {
    /// Wraps a controller. The returned sender feeds host lifecycle events
    /// into the next [`NavHost::poll`].
    pub fn new(
        mut controller: NavController,
        display: Box<dyn NavDisplay>,
    ) -> (NavHost, Sender<LifecycleEvent>) {
        let (sender, lifecycle_events) = channel::unbounded();
        let visible_entries = controller.subscribe_visible_entries();
        let host = NavHost {
            controller,
            lifecycle_events,
            visible_entries,
            display,
        };
        (host, sender)
    }

    pub fn controller(&self) -> &NavController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut NavController {
        &mut self.controller
    }

    /// Drains pending host events and hands the latest visible snapshot to
    /// the display. Call once per frame.
    pub fn poll(&mut self) {
        loop {
            match self.lifecycle_events.try_recv() {
                Ok(event) => self.controller.handle_lifecycle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    panic!("lifecycle event sender has been disconnected")
                }
            }
        }

        let mut latest = None;
        loop {
            match self.visible_entries.try_recv() {
                Ok(entries) => latest = Some(entries),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    panic!("visible entries channel has been disconnected")
                }
            }
        }
        if let Some(entries) = latest {
            self.display.show(&entries);
        }
    }

    /// System back affordance. Returns whether the press was consumed.
    pub fn on_back_pressed(&mut self) -> bool {
        let handled = self.controller.navigate_up();
        self.poll();
        handled
    }
}

#[cfg(test)]
use crate::destination::{screen, GraphBuilder};
#[cfg(test)]
use parking_lot::Mutex;

#[cfg(test)]
struct RecordingDisplay {
    shown: Arc<Mutex<Vec<Vec<String>>>>,
}

#[cfg(test)]
impl NavDisplay for RecordingDisplay {
    fn show(&mut self, entries: &[Arc<BackStackEntry>]) {
        self.shown.lock().push(
            entries
                .iter()
                .map(|e| e.destination().id().to_string())
                .collect(),
        );
    }
}

#[test]
fn test_host_drives_display_and_back_press() {
    let graph = GraphBuilder::new("root", "home")
        .destination(screen("home"))
        .destination(screen("settings"))
        .build_graph()
        .unwrap();
    let mut controller = NavController::new();
    controller.set_graph(graph, None).unwrap();

    let shown = Arc::new(Mutex::new(Vec::new()));
    let display = RecordingDisplay {
        shown: shown.clone(),
    };
    let (mut host, events) = NavHost::new(controller, Box::new(display));

    events.send(LifecycleEvent::Resume).unwrap();
    host.poll();
    assert_eq!(shown.lock().last().unwrap(), &vec!["home".to_string()]);

    host.controller_mut()
        .navigate_to("settings", None, None, None)
        .unwrap();
    host.poll();
    assert_eq!(
        shown.lock().last().unwrap(),
        &vec!["home".to_string(), "settings".to_string()]
    );

    // once the transition is reported complete only the top remains visible
    for entry in host.controller().back_stack_snapshot() {
        host.controller_mut().mark_transition_complete(&entry);
    }
    host.poll();
    assert_eq!(shown.lock().last().unwrap(), &vec!["settings".to_string()]);

    assert!(host.on_back_pressed());
    assert_eq!(
        host.controller().current_destination().unwrap().id(),
        "home"
    );
}
