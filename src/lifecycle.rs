//! Entry lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a back stack entry.
///
/// States are totally ordered: `Destroyed < Initialized < Created < Started
/// < Resumed`. `Destroyed` is terminal—once an entry is destroyed it never
/// transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lifecycle {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

impl Lifecycle {
    pub fn is_at_least(self, other: Lifecycle) -> bool {
        self >= other
    }
}

/// Lifecycle events delivered by the host (window, scene, application).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    Destroy,
}

impl LifecycleEvent {
    /// The state the subject is in after the event has been processed.
    pub fn target_state(self) -> Lifecycle {
        match self {
            LifecycleEvent::Create | LifecycleEvent::Stop => Lifecycle::Created,
            LifecycleEvent::Start | LifecycleEvent::Pause => Lifecycle::Started,
            LifecycleEvent::Resume => Lifecycle::Resumed,
            LifecycleEvent::Destroy => Lifecycle::Destroyed,
        }
    }
}

#[test]
fn test_ordering() {
    assert!(Lifecycle::Destroyed < Lifecycle::Initialized);
    assert!(Lifecycle::Created < Lifecycle::Started);
    assert!(Lifecycle::Started < Lifecycle::Resumed);
    assert!(Lifecycle::Resumed.is_at_least(Lifecycle::Created));
    assert!(!Lifecycle::Created.is_at_least(Lifecycle::Started));
}

#[test]
fn test_event_targets() {
    assert_eq!(LifecycleEvent::Pause.target_state(), Lifecycle::Started);
    assert_eq!(LifecycleEvent::Stop.target_state(), Lifecycle::Created);
    assert_eq!(LifecycleEvent::Destroy.target_state(), Lifecycle::Destroyed);
}
