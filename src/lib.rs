//! A navigation back stack engine.
//!
//! Applications describe their screens as a [`Graph`] of destinations, then
//! drive a [`NavController`] that owns the back stack: navigating pushes
//! entries, popping unwinds them, and every completed operation settles entry
//! lifecycles and publishes immutable snapshots to observers. Navigators
//! decide how each kind of destination is shown; the built-in set covers
//! full screens, nested graphs and floating dialogs, and custom navigators
//! can be registered alongside them.
//!
//! The controller also speaks deep links (explicit uri/action/mime patterns
//! plus the implicit links generated from routes), saves and restores whole
//! stacks by destination, and serializes itself for process death via
//! [`SavedNavState`].

mod bundle;
mod controller;
mod deep_link;
mod destination;
mod entry;
mod error;
mod host;
mod lifecycle;
mod navigator;
mod options;
mod save_state;
mod uri;

pub use bundle::Bundle;
pub use controller::{NavContext, NavController};
pub use deep_link::{
    DeepLink, DeepLinkBuilder, DeepLinkMatch, DeepLinkRequest, MatchStrength, SyntheticStack,
    SyntheticStackBuilder,
};
pub use destination::{
    ArgType, Destination, DestinationBuilder, Graph, GraphBuilder, NavAction, NavArgument,
};
pub use entry::{BackStackEntry, EntryId, ViewModelStore, ViewModelStoreProvider};
pub use error::{GraphError, NavError};
pub use host::{NavDisplay, NavHost};
pub use lifecycle::{Lifecycle, LifecycleEvent};
pub use navigator::{
    DialogNavigator, GraphNavigator, Navigator, NavigatorProvider, NavigatorState, ScreenNavigator,
    DIALOG_NAVIGATOR, GRAPH_NAVIGATOR, SCREEN_NAVIGATOR,
};
pub use options::{NavOptions, NavOptionsBuilder};
pub use save_state::{SavedEntry, SavedNavState};
pub use uri::{Uri, UriError};
