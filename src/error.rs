//! Error types.

use crate::entry::EntryId;
use crate::uri::UriError;
use thiserror::Error;

/// Errors produced while resolving or executing navigation operations.
///
/// Note that popping a destination that is not on the back stack is *not* an
/// error: stale pop targets are benign no-ops that return `false`.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("navigation graph has not been set")]
    NoGraph,

    #[error("navigation destination {id} cannot be found from the current destination")]
    DestinationNotFound { id: String },

    #[error("destination {id} referenced from action {action} cannot be found from the current destination")]
    ActionDestinationNotFound { id: String, action: String },

    #[error("navigation destination matching request {request} cannot be found in the navigation graph")]
    NoDeepLinkMatch { request: String },

    #[error("navigator {name} is not registered with this controller")]
    NavigatorMissing { name: String },

    #[error("graph {graph} does not contain its start destination {start}")]
    StartDestinationMissing { graph: String, start: String },

    #[error("restoring the navigation back stack failed: destination {id} cannot be found from the current destination")]
    RestoreFailed { id: String },

    #[error("entry {id} is no longer part of the back stack")]
    StaleEntry { id: EntryId },

    #[error("invalid deep link uri: {0}")]
    InvalidUri(#[from] UriError),
}

/// Errors detected while building a destination or graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("destinations must declare an id or a route")]
    MissingId,

    #[error("destination {id} cannot have the same id as its graph")]
    SameIdAsGraph { id: String },

    #[error("destination {route} cannot have the same route as its graph")]
    SameRouteAsGraph { route: String },

    #[error("duplicate destination id {id}")]
    DuplicateId { id: String },

    #[error("graph {id} has no start destination set")]
    NoStartDestination { id: String },

    #[error("start destination {start} is not a direct child of graph {id}")]
    StartNotFound { id: String, start: String },

    #[error("deep links must declare a uri pattern, an action, or a mime type")]
    EmptyDeepLink,

    #[error("deep link pattern is not a valid uri: {0}")]
    BadDeepLinkPattern(#[from] UriError),
}
