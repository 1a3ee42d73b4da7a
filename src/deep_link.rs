//! Deep links: declarative patterns that map external requests onto
//! destinations.
//!
//! A pattern addresses a destination by uri (with `{placeholder}` path
//! segments and query templates), by action name, by mime type, or any
//! combination. Matching a request against a graph returns the single best
//! match under a documented total order; see [`MatchStrength`].

use crate::bundle::Bundle;
use crate::destination::{Destination, Graph, NavArgument};
use crate::error::{GraphError, NavError};
use crate::uri::Uri;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Scheme+authority prefix used for the implicit deep links generated from
/// route patterns.
pub(crate) const ROUTE_BASE: &str = "app://skua.nav/";

pub(crate) fn create_route(route: &str) -> String {
    format!("{}{}", ROUTE_BASE, route)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryPart {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct UriPattern {
    scheme: Option<String>,
    authority: Option<String>,
    segments: Vec<Segment>,
    query: Vec<(String, QueryPart)>,
    exact: bool,
}

/// A single deep link declaration on a destination.
#[derive(Debug, Clone)]
pub struct DeepLink {
    uri_pattern: Option<String>,
    action: Option<String>,
    mime_type: Option<String>,
    pattern: Option<UriPattern>,
}

impl DeepLink {
    pub fn from_uri_pattern(pattern: &str) -> Result<DeepLink, GraphError> {
        DeepLink::builder().uri_pattern(pattern).build()
    }

    pub fn builder() -> DeepLinkBuilder {
        DeepLinkBuilder::default()
    }

    pub fn uri_pattern(&self) -> Option<&str> {
        self.uri_pattern.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Whether the uri pattern contains no placeholders or wildcards.
    fn is_exact(&self) -> bool {
        self.pattern.as_ref().map(|p| p.exact).unwrap_or(false)
    }

    /// Extracts the arguments a uri provides under this pattern, typed
    /// according to the destination’s declarations. `None` when the uri does
    /// not match. The second value counts matched literal path segments.
    fn match_uri(
        &self,
        uri: &Uri,
        declared: &BTreeMap<String, NavArgument>,
    ) -> Option<(Bundle, usize)> {
        let pattern = self.pattern.as_ref()?;
        if let Some(scheme) = &pattern.scheme {
            if uri.scheme() != Some(scheme.as_str()) {
                return None;
            }
        }
        if let Some(authority) = &pattern.authority {
            if uri.authority() != Some(authority.as_str()) {
                return None;
            }
        }

        let segments = uri.path_segments();
        let trailing_wildcard = pattern.segments.last() == Some(&Segment::Wildcard);
        if trailing_wildcard {
            if segments.len() < pattern.segments.len() - 1 {
                return None;
            }
        } else if segments.len() != pattern.segments.len() {
            return None;
        }

        let mut args = Bundle::new();
        let mut literal_matches = 0;
        for (i, part) in pattern.segments.iter().enumerate() {
            match part {
                Segment::Literal(expected) => {
                    if segments.get(i).map(|s| s.as_str()) != Some(expected.as_str()) {
                        return None;
                    }
                    literal_matches += 1;
                }
                Segment::Param(name) => {
                    let raw = segments.get(i)?;
                    args.insert(name.clone(), parse_typed(name, raw, declared)?);
                }
                Segment::Wildcard => {
                    if i + 1 == pattern.segments.len() {
                        break;
                    }
                    segments.get(i)?;
                }
            }
        }

        for (key, part) in &pattern.query {
            match (uri.query_value(key), part) {
                (Some(value), QueryPart::Literal(expected)) => {
                    if value != expected {
                        return None;
                    }
                }
                (Some(value), QueryPart::Param(name)) => {
                    args.insert(name.clone(), parse_typed(name, value, declared)?);
                }
                (None, QueryPart::Param(name)) => {
                    // absent query parameters fall back to defaults, but a
                    // required argument cannot be left unfilled
                    if declared.get(name).map(NavArgument::is_required).unwrap_or(false) {
                        return None;
                    }
                }
                (None, QueryPart::Literal(_)) => return None,
            }
        }

        Some((args, literal_matches))
    }

    /// Mime match quality: 2 for an exact type/subtype match, lower when one
    /// half is a `*` wildcard, `None` on mismatch.
    fn mime_rank(&self, request_mime: &str) -> Option<i8> {
        let pattern = self.mime_type.as_deref()?;
        let (ptype, psub) = split_mime(pattern);
        let (rtype, rsub) = split_mime(request_mime);
        let type_rank = component_rank(ptype, rtype)?;
        let sub_rank = component_rank(psub, rsub)?;
        Some(type_rank + sub_rank)
    }
}

fn split_mime(mime: &str) -> (&str, &str) {
    match mime.find('/') {
        Some(idx) => (&mime[..idx], &mime[idx + 1..]),
        None => (mime, "*"),
    }
}

fn component_rank(pattern: &str, request: &str) -> Option<i8> {
    if pattern == request {
        Some(1)
    } else if pattern == "*" || request == "*" {
        Some(0)
    } else {
        None
    }
}

fn parse_typed(
    name: &str,
    raw: &str,
    declared: &BTreeMap<String, NavArgument>,
) -> Option<serde_json::Value> {
    match declared.get(name) {
        Some(argument) => argument.arg_type().parse(raw),
        None => Some(serde_json::Value::from(raw)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeepLinkBuilder {
    uri_pattern: Option<String>,
    action: Option<String>,
    mime_type: Option<String>,
}

impl DeepLinkBuilder {
    pub fn uri_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.uri_pattern = Some(pattern.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn build(self) -> Result<DeepLink, GraphError> {
        if self.uri_pattern.is_none() && self.action.is_none() && self.mime_type.is_none() {
            return Err(GraphError::EmptyDeepLink);
        }
        let pattern = match &self.uri_pattern {
            Some(raw) => Some(compile_pattern(raw)?),
            None => None,
        };
        Ok(DeepLink {
            uri_pattern: self.uri_pattern,
            action: self.action,
            mime_type: self.mime_type,
            pattern,
        })
    }
}

fn compile_pattern(raw: &str) -> Result<UriPattern, GraphError> {
    let uri = Uri::parse(raw)?;
    let mut exact = true;
    let mut segments = Vec::new();
    for segment in uri.path_segments() {
        if segment == "*" {
            segments.push(Segment::Wildcard);
            exact = false;
        } else if segment.starts_with('{') && segment.ends_with('}') {
            segments.push(Segment::Param(
                segment[1..segment.len() - 1].to_string(),
            ));
            exact = false;
        } else {
            segments.push(Segment::Literal(segment));
        }
    }
    let mut query = Vec::new();
    for (key, value) in uri.query() {
        if value.starts_with('{') && value.ends_with('}') {
            query.push((
                key.clone(),
                QueryPart::Param(value[1..value.len() - 1].to_string()),
            ));
            exact = false;
        } else {
            query.push((key.clone(), QueryPart::Literal(value.clone())));
        }
    }
    Ok(UriPattern {
        scheme: uri.scheme().map(str::to_string),
        authority: uri.authority().map(str::to_string),
        segments,
        query,
        exact,
    })
}

/// An incoming request to be matched against the graph.
#[derive(Debug, Clone, Default)]
pub struct DeepLinkRequest {
    uri: Option<Uri>,
    action: Option<String>,
    mime_type: Option<String>,
}

impl DeepLinkRequest {
    pub fn from_uri(uri: Uri) -> DeepLinkRequest {
        DeepLinkRequest {
            uri: Some(uri),
            action: None,
            mime_type: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn uri(&self) -> Option<&Uri> {
        self.uri.as_ref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub(crate) fn describe(&self) -> String {
        match (&self.uri, &self.action, &self.mime_type) {
            (Some(uri), _, _) => uri.to_string(),
            (None, Some(action), _) => format!("action {}", action),
            (None, None, Some(mime)) => format!("mime type {}", mime),
            (None, None, None) => "<empty request>".to_string(),
        }
    }
}

impl From<Uri> for DeepLinkRequest {
    fn from(uri: Uri) -> DeepLinkRequest {
        DeepLinkRequest::from_uri(uri)
    }
}

/// How well a deep link matched a request.
///
/// The derived `Ord` is the documented precedence, most significant field
/// first:
///
/// 1. exact uri patterns (no placeholders) beat templated ones,
/// 2. more matched literal path segments beat fewer,
/// 3. an action match beats none,
/// 4. a better mime match rank beats a worse one.
///
/// Remaining ties resolve to the destination encountered first in graph
/// iteration order, which is id order and therefore deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchStrength {
    pub exact: bool,
    pub path_segments: usize,
    pub action: bool,
    pub mime_rank: i8,
}

/// The result of matching a request against a destination subtree.
#[derive(Debug, Clone)]
pub struct DeepLinkMatch {
    pub destination: Arc<Destination>,
    pub matching_args: Option<Bundle>,
    pub strength: MatchStrength,
}

impl Destination {
    /// Matches a request against this destination’s own deep links only.
    pub fn match_deep_link_excluding_children(
        self: &Arc<Self>,
        request: &DeepLinkRequest,
    ) -> Option<DeepLinkMatch> {
        let mut best: Option<DeepLinkMatch> = None;
        for link in self.deep_links() {
            let uri_match = request
                .uri()
                .and_then(|uri| link.match_uri(uri, self.arguments()));
            let action = match (request.action(), link.action()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            let mime_rank = request
                .mime_type()
                .and_then(|mime| link.mime_rank(mime));

            let candidate = uri_match.is_some()
                || ((action || mime_rank.is_some()) && self.has_no_unfillable_args());
            if !candidate {
                continue;
            }

            let (matching_args, path_segments) = match uri_match {
                Some((args, literal)) => (Some(args), literal),
                None => (None, 0),
            };
            let strength = MatchStrength {
                exact: matching_args.is_some() && link.is_exact(),
                path_segments,
                action,
                mime_rank: mime_rank.unwrap_or(-1),
            };
            let better = best
                .as_ref()
                .map(|b| strength > b.strength)
                .unwrap_or(true);
            if better {
                best = Some(DeepLinkMatch {
                    destination: self.clone(),
                    matching_args,
                    strength,
                });
            }
        }
        best
    }

    /// Matches a request against this destination and, for graphs, all of
    /// its children recursively. Returns the strongest match.
    pub fn match_deep_link(
        self: &Arc<Self>,
        request: &DeepLinkRequest,
    ) -> Option<DeepLinkMatch> {
        let mut best = self.match_deep_link_excluding_children(request);
        for child in self.nodes() {
            if let Some(found) = child.match_deep_link(request) {
                let better = best
                    .as_ref()
                    .map(|b| found.strength > b.strength)
                    .unwrap_or(true);
                if better {
                    best = Some(found);
                }
            }
        }
        best
    }

    /// Whether `route` addresses this destination, taking the entry’s
    /// arguments into account for templated routes.
    pub fn matches_route(self: &Arc<Self>, route: &str, entry_args: Option<&Bundle>) -> bool {
        if self.route() == Some(route) {
            return true;
        }
        let uri = match Uri::parse(&create_route(route)) {
            Ok(uri) => uri,
            Err(_) => return false,
        };
        let request = DeepLinkRequest::from_uri(uri);
        match self.match_deep_link_excluding_children(&request) {
            Some(found) => match &found.matching_args {
                Some(args) => args.iter().all(|(key, value)| {
                    entry_args.and_then(|b| b.get(key)) == Some(value)
                }),
                None => true,
            },
            None => false,
        }
    }

    /// An action- or mime-only match can’t supply argument values, so the
    /// destination must not require any.
    fn has_no_unfillable_args(&self) -> bool {
        self.arguments().values().all(|arg| !arg.is_required())
    }
}

/// A validated, ordered list of navigation requests that synthesizes a back
/// stack, typically in response to an external deep link.
#[derive(Debug, Clone)]
pub struct SyntheticStack {
    pub(crate) requests: Vec<(String, Option<Bundle>)>,
}

impl SyntheticStack {
    pub fn requests(&self) -> &[(String, Option<Bundle>)] {
        &self.requests
    }
}

/// Builds a [`SyntheticStack`] against a graph, verifying every destination
/// up front.
pub struct SyntheticStackBuilder<'a> {
    graph: &'a Graph,
    destinations: Vec<(String, Option<Bundle>)>,
    global_args: Option<Bundle>,
}

impl<'a> SyntheticStackBuilder<'a> {
    pub fn new(graph: &'a Graph) -> SyntheticStackBuilder<'a> {
        SyntheticStackBuilder {
            graph,
            destinations: Vec::new(),
            global_args: None,
        }
    }

    /// Arguments applied to every destination in the stack.
    pub fn arguments(mut self, args: Bundle) -> Self {
        self.global_args = Some(args);
        self
    }

    pub fn destination(mut self, id: impl Into<String>, args: Option<Bundle>) -> Self {
        self.destinations.push((id.into(), args));
        self
    }

    pub fn build(self) -> Result<SyntheticStack, NavError> {
        let first = self.destinations.first().ok_or_else(|| {
            NavError::DestinationNotFound { id: String::new() }
        })?;
        for (id, _) in &self.destinations {
            if self.graph.node(id).is_none() {
                return Err(NavError::DestinationNotFound { id: id.clone() });
            }
        }

        let mut requests = Vec::new();
        let first_node = self
            .graph
            .node(&first.0)
            .expect("destination verified above");
        for id in self.graph.build_deep_link_ids(first_node) {
            let args = if id == first.0 { first.1.clone() } else { None };
            requests.push((id, args));
        }
        for (id, args) in &self.destinations[1..] {
            requests.push((id.clone(), args.clone()));
        }

        if let Some(global) = &self.global_args {
            for (_, args) in &mut requests {
                let mut merged = args.take().unwrap_or_default();
                merged.fill_defaults(global);
                *args = Some(merged);
            }
        }
        Ok(SyntheticStack { requests })
    }
}

#[cfg(test)]
use crate::destination::{ArgType, GraphBuilder};

#[cfg(test)]
fn linked_screen(id: &str, pattern: &str) -> Destination {
    Destination::builder("screen")
        .id(id)
        .deep_link(DeepLink::from_uri_pattern(pattern).unwrap())
        .build()
        .unwrap()
}

#[test]
fn test_path_params_are_typed() {
    let dest = Arc::new(
        Destination::builder("screen")
            .id("profile")
            .argument("userId", NavArgument::new(ArgType::Int))
            .deep_link(DeepLink::from_uri_pattern("app://demo/users/{userId}").unwrap())
            .build()
            .unwrap(),
    );

    let uri = Uri::parse("app://demo/users/42").unwrap();
    let found = dest
        .match_deep_link(&DeepLinkRequest::from_uri(uri))
        .unwrap();
    assert_eq!(found.matching_args.unwrap().get_i64("userId"), Some(42));

    // an unparseable value fails the whole link
    let uri = Uri::parse("app://demo/users/bob").unwrap();
    assert!(dest.match_deep_link(&DeepLinkRequest::from_uri(uri)).is_none());
}

#[test]
fn test_more_literal_segments_win() {
    let graph = GraphBuilder::new("root", "a")
        .destination(linked_screen("a", "app://demo/files/{name}"))
        .destination(linked_screen("b", "app://demo/files/reports"))
        .build_graph()
        .unwrap();

    let uri = Uri::parse("app://demo/files/reports").unwrap();
    let found = graph
        .root()
        .match_deep_link(&DeepLinkRequest::from_uri(uri))
        .unwrap();
    // the fully literal (exact) pattern outranks the templated one
    assert_eq!(found.destination.id(), "b");
    assert!(found.strength.exact);
}

#[test]
fn test_action_and_mime_matching() {
    let dest = Arc::new(
        Destination::builder("screen")
            .id("share")
            .deep_link(
                DeepLink::builder()
                    .action("share")
                    .mime_type("image/*")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap(),
    );

    let request = DeepLinkRequest::default()
        .with_action("share")
        .with_mime_type("image/png");
    let found = dest.match_deep_link(&request).unwrap();
    assert!(found.strength.action);
    assert_eq!(found.strength.mime_rank, 1);
    assert!(found.matching_args.is_none());

    let request = DeepLinkRequest::default().with_mime_type("text/plain");
    assert!(dest.match_deep_link(&request).is_none());
}

#[test]
fn test_query_templates_and_required_args() {
    let dest = Arc::new(
        Destination::builder("screen")
            .id("search")
            .argument("q", NavArgument::new(ArgType::String))
            .argument("page", NavArgument::new(ArgType::Int).with_default(1))
            .deep_link(DeepLink::from_uri_pattern("app://demo/search?q={q}&page={page}").unwrap())
            .build()
            .unwrap(),
    );

    let uri = Uri::parse("app://demo/search?q=birds").unwrap();
    let found = dest
        .match_deep_link(&DeepLinkRequest::from_uri(uri))
        .unwrap();
    let args = found.matching_args.unwrap();
    assert_eq!(args.get_str("q"), Some("birds"));
    // `page` falls back to its declared default later in the pipeline
    assert!(!args.contains("page"));

    // a missing required parameter disqualifies the link
    let uri = Uri::parse("app://demo/search").unwrap();
    assert!(dest.match_deep_link(&DeepLinkRequest::from_uri(uri)).is_none());
}

#[test]
fn test_route_matching() {
    let dest = Arc::new(
        Destination::builder("screen")
            .route("profile/{userId}")
            .build()
            .unwrap(),
    );
    let mut args = Bundle::new();
    args.insert("userId", "7");
    assert!(dest.matches_route("profile/7", Some(&args)));
    assert!(!dest.matches_route("profile/8", Some(&args)));
    assert!(dest.matches_route("profile/{userId}", None));
}

#[test]
fn test_synthetic_stack_builder() {
    let graph = GraphBuilder::new("root", "home")
        .destination(crate::destination::screen("home"))
        .destination(
            GraphBuilder::new("inner", "list")
                .destination(crate::destination::screen("list"))
                .destination(crate::destination::screen("detail"))
                .build()
                .unwrap(),
        )
        .build_graph()
        .unwrap();

    let stack = SyntheticStackBuilder::new(&graph)
        .destination("detail", None)
        .build()
        .unwrap();
    let ids: Vec<_> = stack.requests().iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["root", "inner", "detail"]);

    let err = SyntheticStackBuilder::new(&graph)
        .destination("nope", None)
        .build()
        .unwrap_err();
    assert!(matches!(err, NavError::DestinationNotFound { .. }));
}
