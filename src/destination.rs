//! Destinations and navigation graphs.
//!
//! A [`Destination`] is a node in the navigation graph: it knows which
//! navigator renders it, how it can be addressed (id, route, deep links,
//! actions) and which arguments it accepts. Graph nodes are destinations
//! with a child table and a start destination. Once assembled into a
//! [`Graph`] the whole tree is frozen behind `Arc`s, and all upward links
//! are plain id strings resolved through the graph’s flattened index.

use crate::bundle::Bundle;
use crate::deep_link::{self, DeepLink};
use crate::error::{GraphError, NavError};
use crate::options::NavOptions;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Type of a declared navigation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Int,
    Float,
    Bool,
}

impl ArgType {
    /// Parses a raw string (from a deep link) into a typed value.
    pub(crate) fn parse(self, raw: &str) -> Option<Value> {
        match self {
            ArgType::String => Some(Value::from(raw)),
            ArgType::Int => raw.parse::<i64>().ok().map(Value::from),
            ArgType::Float => raw.parse::<f64>().ok().map(Value::from),
            ArgType::Bool => raw.parse::<bool>().ok().map(Value::from),
        }
    }
}

/// A typed argument declared on a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct NavArgument {
    arg_type: ArgType,
    nullable: bool,
    default: Option<Value>,
}

impl NavArgument {
    pub fn new(arg_type: ArgType) -> NavArgument {
        NavArgument {
            arg_type,
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> NavArgument {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> NavArgument {
        self.default = Some(default.into());
        self
    }

    pub fn arg_type(&self) -> ArgType {
        self.arg_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// A required argument has to be supplied by the caller or the link.
    pub(crate) fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }
}

/// A named alias for navigating somewhere from a destination.
#[derive(Debug, Clone, Default)]
pub struct NavAction {
    destination_id: String,
    nav_options: Option<NavOptions>,
    default_arguments: Option<Bundle>,
}

impl NavAction {
    pub fn new(destination_id: impl Into<String>) -> NavAction {
        NavAction {
            destination_id: destination_id.into(),
            nav_options: None,
            default_arguments: None,
        }
    }

    pub fn with_options(mut self, options: NavOptions) -> NavAction {
        self.nav_options = Some(options);
        self
    }

    pub fn with_default_arguments(mut self, args: Bundle) -> NavAction {
        self.default_arguments = Some(args);
        self
    }

    /// Empty when the action only describes a pop.
    pub fn destination_id(&self) -> &str {
        &self.destination_id
    }

    pub fn nav_options(&self) -> Option<&NavOptions> {
        self.nav_options.as_ref()
    }

    pub fn default_arguments(&self) -> Option<&Bundle> {
        self.default_arguments.as_ref()
    }
}

pub(crate) struct GraphPayload {
    pub(crate) start_id: String,
    pub(crate) nodes: BTreeMap<String, Arc<Destination>>,
}

/// A single node in the navigation graph.
pub struct Destination {
    navigator_name: String,
    id: String,
    route: Option<String>,
    label: Option<String>,
    floating: bool,
    parent_id: Option<String>,
    arguments: BTreeMap<String, NavArgument>,
    actions: BTreeMap<String, NavAction>,
    deep_links: Vec<DeepLink>,
    graph: Option<GraphPayload>,
}

impl Destination {
    pub(crate) fn new(navigator_name: impl Into<String>) -> Destination {
        Destination {
            navigator_name: navigator_name.into(),
            id: String::new(),
            route: None,
            label: None,
            floating: false,
            parent_id: None,
            arguments: BTreeMap::new(),
            actions: BTreeMap::new(),
            deep_links: Vec::new(),
            graph: None,
        }
    }

    pub fn builder(navigator_name: impl Into<String>) -> DestinationBuilder {
        DestinationBuilder {
            destination: Destination::new(navigator_name),
        }
    }

    pub fn navigator_name(&self) -> &str {
        &self.navigator_name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Floating destinations (dialogs, sheets) render above the entry below
    /// them instead of replacing it.
    pub fn is_floating(&self) -> bool {
        self.floating
    }

    pub fn is_graph(&self) -> bool {
        self.graph.is_some()
    }

    /// Id of the graph this destination was added to, if any.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn argument(&self, name: &str) -> Option<&NavArgument> {
        self.arguments.get(name)
    }

    pub(crate) fn arguments(&self) -> &BTreeMap<String, NavArgument> {
        &self.arguments
    }

    /// Looks up an action declared directly on this destination.
    pub fn action(&self, id: &str) -> Option<&NavAction> {
        self.actions.get(id)
    }

    pub(crate) fn deep_links(&self) -> &[DeepLink] {
        &self.deep_links
    }

    /// Direct children, for graph nodes. Iteration order is id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Destination>> {
        self.graph.iter().flat_map(|g| g.nodes.values())
    }

    /// Id of the designated start destination, for graph nodes.
    pub fn start_destination_id(&self) -> Option<&str> {
        self.graph.as_ref().map(|g| g.start_id.as_str())
    }

    /// Looks up a direct child by id. Does not search nested graphs.
    pub fn find_node(&self, id: &str) -> Option<&Arc<Destination>> {
        self.graph.as_ref().and_then(|g| g.nodes.get(id))
    }

    /// Layers the caller’s arguments over this destination’s declared
    /// defaults. Returns `None` if there is nothing to pass along.
    pub fn add_in_default_args(&self, args: Option<&Bundle>) -> Option<Bundle> {
        let mut merged = Bundle::new();
        for (name, argument) in &self.arguments {
            if let Some(default) = argument.default() {
                merged.insert(name.clone(), default.clone());
            }
        }
        if let Some(args) = args {
            merged.put_all(args);
        }
        if merged.is_empty() {
            None
        } else {
            Some(merged)
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("Destination");
        s.field("id", &self.id).field("navigator", &self.navigator_name);
        if let Some(route) = &self.route {
            s.field("route", route);
        }
        if let Some(graph) = &self.graph {
            s.field("start", &graph.start_id)
                .field("nodes", &graph.nodes.keys().collect::<Vec<_>>());
        }
        s.finish()
    }
}

/// Builder for leaf destinations.
pub struct DestinationBuilder {
    destination: Destination,
}

impl DestinationBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.destination.id = id.into();
        self
    }

    /// Sets the route pattern. Routes double as an implicit deep link, and
    /// a destination without an explicit id is addressed by its route.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.destination.route = Some(route.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.destination.label = Some(label.into());
        self
    }

    pub fn floating(mut self) -> Self {
        self.destination.floating = true;
        self
    }

    pub fn argument(mut self, name: impl Into<String>, argument: NavArgument) -> Self {
        self.destination.arguments.insert(name.into(), argument);
        self
    }

    pub fn action(mut self, id: impl Into<String>, action: NavAction) -> Self {
        self.destination.actions.insert(id.into(), action);
        self
    }

    pub fn deep_link(mut self, link: DeepLink) -> Self {
        self.destination.deep_links.push(link);
        self
    }

    pub fn build(mut self) -> Result<Destination, GraphError> {
        if self.destination.id.is_empty() {
            match &self.destination.route {
                Some(route) => self.destination.id = route.clone(),
                None => return Err(GraphError::MissingId),
            }
        }
        if let Some(route) = &self.destination.route {
            let pattern = deep_link::create_route(route);
            let already = self
                .destination
                .deep_links
                .iter()
                .any(|link| link.uri_pattern() == Some(pattern.as_str()));
            if !already {
                self.destination
                    .deep_links
                    .push(DeepLink::from_uri_pattern(&pattern)?);
            }
        }
        Ok(self.destination)
    }
}

/// Builder for graph nodes.
///
/// `GraphBuilder::build` produces a graph *destination* for nesting inside
/// another graph; `GraphBuilder::build_graph` produces the root [`Graph`].
pub struct GraphBuilder {
    destination: DestinationBuilder,
    start: String,
    children: Vec<Destination>,
}

impl GraphBuilder {
    /// Creates a graph with the given id and start destination (child id or
    /// route).
    pub fn new(id: impl Into<String>, start: impl Into<String>) -> GraphBuilder {
        GraphBuilder {
            destination: Destination::builder(crate::navigator::GRAPH_NAVIGATOR).id(id),
            start: start.into(),
            children: Vec::new(),
        }
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.destination = self.destination.route(route);
        self
    }

    pub fn argument(mut self, name: impl Into<String>, argument: NavArgument) -> Self {
        self.destination = self.destination.argument(name, argument);
        self
    }

    pub fn action(mut self, id: impl Into<String>, action: NavAction) -> Self {
        self.destination = self.destination.action(id, action);
        self
    }

    pub fn deep_link(mut self, link: DeepLink) -> Self {
        self.destination = self.destination.deep_link(link);
        self
    }

    /// Adds a child destination. Graph destinations nest.
    pub fn destination(mut self, destination: Destination) -> Self {
        self.children.push(destination);
        self
    }

    /// Builds a graph destination for nesting inside another graph.
    pub fn build(self) -> Result<Destination, GraphError> {
        let GraphBuilder {
            destination,
            start,
            children,
        } = self;
        let mut graph_dest = destination.build()?;
        if start.is_empty() {
            return Err(GraphError::NoStartDestination {
                id: graph_dest.id.clone(),
            });
        }

        let mut nodes = BTreeMap::new();
        let mut start_id = None;
        for mut child in children {
            if child.id.is_empty() {
                return Err(GraphError::MissingId);
            }
            if child.id == graph_dest.id {
                return Err(GraphError::SameIdAsGraph {
                    id: child.id.clone(),
                });
            }
            if child.route.is_some() && child.route == graph_dest.route {
                return Err(GraphError::SameRouteAsGraph {
                    route: child.route.clone().unwrap_or_default(),
                });
            }
            if child.id == start || child.route.as_deref() == Some(start.as_str()) {
                start_id = Some(child.id.clone());
            }
            child.parent_id = Some(graph_dest.id.clone());
            let child_id = child.id.clone();
            if nodes.insert(child_id.clone(), Arc::new(child)).is_some() {
                return Err(GraphError::DuplicateId { id: child_id });
            }
        }

        let start_id = start_id.ok_or_else(|| GraphError::StartNotFound {
            id: graph_dest.id.clone(),
            start: start.clone(),
        })?;
        graph_dest.graph = Some(GraphPayload { start_id, nodes });
        Ok(graph_dest)
    }

    /// Builds the root graph.
    pub fn build_graph(self) -> Result<Graph, GraphError> {
        Graph::new(self.build()?)
    }
}

/// A frozen navigation graph: the root graph destination plus a flattened
/// index of every destination by id.
///
/// Ids are unique across the whole graph, which is what lets parent links be
/// plain id strings.
#[derive(Clone)]
pub struct Graph {
    root: Arc<Destination>,
    index: BTreeMap<String, Arc<Destination>>,
}

impl Graph {
    pub fn new(root: Destination) -> Result<Graph, GraphError> {
        if root.graph.is_none() {
            return Err(GraphError::NoStartDestination {
                id: root.id.clone(),
            });
        }
        let root = Arc::new(root);
        let mut index = BTreeMap::new();
        let mut queue = vec![root.clone()];
        while let Some(node) = queue.pop() {
            if index
                .insert(node.id.clone(), node.clone())
                .is_some()
            {
                return Err(GraphError::DuplicateId {
                    id: node.id.clone(),
                });
            }
            for child in node.nodes() {
                queue.push(child.clone());
            }
        }
        Ok(Graph { root, index })
    }

    pub fn root(&self) -> &Arc<Destination> {
        &self.root
    }

    pub fn id(&self) -> &str {
        self.root.id()
    }

    /// Looks up any destination in the graph by id.
    pub fn node(&self, id: &str) -> Option<&Arc<Destination>> {
        self.index.get(id)
    }

    /// All destinations in the graph, root included, in id order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Arc<Destination>> {
        self.index.values()
    }

    /// The graph that `destination` was added to.
    pub fn parent(&self, destination: &Destination) -> Option<&Arc<Destination>> {
        self.index.get(destination.parent_id()?)
    }

    /// The destination and its graph ancestors, bottom-up.
    pub fn hierarchy<'a>(
        &'a self,
        destination: &Arc<Destination>,
    ) -> impl Iterator<Item = Arc<Destination>> + 'a {
        std::iter::successors(Some(destination.clone()), move |node| {
            self.parent(node).cloned()
        })
    }

    /// Follows start destinations down to the first non-graph node.
    pub fn find_start_destination(
        &self,
        graph_dest: &Arc<Destination>,
    ) -> Result<Arc<Destination>, NavError> {
        let mut node = graph_dest.clone();
        while node.is_graph() {
            let start = node
                .start_destination_id()
                .expect("graph node without start destination")
                .to_string();
            let next = node.find_node(&start).cloned().ok_or_else(|| {
                NavError::StartDestinationMissing {
                    graph: node.id().to_string(),
                    start: start.clone(),
                }
            })?;
            node = next;
        }
        Ok(node)
    }

    /// The chain of ids to navigate through to synthesize a back stack that
    /// ends at `destination`, top-down. Destinations that are their parent
    /// graph’s start destination are skipped, since navigating to the parent
    /// already lands on them.
    pub fn build_deep_link_ids(&self, destination: &Arc<Destination>) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(destination.clone());
        while let Some(node) = current {
            let parent = self.parent(&node).cloned();
            let skipped = parent
                .as_ref()
                .map(|p| p.start_destination_id() == Some(node.id()))
                .unwrap_or(false);
            if !skipped {
                chain.push(node.id().to_string());
            }
            current = parent;
        }
        chain.reverse();
        chain
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Graph")
            .field("root", &self.root)
            .field("nodes", &self.index.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn screen(id: &str) -> Destination {
    Destination::builder("screen").id(id).build().unwrap()
}

#[test]
fn test_graph_builder_validation() {
    // missing start destination
    let err = GraphBuilder::new("root", "nope")
        .destination(screen("a"))
        .build_graph()
        .unwrap_err();
    assert_eq!(
        err,
        GraphError::StartNotFound {
            id: "root".into(),
            start: "nope".into()
        }
    );

    // child sharing the graph's id
    let err = GraphBuilder::new("root", "root")
        .destination(screen("root"))
        .build_graph()
        .unwrap_err();
    assert_eq!(err, GraphError::SameIdAsGraph { id: "root".into() });
}

#[test]
fn test_flattened_index_and_parents() {
    let graph = GraphBuilder::new("root", "a")
        .destination(screen("a"))
        .destination(
            GraphBuilder::new("inner", "b")
                .destination(screen("b"))
                .build()
                .unwrap(),
        )
        .build_graph()
        .unwrap();

    let b = graph.node("b").unwrap().clone();
    assert_eq!(b.parent_id(), Some("inner"));
    let inner = graph.parent(&b).unwrap();
    assert_eq!(inner.id(), "inner");
    assert_eq!(graph.parent(inner).unwrap().id(), "root");

    let chain: Vec<_> = graph.hierarchy(&b).map(|d| d.id().to_string()).collect();
    assert_eq!(chain, vec!["b", "inner", "root"]);
}

#[test]
fn test_start_destination_resolution() {
    let graph = GraphBuilder::new("root", "inner")
        .destination(
            GraphBuilder::new("inner", "b")
                .destination(screen("b"))
                .build()
                .unwrap(),
        )
        .build_graph()
        .unwrap();
    let leaf = graph.find_start_destination(graph.root()).unwrap();
    assert_eq!(leaf.id(), "b");
}

#[test]
fn test_deep_link_ids_collapse_start_chains() {
    let graph = GraphBuilder::new("root", "inner")
        .destination(
            GraphBuilder::new("inner", "b")
                .destination(screen("b"))
                .destination(screen("c"))
                .build()
                .unwrap(),
        )
        .build_graph()
        .unwrap();

    // b is inner's start and inner is root's start: navigating the root
    // already lands on b
    let b = graph.node("b").unwrap();
    assert_eq!(graph.build_deep_link_ids(b), vec!["root".to_string()]);

    // c needs an explicit hop after the root; inner still collapses away
    let c = graph.node("c").unwrap();
    assert_eq!(
        graph.build_deep_link_ids(c),
        vec!["root".to_string(), "c".to_string()]
    );
}

#[test]
fn test_default_args() {
    let dest = Destination::builder("screen")
        .id("profile")
        .argument("tab", NavArgument::new(ArgType::String).with_default("posts"))
        .argument("userId", NavArgument::new(ArgType::Int))
        .build()
        .unwrap();

    let mut args = Bundle::new();
    args.insert("userId", 7);
    let merged = dest.add_in_default_args(Some(&args)).unwrap();
    assert_eq!(merged.get_str("tab"), Some("posts"));
    assert_eq!(merged.get_i64("userId"), Some(7));
    assert!(dest.argument("userId").unwrap().is_required());
}
