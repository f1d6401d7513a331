// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # Router
//!
//! A prefix tree over path components. Route targets are split on `/`; each
//! segment matches literally, as a non-empty parameter (`:name`), or as a
//! wildcard parameter (`*name`). Lookup is a depth-first search preferring
//! literal children over parameters, capturing parameter components in
//! traversal order and rolling captures back when a branch dead-ends. The
//! tree is built at configuration time and read without locks while serving.

use crate::{
    fail::Fail,
    http::{request::Request, response::Response, Method, StatusCode},
};

use std::{fmt, ops::Index, sync::Arc};

//==============================================================================
// Constants & Structures
//==============================================================================

/// The canonical request-handler shape. The registration surface adapts
/// narrower shapes to this one.
pub type RequestHandler =
    Arc<dyn for<'r, 't> Fn(&'r Request, &'r PathParameters<'t>) -> Response + Send + Sync>;

/// Path components captured by parameter segments along the matched route,
/// in traversal order. The slices borrow from the request target.
#[derive(Debug, Default)]
pub struct PathParameters<'t> {
    repr: Vec<&'t str>,
}

/// What a route segment matches.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum NodeKind {
    Literal,
    ParamNonEmpty,
    ParamAny,
}

/// One node of the route tree, matching one path component. Children are
/// kept sorted by kind, literals first, so lookup tries the most specific
/// match before falling back to parameters.
struct RouteNode {
    kind: NodeKind,
    key: String,
    handlers: Vec<(Method, RequestHandler)>,
    children: Vec<RouteNode>,
}

/// The route tree. The root is a literal with an empty key.
pub struct RouteTree {
    root: RouteNode,
}

/// The router: a route tree plus the fallback handler invoked when no route
/// matches.
pub struct Router {
    tree: RouteTree,
    not_found_handler: RequestHandler,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [PathParameters].
impl<'t> PathParameters<'t> {
    /// Wraps captured components.
    pub(crate) fn new(repr: Vec<&'t str>) -> Self {
        Self { repr }
    }

    /// Returns the number of captured components.
    pub fn len(&self) -> usize {
        self.repr.len()
    }

    /// Checks whether anything was captured.
    pub fn is_empty(&self) -> bool {
        self.repr.is_empty()
    }

    /// Returns the component at `index`, counting parameter segments along
    /// the matched route from the left.
    pub fn get(&self, index: usize) -> Option<&'t str> {
        self.repr.get(index).copied()
    }

    /// Iterates over captured components in order.
    pub fn iter(&self) -> impl Iterator<Item = &'t str> + '_ {
        self.repr.iter().copied()
    }
}

/// Associate functions for [NodeKind].
impl NodeKind {
    /// Classifies a registration segment from its leading character.
    fn parse(segment: &str) -> NodeKind {
        match segment.bytes().next() {
            Some(b':') => NodeKind::ParamNonEmpty,
            Some(b'*') => NodeKind::ParamAny,
            _ => NodeKind::Literal,
        }
    }

    /// Strips the kind marker off a registration segment.
    fn parse_key(segment: &str) -> &str {
        match segment.bytes().next() {
            Some(b':') | Some(b'*') => &segment[1..],
            _ => segment,
        }
    }
}

/// Associate functions for [RouteNode].
impl RouteNode {
    /// Creates a node.
    fn new<S: Into<String>>(kind: NodeKind, key: S) -> Self {
        Self {
            kind,
            key: key.into(),
            handlers: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Checks whether the target node matches a request component.
    fn matches(&self, component: &str) -> bool {
        match self.kind {
            NodeKind::Literal => self.key == component,
            NodeKind::ParamNonEmpty => !component.is_empty(),
            NodeKind::ParamAny => true,
        }
    }

    /// Finds the handler registered for a method, if any.
    fn find_handler(&self, method: Method) -> Option<&RequestHandler> {
        self.handlers
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, handler)| handler)
    }

    /// Registers a handler for a method. Returns false if one was already
    /// present.
    fn insert_handler(&mut self, method: Method, handler: RequestHandler) -> bool {
        if self.find_handler(method).is_some() {
            return false;
        }
        self.handlers.push((method, handler));
        true
    }

    /// Returns the child with the given kind and key, inserting it at the
    /// position that keeps children sorted by kind (and in insertion order
    /// within a kind) if absent.
    fn child_mut(&mut self, kind: NodeKind, key: &str) -> &mut RouteNode {
        if let Some(position) = self
            .children
            .iter()
            .position(|child| child.kind == kind && child.key == key)
        {
            return &mut self.children[position];
        }

        let position = self.children.partition_point(|child| child.kind <= kind);
        self.children.insert(position, RouteNode::new(kind, key));
        &mut self.children[position]
    }
}

/// Associate functions for [RouteTree].
impl RouteTree {
    /// Creates an empty route tree.
    pub fn new() -> Self {
        Self {
            root: RouteNode::new(NodeKind::Literal, ""),
        }
    }

    /// Registers a handler for `(method, target)`. Rejects malformed targets
    /// and duplicate registrations.
    pub fn insert(
        &mut self,
        method: Method,
        target: &str,
        handler: RequestHandler,
    ) -> Result<(), Fail> {
        validate_target(target)?;

        let mut node = &mut self.root;
        for segment in split_target(target) {
            let kind = NodeKind::parse(segment);
            let key = NodeKind::parse_key(segment);
            node = node.child_mut(kind, key);
        }

        if !node.insert_handler(method, handler) {
            return Err(Fail::DuplicateRoute {
                method,
                target: target.to_string(),
            });
        }
        Ok(())
    }

    /// Finds the handler for `(method, target)` along with the components
    /// captured by parameter segments. A method mismatch at an otherwise
    /// matching leaf backtracks like any other dead end.
    pub fn lookup<'s, 't>(
        &'s self,
        method: Method,
        target: &'t str,
    ) -> Option<(&'s RequestHandler, Vec<&'t str>)> {
        let components: Vec<&str> = split_target(target).collect();
        let mut captures = Vec::new();
        let handler = Self::search(&self.root, method, &components, &mut captures)?;
        Some((handler, captures))
    }

    /// Depth-first search. Children are already sorted literal-first, so the
    /// most specific match is tried before any parameter; a capture made on
    /// the way down is undone before backtracking.
    fn search<'s, 't>(
        node: &'s RouteNode,
        method: Method,
        components: &[&'t str],
        captures: &mut Vec<&'t str>,
    ) -> Option<&'s RequestHandler> {
        let (component, rest) = match components.split_first() {
            None => return node.find_handler(method),
            Some((component, rest)) => (*component, rest),
        };

        for child in &node.children {
            if !child.matches(component) {
                continue;
            }

            let captured = child.kind != NodeKind::Literal;
            if captured {
                captures.push(component);
            }
            if let Some(handler) = Self::search(child, method, rest, captures) {
                return Some(handler);
            }
            if captured {
                captures.pop();
            }
        }

        None
    }
}

/// Associate functions for [Router].
impl Router {
    /// Creates a router whose fallback answers `404 Not Found` with an empty
    /// body.
    pub fn new() -> Self {
        Self {
            tree: RouteTree::new(),
            not_found_handler: Arc::new(|_request, _parameters| {
                Response::builder(StatusCode::NotFound).build()
            }),
        }
    }

    /// Registers a handler for `(method, target)`.
    pub fn add_route(
        &mut self,
        method: Method,
        target: &str,
        handler: RequestHandler,
    ) -> Result<(), Fail> {
        self.tree.insert(method, target, handler)
    }

    /// Resolves a request target to a handler and its captured parameters.
    /// When nothing matches, the fallback handler and empty parameters are
    /// returned; routing itself never fails.
    pub fn route<'t>(&self, method: Method, target: &'t str) -> (RequestHandler, Vec<&'t str>) {
        match self.tree.lookup(method, target) {
            Some((handler, captures)) => (handler.clone(), captures),
            None => (self.not_found_handler.clone(), Vec::new()),
        }
    }

    /// Replaces the fallback handler.
    pub fn set_not_found_handler(&mut self, handler: RequestHandler) {
        self.not_found_handler = handler;
    }

    /// Returns the route tree, e.g. for rendering.
    pub fn tree(&self) -> &RouteTree {
        &self.tree
    }
}

/// Splits a target into its path components, tolerating one leading `/`.
fn split_target(target: &str) -> std::str::Split<'_, char> {
    let target = target.strip_prefix('/').unwrap_or(target);
    target.split('/')
}

/// Validates a registration target: segment characters must come from
/// `[A-Za-z0-9._-]`, a `:`/`*` marker may only open a segment, and a marked
/// segment must have a non-empty name.
fn validate_target(target: &str) -> Result<(), Fail> {
    let invalid = || Fail::InvalidRoute {
        target: target.to_string(),
    };

    for segment in split_target(target) {
        let key = match segment.bytes().next() {
            Some(b':') | Some(b'*') => {
                let key = &segment[1..];
                if key.is_empty() {
                    return Err(invalid());
                }
                key
            }
            _ => segment,
        };
        let well_formed = key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-');
        if !well_formed {
            return Err(invalid());
        }
    }
    Ok(())
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Index trait implementation for [PathParameters].
impl<'t> Index<usize> for PathParameters<'t> {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        self.repr[index]
    }
}

/// Default trait implementation for [RouteTree].
impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Default trait implementation for [Router].
impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Display trait implementation for [RouteTree]: one line per node, indented
/// by depth, with the methods registered at that node.
impl fmt::Display for RouteTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn render(node: &RouteNode, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
            for _ in 0..depth {
                f.write_str("  ")?;
            }
            let marker = match node.kind {
                NodeKind::Literal => "",
                NodeKind::ParamNonEmpty => ":",
                NodeKind::ParamAny => "*",
            };
            if node.key.is_empty() && marker.is_empty() {
                f.write_str("/")?;
            } else {
                write!(f, "{}{}", marker, node.key)?;
            }
            for (method, _) in &node.handlers {
                write!(f, " {}", method)?;
            }
            writeln!(f)?;

            for child in &node.children {
                render(child, f, depth + 1)?;
            }
            Ok(())
        }

        render(&self.root, f, 0)
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
