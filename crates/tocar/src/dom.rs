//! Simulated target document.
//!
//! The engine drives an in-memory element tree instead of a live browser
//! surface: nodes carry the presentation state a locator or gesture needs
//! (geometry, visibility, form values, focus) plus event listeners that the
//! page under test registers when it is mounted. One document is live at a
//! time; it is dropped and rebuilt between test cases, and element
//! references into it are invalidated by a generation counter owned by the
//! target context.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::event::SyntheticEvent;

/// Axis-aligned bounding box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a new rect
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rect contains the given point
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Center point of the rect
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Index of a node within the current document's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Opaque handle to an element in the current target document.
///
/// Carries the document generation it was minted under; resolving it after
/// a reload fails with a stale-reference error. References must never be
/// cached across test-case boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRef {
    pub(crate) node: NodeId,
    pub(crate) generation: u64,
}

/// Persisted key-value state of the target context.
///
/// Survives reloads within a suite run the way localStorage survives page
/// reloads; the driver snapshots it before the first case and restores the
/// snapshot at teardown.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Storage {
    items: BTreeMap<String, String>,
}

impl Storage {
    /// Read a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Write a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) {
        self.items.remove(key);
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Mutable view handed to page event handlers: the live document plus the
/// persisted storage namespace.
pub struct PageTurn<'a> {
    /// The current target document
    pub doc: &'a mut Document,
    /// The target context's persisted key-value store
    pub storage: &'a mut Storage,
}

impl fmt::Debug for PageTurn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTurn").finish_non_exhaustive()
    }
}

/// Event listener registered by the page under test.
///
/// An `Err` from a handler is an uncaught error inside the target context
/// and fails the running test case.
pub type PageHandler = Rc<dyn Fn(&mut PageTurn<'_>, &SyntheticEvent) -> Result<(), String>>;

struct NodeData {
    tag: String,
    dom_id: Option<String>,
    role: Option<String>,
    label_for: Option<String>,
    input_type: Option<String>,
    hidden: bool,
    draggable: bool,
    detached: bool,
    text: String,
    value: String,
    checked: bool,
    indeterminate: bool,
    rect: Rect,
    scroll_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    handlers: HashMap<String, Vec<PageHandler>>,
}

impl NodeData {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            dom_id: None,
            role: None,
            label_for: None,
            input_type: None,
            hidden: false,
            draggable: false,
            detached: false,
            text: String::new(),
            value: String::new(),
            checked: false,
            indeterminate: false,
            rect: Rect::default(),
            scroll_height: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            parent: None,
            children: Vec::new(),
            handlers: HashMap::new(),
        }
    }
}

/// The isolated, reloadable element tree under test.
///
/// Created with a body node spanning the viewport so that hit-testing an
/// in-viewport point always resolves to at least one element.
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    active: Option<NodeId>,
    viewport_width: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("active", &self.active)
            .field(
                "viewport",
                &(self.viewport_width, self.viewport_height),
            )
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Create an empty document with a body spanning the viewport
    #[must_use]
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        let mut body = NodeData::new("body");
        body.rect = Rect::new(0.0, 0.0, viewport_width, viewport_height);
        Self {
            nodes: vec![body],
            root: NodeId(0),
            active: None,
            viewport_width,
            viewport_height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    /// The body node
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Viewport dimensions
    #[must_use]
    pub fn viewport(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    // ---- tree construction (used by PageSource::mount and page handlers) ----

    /// Create a detached element; it joins the document when appended
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(tag));
        id
    }

    /// Append a child to a parent node
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert a child before a sibling within the parent's child list
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, sibling: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let at = children.iter().position(|&c| c == sibling);
        match at {
            Some(i) => children.insert(i, child),
            None => children.push(child),
        }
    }

    /// Remove a node and its subtree from the document
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            self.nodes[id.0].detached = true;
            if self.active == Some(id) {
                self.active = None;
            }
            stack.extend(self.nodes[id.0].children.iter().copied());
        }
    }

    /// Register an event listener on a node
    pub fn on<F>(&mut self, node: NodeId, event_type: impl Into<String>, handler: F)
    where
        F: Fn(&mut PageTurn<'_>, &SyntheticEvent) -> Result<(), String> + 'static,
    {
        self.nodes[node.0]
            .handlers
            .entry(event_type.into())
            .or_default()
            .push(Rc::new(handler));
    }

    // ---- attribute setters ----

    /// Set the element's DOM id (used for label `for` binding)
    pub fn set_dom_id(&mut self, node: NodeId, id: impl Into<String>) {
        self.nodes[node.0].dom_id = Some(id.into());
    }

    /// Set the element's role attribute
    pub fn set_role(&mut self, node: NodeId, role: impl Into<String>) {
        self.nodes[node.0].role = Some(role.into());
    }

    /// Bind a label element to a control by id
    pub fn set_label_for(&mut self, node: NodeId, target_id: impl Into<String>) {
        self.nodes[node.0].label_for = Some(target_id.into());
    }

    /// Set the input type ("text", "checkbox", "radio", ...)
    pub fn set_input_type(&mut self, node: NodeId, input_type: impl Into<String>) {
        self.nodes[node.0].input_type = Some(input_type.into());
    }

    /// Set the hidden attribute
    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        self.nodes[node.0].hidden = hidden;
    }

    /// Mark the element draggable
    pub fn set_draggable(&mut self, node: NodeId, draggable: bool) {
        self.nodes[node.0].draggable = draggable;
    }

    /// Set the element's own text
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        self.nodes[node.0].text = text.into();
    }

    /// Set the element's form value
    pub fn set_value(&mut self, node: NodeId, value: impl Into<String>) {
        self.nodes[node.0].value = value.into();
    }

    /// Set the checked state
    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        self.nodes[node.0].checked = checked;
    }

    /// Set the indeterminate state
    pub fn set_indeterminate(&mut self, node: NodeId, indeterminate: bool) {
        self.nodes[node.0].indeterminate = indeterminate;
    }

    /// Set the element's bounding rect
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = rect;
    }

    /// Set the element's scrollable content height
    pub fn set_scroll_height(&mut self, node: NodeId, height: f64) {
        self.nodes[node.0].scroll_height = height;
    }

    // ---- accessors ----

    /// Tag name
    #[must_use]
    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    /// DOM id, if set
    #[must_use]
    pub fn dom_id(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].dom_id.as_deref()
    }

    /// Role attribute, if set
    #[must_use]
    pub fn role(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].role.as_deref()
    }

    /// Label `for` binding, if set
    #[must_use]
    pub fn label_for(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].label_for.as_deref()
    }

    /// Input type, if set
    #[must_use]
    pub fn input_type(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].input_type.as_deref()
    }

    /// Whether the element carries the hidden attribute
    #[must_use]
    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.nodes[node.0].hidden
    }

    /// Whether the element has been removed from the document
    #[must_use]
    pub fn is_detached(&self, node: NodeId) -> bool {
        self.nodes[node.0].detached
    }

    /// Whether the element is marked draggable
    #[must_use]
    pub fn is_draggable(&self, node: NodeId) -> bool {
        self.nodes[node.0].draggable
    }

    /// Current form value
    #[must_use]
    pub fn value(&self, node: NodeId) -> &str {
        &self.nodes[node.0].value
    }

    /// Checked state
    #[must_use]
    pub fn is_checked(&self, node: NodeId) -> bool {
        self.nodes[node.0].checked
    }

    /// Indeterminate state
    #[must_use]
    pub fn is_indeterminate(&self, node: NodeId) -> bool {
        self.nodes[node.0].indeterminate
    }

    /// Bounding rect
    #[must_use]
    pub fn rect(&self, node: NodeId) -> Rect {
        self.nodes[node.0].rect
    }

    /// Parent node, if attached
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Children in document order
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Visible text of the element and all of its descendants
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push_str(&self.nodes[id.0].text);
            // Push children reversed so the text reads in document order
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Listeners registered on a node for an event type
    #[must_use]
    pub(crate) fn handlers_for(&self, node: NodeId, event_type: &str) -> Vec<PageHandler> {
        self.nodes[node.0]
            .handlers
            .get(event_type)
            .map(|hs| hs.iter().map(Rc::clone).collect())
            .unwrap_or_default()
    }

    // ---- focus ----

    /// The element currently holding input focus
    #[must_use]
    pub fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    /// Move input focus to an element
    pub fn focus(&mut self, node: NodeId) {
        self.active = Some(node);
    }

    /// Drop input focus entirely
    pub fn clear_focus(&mut self) {
        self.active = None;
    }

    // ---- traversal and hit-testing ----

    /// All attached nodes in document order (depth-first from the body)
    #[must_use]
    pub fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if self.nodes[id.0].detached {
                continue;
            }
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Ancestors of a node from nearest to the body
    #[must_use]
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[node.0].parent;
        while let Some(id) = current {
            out.push(id);
            current = self.nodes[id.0].parent;
        }
        out
    }

    /// All non-hidden elements whose rect contains the point, topmost first
    #[must_use]
    pub fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        let mut hits: Vec<NodeId> = self
            .document_order()
            .into_iter()
            .filter(|&id| !self.nodes[id.0].hidden && self.nodes[id.0].rect.contains(x, y))
            .collect();
        hits.reverse();
        hits
    }

    /// The nearest ancestor (including the node itself) with scrollable
    /// overflow, or `None` when only the document itself can scroll
    #[must_use]
    pub fn scrolling_ancestor(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            let data = &self.nodes[id.0];
            if data.scroll_height > data.rect.height {
                return Some(id);
            }
            current = data.parent;
        }
        None
    }

    /// Scroll a node's content by the given amounts
    pub fn scroll_node_by(&mut self, node: NodeId, dx: f64, dy: f64) {
        let data = &mut self.nodes[node.0];
        data.scroll_x += dx;
        data.scroll_y += dy;
    }

    /// Node scroll offsets
    #[must_use]
    pub fn node_scroll(&self, node: NodeId) -> (f64, f64) {
        let data = &self.nodes[node.0];
        (data.scroll_x, data.scroll_y)
    }

    /// Scroll the document by the given amounts
    pub fn scroll_by(&mut self, dx: f64, dy: f64) {
        self.scroll_x += dx;
        self.scroll_y += dy;
    }

    /// Scroll the document to an absolute position
    pub fn scroll_to(&mut self, x: f64, y: f64) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    /// Document scroll offsets
    #[must_use]
    pub fn scroll_offset(&self) -> (f64, f64) {
        (self.scroll_x, self.scroll_y)
    }
}
