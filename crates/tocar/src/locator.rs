//! Semantic element location within the current target document.
//!
//! Elements are matched by role and visible label text, never by tag name
//! directly: roles are defined from the perspective of the end user. Zero
//! matches is always a hard failure, both for the plural and the singular
//! query; there is no maybe-empty mode.

use std::fmt;

use crate::context::TargetContext;
use crate::dom::{Document, ElementRef, NodeId};
use crate::result::{TocarError, TocarResult};

/// Abstract interaction category, independent of markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Clickable controls: native buttons or elements with `role=button`
    /// whose visible text contains the label
    Button,
    /// Input, select, or text-area controls associated with a label (by
    /// explicit for/id binding or ancestor wrapping) whose label text
    /// contains the label
    FormField,
    /// Draggable regions whose visible text contains the label; used by
    /// the label-based grab operations
    Area,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button => f.write_str("button"),
            Self::FormField => f.write_str("form field"),
            Self::Area => f.write_str("area"),
        }
    }
}

/// The label element bound to a form control, if any: an explicit
/// `label[for=id]` binding wins, otherwise the nearest label ancestor.
/// Hidden labels never associate.
fn label_node_for(doc: &Document, control: NodeId) -> Option<NodeId> {
    if let Some(id) = doc.dom_id(control) {
        let bound = doc.document_order().into_iter().find(|&n| {
            doc.tag(n) == "label" && !doc.is_hidden(n) && doc.label_for(n) == Some(id)
        });
        if bound.is_some() {
            return bound;
        }
    }
    let mut current = doc.parent(control);
    while let Some(node) = current {
        if doc.tag(node) == "label" && !doc.is_hidden(node) {
            return Some(node);
        }
        current = doc.parent(node);
    }
    None
}

fn node_matches(doc: &Document, node: NodeId, role: Role, label: &str) -> bool {
    if doc.is_hidden(node) {
        return false;
    }
    match role {
        Role::Button => {
            (doc.tag(node) == "button" || doc.role(node) == Some("button"))
                && doc.text_content(node).contains(label)
        }
        Role::FormField => {
            matches!(doc.tag(node), "input" | "select" | "textarea")
                && label_node_for(doc, node)
                    .is_some_and(|l| doc.text_content(l).contains(label))
        }
        Role::Area => doc.is_draggable(node) && doc.text_content(node).contains(label),
    }
}

/// Nodes matching the role and label, in document order
pub(crate) fn matching_nodes(doc: &Document, role: Role, label: &str) -> Vec<NodeId> {
    doc.document_order()
        .into_iter()
        .filter(|&node| node_matches(doc, node, role, label))
        .collect()
}

/// All elements matching the role and label.
///
/// Not finding any matches is an automatic failure, so this doubles as an
/// assertion.
pub fn find_all(
    target: &TargetContext,
    role: Role,
    label: &str,
) -> TocarResult<Vec<ElementRef>> {
    let nodes = target.with_doc(|doc| matching_nodes(doc, role, label))?;
    if nodes.is_empty() {
        return Err(TocarError::assertion(format!(
            "No {role} elements found with label \"{label}\""
        )));
    }
    Ok(nodes.into_iter().map(|node| target.make_ref(node)).collect())
}

/// The nth (1-based, document order) element matching the role and label.
///
/// Not finding a match at that position is an automatic failure.
pub fn find(
    target: &TargetContext,
    role: Role,
    label: &str,
    position: usize,
) -> TocarResult<ElementRef> {
    let nodes = target.with_doc(|doc| matching_nodes(doc, role, label))?;
    position
        .checked_sub(1)
        .and_then(|i| nodes.get(i).copied())
        .map(|node| target.make_ref(node))
        .ok_or_else(|| {
            TocarError::assertion(format!(
                "No {role} elements found with label \"{label}\""
            ))
        })
}

/// The topmost element at the given point; failing to find one is an
/// automatic failure
pub fn element_at_point(target: &TargetContext, x: f64, y: f64) -> TocarResult<ElementRef> {
    let hit = target.with_doc(|doc| doc.elements_from_point(x, y).first().copied())?;
    hit.map(|node| target.make_ref(node)).ok_or_else(|| {
        TocarError::assertion(format!("No element found at point ({x}, {y})"))
    })
}

/// Every element under the given point, topmost first; an empty result is
/// an automatic failure
pub fn elements_at_point(
    target: &TargetContext,
    x: f64,
    y: f64,
) -> TocarResult<Vec<ElementRef>> {
    let hits = target.with_doc(|doc| doc.elements_from_point(x, y))?;
    if hits.is_empty() {
        return Err(TocarError::assertion(format!(
            "No elements found at point ({x}, {y})"
        )));
    }
    Ok(hits.into_iter().map(|node| target.make_ref(node)).collect())
}
