//! Synthetic input event construction and dispatch.
//!
//! Events are categorized by a fixed prefix table and carry the
//! bubbling/cancelable defaults a real user agent would apply. Dispatch
//! delivers to the target element and, for bubbling events, its ancestors;
//! page handlers may cancel the default action or stop propagation, and a
//! handler error surfaces as a target-document error.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::context::TargetContext;
use crate::dom::{ElementRef, PageTurn};
use crate::keymap::KeyStroke;
use crate::result::{TocarError, TocarResult};

/// Event constructor category, selected by type-name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// `key*` events
    Keyboard,
    /// `pointer*` events
    Pointer,
    /// `mouse*` events
    Mouse,
    /// `drag*` events
    Drag,
    /// `touch*` events
    Touch,
    /// Everything else (focus, blur, change, input, click, ...)
    Generic,
}

/// Select the event category from the fixed prefix table
#[must_use]
pub fn category_for(event_type: &str) -> EventCategory {
    if event_type.starts_with("key") {
        EventCategory::Keyboard
    } else if event_type.starts_with("pointer") {
        EventCategory::Pointer
    } else if event_type.starts_with("mouse") {
        EventCategory::Mouse
    } else if event_type.starts_with("drag") {
        EventCategory::Drag
    } else if event_type.starts_with("touch") {
        EventCategory::Touch
    } else {
        EventCategory::Generic
    }
}

/// Events that do not bubble
pub const NON_BUBBLING_EVENTS: [&str; 5] = ["focus", "blur", "load", "unload", "scroll"];

/// Events whose default action cannot be prevented
pub const NON_CANCELABLE_EVENTS: [&str; 8] = [
    "focus",
    "blur",
    "change",
    "input",
    "mousewheel",
    "load",
    "unload",
    "scroll",
];

/// Pointer coordinates carried by mouse, pointer, drag, and touch events
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseInit {
    /// X relative to the target context's viewport
    pub screen_x: f64,
    /// Y relative to the target context's viewport
    pub screen_y: f64,
    /// X relative to the target element's left edge
    pub client_x: f64,
    /// Y relative to the target element's top edge
    pub client_y: f64,
}

impl MouseInit {
    /// Coordinates of a point relative to an element's rect
    #[must_use]
    pub fn at(x: f64, y: f64, element_rect: crate::dom::Rect) -> Self {
        Self {
            screen_x: x,
            screen_y: y,
            client_x: x - element_rect.x,
            client_y: y - element_rect.y,
        }
    }
}

/// Opaque drag payload shared by every event of one grab session.
///
/// String key/value store in the manner of a DataTransfer object; the page
/// under test can stash data on dragstart and read it back on drop.
#[derive(Clone, Default)]
pub struct DragPayload {
    data: Rc<std::cell::RefCell<BTreeMap<String, String>>>,
}

impl DragPayload {
    /// Create an empty payload
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under a format key
    pub fn set_data(&self, format: impl Into<String>, value: impl Into<String>) {
        self.data.borrow_mut().insert(format.into(), value.into());
    }

    /// Read a value back
    #[must_use]
    pub fn get_data(&self, format: &str) -> Option<String> {
        self.data.borrow().get(format).cloned()
    }

    /// Whether two handles point at the same payload
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for DragPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragPayload")
            .field("entries", &self.data.borrow().len())
            .finish()
    }
}

/// Optional event parameters supplied at dispatch time
#[derive(Debug, Clone, Default)]
pub struct EventInit {
    /// Pointer coordinates
    pub mouse: Option<MouseInit>,
    /// Touch list (touch events only)
    pub touches: Vec<MouseInit>,
    /// Key parameters (keyboard events only)
    pub key: Option<KeyStroke>,
    /// Ctrl modifier
    pub ctrl: bool,
    /// Drag payload (drag events only)
    pub payload: Option<DragPayload>,
}

impl EventInit {
    /// Init carrying pointer coordinates
    #[must_use]
    pub fn mouse(init: MouseInit) -> Self {
        Self {
            mouse: Some(init),
            ..Self::default()
        }
    }

    /// Init carrying a single-touch list
    #[must_use]
    pub fn touch(init: MouseInit) -> Self {
        Self {
            touches: vec![init],
            ..Self::default()
        }
    }

    /// Init carrying pointer coordinates and a drag payload
    #[must_use]
    pub fn drag(init: MouseInit, payload: DragPayload) -> Self {
        Self {
            mouse: Some(init),
            payload: Some(payload),
            ..Self::default()
        }
    }

    /// Init carrying key parameters
    #[must_use]
    pub fn key(stroke: KeyStroke) -> Self {
        Self {
            key: Some(stroke),
            ..Self::default()
        }
    }

    /// Init carrying key parameters with the ctrl modifier held
    #[must_use]
    pub fn key_ctrl(stroke: KeyStroke) -> Self {
        Self {
            key: Some(stroke),
            ctrl: true,
            ..Self::default()
        }
    }
}

/// One synthesized input event
#[derive(Debug)]
pub struct SyntheticEvent {
    event_type: String,
    category: EventCategory,
    bubbles: bool,
    cancelable: bool,
    init: EventInit,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl SyntheticEvent {
    /// Construct an event with the category and defaults for its type
    #[must_use]
    pub fn new(event_type: impl Into<String>, init: EventInit) -> Self {
        let event_type = event_type.into();
        let category = category_for(&event_type);
        let bubbles = !NON_BUBBLING_EVENTS.contains(&event_type.as_str());
        let cancelable = !NON_CANCELABLE_EVENTS.contains(&event_type.as_str());
        Self {
            event_type,
            category,
            bubbles,
            cancelable,
            init,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Event type name
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Constructor category
    #[must_use]
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Whether the event bubbles to ancestors
    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Whether the default action can be prevented
    #[must_use]
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Pointer coordinates, if any
    #[must_use]
    pub fn mouse(&self) -> Option<MouseInit> {
        self.init.mouse
    }

    /// Touch list
    #[must_use]
    pub fn touches(&self) -> &[MouseInit] {
        &self.init.touches
    }

    /// Key parameters, if any
    #[must_use]
    pub fn key(&self) -> Option<&KeyStroke> {
        self.init.key.as_ref()
    }

    /// Whether ctrl is held
    #[must_use]
    pub fn ctrl(&self) -> bool {
        self.init.ctrl
    }

    /// Drag payload, if any
    #[must_use]
    pub fn payload(&self) -> Option<&DragPayload> {
        self.init.payload.as_ref()
    }

    /// Cancel the default action; ignored for non-cancelable events
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    /// Whether a handler cancelled the default action
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stop delivery to further elements in the bubble chain
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Whether propagation was stopped
    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

/// Dispatch one synthetic event to an element.
///
/// For `focus`, input focus is first moved imperatively to the element and
/// the event dispatched after that; dispatching alone never moves focus.
/// Bubbling events are delivered to the element and then its ancestors
/// until propagation is stopped.
pub fn dispatch(
    target: &TargetContext,
    element: ElementRef,
    event_type: &str,
    init: EventInit,
) -> TocarResult<SyntheticEvent> {
    let node = target.resolve(element)?;
    let event = SyntheticEvent::new(event_type, init);

    if event_type == "focus" {
        target.with_doc_mut(|doc| doc.focus(node))?;
    }
    if event_type == "blur" {
        target.with_doc_mut(|doc| {
            if doc.active_element() == Some(node) {
                doc.clear_focus();
            }
        })?;
    }

    tracing::trace!(target: "tocar::event", event = event_type, ?node, "dispatch");

    let chain = target.with_doc(|doc| {
        let mut chain = vec![node];
        if event.bubbles() {
            chain.extend(doc.ancestors(node));
        }
        chain
    })?;

    'chain: for link in chain {
        let handlers = target.with_doc(|doc| {
            if doc.is_detached(link) {
                Vec::new()
            } else {
                doc.handlers_for(link, event_type)
            }
        })?;
        for handler in handlers {
            target
                .with_page_turn(|doc, storage| {
                    let mut turn = PageTurn { doc, storage };
                    handler(&mut turn, &event)
                })?
                .map_err(TocarError::target)?;
            if event.propagation_stopped() {
                break 'chain;
            }
        }
        if event.propagation_stopped() {
            break;
        }
    }

    Ok(event)
}

/// Dispatch a sequence of events, returning early with the vetoing event
/// the moment a cancelable event reports its default was prevented.
///
/// An approximation of how a target document vetoes an interaction (for
/// example a prevented drop); good enough in most cases.
pub fn dispatch_chain(
    target: &TargetContext,
    element: ElementRef,
    steps: Vec<(&str, EventInit)>,
) -> TocarResult<Option<SyntheticEvent>> {
    for (event_type, init) in steps {
        let event = dispatch(target, element, event_type, init)?;
        if event.cancelable() && event.default_prevented() {
            return Ok(Some(event));
        }
    }
    Ok(None)
}

/// Dispatch the keydown/keyup/keypress triad for one keystroke
pub fn key_press(
    target: &TargetContext,
    element: ElementRef,
    stroke: KeyStroke,
    ctrl: bool,
) -> TocarResult<()> {
    for event_type in ["keydown", "keyup", "keypress"] {
        let init = if ctrl {
            EventInit::key_ctrl(stroke.clone())
        } else {
            EventInit::key(stroke.clone())
        };
        dispatch(target, element, event_type, init)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn context_with_button() -> (Rc<TargetContext>, ElementRef) {
        let target = Rc::new(TargetContext::new(800.0, 600.0));
        target.mount(|doc, _storage| {
            let button = doc.create_element("button");
            doc.set_text(button, "Go");
            doc.set_rect(button, Rect::new(0.0, 0.0, 50.0, 20.0));
            let root = doc.root();
            doc.append_child(root, button);
        });
        let node = target.with_doc(|doc| doc.children(doc.root())[0]).unwrap();
        let element = target.make_ref(node);
        (target, element)
    }

    mod category_tests {
        use super::*;

        #[test]
        fn test_prefix_table() {
            assert_eq!(category_for("keydown"), EventCategory::Keyboard);
            assert_eq!(category_for("pointerenter"), EventCategory::Pointer);
            assert_eq!(category_for("mousemove"), EventCategory::Mouse);
            assert_eq!(category_for("dragstart"), EventCategory::Drag);
            assert_eq!(category_for("touchend"), EventCategory::Touch);
            assert_eq!(category_for("click"), EventCategory::Generic);
            assert_eq!(category_for("change"), EventCategory::Generic);
        }

        #[test]
        fn test_bubbling_and_cancelable_defaults() {
            let click = SyntheticEvent::new("click", EventInit::default());
            assert!(click.bubbles());
            assert!(click.cancelable());

            let focus = SyntheticEvent::new("focus", EventInit::default());
            assert!(!focus.bubbles());
            assert!(!focus.cancelable());

            let change = SyntheticEvent::new("change", EventInit::default());
            assert!(change.bubbles());
            assert!(!change.cancelable());
        }

        #[test]
        fn test_prevent_default_ignored_when_not_cancelable() {
            let input = SyntheticEvent::new("input", EventInit::default());
            input.prevent_default();
            assert!(!input.default_prevented());
        }
    }

    mod dispatch_tests {
        use super::*;

        #[test]
        fn test_handler_receives_event() {
            let (target, element) = context_with_button();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&seen);
            target
                .with_doc_mut(|doc| {
                    let node = doc.children(doc.root())[0];
                    doc.on(node, "click", move |_turn, ev| {
                        log.borrow_mut().push(ev.event_type().to_string());
                        Ok(())
                    });
                })
                .unwrap();

            dispatch(&target, element, "click", EventInit::default()).unwrap();
            assert_eq!(*seen.borrow(), vec!["click"]);
        }

        #[test]
        fn test_bubbles_to_ancestors() {
            let (target, element) = context_with_button();
            let order = Rc::new(RefCell::new(Vec::new()));
            let at_button = Rc::clone(&order);
            let at_body = Rc::clone(&order);
            target
                .with_doc_mut(|doc| {
                    let root = doc.root();
                    let node = doc.children(root)[0];
                    doc.on(node, "click", move |_turn, _ev| {
                        at_button.borrow_mut().push("button");
                        Ok(())
                    });
                    doc.on(root, "click", move |_turn, _ev| {
                        at_body.borrow_mut().push("body");
                        Ok(())
                    });
                })
                .unwrap();

            dispatch(&target, element, "click", EventInit::default()).unwrap();
            assert_eq!(*order.borrow(), vec!["button", "body"]);
        }

        #[test]
        fn test_non_bubbling_stays_on_target() {
            let (target, element) = context_with_button();
            let fired = Rc::new(RefCell::new(false));
            let at_body = Rc::clone(&fired);
            target
                .with_doc_mut(|doc| {
                    let root = doc.root();
                    doc.on(root, "blur", move |_turn, _ev| {
                        *at_body.borrow_mut() = true;
                        Ok(())
                    });
                })
                .unwrap();

            dispatch(&target, element, "blur", EventInit::default()).unwrap();
            assert!(!*fired.borrow());
        }

        #[test]
        fn test_focus_moves_input_focus() {
            let (target, element) = context_with_button();
            dispatch(&target, element, "focus", EventInit::default()).unwrap();
            assert_eq!(target.active_element(), Some(element));
        }

        #[test]
        fn test_handler_error_is_target_error() {
            let (target, element) = context_with_button();
            target
                .with_doc_mut(|doc| {
                    let node = doc.children(doc.root())[0];
                    doc.on(node, "click", |_turn, _ev| Err("boom".to_string()));
                })
                .unwrap();

            let err = dispatch(&target, element, "click", EventInit::default()).unwrap_err();
            assert!(matches!(err, TocarError::Target { .. }));
        }

        #[test]
        fn test_stop_propagation_halts_bubbling() {
            let (target, element) = context_with_button();
            let reached_body = Rc::new(RefCell::new(false));
            let flag = Rc::clone(&reached_body);
            target
                .with_doc_mut(|doc| {
                    let root = doc.root();
                    let node = doc.children(root)[0];
                    doc.on(node, "click", |_turn, ev| {
                        ev.stop_propagation();
                        Ok(())
                    });
                    doc.on(root, "click", move |_turn, _ev| {
                        *flag.borrow_mut() = true;
                        Ok(())
                    });
                })
                .unwrap();

            dispatch(&target, element, "click", EventInit::default()).unwrap();
            assert!(!*reached_body.borrow());
        }
    }

    mod chain_tests {
        use super::*;

        #[test]
        fn test_chain_short_circuits_on_prevented_default() {
            let (target, element) = context_with_button();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&seen);
            target
                .with_doc_mut(|doc| {
                    let node = doc.children(doc.root())[0];
                    doc.on(node, "mousedown", |_turn, ev| {
                        ev.prevent_default();
                        Ok(())
                    });
                    doc.on(node, "mouseup", move |_turn, _ev| {
                        log.borrow_mut().push("mouseup");
                        Ok(())
                    });
                })
                .unwrap();

            let vetoed = dispatch_chain(
                &target,
                element,
                vec![
                    ("mousedown", EventInit::default()),
                    ("mouseup", EventInit::default()),
                ],
            )
            .unwrap();

            assert_eq!(vetoed.unwrap().event_type(), "mousedown");
            assert!(seen.borrow().is_empty(), "mouseup must not be dispatched");
        }

        #[test]
        fn test_chain_runs_to_completion() {
            let (target, element) = context_with_button();
            let vetoed = dispatch_chain(
                &target,
                element,
                vec![
                    ("pointerdown", EventInit::default()),
                    ("pointerup", EventInit::default()),
                    ("click", EventInit::default()),
                ],
            )
            .unwrap();
            assert!(vetoed.is_none());
        }
    }

    mod payload_tests {
        use super::*;

        #[test]
        fn test_payload_shared_between_clones() {
            let payload = DragPayload::new();
            let clone = payload.clone();
            payload.set_data("text/plain", "task-1");
            assert_eq!(clone.get_data("text/plain").as_deref(), Some("task-1"));
            assert!(payload.same_as(&clone));
            assert!(!payload.same_as(&DragPayload::new()));
        }
    }
}
