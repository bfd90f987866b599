//! Multi-event interaction protocols composed from single synthetic events.
//!
//! One engine serves both device profiles; the profile decides which event
//! sequence table a gesture uses, never which code path runs. All gesture
//! state (the grab session, the per-field edit memory) lives here as
//! explicit optional fields, never on document nodes, so two live drag
//! sessions are impossible by construction.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::{Target, TargetContext};
use crate::dom::{ElementRef, NodeId};
use crate::event::{self, DragPayload, EventInit, MouseInit};
use crate::keymap::keystroke_for;
use crate::result::{TocarError, TocarResult};

/// Completion callback for gestures that run on the target clock
pub type OnSettled = Box<dyn FnOnce() -> TocarResult<()>>;

/// Fixed number of time slices one drag motion is divided into
const DRAG_STEPS: f64 = 50.0;
/// Virtual milliseconds between drag steps
const DRAG_STEP_MS: u64 = 10;
/// Cursor keeps this margin from the viewport edges while dragging
const DRAG_MARGIN: f64 = 10.0;
/// Upper bound of the per-character typing jitter
const TYPE_JITTER_MS: u64 = 50;

const NO_GRAB: &str = "There is no grabbed element. You must grab one first.";
const ALREADY_GRABBED: &str = "There is already a grabbed element. You must drop it first.";

/// Touch/drag capability configuration supplied at construction.
///
/// Always an explicit value, never ambient environment probing, so the
/// engine is deterministic and testable under either profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Whether the profile emulates a touch screen
    pub supports_touch: bool,
    /// Whether the profile supports native drag gestures
    pub supports_drag: bool,
}

impl DeviceProfile {
    /// Desktop pointer profile with native drag support
    #[must_use]
    pub const fn pointer() -> Self {
        Self {
            supports_touch: false,
            supports_drag: true,
        }
    }

    /// Touch-screen profile without native drag support
    #[must_use]
    pub const fn touch() -> Self {
        Self {
            supports_touch: true,
            supports_drag: false,
        }
    }

    /// Override native drag support
    #[must_use]
    pub const fn with_native_drag(mut self, supported: bool) -> Self {
        self.supports_drag = supported;
        self
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::pointer()
    }
}

/// Ephemeral state of one in-progress drag gesture.
///
/// Created by grab, mutated by drag, consumed by drop. At most one session
/// is live at a time.
#[derive(Debug)]
struct GrabSession {
    element: ElementRef,
    start: (f64, f64),
    last: (f64, f64),
    payload: DragPayload,
}

/// Remembered original value of the field being edited, used to decide
/// whether blur must fire a change notification
#[derive(Debug)]
struct EditMemory {
    element: ElementRef,
    original: String,
}

struct DragMotion {
    element: ElementRef,
    payload: DragPayload,
    pos: (f64, f64),
    remaining: (f64, f64),
    velocity: (f64, f64),
    under_cursor: Vec<NodeId>,
}

/// The gesture engine: composes synthetic events into interaction
/// protocols parameterized by a device profile
#[derive(Debug)]
pub struct GestureEngine {
    device: DeviceProfile,
    min_typing_delay_ms: u64,
    rng_state: u64,
    session: Option<GrabSession>,
    edit: Option<EditMemory>,
}

impl GestureEngine {
    /// Create an engine for the given profile
    #[must_use]
    pub fn new(device: DeviceProfile, min_typing_delay_ms: u64, jitter_seed: u64) -> Self {
        Self {
            device,
            min_typing_delay_ms,
            rng_state: if jitter_seed == 0 {
                0x9E37_79B9_7F4A_7C15
            } else {
                jitter_seed
            },
            session: None,
            edit: None,
        }
    }

    /// The profile this engine emulates
    #[must_use]
    pub fn device(&self) -> DeviceProfile {
        self.device
    }

    /// Whether a grab session is live
    #[must_use]
    pub fn has_grab_session(&self) -> bool {
        self.session.is_some()
    }

    /// Last recorded cursor position of the live grab session
    #[must_use]
    pub fn grab_position(&self) -> Option<(f64, f64)> {
        self.session.as_ref().map(|s| s.last)
    }

    /// Drop all gesture state; called between test cases
    pub fn reset(&mut self) {
        self.session = None;
        self.edit = None;
    }

    fn next_jitter(&mut self) -> u64 {
        // xorshift64; reproducible non-uniform typing cadence
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        self.rng_state % (TYPE_JITTER_MS + 1)
    }

    fn remember_original(
        &mut self,
        target: &TargetContext,
        element: ElementRef,
    ) -> TocarResult<()> {
        let same_field = self.edit.as_ref().is_some_and(|m| m.element == element);
        if !same_field {
            let node = target.resolve(element)?;
            let original = target.with_doc(|doc| doc.value(node).to_string())?;
            self.edit = Some(EditMemory { element, original });
        }
        Ok(())
    }

    // ---- blur protocol ----

    /// Remove focus from an element: change notification first when its
    /// value was edited since focus, then the device-appropriate leave
    /// sequence and a terminal blur.
    pub fn blur_element(&mut self, target: &TargetContext, element: ElementRef) -> TocarResult<()> {
        let Ok(node) = target.resolve(element) else {
            // The element left the document; nothing to blur
            self.edit = None;
            return Ok(());
        };

        if let Some(memory) = self.edit.take() {
            if memory.element == element {
                let current = target.with_doc(|doc| doc.value(node).to_string())?;
                if memory.original != current {
                    event::dispatch(target, element, "change", EventInit::default())?;
                }
            } else {
                self.edit = Some(memory);
            }
        }

        let sequence: Vec<(&str, EventInit)> = if self.device.supports_touch {
            vec![
                ("mouseleave", EventInit::default()),
                ("mouseout", EventInit::default()),
                ("blur", EventInit::default()),
            ]
        } else {
            vec![
                ("pointerleave", EventInit::default()),
                ("mouseleave", EventInit::default()),
                ("blur", EventInit::default()),
            ]
        };
        event::dispatch_chain(target, element, sequence)?;
        event::dispatch(target, element, "blur", EventInit::default())?;
        Ok(())
    }

    // ---- click protocol ----

    /// Click an element: blur whatever held focus, run the profile's full
    /// press sequence, then apply the native value side effects of the
    /// click (checkbox toggle, radio select) strictly after the chain.
    pub fn click(&mut self, target: &TargetContext, element: ElementRef) -> TocarResult<()> {
        let focused = target.active_element();
        let already_has_focus = focused == Some(element);
        if let Some(previous) = focused {
            if previous != element {
                self.blur_element(target, previous)?;
            }
        }

        let mut events: Vec<(&str, EventInit)> = Vec::new();
        if self.device.supports_touch {
            events.extend([
                ("pointerover", EventInit::default()),
                ("pointerenter", EventInit::default()),
                ("pointerdown", EventInit::default()),
                ("touchstart", EventInit::default()),
                ("pointerup", EventInit::default()),
                ("pointerout", EventInit::default()),
                ("pointerleave", EventInit::default()),
                ("touchend", EventInit::default()),
                ("mouseover", EventInit::default()),
                ("mouseenter", EventInit::default()),
                ("mousemove", EventInit::default()),
                ("mousedown", EventInit::default()),
            ]);
            if !already_has_focus {
                events.push(("focus", EventInit::default()));
            }
            events.extend([
                ("mouseup", EventInit::default()),
                ("click", EventInit::default()),
            ]);
        } else {
            if !already_has_focus {
                events.extend([
                    ("pointerover", EventInit::default()),
                    ("pointerenter", EventInit::default()),
                    ("mouseover", EventInit::default()),
                    ("mouseenter", EventInit::default()),
                ]);
            }
            events.extend([
                ("pointerdown", EventInit::default()),
                ("mousedown", EventInit::default()),
            ]);
            if !already_has_focus {
                events.push(("focus", EventInit::default()));
            }
            events.extend([
                ("pointerup", EventInit::default()),
                ("mouseup", EventInit::default()),
                ("click", EventInit::default()),
            ]);
        }
        event::dispatch_chain(target, element, events)?;

        // Native toggling happens as a side effect of the click, after the
        // full event chain, never before it
        let node = target.resolve(element)?;
        let (is_input, input_type, checked) = target.with_doc(|doc| {
            (
                doc.tag(node) == "input",
                doc.input_type(node).unwrap_or("").to_string(),
                doc.is_checked(node),
            )
        })?;
        if is_input && input_type == "checkbox" {
            target.with_doc_mut(|doc| {
                doc.set_checked(node, !checked);
                doc.set_indeterminate(node, false);
            })?;
            event::dispatch(target, element, "change", EventInit::default())?;
        }
        if is_input && input_type == "radio" && !checked {
            target.with_doc_mut(|doc| doc.set_checked(node, true))?;
            event::dispatch(target, element, "change", EventInit::default())?;
        }
        Ok(())
    }

    // ---- grab / drag / drop state machine ----

    /// Grab the element at a point, opening a grab session.
    ///
    /// Not restricted to elements with the draggable attribute; the full
    /// press sequence is synthesized either way, and dragstart only fires
    /// for draggable elements under a drag-capable profile.
    pub fn grab_at_point(&mut self, target: &TargetContext, x: f64, y: f64) -> TocarResult<()> {
        if self.session.is_some() {
            return Err(TocarError::usage(ALREADY_GRABBED));
        }

        let element = crate::locator::element_at_point(target, x, y)?;
        let node = target.resolve(element)?;
        let (rect, draggable) =
            target.with_doc(|doc| (doc.rect(node), doc.is_draggable(node)))?;
        let mouse = MouseInit::at(x, y, rect);
        let payload = DragPayload::new();

        self.session = Some(GrabSession {
            element,
            start: (x, y),
            last: (x, y),
            payload: payload.clone(),
        });

        if let Some(previous) = target.active_element() {
            if previous != element {
                self.blur_element(target, previous)?;
            }
        }

        let mut events: Vec<(&str, EventInit)> = if self.device.supports_touch {
            vec![
                ("pointerover", EventInit::mouse(mouse)),
                ("pointerenter", EventInit::mouse(mouse)),
                ("pointerdown", EventInit::mouse(mouse)),
                ("touchstart", EventInit::touch(mouse)),
                ("pointerup", EventInit::mouse(mouse)),
                ("pointerout", EventInit::mouse(mouse)),
                ("pointerleave", EventInit::mouse(mouse)),
                ("touchend", EventInit::touch(mouse)),
                ("mouseover", EventInit::mouse(mouse)),
                ("mouseenter", EventInit::mouse(mouse)),
                ("mousemove", EventInit::mouse(mouse)),
                ("mousedown", EventInit::mouse(mouse)),
            ]
        } else {
            vec![
                ("pointerenter", EventInit::mouse(mouse)),
                ("pointerdown", EventInit::mouse(mouse)),
                ("mouseenter", EventInit::mouse(mouse)),
                ("mousedown", EventInit::mouse(mouse)),
            ]
        };
        if draggable && self.device.supports_drag {
            events.push(("dragstart", EventInit::drag(mouse, payload)));
        }
        event::dispatch_chain(target, element, events)?;
        Ok(())
    }

    /// Grab an element located by role and label, at its center point
    pub fn grab_element(
        &mut self,
        target: &TargetContext,
        role: crate::locator::Role,
        label: &str,
        position: usize,
    ) -> TocarResult<()> {
        let element = crate::locator::find(target, role, label, position)?;
        let node = target.resolve(element)?;
        let center = target.with_doc(|doc| doc.rect(node).center())?;
        self.grab_at_point(target, center.0, center.1)
    }

    /// Drag the grabbed element by the given distances.
    ///
    /// The motion is time-sliced into a fixed number of steps on the
    /// target clock; each step clamps the cursor into the viewport margin,
    /// scrolls the nearest scrollable ancestor by any clamped overshoot,
    /// and synthesizes enter/leave/move traffic for the elements under the
    /// cursor. The loop ends only when both axis deltas are consumed, then
    /// invokes `on_settled`.
    pub fn drag_by(
        engine: &Rc<RefCell<Self>>,
        target: &Target,
        dist_x: f64,
        dist_y: f64,
        on_settled: OnSettled,
    ) -> TocarResult<()> {
        let (element, payload, start) = {
            let this = engine.borrow();
            let session = this
                .session
                .as_ref()
                .ok_or_else(|| TocarError::usage(NO_GRAB))?;
            (session.element, session.payload.clone(), session.last)
        };

        let under_cursor = crate::locator::elements_at_point(target, start.0, start.1)?
            .into_iter()
            .map(|r| target.resolve(r))
            .collect::<TocarResult<Vec<_>>>()?;

        let motion = DragMotion {
            element,
            payload,
            pos: start,
            remaining: (dist_x, dist_y),
            velocity: (dist_x / DRAG_STEPS, dist_y / DRAG_STEPS),
            under_cursor,
        };
        Self::drag_step(Rc::clone(engine), Rc::clone(target), motion, on_settled)
    }

    /// Drag the grabbed element over another element located by role and
    /// label: the delta is the distance from the session's current
    /// position to the target element's center
    pub fn drag_over(
        engine: &Rc<RefCell<Self>>,
        target: &Target,
        role: crate::locator::Role,
        label: &str,
        position: usize,
        on_settled: OnSettled,
    ) -> TocarResult<()> {
        let from = engine
            .borrow()
            .grab_position()
            .ok_or_else(|| TocarError::usage(NO_GRAB))?;
        let destination = crate::locator::find(target, role, label, position)?;
        let node = target.resolve(destination)?;
        let center = target.with_doc(|doc| doc.rect(node).center())?;
        Self::drag_by(engine, target, center.0 - from.0, center.1 - from.1, on_settled)
    }

    fn drag_step(
        engine: Rc<RefCell<Self>>,
        target: Target,
        mut motion: DragMotion,
        on_settled: OnSettled,
    ) -> TocarResult<()> {
        let reached_x = motion.remaining.0.round() == 0.0;
        let reached_y = motion.remaining.1.round() == 0.0;

        // The motion ends only once the destination is reached along both
        // axes; the final position becomes the drop point.
        if reached_x && reached_y {
            if let Some(session) = engine.borrow_mut().session.as_mut() {
                session.start = motion.pos;
                session.last = motion.pos;
            }
            return on_settled();
        }

        let (viewport_w, viewport_h) = target.viewport();
        let scrolling = target.with_doc(|doc| {
            target
                .resolve(motion.element)
                .ok()
                .and_then(|node| doc.scrolling_ancestor(node))
        })?;

        if !reached_x {
            let desired = motion.pos.0 + motion.velocity.0;
            let clamped = desired.clamp(DRAG_MARGIN, viewport_w - DRAG_MARGIN);
            let overshoot = desired - clamped;
            if overshoot != 0.0 {
                target.with_doc_mut(|doc| match scrolling {
                    Some(node) => doc.scroll_node_by(node, overshoot, 0.0),
                    None => doc.scroll_by(overshoot, 0.0),
                })?;
            }
            motion.pos.0 = clamped;
            motion.remaining.0 -= motion.velocity.0;
        }
        if !reached_y {
            let desired = motion.pos.1 + motion.velocity.1;
            let clamped = desired.clamp(DRAG_MARGIN, viewport_h - DRAG_MARGIN);
            let overshoot = desired - clamped;
            if overshoot != 0.0 {
                target.with_doc_mut(|doc| match scrolling {
                    Some(node) => doc.scroll_node_by(node, 0.0, overshoot),
                    None => doc.scroll_by(0.0, overshoot),
                })?;
            }
            motion.pos.1 = clamped;
            motion.remaining.1 -= motion.velocity.1;
        }

        let under_refs = crate::locator::elements_at_point(&target, motion.pos.0, motion.pos.1)?;
        let under: Vec<NodeId> = under_refs
            .iter()
            .map(|&r| target.resolve(r))
            .collect::<TocarResult<_>>()?;
        let top_rect = target.with_doc(|doc| doc.rect(under[0]))?;
        let mouse = MouseInit::at(motion.pos.0, motion.pos.1, top_rect);

        let (supports_touch, supports_drag) = {
            let this = engine.borrow();
            (this.device.supports_touch, this.device.supports_drag)
        };
        let drag_active = supports_drag
            && target
                .resolve(motion.element)
                .and_then(|node| target.with_doc(|doc| doc.is_draggable(node)))
                .unwrap_or(false);

        // touchmove targets the original touch point's element, unlike
        // pointer and drag events which follow the cursor
        if supports_touch {
            event::dispatch(&target, motion.element, "touchmove", EventInit::touch(mouse))?;
        }

        for &left in motion.under_cursor.iter().filter(|&n| !under.contains(n)) {
            let left_ref = target.make_ref(left);
            event::dispatch_chain(
                &target,
                left_ref,
                vec![
                    ("pointerleave", EventInit::mouse(mouse)),
                    ("mouseleave", EventInit::mouse(mouse)),
                    ("dragleave", EventInit::drag(mouse, motion.payload.clone())),
                ],
            )?;
        }

        for &hovered in &under {
            let hovered_ref = target.make_ref(hovered);
            if !motion.under_cursor.contains(&hovered) {
                let mut entered: Vec<(&str, EventInit)> = vec![
                    ("pointerenter", EventInit::mouse(mouse)),
                    ("mouseenter", EventInit::mouse(mouse)),
                ];
                if drag_active {
                    entered.push(("dragenter", EventInit::drag(mouse, motion.payload.clone())));
                }
                event::dispatch_chain(&target, hovered_ref, entered)?;
            }

            let mut moved: Vec<(&str, EventInit)> = vec![
                ("pointermove", EventInit::mouse(mouse)),
                ("mousemove", EventInit::mouse(mouse)),
            ];
            if drag_active {
                moved.push(("dragover", EventInit::drag(mouse, motion.payload.clone())));
            }
            event::dispatch_chain(&target, hovered_ref, moved)?;
        }

        motion.under_cursor = under;

        let next_target = Rc::clone(&target);
        target.set_timeout(DRAG_STEP_MS, move || {
            Self::drag_step(engine, next_target, motion, on_settled)
        });
        Ok(())
    }

    /// Release the grabbed element at the last recorded coordinates.
    ///
    /// The session is cleared whatever the outcome.
    pub fn drop_grabbed(&mut self, target: &TargetContext) -> TocarResult<()> {
        let session = self
            .session
            .take()
            .ok_or_else(|| TocarError::usage(NO_GRAB))?;

        let (x, y) = session.last;
        let under = crate::locator::element_at_point(target, x, y)?;
        let grabbed_node = target.resolve(session.element)?;
        let (rect, draggable) =
            target.with_doc(|doc| (doc.rect(grabbed_node), doc.is_draggable(grabbed_node)))?;
        let mouse = MouseInit::at(x, y, rect);

        // touchend targets the originally grabbed element; pointer events
        // go to whatever sits under the cursor
        if self.device.supports_touch {
            event::dispatch(target, session.element, "touchend", EventInit::touch(mouse))?;
        }
        let mut events: Vec<(&str, EventInit)> = vec![
            ("pointerup", EventInit::mouse(mouse)),
            ("mouseup", EventInit::mouse(mouse)),
        ];
        if draggable && self.device.supports_drag {
            events.push(("dragend", EventInit::drag(mouse, session.payload)));
        }
        event::dispatch_chain(target, under, events)?;
        Ok(())
    }

    // ---- typing protocols ----

    /// Type text into whichever element holds focus, one character per
    /// jittered timer tick; `on_done` fires after the last character.
    ///
    /// Deliberately non-deterministic in timing but deterministic in the
    /// resulting value and event order.
    pub fn type_into_focused(
        engine: &Rc<RefCell<Self>>,
        target: &Target,
        text: &str,
        on_done: OnSettled,
    ) -> TocarResult<()> {
        let element = target
            .active_element()
            .ok_or_else(|| TocarError::usage("No focused element found"))?;
        engine.borrow_mut().remember_original(target, element)?;
        let chars: VecDeque<char> = text.chars().collect();
        Self::type_step(Rc::clone(engine), Rc::clone(target), element, chars, on_done)
    }

    fn type_step(
        engine: Rc<RefCell<Self>>,
        target: Target,
        element: ElementRef,
        mut chars: VecDeque<char>,
        on_done: OnSettled,
    ) -> TocarResult<()> {
        let Some(ch) = chars.pop_front() else {
            return on_done();
        };

        let node = target.resolve(element)?;
        target.with_doc_mut(|doc| {
            let appended = format!("{}{ch}", doc.value(node));
            doc.set_value(node, appended);
        })?;
        event::key_press(&target, element, keystroke_for(ch), false)?;
        event::dispatch(&target, element, "input", EventInit::default())?;

        let delay = {
            let mut this = engine.borrow_mut();
            this.min_typing_delay_ms + this.next_jitter()
        };
        let next_target = Rc::clone(&target);
        target.set_timeout(delay, move || {
            Self::type_step(engine, next_target, element, chars, on_done)
        });
        Ok(())
    }

    /// Paste text into the focused field: one ctrl+V triad, the whole text
    /// appended at once, one input event, no delays
    pub fn paste_into_focused(&mut self, target: &TargetContext, text: &str) -> TocarResult<()> {
        let element = target
            .active_element()
            .ok_or_else(|| TocarError::usage("No focused element found"))?;
        self.remember_original(target, element)?;

        event::key_press(target, element, keystroke_for('v'), true)?;
        let node = target.resolve(element)?;
        target.with_doc_mut(|doc| {
            let appended = format!("{}{text}", doc.value(node));
            doc.set_value(node, appended);
        })?;
        event::dispatch(target, element, "input", EventInit::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pump(target: &Target) {
        loop {
            let Some(callback) = target.pop_due_timer() else {
                break;
            };
            callback().unwrap();
        }
    }

    fn engine(device: DeviceProfile) -> Rc<RefCell<GestureEngine>> {
        Rc::new(RefCell::new(GestureEngine::new(device, 50, 42)))
    }

    /// Target with a checkbox, a text input (focusable), and a draggable
    /// card, each with an event log
    fn playground() -> (Target, Rc<RefCell<Vec<String>>>) {
        let target = Rc::new(crate::context::TargetContext::new(800.0, 600.0));
        let log = Rc::new(RefCell::new(Vec::new()));
        let mount_log = Rc::clone(&log);
        target.mount(move |doc, _storage| {
            let root = doc.root();

            let checkbox = doc.create_element("input");
            doc.set_input_type(checkbox, "checkbox");
            doc.set_dom_id(checkbox, "done");
            doc.set_rect(checkbox, Rect::new(10.0, 10.0, 20.0, 20.0));
            doc.append_child(root, checkbox);

            let input = doc.create_element("input");
            doc.set_input_type(input, "text");
            doc.set_dom_id(input, "title");
            doc.set_rect(input, Rect::new(10.0, 50.0, 200.0, 30.0));
            doc.append_child(root, input);

            let card = doc.create_element("fieldset");
            doc.set_draggable(card, true);
            doc.set_text(card, "Card one");
            doc.set_rect(card, Rect::new(100.0, 100.0, 200.0, 40.0));
            doc.append_child(root, card);

            for node in [checkbox, input, card] {
                for event_type in [
                    "change", "blur", "input", "click", "touchstart", "touchmove", "touchend",
                    "dragstart", "dragover", "dragend", "keydown",
                ] {
                    let sink = Rc::clone(&mount_log);
                    let tag = doc.dom_id(node).unwrap_or("card").to_string();
                    doc.on(node, event_type, move |_turn, ev| {
                        sink.borrow_mut().push(format!("{tag}:{}", ev.event_type()));
                        Ok(())
                    });
                }
            }
        });
        (target, log)
    }

    fn node_by_dom_id(target: &Target, id: &str) -> ElementRef {
        let node = target
            .with_doc(|doc| {
                doc.document_order()
                    .into_iter()
                    .find(|&n| doc.dom_id(n) == Some(id))
            })
            .unwrap()
            .unwrap();
        target.make_ref(node)
    }

    mod click_tests {
        use super::*;

        #[test]
        fn test_checkbox_toggles_once_per_click() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let checkbox = node_by_dom_id(&target, "done");
            target
                .with_doc_mut(|doc| {
                    let node = doc.document_order()[1];
                    doc.set_indeterminate(node, true);
                })
                .unwrap();

            eng.borrow_mut().click(&target, checkbox).unwrap();
            let node = target.resolve(checkbox).unwrap();
            target
                .with_doc(|doc| {
                    assert!(doc.is_checked(node));
                    assert!(!doc.is_indeterminate(node));
                })
                .unwrap();

            eng.borrow_mut().click(&target, checkbox).unwrap();
            target
                .with_doc(|doc| assert!(!doc.is_checked(node)))
                .unwrap();

            let changes = log
                .borrow()
                .iter()
                .filter(|e| e.as_str() == "done:change")
                .count();
            assert_eq!(changes, 2, "exactly one change per click");
        }

        #[test]
        fn test_click_moves_focus() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");

            eng.borrow_mut().click(&target, input).unwrap();
            assert_eq!(target.active_element(), Some(input));
        }

        #[test]
        fn test_touch_profile_dispatches_touch_sequence() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::touch());
            let checkbox = node_by_dom_id(&target, "done");

            eng.borrow_mut().click(&target, checkbox).unwrap();
            let events = log.borrow();
            assert!(events.contains(&"done:touchstart".to_string()));
            assert!(events.contains(&"done:touchend".to_string()));
            assert!(events.contains(&"done:click".to_string()));
        }

        #[test]
        fn test_click_blurs_previously_focused() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");
            let checkbox = node_by_dom_id(&target, "done");

            eng.borrow_mut().click(&target, input).unwrap();
            eng.borrow_mut().click(&target, checkbox).unwrap();

            assert!(log.borrow().contains(&"title:blur".to_string()));
            assert_eq!(target.active_element(), Some(checkbox));
        }
    }

    mod blur_tests {
        use super::*;

        #[test]
        fn test_changed_field_fires_change_before_blur() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");

            eng.borrow_mut().click(&target, input).unwrap();
            eng.borrow_mut()
                .paste_into_focused(&target, "hello")
                .unwrap();
            log.borrow_mut().clear();

            eng.borrow_mut().blur_element(&target, input).unwrap();

            let events: Vec<String> = log
                .borrow()
                .iter()
                .filter(|e| e.starts_with("title:"))
                .cloned()
                .collect();
            let change_at = events.iter().position(|e| e == "title:change");
            let blur_at = events.iter().position(|e| e == "title:blur");
            assert_eq!(
                events.iter().filter(|e| *e == "title:change").count(),
                1,
                "exactly one change event"
            );
            assert!(change_at.unwrap() < blur_at.unwrap(), "change precedes blur");
        }

        #[test]
        fn test_unchanged_field_fires_no_change_on_blur() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");

            eng.borrow_mut().click(&target, input).unwrap();
            log.borrow_mut().clear();
            eng.borrow_mut().blur_element(&target, input).unwrap();

            assert!(!log.borrow().contains(&"title:change".to_string()));
            assert!(log.borrow().contains(&"title:blur".to_string()));
        }
    }

    mod grab_drag_drop_tests {
        use super::*;

        #[test]
        fn test_grab_while_grabbed_is_usage_error() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());
            eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();
            let err = eng
                .borrow_mut()
                .grab_at_point(&target, 150.0, 120.0)
                .unwrap_err();
            assert!(matches!(err, TocarError::Usage { .. }));
        }

        #[test]
        fn test_drag_and_drop_without_grab_are_usage_errors() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());

            let err =
                GestureEngine::drag_by(&eng, &target, 10.0, 10.0, Box::new(|| Ok(()))).unwrap_err();
            assert!(matches!(err, TocarError::Usage { .. }));

            let err = eng.borrow_mut().drop_grabbed(&target).unwrap_err();
            assert!(matches!(err, TocarError::Usage { .. }));
        }

        #[test]
        fn test_drag_converges_on_fractional_deltas() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());
            eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();

            let settled = Rc::new(RefCell::new(false));
            let flag = Rc::clone(&settled);
            GestureEngine::drag_by(
                &eng,
                &target,
                37.3,
                -22.8,
                Box::new(move || {
                    *flag.borrow_mut() = true;
                    Ok(())
                }),
            )
            .unwrap();
            pump(&target);

            assert!(*settled.borrow());
            // The motion stops once the remaining delta rounds to zero, so
            // the final position lands within half a pixel of the request
            let (x, y) = eng.borrow().grab_position().unwrap();
            assert!((x - 187.3).abs() <= 0.5, "x settled at {x}");
            assert!((y - 97.2).abs() <= 0.5, "y settled at {y}");
        }

        proptest::proptest! {
            // Deltas chosen to keep the whole path inside the viewport
            // margins, so no overshoot is converted into scrolling
            #[test]
            fn prop_unclamped_drag_settles_within_half_a_pixel(
                dist_x in -140.0_f64..600.0,
                dist_y in -110.0_f64..400.0,
            ) {
                let (target, _log) = playground();
                let eng = engine(DeviceProfile::pointer());
                eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();

                GestureEngine::drag_by(&eng, &target, dist_x, dist_y, Box::new(|| Ok(())))
                    .unwrap();
                pump(&target);

                let (x, y) = eng.borrow().grab_position().unwrap();
                proptest::prop_assert!((x - (150.0 + dist_x)).abs() <= 0.5);
                proptest::prop_assert!((y - (120.0 + dist_y)).abs() <= 0.5);
            }
        }

        #[test]
        fn test_drag_clamps_to_viewport_margin() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());
            eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();

            GestureEngine::drag_by(&eng, &target, 5000.0, 0.0, Box::new(|| Ok(()))).unwrap();
            pump(&target);

            let (x, _y) = eng.borrow().grab_position().unwrap();
            assert_eq!(x, 790.0, "clamped to width - margin");
            // Clamped overshoot went into document scroll instead
            let (scroll_x, _) = target.with_doc(|doc| doc.scroll_offset()).unwrap();
            assert!((scroll_x - (5000.0 - (790.0 - 150.0))).abs() < 1e-6);
        }

        #[test]
        fn test_drop_clears_session_and_fires_dragend() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();
            assert!(log.borrow().contains(&"card:dragstart".to_string()));

            eng.borrow_mut().drop_grabbed(&target).unwrap();
            assert!(!eng.borrow().has_grab_session());
            assert!(log.borrow().contains(&"card:dragend".to_string()));
        }

        #[test]
        fn test_touchmove_targets_grabbed_element_only() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::touch());
            eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();

            GestureEngine::drag_by(&eng, &target, 0.0, 300.0, Box::new(|| Ok(()))).unwrap();
            pump(&target);

            let moves = log
                .borrow()
                .iter()
                .filter(|e| e.ends_with(":touchmove"))
                .cloned()
                .collect::<Vec<_>>();
            assert!(!moves.is_empty());
            assert!(moves.iter().all(|e| e == "card:touchmove"));
        }

        #[test]
        fn test_no_drag_events_without_native_drag_support() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer().with_native_drag(false));
            eng.borrow_mut().grab_at_point(&target, 150.0, 120.0).unwrap();
            eng.borrow_mut().drop_grabbed(&target).unwrap();

            assert!(!log.borrow().iter().any(|e| e.contains("dragstart")));
            assert!(!log.borrow().iter().any(|e| e.contains("dragend")));
        }
    }

    mod typing_tests {
        use super::*;

        #[test]
        fn test_typing_appends_and_fires_one_input_per_char() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");
            eng.borrow_mut().click(&target, input).unwrap();
            log.borrow_mut().clear();

            let done = Rc::new(RefCell::new(false));
            let flag = Rc::clone(&done);
            GestureEngine::type_into_focused(
                &eng,
                &target,
                "Hi, you!",
                Box::new(move || {
                    *flag.borrow_mut() = true;
                    Ok(())
                }),
            )
            .unwrap();
            pump(&target);

            assert!(*done.borrow());
            let node = target.resolve(input).unwrap();
            target
                .with_doc(|doc| assert_eq!(doc.value(node), "Hi, you!"))
                .unwrap();
            let inputs = log
                .borrow()
                .iter()
                .filter(|e| e.as_str() == "title:input")
                .count();
            assert_eq!(inputs, "Hi, you!".chars().count());
        }

        #[test]
        fn test_typing_appends_to_existing_value() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");
            let node = target.resolve(input).unwrap();
            target
                .with_doc_mut(|doc| doc.set_value(node, "pre-"))
                .unwrap();
            eng.borrow_mut().click(&target, input).unwrap();

            GestureEngine::type_into_focused(&eng, &target, "fix", Box::new(|| Ok(()))).unwrap();
            pump(&target);

            target
                .with_doc(|doc| assert_eq!(doc.value(node), "pre-fix"))
                .unwrap();
        }

        #[test]
        fn test_typing_without_focus_is_usage_error() {
            let (target, _log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let err = GestureEngine::type_into_focused(&eng, &target, "x", Box::new(|| Ok(())))
                .unwrap_err();
            assert!(matches!(err, TocarError::Usage { .. }));
        }

        #[test]
        fn test_paste_is_synchronous_single_input() {
            let (target, log) = playground();
            let eng = engine(DeviceProfile::pointer());
            let input = node_by_dom_id(&target, "title");
            eng.borrow_mut().click(&target, input).unwrap();
            log.borrow_mut().clear();

            eng.borrow_mut()
                .paste_into_focused(&target, "pasted text")
                .unwrap();

            let node = target.resolve(input).unwrap();
            target
                .with_doc(|doc| assert_eq!(doc.value(node), "pasted text"))
                .unwrap();
            let inputs = log
                .borrow()
                .iter()
                .filter(|e| e.as_str() == "title:input")
                .count();
            assert_eq!(inputs, 1);
            assert_eq!(target.pop_due_timer().map(|_| ()), None, "no timers queued");
        }
    }
}
