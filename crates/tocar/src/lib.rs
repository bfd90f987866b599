//! Tocar: deterministic UI automation and test orchestration.
//!
//! Tocar (Spanish: "to touch") drives an in-memory target document with
//! faithfully sequenced synthetic input (clicks, drags, typing) and runs
//! labelled test cases against it on a virtual clock. Elements are located
//! by role and visible label, the way an end user finds them, and every
//! delay in the engine is virtual time, so a suite run is reproducible.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Suite                              │
//! │  use_case(label, |ui, done| { ... })  ──►  run() ► report   │
//! ├──────────────┬──────────────────┬───────────────────────────┤
//! │   Locator    │  GestureEngine   │        Assertions         │
//! │ (role+label) │ (click/drag/type)│  (count/focus/value)      │
//! ├──────────────┴──────────────────┴───────────────────────────┤
//! │        TargetContext: Document + Storage + Scheduler        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tocar::{Document, Role, Storage, Suite};
//!
//! fn page(doc: &mut Document, _storage: &mut Storage) {
//!     let root = doc.root();
//!     let button = doc.create_element("button");
//!     doc.set_text(button, "Add task");
//!     doc.append_child(root, button);
//! }
//!
//! let mut suite = Suite::new("smoke", page);
//! suite.use_case("finds the button", |ui, done| {
//!     ui.count_elements_with_label(Role::Button, "Add task", 1)?;
//!     done.signal();
//!     Ok(())
//! });
//! assert!(suite.run().all_passed());
//! ```

#![warn(missing_docs)]

mod assertion;
mod clock;
mod context;
mod dom;
mod driver;
mod event;
mod gesture;
mod harness;
mod keymap;
mod locator;
mod result;

pub use assertion::{
    count_elements_with_label, element_should_have_focus, field_should_have_value,
    no_elements_match, FieldValue,
};
pub use clock::{Scheduler, TimerCallback, TimerId, FRAME_MS};
pub use context::{Target, TargetContext};
pub use dom::{Document, ElementRef, NodeId, PageHandler, PageTurn, Rect, Storage};
pub use driver::{Driver, PageSource};
pub use event::{
    category_for, dispatch, dispatch_chain, key_press, DragPayload, EventCategory, EventInit,
    MouseInit, SyntheticEvent, NON_BUBBLING_EVENTS, NON_CANCELABLE_EVENTS,
};
pub use gesture::{DeviceProfile, GestureEngine, OnSettled};
pub use harness::{CaseReport, CaseStatus, Done, Suite, SuiteConfig, SuiteReport, Ui};
pub use keymap::{keystroke_for, KeyStroke};
pub use locator::{element_at_point, elements_at_point, find, find_all, Role};
pub use result::{TocarError, TocarResult};
