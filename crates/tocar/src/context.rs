//! The isolated target context leased by the document driver.
//!
//! Bundles the live document slot, the persisted storage namespace, the
//! virtual-time scheduler, and the generation counter that invalidates
//! element references across reloads. Every other component reaches the
//! current document only through this handle; nothing holds a node across
//! a reload boundary.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::clock::{Scheduler, TimerId};
use crate::dom::{Document, ElementRef, NodeId, Storage};
use crate::result::{TocarError, TocarResult};

/// Shared handle to one target context
pub type Target = Rc<TargetContext>;

/// One isolated, reloadable rendering context under test
pub struct TargetContext {
    doc: RefCell<Option<Document>>,
    storage: RefCell<Storage>,
    scheduler: RefCell<Scheduler>,
    generation: Cell<u64>,
    viewport_width: f64,
    viewport_height: f64,
}

impl fmt::Debug for TargetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetContext")
            .field("generation", &self.generation.get())
            .field("loaded", &self.doc.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl TargetContext {
    /// Create an unloaded context with the given viewport
    #[must_use]
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            doc: RefCell::new(None),
            storage: RefCell::new(Storage::default()),
            scheduler: RefCell::new(Scheduler::new()),
            generation: Cell::new(0),
            viewport_width,
            viewport_height,
        }
    }

    /// Viewport dimensions
    #[must_use]
    pub fn viewport(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    /// Current document generation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Whether a document is currently loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.doc.borrow().is_some()
    }

    // ---- lifecycle ----

    /// Drop the current document and every pending timer.
    ///
    /// Bumps the generation so outstanding element references turn stale.
    pub fn unload(&self) {
        *self.doc.borrow_mut() = None;
        self.scheduler.borrow_mut().clear();
        self.generation.set(self.generation.get() + 1);
    }

    /// Mount a fresh document built by the given page-mounting function.
    ///
    /// Used for both the between-case load and an in-case refresh; the
    /// mount function may read the persisted storage to restore state.
    pub fn mount<F>(&self, mount_fn: F)
    where
        F: FnOnce(&mut Document, &mut Storage),
    {
        let mut doc = Document::new(self.viewport_width, self.viewport_height);
        mount_fn(&mut doc, &mut self.storage.borrow_mut());
        *self.doc.borrow_mut() = Some(doc);
    }

    /// Replace the document in place without touching timers or storage.
    ///
    /// This is the in-case `refresh`: element references are invalidated
    /// by the generation bump, while context-scoped timers (notably the
    /// auto-fail timeout) keep running.
    pub fn remount<F>(&self, mount_fn: F)
    where
        F: FnOnce(&mut Document, &mut Storage),
    {
        self.generation.set(self.generation.get() + 1);
        self.mount(mount_fn);
    }

    // ---- element references ----

    /// Mint a reference into the current document
    #[must_use]
    pub fn make_ref(&self, node: NodeId) -> ElementRef {
        ElementRef {
            node,
            generation: self.generation.get(),
        }
    }

    /// Resolve a reference, failing if it outlived its document
    pub fn resolve(&self, element: ElementRef) -> TocarResult<NodeId> {
        if element.generation != self.generation.get() {
            return Err(TocarError::stale(
                "element reference belongs to a previous document load",
            ));
        }
        let doc = self.doc.borrow();
        let doc = doc
            .as_ref()
            .ok_or_else(|| TocarError::target("no document is loaded"))?;
        if doc.is_detached(element.node) {
            return Err(TocarError::stale(
                "element has been removed from the document",
            ));
        }
        Ok(element.node)
    }

    /// The element currently holding focus, as a reference
    #[must_use]
    pub fn active_element(&self) -> Option<ElementRef> {
        self.doc
            .borrow()
            .as_ref()
            .and_then(Document::active_element)
            .map(|node| self.make_ref(node))
    }

    // ---- guarded document access ----

    /// Run a closure against the current document
    pub fn with_doc<R>(&self, f: impl FnOnce(&Document) -> R) -> TocarResult<R> {
        let doc = self.doc.borrow();
        let doc = doc
            .as_ref()
            .ok_or_else(|| TocarError::target("no document is loaded"))?;
        Ok(f(doc))
    }

    /// Run a closure against the current document, mutably
    pub fn with_doc_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> TocarResult<R> {
        let mut doc = self.doc.borrow_mut();
        let doc = doc
            .as_mut()
            .ok_or_else(|| TocarError::target("no document is loaded"))?;
        Ok(f(doc))
    }

    /// Run a closure against the current document and the storage, used by
    /// event delivery so page handlers can persist state
    pub(crate) fn with_page_turn<R>(
        &self,
        f: impl FnOnce(&mut Document, &mut Storage) -> R,
    ) -> TocarResult<R> {
        let mut doc = self.doc.borrow_mut();
        let doc = doc
            .as_mut()
            .ok_or_else(|| TocarError::target("no document is loaded"))?;
        Ok(f(doc, &mut self.storage.borrow_mut()))
    }

    /// Run a closure against the persisted storage
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut Storage) -> R) -> R {
        f(&mut self.storage.borrow_mut())
    }

    // ---- clock ----

    /// Schedule a callback on this context's clock
    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        self.scheduler.borrow_mut().set_timeout(delay_ms, callback)
    }

    /// Cancel a pending timer
    pub fn clear_timeout(&self, id: TimerId) {
        self.scheduler.borrow_mut().clear_timeout(id);
    }

    /// Schedule a callback on the next animation frame
    pub fn request_animation_frame<F>(&self, callback: F) -> TimerId
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        self.scheduler.borrow_mut().request_animation_frame(callback)
    }

    /// Current virtual time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.scheduler.borrow().now_ms()
    }

    /// Pop the earliest pending timer, advancing virtual time.
    ///
    /// Driven by the suite runner's per-case loop; the borrow is released
    /// before the callback runs so callbacks can schedule further timers.
    pub(crate) fn pop_due_timer(&self) -> Option<crate::clock::TimerCallback> {
        self.scheduler.borrow_mut().pop_due_next()
    }
}
