//! Document lifecycle: mounting the page under test into the target
//! context and guarding the persisted storage across a suite run.
//!
//! The storage namespace is snapshotted before the first load and restored
//! when the driver is dropped, so a suite never leaks state into whatever
//! owns the context after it.

use std::rc::Rc;

use crate::context::Target;
use crate::dom::{Document, Storage};
use crate::result::TocarResult;

/// A mountable page under test.
///
/// Mounting builds the element tree and registers event listeners; it runs
/// on every load and refresh, and may read the persisted storage to
/// restore page state the way a real page would on startup.
pub trait PageSource {
    /// Build the document for one load
    fn mount(&self, doc: &mut Document, storage: &mut Storage);
}

impl<F> PageSource for F
where
    F: Fn(&mut Document, &mut Storage),
{
    fn mount(&self, doc: &mut Document, storage: &mut Storage) {
        self(doc, storage);
    }
}

/// Drives documents in and out of one target context
pub struct Driver {
    target: Target,
    page: Rc<dyn PageSource>,
    snapshot: Option<String>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("snapshot", &self.snapshot.is_some())
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Create a driver for a page source over a target context
    pub fn new(target: Target, page: Rc<dyn PageSource>) -> Self {
        Self {
            target,
            page,
            snapshot: None,
        }
    }

    /// Snapshot the persisted storage so teardown can restore it.
    ///
    /// Taken once, before the first load.
    pub fn take_snapshot(&mut self) -> TocarResult<()> {
        let json = self
            .target
            .with_storage(|storage| serde_json::to_string(storage))?;
        self.snapshot = Some(json);
        Ok(())
    }

    /// Tear down the current document and mount a fresh one.
    ///
    /// The between-case load: pending timers are dropped with the old
    /// document, and the storage is optionally cleared first.
    pub fn load(&self, clear_storage: bool) {
        self.target.unload();
        if clear_storage {
            self.target.with_storage(Storage::clear);
        }
        let page = Rc::clone(&self.page);
        self.target
            .mount(move |doc, storage| page.mount(doc, storage));
    }

    /// Replace the document in place, keeping storage and pending timers.
    ///
    /// The in-case refresh: outstanding element references turn stale, the
    /// case's auto-fail timer keeps running.
    pub fn refresh(&self) {
        let page = Rc::clone(&self.page);
        self.target
            .remount(move |doc, storage| page.mount(doc, storage));
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        // Teardown restore; a corrupt snapshot is ignored rather than
        // panicking in a destructor
        if let Some(json) = self.snapshot.take() {
            if let Ok(restored) = serde_json::from_str::<Storage>(&json) {
                self.target.with_storage(|storage| *storage = restored);
            }
        }
    }
}
