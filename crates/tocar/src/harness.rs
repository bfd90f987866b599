//! Suite orchestration: registering test cases and running them one at a
//! time against a freshly mounted document on the virtual clock.
//!
//! Each case gets a `Ui` capability handle and a `Done` completion handle;
//! the runner pumps the target's timer queue until the case signals done
//! or the auto-fail timeout fires. A failing case halts the run and the
//! remaining cases are reported as skipped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use uuid::Uuid;

use crate::assertion::{self, FieldValue};
use crate::clock::TimerId;
use crate::context::{Target, TargetContext};
use crate::driver::{Driver, PageSource};
use crate::gesture::{DeviceProfile, GestureEngine};
use crate::locator::Role;
use crate::result::{TocarError, TocarResult};

/// Suite-wide configuration
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Viewport width of the target context
    pub viewport_width: f64,
    /// Viewport height of the target context
    pub viewport_height: f64,
    /// Whether persisted storage is wiped before each case
    pub clear_storage_between_cases: bool,
    /// Minimum delay between typed characters in virtual milliseconds
    pub min_typing_delay_ms: u64,
    /// Auto-fail timeout per case in virtual milliseconds
    pub case_timeout_ms: u64,
    /// Device profile gestures are synthesized for
    pub device: DeviceProfile,
    /// Seed for the typing jitter; zero selects a fixed default
    pub typing_jitter_seed: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,
            clear_storage_between_cases: true,
            min_typing_delay_ms: 50,
            case_timeout_ms: 8000,
            device: DeviceProfile::pointer(),
            typing_jitter_seed: 0,
        }
    }
}

impl SuiteConfig {
    /// Set the viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Keep or wipe persisted storage between cases
    #[must_use]
    pub const fn with_clear_storage_between_cases(mut self, clear: bool) -> Self {
        self.clear_storage_between_cases = clear;
        self
    }

    /// Set the minimum per-character typing delay
    #[must_use]
    pub const fn with_min_typing_delay_ms(mut self, ms: u64) -> Self {
        self.min_typing_delay_ms = ms;
        self
    }

    /// Set the per-case auto-fail timeout
    #[must_use]
    pub const fn with_case_timeout_ms(mut self, ms: u64) -> Self {
        self.case_timeout_ms = ms;
        self
    }

    /// Set the device profile
    #[must_use]
    pub const fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    /// Set the typing jitter seed
    #[must_use]
    pub const fn with_typing_jitter_seed(mut self, seed: u64) -> Self {
        self.typing_jitter_seed = seed;
        self
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaseStatus {
    /// The case signalled completion without an error
    Passed,
    /// The case returned an error or timed out
    Failed,
    /// The case never ran because an earlier case failed
    Skipped,
}

/// Report for one test case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    /// Case label
    pub label: String,
    /// Outcome
    pub status: CaseStatus,
    /// Virtual milliseconds the case consumed
    pub duration_ms: u64,
    /// Error message when failed
    pub error: Option<String>,
}

/// Results from running a suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Suite name
    pub suite_name: String,
    /// Per-case reports in registration order
    pub results: Vec<CaseReport>,
}

impl SuiteReport {
    /// Whether every case passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.status == CaseStatus::Passed)
    }

    /// Count passed cases
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(CaseStatus::Passed)
    }

    /// Count failed cases
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(CaseStatus::Failed)
    }

    /// Count skipped cases
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(CaseStatus::Skipped)
    }

    /// Total case count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// The case that halted the run, if any
    #[must_use]
    pub fn first_failure(&self) -> Option<&CaseReport> {
        self.results.iter().find(|r| r.status == CaseStatus::Failed)
    }

    fn count(&self, status: CaseStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Completion handle passed to every test case.
///
/// A case that finishes its assertions calls [`Done::signal`]; until then
/// the runner keeps pumping timers, and the auto-fail timeout eventually
/// fails a case that never signals.
#[derive(Debug, Clone)]
pub struct Done {
    flag: Rc<Cell<bool>>,
}

impl Done {
    fn new() -> Self {
        Self {
            flag: Rc::new(Cell::new(false)),
        }
    }

    /// Mark the case complete
    pub fn signal(&self) {
        self.flag.set(true);
    }

    /// Whether the case has signalled completion
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.flag.get()
    }
}

/// Capability handle a test case drives the target document through.
///
/// Cheap to clone; async operations take a completion closure that runs on
/// the target clock once the gesture settles.
#[derive(Debug, Clone)]
pub struct Ui {
    target: Target,
    engine: Rc<RefCell<GestureEngine>>,
    driver: Rc<Driver>,
}

impl Ui {
    // ---- gestures ----

    /// Click the nth element matching the role and label
    pub fn click_element(&self, role: Role, label: &str, position: usize) -> TocarResult<()> {
        let element = crate::locator::find(&self.target, role, label, position)?;
        self.engine.borrow_mut().click(&self.target, element)
    }

    /// Grab whatever element sits at the given viewport point
    pub fn grab_element_at_point(&self, x: f64, y: f64) -> TocarResult<()> {
        self.engine.borrow_mut().grab_at_point(&self.target, x, y)
    }

    /// Grab the nth element matching the role and label, at its center
    pub fn grab_element(&self, role: Role, label: &str, position: usize) -> TocarResult<()> {
        self.engine
            .borrow_mut()
            .grab_element(&self.target, role, label, position)
    }

    /// Drag the grabbed element by the given distances; `on_settled` runs
    /// once the motion has fully played out
    pub fn drag_grabbed_element_by<F>(
        &self,
        dist_x: f64,
        dist_y: f64,
        on_settled: F,
    ) -> TocarResult<()>
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        GestureEngine::drag_by(&self.engine, &self.target, dist_x, dist_y, Box::new(on_settled))
    }

    /// Drag the grabbed element over the nth element matching the role and
    /// label
    pub fn drag_grabbed_element_over<F>(
        &self,
        role: Role,
        label: &str,
        position: usize,
        on_settled: F,
    ) -> TocarResult<()>
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        GestureEngine::drag_over(
            &self.engine,
            &self.target,
            role,
            label,
            position,
            Box::new(on_settled),
        )
    }

    /// Release the grabbed element at its last dragged position
    pub fn drop_grabbed_element(&self) -> TocarResult<()> {
        self.engine.borrow_mut().drop_grabbed(&self.target)
    }

    /// Type text into the focused field, one character per jittered tick;
    /// `on_done` runs after the last character
    pub fn type_into_focused_field<F>(&self, text: &str, on_done: F) -> TocarResult<()>
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        GestureEngine::type_into_focused(&self.engine, &self.target, text, Box::new(on_done))
    }

    /// Paste text into the focused field in one synchronous step
    pub fn paste_into_focused_field(&self, text: &str) -> TocarResult<()> {
        self.engine
            .borrow_mut()
            .paste_into_focused(&self.target, text)
    }

    // ---- assertions ----

    /// Assert that exactly `expected` elements match the role and label
    pub fn count_elements_with_label(
        &self,
        role: Role,
        label: &str,
        expected: usize,
    ) -> TocarResult<()> {
        assertion::count_elements_with_label(&self.target, role, label, expected)
    }

    /// Assert that no elements match the role and label
    pub fn no_elements_match(&self, role: Role, label: &str) -> TocarResult<()> {
        assertion::no_elements_match(&self.target, role, label)
    }

    /// Assert that the nth element matching the role and label holds focus
    pub fn element_should_have_focus(
        &self,
        role: Role,
        label: &str,
        position: usize,
    ) -> TocarResult<()> {
        assertion::element_should_have_focus(&self.target, role, label, position)
    }

    /// Assert the value of the nth form field matching the label
    pub fn field_should_have_value(
        &self,
        label: &str,
        position: usize,
        expected: impl Into<FieldValue>,
    ) -> TocarResult<()> {
        assertion::field_should_have_value(&self.target, label, position, &expected.into())
    }

    // ---- document lifecycle and clock ----

    /// Remount the page in place, keeping storage and pending timers.
    ///
    /// Every element previously located turns stale; `on_ready` runs on
    /// the next timer tick against the fresh document.
    pub fn refresh<F>(&self, on_ready: F)
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        self.driver.refresh();
        self.target.set_timeout(1, on_ready);
    }

    /// Scroll the document back to the origin
    pub fn scroll_to_top(&self) -> TocarResult<()> {
        self.target.with_doc_mut(|doc| doc.scroll_to(0.0, 0.0))
    }

    /// Schedule a callback on the target clock
    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        self.target.set_timeout(delay_ms, callback)
    }

    /// Cancel a pending timer
    pub fn clear_timeout(&self, id: TimerId) {
        self.target.clear_timeout(id);
    }

    /// Schedule a callback on the next animation frame
    pub fn request_animation_frame<F>(&self, callback: F) -> TimerId
    where
        F: FnOnce() -> TocarResult<()> + 'static,
    {
        self.target.request_animation_frame(callback)
    }

    /// Current virtual time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.target.now_ms()
    }
}

type CaseFn = Box<dyn FnOnce(Ui, Done) -> TocarResult<()>>;

struct Case {
    label: String,
    run: CaseFn,
}

/// A suite of test cases run against one page source
pub struct Suite {
    name: String,
    config: SuiteConfig,
    page: Rc<dyn PageSource>,
    cases: Vec<Case>,
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("cases", &self.cases.len())
            .finish_non_exhaustive()
    }
}

impl Suite {
    /// Create a suite over a page source with the default configuration
    pub fn new(name: impl Into<String>, page: impl PageSource + 'static) -> Self {
        Self {
            name: name.into(),
            config: SuiteConfig::default(),
            page: Rc::new(page),
            cases: Vec::new(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: SuiteConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a test case.
    ///
    /// The case receives a [`Ui`] handle and a [`Done`] handle and must
    /// eventually signal done, directly or from a settled-gesture
    /// callback.
    pub fn use_case<F>(&mut self, label: impl Into<String>, case: F) -> &mut Self
    where
        F: FnOnce(Ui, Done) -> TocarResult<()> + 'static,
    {
        self.cases.push(Case {
            label: label.into(),
            run: Box::new(case),
        });
        self
    }

    /// Run every registered case in order, mounting a fresh document per
    /// case and halting at the first failure
    pub fn run(self) -> SuiteReport {
        let run_id = Uuid::new_v4();
        tracing::info!(
            suite = %self.name,
            %run_id,
            cases = self.cases.len(),
            "running suite"
        );

        let target: Target = Rc::new(TargetContext::new(
            self.config.viewport_width,
            self.config.viewport_height,
        ));
        let mut driver = Driver::new(Rc::clone(&target), Rc::clone(&self.page));
        if let Err(error) = driver.take_snapshot() {
            tracing::warn!(%error, "storage snapshot failed; teardown will not restore");
        }
        let driver = Rc::new(driver);
        let engine = Rc::new(RefCell::new(GestureEngine::new(
            self.config.device,
            self.config.min_typing_delay_ms,
            self.config.typing_jitter_seed,
        )));

        let mut results = Vec::with_capacity(self.cases.len());
        let mut halted = false;
        for case in self.cases {
            if halted {
                tracing::warn!("SKIP: {}", case.label);
                results.push(CaseReport {
                    label: case.label,
                    status: CaseStatus::Skipped,
                    duration_ms: 0,
                    error: None,
                });
                continue;
            }
            let report = Self::run_case(&self.config, &target, &driver, &engine, case);
            halted = report.status == CaseStatus::Failed;
            results.push(report);
        }

        SuiteReport {
            run_id,
            suite_name: self.name,
            results,
        }
    }

    fn run_case(
        config: &SuiteConfig,
        target: &Target,
        driver: &Rc<Driver>,
        engine: &Rc<RefCell<GestureEngine>>,
        case: Case,
    ) -> CaseReport {
        driver.load(config.clear_storage_between_cases);
        engine.borrow_mut().reset();

        let started = target.now_ms();
        let timeout_ms = config.case_timeout_ms;
        let autofail =
            target.set_timeout(timeout_ms, move || Err(TocarError::Timeout { ms: timeout_ms }));

        let done = Done::new();
        let ui = Ui {
            target: Rc::clone(target),
            engine: Rc::clone(engine),
            driver: Rc::clone(driver),
        };

        // The callback runs inside a settle tick, one beat after the
        // load, so it never observes the document at virtual time zero
        let run = case.run;
        let case_done = done.clone();
        target.set_timeout(1, move || run(ui, case_done));

        let label = case.label;
        let outcome = Self::drive_case(target, &done);
        target.clear_timeout(autofail);
        let duration_ms = target.now_ms() - started;

        match outcome {
            Ok(()) => {
                tracing::info!("PASS: {label} ({duration_ms}ms)");
                CaseReport {
                    label,
                    status: CaseStatus::Passed,
                    duration_ms,
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!("FAIL: {label}: {error}");
                CaseReport {
                    label,
                    status: CaseStatus::Failed,
                    duration_ms,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Pump the timer queue until the case signals done or a callback
    /// (the case body, the auto-fail timer, or anything they scheduled)
    /// errors
    fn drive_case(target: &Target, done: &Done) -> TocarResult<()> {
        while !done.is_signaled() {
            let Some(callback) = target.pop_due_timer() else {
                return Err(TocarError::usage(
                    "test case neither signalled done nor scheduled further work",
                ));
            };
            callback()?;
        }
        Ok(())
    }
}
