//! Seams between the animation core and the environment it runs in.
//!
//! The browser build implements these with `requestAnimationFrame`,
//! `setTimeout`, `IntersectionObserver` and the page visibility API (see the
//! `wasm` module). [`manual`] provides a deterministic headless host that is
//! driven programmatically.
//!
//! Hosts must never invoke a callback synchronously from inside the call that
//! registered it; delivery always happens on a later turn of the host loop.

use std::fmt;
use std::rc::Rc;

pub mod manual;

/// Milliseconds, on the same clock as [`Scheduler::now`].
pub type Millis = f64;

pub type FrameCallback = Box<dyn FnOnce(Millis)>;
pub type TimerCallback = Box<dyn FnOnce()>;

/// Opaque token for one pending frame or timer registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Per-frame and timed callbacks on the host's single UI thread.
pub trait Scheduler {
    fn now(&self) -> Millis;

    /// Runs `callback` with the frame timestamp before the next repaint.
    fn request_frame(&self, callback: FrameCallback) -> TaskHandle;

    fn set_timeout(&self, delay: Millis, callback: TimerCallback) -> TaskHandle;

    /// Invalidates a registration. Cancelling a fired or already cancelled
    /// handle is a no-op.
    fn cancel(&self, handle: TaskHandle);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilitySignal {
    /// The observed element entered (`true`) or left (`false`) the viewport.
    Intersection(bool),
    /// The tab was foregrounded (`true`) or backgrounded (`false`).
    Page(bool),
}

pub type SignalSink = Rc<dyn Fn(VisibilitySignal)>;

#[derive(Clone, Debug, PartialEq)]
pub struct ObserveOptions {
    pub threshold: f64,
    pub root_margin: String,
    /// Selector of a scroll container; `None` observes against the viewport.
    pub root: Option<String>,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: "0px".to_string(),
            root: None,
        }
    }
}

/// Visibility signals for one bound element.
pub trait VisibilityHost {
    /// Starts an intersection watch. `None` means the primitive is unavailable.
    fn observe_intersection(&self, options: &ObserveOptions, sink: SignalSink)
        -> Option<Subscription>;

    /// Starts a page-visibility watch. `None` means the page is never hidden.
    fn watch_page(&self, sink: SignalSink) -> Option<Subscription>;

    fn page_visible(&self) -> bool;
}

pub trait RandomSource {
    /// Uniform sample in `[0, 1)`.
    fn next_f64(&self) -> f64;
}

/// Detach guard for a listener registration. Cancels on drop.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Everything an effect needs from its environment besides the element it
/// renders into.
#[derive(Clone)]
pub struct Host {
    pub scheduler: Rc<dyn Scheduler>,
    pub visibility: Rc<dyn VisibilityHost>,
    pub random: Rc<dyn RandomSource>,
}

impl Host {
    pub fn new(
        scheduler: Rc<dyn Scheduler>,
        visibility: Rc<dyn VisibilityHost>,
        random: Rc<dyn RandomSource>,
    ) -> Self {
        Self {
            scheduler,
            visibility,
            random,
        }
    }
}
