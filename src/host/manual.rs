//! Deterministic headless host.
//!
//! [`ManualScheduler`] keeps a virtual clock that only moves when told to, and
//! [`ManualVisibility`] delivers intersection/page signals on demand. Together
//! they let effects be evaluated frame by frame without a browser.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use slotmap::{DefaultKey, Key, KeyData, SlotMap};

use super::{
    FrameCallback, Millis, ObserveOptions, RandomSource, Scheduler, SignalSink, Subscription,
    TaskHandle, TimerCallback, VisibilityHost, VisibilitySignal,
};

enum Task {
    Frame(FrameCallback),
    Timeout {
        due: Millis,
        seq: u64,
        callback: TimerCallback,
    },
}

#[derive(Default)]
struct ClockState {
    now: Millis,
    seq: u64,
    tasks: SlotMap<DefaultKey, Task>,
    frame_requests: usize,
    timeout_requests: usize,
    cancels: usize,
}

#[derive(Default)]
pub struct ManualScheduler {
    state: RefCell<ClockState>,
}

fn handle_of(key: DefaultKey) -> TaskHandle {
    TaskHandle::new(key.data().as_ffi())
}

fn key_of(handle: TaskHandle) -> DefaultKey {
    KeyData::from_ffi(handle.raw()).into()
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_frames(&self) -> usize {
        let state = self.state.borrow();
        state
            .tasks
            .values()
            .filter(|task| matches!(task, Task::Frame(_)))
            .count()
    }

    pub fn pending_timeouts(&self) -> usize {
        let state = self.state.borrow();
        state
            .tasks
            .values()
            .filter(|task| matches!(task, Task::Timeout { .. }))
            .count()
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Total `request_frame` calls since creation.
    pub fn frame_requests(&self) -> usize {
        self.state.borrow().frame_requests
    }

    pub fn timeout_requests(&self) -> usize {
        self.state.borrow().timeout_requests
    }

    pub fn cancels(&self) -> usize {
        self.state.borrow().cancels
    }

    /// Moves the clock forward, firing due timeouts in deadline order.
    pub fn advance(&self, by: Millis) {
        let target = self.state.borrow().now + by.max(0.0);
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let due = state
                    .tasks
                    .iter()
                    .filter_map(|(key, task)| match task {
                        Task::Timeout { due, seq, .. } if *due <= target => Some((*due, *seq, key)),
                        _ => None,
                    })
                    .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                match due {
                    Some((due, _, key)) => {
                        state.now = state.now.max(due);
                        match state.tasks.remove(key) {
                            Some(Task::Timeout { callback, .. }) => Some(callback),
                            _ => None,
                        }
                    }
                    None => None,
                }
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.state.borrow_mut().now = target;
    }

    /// Advances by `by` and then runs every frame callback requested before
    /// this frame. Frames requested while running land in the next frame.
    pub fn frame(&self, by: Millis) {
        self.advance(by);
        let (now, callbacks) = {
            let mut state = self.state.borrow_mut();
            let keys: Vec<DefaultKey> = state
                .tasks
                .iter()
                .filter(|(_, task)| matches!(task, Task::Frame(_)))
                .map(|(key, _)| key)
                .collect();
            let callbacks: Vec<FrameCallback> = keys
                .into_iter()
                .filter_map(|key| match state.tasks.remove(key) {
                    Some(Task::Frame(callback)) => Some(callback),
                    _ => None,
                })
                .collect();
            (state.now, callbacks)
        };
        for callback in callbacks {
            callback(now);
        }
    }

    /// Runs frames of `step` ms until `total` ms have elapsed.
    pub fn run_frames(&self, total: Millis, step: Millis) {
        let step = if step > 0.0 { step } else { 16.0 };
        let mut elapsed = 0.0;
        while elapsed < total {
            self.frame(step);
            elapsed += step;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Millis {
        self.state.borrow().now
    }

    fn request_frame(&self, callback: FrameCallback) -> TaskHandle {
        let mut state = self.state.borrow_mut();
        state.frame_requests += 1;
        handle_of(state.tasks.insert(Task::Frame(callback)))
    }

    fn set_timeout(&self, delay: Millis, callback: TimerCallback) -> TaskHandle {
        let mut state = self.state.borrow_mut();
        state.timeout_requests += 1;
        state.seq += 1;
        let task = Task::Timeout {
            due: state.now + delay.max(0.0),
            seq: state.seq,
            callback,
        };
        handle_of(state.tasks.insert(task))
    }

    fn cancel(&self, handle: TaskHandle) {
        let mut state = self.state.borrow_mut();
        if state.tasks.remove(key_of(handle)).is_some() {
            state.cancels += 1;
        }
    }
}

struct VisibilityState {
    intersection_supported: bool,
    page_supported: bool,
    page_visible: bool,
    observers: SlotMap<DefaultKey, (ObserveOptions, SignalSink)>,
    page_listeners: SlotMap<DefaultKey, SignalSink>,
    observe_calls: usize,
}

/// Visibility host whose signals are injected by the caller.
pub struct ManualVisibility {
    state: Rc<RefCell<VisibilityState>>,
}

impl Default for ManualVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualVisibility {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(VisibilityState {
                intersection_supported: true,
                page_supported: true,
                page_visible: true,
                observers: SlotMap::new(),
                page_listeners: SlotMap::new(),
                observe_calls: 0,
            })),
        }
    }

    /// A host lacking the intersection primitive.
    pub fn without_intersection() -> Self {
        let host = Self::new();
        host.state.borrow_mut().intersection_supported = false;
        host
    }

    /// A host lacking the page visibility primitive.
    pub fn without_page_visibility() -> Self {
        let host = Self::new();
        host.state.borrow_mut().page_supported = false;
        host
    }

    pub fn with_page_hidden(self) -> Self {
        self.state.borrow_mut().page_visible = false;
        self
    }

    pub fn set_intersecting(&self, intersecting: bool) {
        let sinks: Vec<SignalSink> = self
            .state
            .borrow()
            .observers
            .values()
            .map(|(_, sink)| Rc::clone(sink))
            .collect();
        for sink in sinks {
            sink(VisibilitySignal::Intersection(intersecting));
        }
    }

    pub fn set_page_visible(&self, visible: bool) {
        let sinks: Vec<SignalSink> = {
            let mut state = self.state.borrow_mut();
            state.page_visible = visible;
            state.page_listeners.values().map(Rc::clone).collect()
        };
        for sink in sinks {
            sink(VisibilitySignal::Page(visible));
        }
    }

    pub fn active_observers(&self) -> usize {
        self.state.borrow().observers.len()
    }

    pub fn active_page_listeners(&self) -> usize {
        self.state.borrow().page_listeners.len()
    }

    pub fn observe_calls(&self) -> usize {
        self.state.borrow().observe_calls
    }

    pub fn last_options(&self) -> Option<ObserveOptions> {
        self.state
            .borrow()
            .observers
            .values()
            .last()
            .map(|(options, _)| options.clone())
    }
}

fn detach_with(
    state: Weak<RefCell<VisibilityState>>,
    remove: impl FnOnce(&mut VisibilityState) + 'static,
) -> Subscription {
    Subscription::new(move || {
        if let Some(state) = state.upgrade() {
            remove(&mut state.borrow_mut());
        }
    })
}

impl VisibilityHost for ManualVisibility {
    fn observe_intersection(
        &self,
        options: &ObserveOptions,
        sink: SignalSink,
    ) -> Option<Subscription> {
        let mut state = self.state.borrow_mut();
        state.observe_calls += 1;
        if !state.intersection_supported {
            return None;
        }
        let key = state.observers.insert((options.clone(), sink));
        Some(detach_with(Rc::downgrade(&self.state), move |state| {
            state.observers.remove(key);
        }))
    }

    fn watch_page(&self, sink: SignalSink) -> Option<Subscription> {
        let mut state = self.state.borrow_mut();
        if !state.page_supported {
            return None;
        }
        let key = state.page_listeners.insert(sink);
        Some(detach_with(Rc::downgrade(&self.state), move |state| {
            state.page_listeners.remove(key);
        }))
    }

    fn page_visible(&self) -> bool {
        let state = self.state.borrow();
        !state.page_supported || state.page_visible
    }
}

/// Replays a fixed sequence of samples, cycling when exhausted.
pub struct SequenceRandom {
    samples: Vec<f64>,
    cursor: RefCell<usize>,
}

impl SequenceRandom {
    pub fn new(samples: impl Into<Vec<f64>>) -> Self {
        let mut samples = samples.into();
        if samples.is_empty() {
            samples.push(0.0);
        }
        Self {
            samples,
            cursor: RefCell::new(0),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        let mut cursor = self.cursor.borrow_mut();
        let value = self.samples[*cursor % self.samples.len()];
        *cursor += 1;
        value
    }
}
