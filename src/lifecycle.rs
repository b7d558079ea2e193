//! The visibility-gated animation state machine shared by every effect.
//!
//! ```text
//! Idle -> Armed -> Running -> Completed
//!                    |  ^
//!                    v  |
//!                   Paused          Stopped (explicit stop)
//!
//! any state -> Destroyed
//! ```
//!
//! A [`GatedAnimation`] owns the run state, the pending frame/timer
//! registration and the [`VisibilityCoordinator`]; an effect supplies only a
//! [`Payload`] describing what changes over time. All state lives behind one
//! `Rc<RefCell<_>>`. Host callbacks hold a `Weak` to it, and user callbacks are
//! queued in an [`Outbox`] that is flushed after the borrow is released, so a
//! callback may call straight back into the effect.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::config::{Callback, TriggerConfig};
use crate::easing::Easing;
use crate::host::{Host, Millis, SignalSink, TaskHandle, VisibilitySignal};
use crate::visibility::{VisibilityChange, VisibilityCoordinator};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, waiting for the payload to become ready.
    Idle,
    /// Watching visibility, not yet triggered (or reset).
    Armed,
    Running,
    /// Interrupted by a hidden signal; resumes on the next visible signal.
    Paused,
    Completed,
    /// Halted by an explicit `stop()`.
    Stopped,
    Destroyed,
}

/// What a hidden signal does to an active run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HidePolicy {
    /// Revert to the pre-animation state and allow the run to replay.
    Reset,
    /// Halt in place and continue on the next visible signal.
    Pause,
}

/// What the payload wants next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    Frame,
    After(Millis),
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clock {
    /// Time since the run started, excluding paused time.
    pub elapsed: Millis,
    pub now: Millis,
}

/// Linear and eased progress of a finite run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub raw: f64,
    pub eased: f64,
}

impl Progress {
    /// A zero or negative duration is complete immediately.
    pub fn at(elapsed: Millis, duration: Millis, easing: Easing) -> Self {
        let raw = if duration <= 0.0 {
            1.0
        } else {
            (elapsed / duration).clamp(0.0, 1.0)
        };
        Self {
            raw,
            eased: easing.apply(raw),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.raw >= 1.0
    }
}

/// User callbacks collected during a transition and fired once the state
/// borrow is released.
#[derive(Default)]
pub struct Outbox {
    calls: Vec<Box<dyn FnOnce()>>,
}

impl Outbox {
    pub fn emit<T: 'static>(&mut self, callback: &Option<Callback<T>>, value: T) {
        if let Some(callback) = callback {
            let callback = callback.clone();
            self.calls.push(Box::new(move || callback.call(value)));
        }
    }

    fn flush(self) {
        for call in self.calls {
            call();
        }
    }
}

/// The effect-specific half of an animation.
pub trait Payload: 'static {
    fn trigger(&self) -> TriggerConfig;

    fn hide_policy(&self) -> HidePolicy;

    /// Lays down the initial visual state. Returning `false` defers arming;
    /// the animation retries on the next frame.
    fn prepare(&mut self, out: &mut Outbox) -> bool {
        let _ = out;
        self.rest();
        true
    }

    /// Restores the pre-animation visual state.
    fn rest(&mut self);

    /// Starts a fresh run and returns the first step.
    fn begin(&mut self, out: &mut Outbox) -> Step;

    fn tick(&mut self, clock: Clock, out: &mut Outbox) -> Step;

    /// First step after a paused run continues.
    fn resume(&mut self) -> Step {
        Step::Frame
    }

    /// Called once when `tick` or `begin` returns [`Step::Done`].
    fn complete(&mut self, out: &mut Outbox) {
        let _ = out;
    }

    /// Releases anything the payload created in the host.
    fn teardown(&mut self) {}
}

/// Result of a configuration change applied through
/// [`GatedAnimation::reconfigure`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconfigure {
    /// Visibility options changed; the coordinator is recreated.
    pub observe_changed: bool,
    /// Derived state changed; the payload is reset and, if currently
    /// visible, triggered afresh.
    pub reset: bool,
    /// Restart even if the run was not active before the change.
    pub force_restart: bool,
    /// Only restart while the coordinator reports visible.
    pub restart_requires_visible: bool,
}

struct Core<P: Payload> {
    payload: P,
    host: Host,
    phase: Phase,
    has_triggered: bool,
    start_time: Option<Millis>,
    paused_elapsed: Option<Millis>,
    pending: Option<TaskHandle>,
    coordinator: Option<VisibilityCoordinator>,
    this: Weak<RefCell<Core<P>>>,
}

fn dispatch<P: Payload>(
    weak: &Weak<RefCell<Core<P>>>,
    f: impl FnOnce(&mut Core<P>, &mut Outbox),
) {
    if let Some(core) = weak.upgrade() {
        with_core(&core, f);
    }
}

fn with_core<P: Payload, R>(
    core: &Rc<RefCell<Core<P>>>,
    f: impl FnOnce(&mut Core<P>, &mut Outbox) -> R,
) -> Option<R> {
    let mut out = Outbox::default();
    let result = match core.try_borrow_mut() {
        Ok(mut core) => f(&mut core, &mut out),
        Err(_) => {
            warn!("animation re-entered while busy; call skipped");
            return None;
        }
    };
    out.flush();
    Some(result)
}

impl<P: Payload> Core<P> {
    fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.host.scheduler.cancel(handle);
        }
    }

    fn schedule(&mut self, step: Step) {
        self.cancel_pending();
        let weak = self.this.clone();
        let handle = match step {
            Step::Frame => self.host.scheduler.request_frame(Box::new(move |now| {
                dispatch(&weak, |core, out| core.on_step(Some(now), out))
            })),
            Step::After(delay) => self.host.scheduler.set_timeout(
                delay,
                Box::new(move || dispatch(&weak, |core, out| core.on_step(None, out))),
            ),
            Step::Done => return,
        };
        self.pending = Some(handle);
    }

    fn advance(&mut self, step: Step, out: &mut Outbox) {
        match step {
            Step::Done => {
                self.cancel_pending();
                self.phase = Phase::Completed;
                self.start_time = None;
                self.paused_elapsed = None;
                debug!("animation completed");
                self.payload.complete(out);
            }
            step => self.schedule(step),
        }
    }

    fn on_step(&mut self, now: Option<Millis>, out: &mut Outbox) {
        self.pending = None;
        match self.phase {
            Phase::Idle => self.arm(out),
            Phase::Running => {
                let now = now.unwrap_or_else(|| self.host.scheduler.now());
                let start = *self.start_time.get_or_insert(now);
                let clock = Clock {
                    elapsed: (now - start).max(0.0),
                    now,
                };
                let step = self.payload.tick(clock, out);
                self.advance(step, out);
            }
            _ => {}
        }
    }

    fn arm(&mut self, out: &mut Outbox) {
        if !self.payload.prepare(out) {
            debug!("payload not ready; retrying next frame");
            self.schedule(Step::Frame);
            return;
        }
        self.phase = Phase::Armed;
        self.attach_coordinator(out);
    }

    fn attach_coordinator(&mut self, out: &mut Outbox) {
        if let Some(mut old) = self.coordinator.take() {
            old.destroy();
        }
        let trigger = self.payload.trigger();
        let mut coordinator =
            VisibilityCoordinator::new(self.host.visibility.clone(), trigger.observe);
        let weak = self.this.clone();
        let sink: SignalSink = Rc::new(move |signal: VisibilitySignal| {
            dispatch(&weak, |core, out| core.on_signal(signal, out))
        });
        let change = coordinator.attach(sink);
        self.coordinator = Some(coordinator);
        if let Some(change) = change {
            self.on_change(change, out);
        }
    }

    /// Re-observes the element with the payload's current options. The
    /// element and page state carry over to the new watch.
    fn refresh_observation(&mut self, out: &mut Outbox) {
        let observe = self.payload.trigger().observe;
        let Some(coordinator) = self.coordinator.as_mut() else {
            self.attach_coordinator(out);
            return;
        };
        if let Some(change) = coordinator.update_options(observe.into()) {
            self.on_change(change, out);
        }
    }

    fn on_signal(&mut self, signal: VisibilitySignal, out: &mut Outbox) {
        let change = self
            .coordinator
            .as_mut()
            .and_then(|coordinator| coordinator.handle(signal));
        if let Some(change) = change {
            self.on_change(change, out);
        }
    }

    fn on_change(&mut self, change: VisibilityChange, out: &mut Outbox) {
        if change.visible {
            self.on_visible(out);
        } else {
            self.on_hidden();
        }
    }

    fn on_visible(&mut self, out: &mut Outbox) {
        let trigger = self.payload.trigger();
        if !trigger.enabled {
            return;
        }
        match self.phase {
            Phase::Paused => self.resume(),
            Phase::Armed | Phase::Completed | Phase::Stopped => {
                if !trigger.trigger_once || !self.has_triggered {
                    self.has_triggered = true;
                    self.start_fresh(out);
                }
            }
            Phase::Idle | Phase::Running | Phase::Destroyed => {}
        }
    }

    fn on_hidden(&mut self) {
        let trigger = self.payload.trigger();
        let policy = if trigger.trigger_once {
            HidePolicy::Pause
        } else {
            self.payload.hide_policy()
        };
        match (policy, self.phase) {
            (
                HidePolicy::Reset,
                Phase::Running | Phase::Paused | Phase::Completed | Phase::Stopped,
            ) => {
                debug!("hidden; resetting");
                self.reset();
            }
            (HidePolicy::Pause, Phase::Running) => self.pause(),
            _ => {}
        }
    }

    fn start_fresh(&mut self, out: &mut Outbox) {
        self.cancel_pending();
        self.phase = Phase::Running;
        self.start_time = Some(self.host.scheduler.now());
        self.paused_elapsed = None;
        debug!("animation started");
        let step = self.payload.begin(out);
        self.advance(step, out);
    }

    fn pause(&mut self) {
        let now = self.host.scheduler.now();
        self.paused_elapsed = Some(self.start_time.map_or(0.0, |start| (now - start).max(0.0)));
        self.cancel_pending();
        self.phase = Phase::Paused;
        debug!(elapsed = ?self.paused_elapsed, "animation paused");
    }

    fn resume(&mut self) {
        let elapsed = self.paused_elapsed.take().unwrap_or(0.0);
        self.start_time = Some(self.host.scheduler.now() - elapsed);
        self.phase = Phase::Running;
        debug!(elapsed, "animation resumed");
        let step = self.payload.resume();
        self.schedule(step);
    }

    fn start(&mut self, out: &mut Outbox) {
        match self.phase {
            Phase::Idle => warn!("start() before initialization; skipped"),
            Phase::Running | Phase::Destroyed => {}
            _ if !self.payload.trigger().enabled => {}
            Phase::Paused => self.resume(),
            _ => self.start_fresh(out),
        }
    }

    fn stop(&mut self) {
        self.cancel_pending();
        if matches!(self.phase, Phase::Running | Phase::Paused) {
            self.phase = Phase::Stopped;
            self.paused_elapsed = None;
            debug!("animation stopped");
        }
    }

    fn reset(&mut self) {
        if matches!(self.phase, Phase::Idle | Phase::Destroyed) {
            return;
        }
        self.stop();
        self.payload.rest();
        self.has_triggered = false;
        self.start_time = None;
        self.phase = Phase::Armed;
    }

    fn reconfigure(&mut self, change: impl FnOnce(&mut P) -> Reconfigure, out: &mut Outbox) {
        if self.phase == Phase::Destroyed {
            return;
        }
        let was_running = self.is_running();
        if was_running {
            self.stop();
        }
        let changes = change(&mut self.payload);
        if self.phase == Phase::Idle {
            return;
        }
        if changes.reset {
            self.reset();
        }
        if changes.observe_changed {
            self.refresh_observation(out);
        }
        if !self.payload.trigger().enabled || self.is_running() {
            return;
        }
        let visible = self.is_visible();
        let wants_restart = was_running || changes.force_restart;
        let restart = (wants_restart && (visible || !changes.restart_requires_visible))
            || (changes.reset && visible && self.phase == Phase::Armed);
        if restart {
            self.has_triggered = true;
            self.start_fresh(out);
        }
    }

    fn is_visible(&self) -> bool {
        self.coordinator
            .as_ref()
            .is_some_and(VisibilityCoordinator::is_visible)
    }

    fn destroy(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.cancel_pending();
        if let Some(coordinator) = self.coordinator.as_mut() {
            coordinator.destroy();
        }
        self.payload.teardown();
        self.phase = Phase::Destroyed;
        debug!("animation destroyed");
    }
}

impl<P: Payload> Drop for Core<P> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// A payload driven by visibility and the host scheduler.
pub struct GatedAnimation<P: Payload> {
    core: Rc<RefCell<Core<P>>>,
}

impl<P: Payload> GatedAnimation<P> {
    /// Prepares the payload and attaches the visibility coordinator. If the
    /// payload is not ready yet the animation stays [`Phase::Idle`] and
    /// retries every frame.
    pub fn new(payload: P, host: Host) -> Self {
        let core = Rc::new_cyclic(|this| {
            RefCell::new(Core {
                payload,
                host,
                phase: Phase::Idle,
                has_triggered: false,
                start_time: None,
                paused_elapsed: None,
                pending: None,
                coordinator: None,
                this: this.clone(),
            })
        });
        let anim = Self { core };
        anim.with_core(|core, out| core.arm(out));
        anim
    }

    fn with_core<R>(&self, f: impl FnOnce(&mut Core<P>, &mut Outbox) -> R) -> Option<R> {
        with_core(&self.core, f)
    }

    /// Starts a run. A no-op while running; a paused run continues.
    pub fn start(&self) {
        self.with_core(|core, out| core.start(out));
    }

    /// Cancels the pending step. Keeps the payload and trigger state.
    pub fn stop(&self) {
        self.with_core(|core, _| {
            if core.phase == Phase::Idle {
                warn!("stop() before initialization; skipped");
                return;
            }
            core.stop()
        });
    }

    /// Stops and restores the initial state, allowing the trigger to fire again.
    pub fn reset(&self) {
        self.with_core(|core, _| {
            if core.phase == Phase::Idle {
                warn!("reset() before initialization; skipped");
                return;
            }
            core.reset()
        });
    }

    /// Stops, applies `change` to the payload and restarts according to the
    /// returned [`Reconfigure`].
    pub fn reconfigure(&self, change: impl FnOnce(&mut P) -> Reconfigure) {
        self.with_core(|core, out| core.reconfigure(change, out));
    }

    /// Releases the scheduler registration, the coordinator and any host
    /// resources. Idempotent.
    pub fn destroy(&self) {
        self.with_core(|core, _| core.destroy());
    }

    pub fn phase(&self) -> Phase {
        self.core.borrow().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    pub fn has_triggered(&self) -> bool {
        self.core.borrow().has_triggered
    }

    pub fn is_visible(&self) -> bool {
        self.core.borrow().is_visible()
    }

    pub fn has_pending_step(&self) -> bool {
        self.core.borrow().pending.is_some()
    }

    pub fn with_payload<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.core.borrow().payload)
    }

    /// Mutates the payload outside the run-state machine (e.g. pointer input).
    pub fn update_payload<R>(&self, f: impl FnOnce(&mut P, &mut Outbox) -> R) -> Option<R> {
        self.with_core(|core, out| {
            if core.phase == Phase::Destroyed {
                return None;
            }
            Some(f(&mut core.payload, out))
        })
        .flatten()
    }

    pub fn downgrade(&self) -> WeakAnimation<P> {
        WeakAnimation {
            core: Rc::downgrade(&self.core),
        }
    }
}

/// Non-owning handle for routing host events back into an animation.
pub struct WeakAnimation<P: Payload> {
    core: Weak<RefCell<Core<P>>>,
}

impl<P: Payload> Clone for WeakAnimation<P> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<P: Payload> WeakAnimation<P> {
    pub fn update_payload(&self, f: impl FnOnce(&mut P, &mut Outbox)) {
        dispatch(&self.core, |core, out| {
            if core.phase != Phase::Destroyed {
                f(&mut core.payload, out);
            }
        });
    }

    pub fn reconfigure(&self, change: impl FnOnce(&mut P) -> Reconfigure) {
        dispatch(&self.core, |core, out| core.reconfigure(change, out));
    }
}
