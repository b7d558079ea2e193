#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use masoneffect::host::manual::{ManualScheduler, ManualVisibility, SequenceRandom};
use masoneffect::{Callback, Host};

pub const FRAME: f64 = 16.0;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Headless host with handles kept for driving it.
pub struct Rig {
    pub scheduler: Rc<ManualScheduler>,
    pub visibility: Rc<ManualVisibility>,
    pub host: Host,
}

impl Rig {
    pub fn new() -> Self {
        Self::build(ManualVisibility::new(), SequenceRandom::constant(0.5))
    }

    pub fn with_visibility(visibility: ManualVisibility) -> Self {
        Self::build(visibility, SequenceRandom::constant(0.5))
    }

    pub fn with_random(random: SequenceRandom) -> Self {
        Self::build(ManualVisibility::new(), random)
    }

    fn build(visibility: ManualVisibility, random: SequenceRandom) -> Self {
        init_tracing();
        let scheduler = Rc::new(ManualScheduler::new());
        let visibility = Rc::new(visibility);
        let host = Host::new(scheduler.clone(), visibility.clone(), Rc::new(random));
        Self {
            scheduler,
            visibility,
            host,
        }
    }

    pub fn show(&self) {
        self.visibility.set_intersecting(true);
    }

    pub fn hide(&self) {
        self.visibility.set_intersecting(false);
    }

    pub fn frames(&self, n: usize) {
        for _ in 0..n {
            self.scheduler.frame(FRAME);
        }
    }

    /// Runs frames until `total` ms have passed.
    pub fn run_for(&self, total: f64) {
        self.scheduler.run_frames(total, FRAME);
    }
}

/// Counts invocations of a unit callback.
pub fn counter() -> (Callback, Rc<Cell<usize>>) {
    let hits = Rc::new(Cell::new(0));
    let seen = Rc::clone(&hits);
    (Callback::new(move |()| seen.set(seen.get() + 1)), hits)
}

/// Records every value a callback receives.
pub fn recorder<T: 'static>() -> (Callback<T>, Rc<RefCell<Vec<T>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    (Callback::new(move |value| sink.borrow_mut().push(value)), log)
}
