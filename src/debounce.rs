//! Trailing-edge debouncing on top of [`Scheduler`] timeouts.

use std::cell::Cell;
use std::rc::Rc;

use crate::host::{Millis, Scheduler, TaskHandle};

/// Runs only the last call made within `delay` of each other.
pub struct Debouncer {
    scheduler: Rc<dyn Scheduler>,
    delay: Millis,
    pending: Rc<Cell<Option<TaskHandle>>>,
}

impl Debouncer {
    pub fn new(scheduler: Rc<dyn Scheduler>, delay: Millis) -> Self {
        Self {
            scheduler,
            delay,
            pending: Rc::new(Cell::new(None)),
        }
    }

    /// Replaces any waiting call with `f`, due `delay` ms from now.
    pub fn call(&self, f: impl FnOnce() + 'static) {
        self.cancel();
        let pending = Rc::clone(&self.pending);
        let handle = self.scheduler.set_timeout(
            self.delay,
            Box::new(move || {
                pending.set(None);
                f();
            }),
        );
        self.pending.set(Some(handle));
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::manual::ManualScheduler;
    use std::cell::RefCell;

    #[test]
    fn only_the_last_call_runs() {
        let scheduler = Rc::new(ManualScheduler::new());
        let debouncer = Debouncer::new(scheduler.clone(), 150.0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for word in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            debouncer.call(move || seen.borrow_mut().push(word));
            scheduler.advance(100.0);
        }
        assert!(seen.borrow().is_empty());
        scheduler.advance(50.0);
        assert_eq!(*seen.borrow(), vec!["c"]);
        assert!(!debouncer.is_pending());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn drop_cancels_the_waiting_call() {
        let scheduler = Rc::new(ManualScheduler::new());
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let debouncer = Debouncer::new(scheduler.clone(), 10.0);
        debouncer.call(move || flag.set(true));
        drop(debouncer);
        scheduler.advance(100.0);
        assert!(!ran.get());
        assert_eq!(scheduler.pending(), 0);
    }
}
