use std::cell::RefCell;
use std::rc::{Rc, Weak};

use slotmap::{DefaultKey, Key, KeyData, SlotMap};
use tracing::warn;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Performance, Window};

use crate::host::{FrameCallback, Millis, Scheduler, TaskHandle, TimerCallback};

enum Slot {
    /// Inserted before the browser hands out an id.
    Reserved,
    Frame(i32, Closure<dyn FnMut(f64)>),
    Timeout(i32, Closure<dyn FnMut()>),
}

#[derive(Default)]
struct Registry {
    live: SlotMap<DefaultKey, Slot>,
    /// Closures that have fired. A closure must outlive its own invocation,
    /// so each one is released when the next callback fires.
    retired: Vec<Slot>,
}

/// `requestAnimationFrame`/`setTimeout` scheduler. Every registration owns
/// its JS closure until it fires or is cancelled.
pub struct WebScheduler {
    window: Window,
    performance: Option<Performance>,
    registry: Rc<RefCell<Registry>>,
}

fn handle_of(key: DefaultKey) -> TaskHandle {
    TaskHandle::new(key.data().as_ffi())
}

fn key_of(handle: TaskHandle) -> DefaultKey {
    KeyData::from_ffi(handle.raw()).into()
}

fn retire(registry: &Weak<RefCell<Registry>>, key: DefaultKey) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let stale = {
        let mut registry = registry.borrow_mut();
        let stale = std::mem::take(&mut registry.retired);
        if let Some(slot) = registry.live.remove(key) {
            registry.retired.push(slot);
        }
        stale
    };
    drop(stale);
}

impl WebScheduler {
    pub fn new(window: Window) -> Self {
        let performance = window.performance();
        Self {
            window,
            performance,
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }
}

impl Scheduler for WebScheduler {
    fn now(&self) -> Millis {
        match &self.performance {
            Some(performance) => performance.now(),
            None => js_sys::Date::now(),
        }
    }

    fn request_frame(&self, callback: FrameCallback) -> TaskHandle {
        let mut registry = self.registry.borrow_mut();
        let key = registry.live.insert(Slot::Reserved);
        let weak = Rc::downgrade(&self.registry);
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new(move |now: f64| {
            retire(&weak, key);
            if let Some(callback) = callback.take() {
                callback(now);
            }
        }) as Box<dyn FnMut(f64)>);
        match self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
        {
            Ok(id) => {
                if let Some(slot) = registry.live.get_mut(key) {
                    *slot = Slot::Frame(id, closure);
                }
            }
            Err(err) => {
                warn!(?err, "requestAnimationFrame failed");
                registry.live.remove(key);
            }
        }
        handle_of(key)
    }

    fn set_timeout(&self, delay: Millis, callback: TimerCallback) -> TaskHandle {
        let mut registry = self.registry.borrow_mut();
        let key = registry.live.insert(Slot::Reserved);
        let weak = Rc::downgrade(&self.registry);
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new(move || {
            retire(&weak, key);
            if let Some(callback) = callback.take() {
                callback();
            }
        }) as Box<dyn FnMut()>);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                delay.max(0.0).round() as i32,
            ) {
            Ok(id) => {
                if let Some(slot) = registry.live.get_mut(key) {
                    *slot = Slot::Timeout(id, closure);
                }
            }
            Err(err) => {
                warn!(?err, "setTimeout failed");
                registry.live.remove(key);
            }
        }
        handle_of(key)
    }

    fn cancel(&self, handle: TaskHandle) {
        let slot = self.registry.borrow_mut().live.remove(key_of(handle));
        match slot {
            Some(Slot::Frame(id, _)) => {
                if let Err(err) = self.window.cancel_animation_frame(id) {
                    warn!(?err, "cancelAnimationFrame failed");
                }
            }
            Some(Slot::Timeout(id, _)) => self.window.clear_timeout_with_handle(id),
            Some(Slot::Reserved) | None => {}
        }
    }
}

impl Drop for WebScheduler {
    fn drop(&mut self) {
        let keys: Vec<DefaultKey> = self.registry.borrow().live.keys().collect();
        for key in keys {
            self.cancel(handle_of(key));
        }
    }
}
