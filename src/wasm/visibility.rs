use std::cell::RefCell;

use tracing::{debug, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{
    Document, Element, Event, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, VisibilityState, Window,
};

use crate::host::{ObserveOptions, SignalSink, Subscription, VisibilityHost, VisibilitySignal};

/// `IntersectionObserver` plus `visibilitychange` for one element.
pub struct WebVisibility {
    window: Window,
    document: Document,
    element: Element,
    /// Scroll container passed as an element rather than a selector.
    root_element: RefCell<Option<Element>>,
}

impl WebVisibility {
    pub fn new(window: Window, document: Document, element: Element) -> Self {
        Self {
            window,
            document,
            element,
            root_element: RefCell::new(None),
        }
    }

    /// Used when the observe options carry no selector root. Takes effect on
    /// the next `observe_intersection`.
    pub fn set_root_element(&self, root: Option<Element>) {
        *self.root_element.borrow_mut() = root;
    }

    fn root(&self, selector: Option<&str>) -> Option<Element> {
        let Some(selector) = selector else {
            return self.root_element.borrow().clone();
        };
        match self.document.query_selector(selector) {
            Ok(Some(root)) => Some(root),
            _ => {
                warn!(selector = %selector, "observation root not found; using the viewport");
                None
            }
        }
    }

    fn has_intersection_observer(&self) -> bool {
        js_sys::Reflect::has(&self.window, &JsValue::from_str("IntersectionObserver"))
            .unwrap_or(false)
    }
}

impl VisibilityHost for WebVisibility {
    fn observe_intersection(
        &self,
        options: &ObserveOptions,
        sink: SignalSink,
    ) -> Option<Subscription> {
        if !self.has_intersection_observer() {
            return None;
        }
        let callback = Closure::wrap(Box::new(move |entries: js_sys::Array, _: JsValue| {
            for entry in entries.iter() {
                if let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() {
                    sink(VisibilitySignal::Intersection(entry.is_intersecting()));
                }
            }
        }) as Box<dyn FnMut(js_sys::Array, JsValue)>);

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold));
        init.set_root_margin(&options.root_margin);
        if let Some(root) = self.root(options.root.as_deref()) {
            if let Err(err) = js_sys::Reflect::set(&init, &JsValue::from_str("root"), &root) {
                warn!(?err, "could not set observation root");
            }
        }

        let observer =
            match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
                Ok(observer) => observer,
                Err(err) => {
                    warn!(?err, "IntersectionObserver rejected its options");
                    return None;
                }
            };
        observer.observe(&self.element);
        debug!(threshold = options.threshold, "intersection observer attached");
        Some(Subscription::new(move || {
            observer.disconnect();
            drop(callback);
        }))
    }

    fn watch_page(&self, sink: SignalSink) -> Option<Subscription> {
        let document = self.document.clone();
        let listener = Closure::wrap(Box::new(move |_: Event| {
            let visible = document.visibility_state() == VisibilityState::Visible;
            sink(VisibilitySignal::Page(visible));
        }) as Box<dyn FnMut(Event)>);
        if let Err(err) = self
            .document
            .add_event_listener_with_callback("visibilitychange", listener.as_ref().unchecked_ref())
        {
            warn!(?err, "visibilitychange listener unavailable");
            return None;
        }
        let document = self.document.clone();
        Some(Subscription::new(move || {
            let _ = document.remove_event_listener_with_callback(
                "visibilitychange",
                listener.as_ref().unchecked_ref(),
            );
        }))
    }

    fn page_visible(&self) -> bool {
        self.document.visibility_state() == VisibilityState::Visible
    }
}
