//! Combined element-in-viewport and tab-foreground visibility for one element.
//!
//! The coordinator folds two independent signals into a single
//! [`VisibilityChange`] stream. It emits only on transitions of the
//! `(element visible, page visible)` pair:
//!
//! - element enters view: visible, but only while the page is foregrounded
//! - element leaves view: hidden, regardless of the page
//! - page backgrounded: hidden, regardless of the element
//! - page foregrounded: visible, but only while the element is in view
//!
//! The host registrations are owned by the coordinator and released exactly
//! once by [`VisibilityCoordinator::destroy`] (or on drop).

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::host::{ObserveOptions, SignalSink, Subscription, VisibilityHost, VisibilitySignal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilityCause {
    /// The intersection watch reported a change.
    Element,
    /// The page visibility watch reported a change.
    Page,
    /// No intersection primitive; the element counts as permanently in view.
    Fallback,
}

/// One edge of the combined visibility signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityChange {
    pub visible: bool,
    pub cause: VisibilityCause,
}

impl VisibilityChange {
    fn shown(cause: VisibilityCause) -> Self {
        Self {
            visible: true,
            cause,
        }
    }

    fn hidden(cause: VisibilityCause) -> Self {
        Self {
            visible: false,
            cause,
        }
    }
}

/// Partial update of [`ObserveOptions`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservePatch {
    pub threshold: Option<f64>,
    pub root_margin: Option<String>,
    pub root: Option<Option<String>>,
}

impl ObservePatch {
    pub fn is_empty(&self) -> bool {
        self.threshold.is_none() && self.root_margin.is_none() && self.root.is_none()
    }

    pub(crate) fn apply(self, options: &mut ObserveOptions) {
        if let Some(threshold) = self.threshold {
            options.threshold = threshold;
        }
        if let Some(root_margin) = self.root_margin {
            options.root_margin = root_margin;
        }
        if let Some(root) = self.root {
            options.root = root;
        }
    }
}

impl From<ObserveOptions> for ObservePatch {
    /// A patch that replaces every option.
    fn from(options: ObserveOptions) -> Self {
        Self {
            threshold: Some(options.threshold),
            root_margin: Some(options.root_margin),
            root: Some(options.root),
        }
    }
}

pub struct VisibilityCoordinator {
    host: Rc<dyn VisibilityHost>,
    options: ObserveOptions,
    sink: Option<SignalSink>,
    element_visible: bool,
    page_visible: bool,
    intersection: Option<Subscription>,
    page: Option<Subscription>,
    destroyed: bool,
}

impl VisibilityCoordinator {
    pub fn new(host: Rc<dyn VisibilityHost>, options: ObserveOptions) -> Self {
        Self {
            host,
            options,
            sink: None,
            element_visible: false,
            page_visible: true,
            intersection: None,
            page: None,
            destroyed: false,
        }
    }

    /// Starts both watches, delivering host signals to `sink`.
    ///
    /// Returns the change to apply immediately when the intersection
    /// primitive is missing and the element is treated as always in view.
    pub fn attach(&mut self, sink: SignalSink) -> Option<VisibilityChange> {
        if self.destroyed {
            return None;
        }
        self.page_visible = self.host.page_visible();
        self.sink = Some(Rc::clone(&sink));
        let change = self.observe_element();
        self.page = self.host.watch_page(sink);
        if self.page.is_none() {
            debug!("page visibility unavailable; page treated as always visible");
            self.page_visible = true;
        }
        change
    }

    fn observe_element(&mut self) -> Option<VisibilityChange> {
        let sink = Rc::clone(self.sink.as_ref()?);
        self.intersection = self.host.observe_intersection(&self.options, sink);
        if self.intersection.is_some() {
            return None;
        }
        warn!("intersection observation unavailable; element treated as always visible");
        let was_visible = self.is_visible();
        self.element_visible = true;
        (self.is_visible() && !was_visible).then(|| VisibilityChange::shown(VisibilityCause::Fallback))
    }

    /// Folds one host signal into the combined state.
    pub fn handle(&mut self, signal: VisibilitySignal) -> Option<VisibilityChange> {
        if self.destroyed {
            return None;
        }
        trace!(?signal, element = self.element_visible, page = self.page_visible, "visibility signal");
        match signal {
            VisibilitySignal::Intersection(true) => {
                if self.element_visible {
                    return None;
                }
                self.element_visible = true;
                self.page_visible
                    .then(|| VisibilityChange::shown(VisibilityCause::Element))
            }
            VisibilitySignal::Intersection(false) => {
                if !self.element_visible {
                    return None;
                }
                self.element_visible = false;
                Some(VisibilityChange::hidden(VisibilityCause::Element))
            }
            VisibilitySignal::Page(false) => {
                if !self.page_visible {
                    return None;
                }
                self.page_visible = false;
                Some(VisibilityChange::hidden(VisibilityCause::Page))
            }
            VisibilitySignal::Page(true) => {
                if self.page_visible {
                    return None;
                }
                self.page_visible = true;
                self.element_visible
                    .then(|| VisibilityChange::shown(VisibilityCause::Page))
            }
        }
    }

    /// Recreates the intersection watch with merged options. The page watch
    /// is left untouched.
    pub fn update_options(&mut self, patch: ObservePatch) -> Option<VisibilityChange> {
        if self.destroyed {
            return None;
        }
        patch.apply(&mut self.options);
        if let Some(mut watch) = self.intersection.take() {
            watch.cancel();
        }
        self.observe_element()
    }

    /// Detaches both watches. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(mut watch) = self.intersection.take() {
            watch.cancel();
        }
        if let Some(mut watch) = self.page.take() {
            watch.cancel();
        }
        self.sink = None;
    }

    pub fn is_visible(&self) -> bool {
        self.element_visible && self.page_visible
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for VisibilityCoordinator {
    fn drop(&mut self) {
        self.destroy();
    }
}
