//! Shared configuration pieces: callbacks, trigger settings and patch helpers.
//!
//! Every effect keeps a fully-populated `*Config` and is reconfigured through a
//! `*Patch` whose fields are all `Option`. A `None` field means "key absent"
//! and never overrides the current value, so a patch that omits a callback
//! keeps the previously installed one.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer};

use crate::host::ObserveOptions;
use crate::visibility::ObservePatch;

/// A host-supplied callback, fired synchronously from the scheduling callback.
pub struct Callback<T = ()>(Rc<dyn Fn(T)>);

impl<T> Callback<T> {
    pub fn new(f: impl Fn(T) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, value: T) {
        (self.0)(value)
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// Visibility gating shared by all effects.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerConfig {
    pub enabled: bool,
    pub trigger_once: bool,
    pub observe: ObserveOptions,
}

impl TriggerConfig {
    pub fn new(threshold: f64, root_margin: &str) -> Self {
        Self {
            enabled: true,
            trigger_once: false,
            observe: ObserveOptions {
                threshold,
                root_margin: root_margin.to_string(),
                root: None,
            },
        }
    }
}

/// Partial update of a [`TriggerConfig`], flattened into every effect patch.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerPatch {
    pub enabled: Option<bool>,
    pub trigger_once: Option<bool>,
    pub threshold: Option<f64>,
    pub root_margin: Option<String>,
    #[serde(deserialize_with = "explicit_null")]
    pub root: Option<Option<String>>,
}

/// What a [`TriggerPatch`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TriggerUpdate {
    pub observe_changed: bool,
    /// `Some(new)` when `enabled` flipped.
    pub enabled_changed: Option<bool>,
}

impl TriggerPatch {
    pub(crate) fn apply(self, trigger: &mut TriggerConfig) -> TriggerUpdate {
        let was_enabled = trigger.enabled;
        merge(&mut trigger.enabled, self.enabled);
        merge(&mut trigger.trigger_once, self.trigger_once);
        let observe = ObservePatch {
            threshold: self.threshold,
            root_margin: self.root_margin,
            root: self.root,
        };
        let observe_changed = !observe.is_empty();
        observe.apply(&mut trigger.observe);
        TriggerUpdate {
            observe_changed,
            enabled_changed: (trigger.enabled != was_enabled).then_some(trigger.enabled),
        }
    }
}

/// Overwrites `slot` when the patch carries a value. Returns whether it did.
pub(crate) fn merge<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// Deserializes a nullable patch field so that an explicit `null` becomes
/// `Some(None)` while a missing key stays `None`.
pub(crate) fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Deserialize, Default)]
    struct Probe {
        #[serde(default, deserialize_with = "explicit_null")]
        root: Option<Option<String>>,
    }

    #[test]
    fn merge_only_overrides_present_values() {
        let mut duration = 2000.0;
        assert!(!merge(&mut duration, None));
        assert_eq!(duration, 2000.0);
        assert!(merge(&mut duration, Some(500.0)));
        assert_eq!(duration, 500.0);
    }

    #[test]
    fn explicit_null_distinguishes_absent_from_null() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.root, None);
        let null: Probe = serde_json::from_str(r#"{"root":null}"#).unwrap();
        assert_eq!(null.root, Some(None));
        let set: Probe = serde_json::from_str(r##"{"root":"#scroller"}"##).unwrap();
        assert_eq!(set.root, Some(Some("#scroller".to_string())));
    }

    #[test]
    fn trigger_patch_reports_what_changed() {
        let mut trigger = TriggerConfig::new(0.2, "0px 0px -100px 0px");
        let patch: TriggerPatch = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        let update = patch.apply(&mut trigger);
        assert_eq!(update.enabled_changed, Some(false));
        assert!(!update.observe_changed);
        assert_eq!(trigger.observe.threshold, 0.2);

        let patch: TriggerPatch =
            serde_json::from_str(r#"{"threshold":0.5,"enabled":false}"#).unwrap();
        let update = patch.apply(&mut trigger);
        assert_eq!(update.enabled_changed, None);
        assert!(update.observe_changed);
        assert_eq!(trigger.observe.threshold, 0.5);
        assert_eq!(trigger.observe.root_margin, "0px 0px -100px 0px");
    }

    #[test]
    fn callbacks_share_the_closure() {
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        let cb = Callback::new(move |n: u32| seen.set(seen.get() + n));
        let copy = cb.clone();
        cb.call(2);
        copy.call(3);
        assert_eq!(hits.get(), 5);
        assert_eq!(format!("{cb:?}"), "Callback");
    }
}
