//! Counts a number up (or down) to a target when it scrolls into view.

use std::rc::Rc;

use serde::Deserialize;

use crate::config::{merge, Callback, TriggerConfig, TriggerPatch};
use crate::easing::Easing;
use crate::error::{EffectError, EffectResult};
use crate::host::{Host, Millis};
use crate::lifecycle::{
    Clock, GatedAnimation, HidePolicy, Outbox, Payload, Phase, Progress, Reconfigure, Step,
};
use crate::surface::TextSurface;

#[derive(Clone, Debug)]
pub struct CountConfig {
    pub target_value: f64,
    pub duration: Millis,
    pub start_value: f64,
    pub easing: Easing,
    pub trigger: TriggerConfig,
    /// Receives every displayed (floored) value.
    pub on_update: Option<Callback<f64>>,
    pub on_complete: Option<Callback>,
}

impl CountConfig {
    pub fn new(target_value: f64) -> Self {
        Self {
            target_value,
            duration: 2000.0,
            start_value: 0.0,
            easing: Easing::Linear,
            trigger: TriggerConfig::new(0.2, "0px 0px -100px 0px"),
            on_update: None,
            on_complete: None,
        }
    }

    /// Builds a config from user options; `targetValue` is required.
    pub fn from_patch(patch: CountPatch) -> EffectResult<Self> {
        let target_value = patch
            .target_value
            .ok_or(EffectError::MissingField("targetValue"))?;
        let mut config = Self::new(target_value);
        config.apply(patch);
        Ok(config)
    }

    fn apply(&mut self, patch: CountPatch) -> Reconfigure {
        let retarget = merge(&mut self.target_value, patch.target_value);
        let restart_from = merge(&mut self.start_value, patch.start_value);
        merge(&mut self.duration, patch.duration);
        merge(&mut self.easing, patch.easing);
        if patch.on_update.is_some() {
            self.on_update = patch.on_update;
        }
        if patch.on_complete.is_some() {
            self.on_complete = patch.on_complete;
        }
        let trigger = patch.trigger.apply(&mut self.trigger);
        Reconfigure {
            observe_changed: trigger.observe_changed,
            reset: retarget || restart_from,
            force_restart: trigger.enabled_changed == Some(true),
            restart_requires_visible: true,
        }
    }
}

/// Partial [`CountConfig`]. Absent fields keep their current value.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CountPatch {
    pub target_value: Option<f64>,
    pub duration: Option<Millis>,
    pub start_value: Option<f64>,
    pub easing: Option<Easing>,
    #[serde(flatten)]
    pub trigger: TriggerPatch,
    #[serde(skip)]
    pub on_update: Option<Callback<f64>>,
    #[serde(skip)]
    pub on_complete: Option<Callback>,
}

/// Floors `value` and groups thousands with commas.
pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let floored = value.floor();
    let digits = format!("{:.0}", floored.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if floored < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

struct CountPayload {
    config: CountConfig,
    surface: Rc<dyn TextSurface>,
    value: f64,
}

impl CountPayload {
    fn show(&mut self, value: f64) {
        self.value = value;
        self.surface.set_text(&format_count(value));
    }
}

impl Payload for CountPayload {
    fn trigger(&self) -> TriggerConfig {
        self.config.trigger.clone()
    }

    fn hide_policy(&self) -> HidePolicy {
        HidePolicy::Reset
    }

    fn rest(&mut self) {
        self.show(self.config.start_value);
    }

    fn begin(&mut self, _out: &mut Outbox) -> Step {
        self.show(self.config.start_value);
        Step::Frame
    }

    fn tick(&mut self, clock: Clock, out: &mut Outbox) -> Step {
        let CountConfig {
            start_value,
            target_value,
            duration,
            easing,
            ..
        } = self.config;
        let progress = Progress::at(clock.elapsed, duration, easing);
        let value = (start_value + (target_value - start_value) * progress.eased).floor();
        self.show(value);
        out.emit(&self.config.on_update, value);
        if progress.is_complete() {
            // Land exactly on the target even when it is fractional.
            self.show(target_value);
            Step::Done
        } else {
            Step::Frame
        }
    }

    fn complete(&mut self, out: &mut Outbox) {
        out.emit(&self.config.on_complete, ());
    }
}

/// Animated number bound to one element.
pub struct Count {
    anim: GatedAnimation<CountPayload>,
}

impl Count {
    /// Shows the start value and starts watching visibility.
    pub fn new(surface: Rc<dyn TextSurface>, host: Host, config: CountConfig) -> Self {
        let value = config.start_value;
        let payload = CountPayload {
            config,
            surface,
            value,
        };
        Self {
            anim: GatedAnimation::new(payload, host),
        }
    }

    pub fn start(&self) {
        self.anim.start();
    }

    pub fn stop(&self) {
        self.anim.stop();
    }

    pub fn reset(&self) {
        self.anim.reset();
    }

    /// Merges `patch`. A new target or start value resets the count.
    pub fn update_config(&self, patch: CountPatch) {
        self.anim.reconfigure(|payload| payload.config.apply(patch));
    }

    pub fn destroy(&self) {
        self.anim.destroy();
    }

    /// The value currently displayed.
    pub fn value(&self) -> f64 {
        self.anim.with_payload(|payload| payload.value)
    }

    pub fn phase(&self) -> Phase {
        self.anim.phase()
    }

    pub fn is_running(&self) -> bool {
        self.anim.is_running()
    }

    pub fn has_triggered(&self) -> bool {
        self.anim.has_triggered()
    }

    pub fn config(&self) -> CountConfig {
        self.anim.with_payload(|payload| payload.config.clone())
    }
}
