//! Slides and fades an element in from one side when it enters the viewport.

use std::rc::Rc;

use serde::Deserialize;

use crate::config::{merge, Callback, TriggerConfig, TriggerPatch};
use crate::distance::{parse_distance, Direction, DistanceContext};
use crate::easing::Easing;
use crate::host::{Host, Millis};
use crate::lifecycle::{
    Clock, GatedAnimation, HidePolicy, Outbox, Payload, Phase, Progress, Reconfigure, Step,
};
use crate::surface::StyleSurface;

#[derive(Clone, Debug)]
pub struct ScrollFadeInConfig {
    pub direction: Direction,
    /// CSS length, e.g. `"50px"`, `"2rem"` or `"10%"`.
    pub distance: String,
    pub duration: Millis,
    pub easing: Easing,
    pub trigger: TriggerConfig,
    pub on_start: Option<Callback>,
    pub on_complete: Option<Callback>,
}

impl Default for ScrollFadeInConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Bottom,
            distance: "50px".to_string(),
            duration: 800.0,
            easing: Easing::EaseOutCubic,
            trigger: TriggerConfig::new(0.1, "0px"),
            on_start: None,
            on_complete: None,
        }
    }
}

impl ScrollFadeInConfig {
    pub fn from_patch(patch: ScrollFadeInPatch) -> Self {
        let mut config = Self::default();
        config.apply(patch);
        config
    }

    fn apply(&mut self, patch: ScrollFadeInPatch) -> Reconfigure {
        let turned = merge(&mut self.direction, patch.direction);
        let moved = merge(&mut self.distance, patch.distance);
        merge(&mut self.duration, patch.duration);
        merge(&mut self.easing, patch.easing);
        if patch.on_start.is_some() {
            self.on_start = patch.on_start;
        }
        if patch.on_complete.is_some() {
            self.on_complete = patch.on_complete;
        }
        let trigger = patch.trigger.apply(&mut self.trigger);
        Reconfigure {
            observe_changed: trigger.observe_changed,
            reset: turned || moved,
            force_restart: trigger.enabled_changed == Some(true),
            restart_requires_visible: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrollFadeInPatch {
    pub direction: Option<Direction>,
    pub distance: Option<String>,
    pub duration: Option<Millis>,
    pub easing: Option<Easing>,
    #[serde(flatten)]
    pub trigger: TriggerPatch,
    #[serde(skip)]
    pub on_start: Option<Callback>,
    #[serde(skip)]
    pub on_complete: Option<Callback>,
}

/// Formats a px offset the way CSS expects it, without a negative zero.
fn px(value: f64) -> String {
    format!("{}px", value + 0.0)
}

struct FadePayload {
    config: ScrollFadeInConfig,
    surface: Rc<dyn StyleSurface>,
    /// Computed transform found on the element before it was touched.
    initial_transform: Option<String>,
    /// `config.distance` resolved to px.
    distance_px: f64,
}

impl FadePayload {
    fn resolve_distance(&mut self) {
        let ctx = DistanceContext {
            container: self.surface.bounding_size(),
            root_font_size: self.surface.root_font_size(),
            viewport: self.surface.viewport_size(),
        };
        self.distance_px = parse_distance(&self.config.distance, self.config.direction, &ctx);
    }

    /// Places the element `remaining` of the way back from its resting place.
    fn place(&self, remaining: f64) {
        let (x, y) = self.config.direction.offset(self.distance_px * remaining);
        let translate = format!("translate({}, {})", px(x), px(y));
        let transform = match &self.initial_transform {
            Some(initial) => format!("{translate} {initial}"),
            None => translate,
        };
        self.surface.set_style("transform", &transform);
    }

    fn restore_transform(&self) {
        let initial = self.initial_transform.as_deref().unwrap_or("");
        self.surface.set_style("transform", initial);
    }
}

impl Payload for FadePayload {
    fn trigger(&self) -> TriggerConfig {
        self.config.trigger.clone()
    }

    fn hide_policy(&self) -> HidePolicy {
        HidePolicy::Reset
    }

    fn rest(&mut self) {
        self.place(1.0);
        self.surface.set_style("opacity", "0");
        self.surface.set_style("transition", "none");
    }

    fn begin(&mut self, out: &mut Outbox) -> Step {
        out.emit(&self.config.on_start, ());
        self.surface.set_style("transition", "none");
        Step::Frame
    }

    fn tick(&mut self, clock: Clock, _out: &mut Outbox) -> Step {
        let progress = Progress::at(clock.elapsed, self.config.duration, self.config.easing);
        self.place(1.0 - progress.eased);
        self.surface.set_style("opacity", &progress.eased.to_string());
        if progress.is_complete() {
            Step::Done
        } else {
            Step::Frame
        }
    }

    fn complete(&mut self, out: &mut Outbox) {
        self.restore_transform();
        self.surface.set_style("opacity", "1");
        out.emit(&self.config.on_complete, ());
    }

    fn teardown(&mut self) {
        self.restore_transform();
        self.surface.set_style("opacity", "");
        self.surface.set_style("transition", "");
    }
}

/// Scroll-triggered slide-and-fade bound to one element.
pub struct ScrollFadeIn {
    anim: GatedAnimation<FadePayload>,
}

impl ScrollFadeIn {
    /// Captures the element's transform, moves it to the start position and
    /// starts watching visibility.
    pub fn new(surface: Rc<dyn StyleSurface>, host: Host, config: ScrollFadeInConfig) -> Self {
        let initial_transform = surface
            .computed_transform()
            .filter(|transform| !transform.is_empty() && transform != "none");
        let mut payload = FadePayload {
            config,
            surface,
            initial_transform,
            distance_px: 0.0,
        };
        payload.resolve_distance();
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

    /// Merges `patch`. A new direction or distance is re-resolved and moves
    /// the element back to its start position.
    pub fn update_config(&self, patch: ScrollFadeInPatch) {
        self.anim.reconfigure(|payload| {
            let change = payload.config.apply(patch);
            if change.reset {
                payload.resolve_distance();
            }
            change
        });
    }

    /// Stops and restores the element's original transform.
    pub fn destroy(&self) {
        self.anim.destroy();
    }

    /// Resolved slide distance in px.
    pub fn distance_px(&self) -> f64 {
        self.anim.with_payload(|payload| payload.distance_px)
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
}
