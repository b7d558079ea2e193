//! Reveals text one character at a time, each spinning in after its own
//! random delay.

use std::rc::Rc;

use serde::Deserialize;

use crate::config::{merge, Callback, TriggerConfig, TriggerPatch};
use crate::error::{EffectError, EffectResult};
use crate::host::{Host, Millis, RandomSource};
use crate::lifecycle::{
    Clock, GatedAnimation, HidePolicy, Outbox, Payload, Phase, Reconfigure, Step,
};
use crate::surface::GlyphSurface;

/// Timings are in seconds, matching the CSS transitions they drive.
#[derive(Clone, Debug)]
pub struct TextSpinConfig {
    pub text: String,
    pub delay: f64,
    pub duration: f64,
    /// Upper bound of the per-character random extra delay.
    pub random_delay: f64,
    pub trigger: TriggerConfig,
    pub on_start: Option<Callback>,
    pub on_complete: Option<Callback>,
}

impl TextSpinConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay: 0.2,
            duration: 0.6,
            random_delay: 2.0,
            trigger: TriggerConfig::new(0.1, "0px"),
            on_start: None,
            on_complete: None,
        }
    }

    pub fn from_patch(patch: TextSpinPatch) -> EffectResult<Self> {
        let mut config = Self::new(String::new());
        config.apply(patch);
        if config.text.is_empty() {
            return Err(EffectError::MissingField("text"));
        }
        Ok(config)
    }

    fn apply(&mut self, patch: TextSpinPatch) -> (Reconfigure, Rebuild) {
        // Empty text would leave nothing to animate.
        let retext = merge(&mut self.text, patch.text.filter(|text| !text.is_empty()));
        let retimed = merge(&mut self.duration, patch.duration);
        merge(&mut self.delay, patch.delay);
        merge(&mut self.random_delay, patch.random_delay);
        if patch.on_start.is_some() {
            self.on_start = patch.on_start;
        }
        if patch.on_complete.is_some() {
            self.on_complete = patch.on_complete;
        }
        let trigger = patch.trigger.apply(&mut self.trigger);
        let rebuild = if retext {
            Rebuild::Glyphs
        } else if retimed {
            Rebuild::Transitions
        } else {
            Rebuild::Nothing
        };
        let change = Reconfigure {
            observe_changed: trigger.observe_changed,
            reset: retext || trigger.enabled_changed == Some(false),
            force_restart: trigger.enabled_changed == Some(true),
            restart_requires_visible: true,
        };
        (change, rebuild)
    }

    /// Inline transition for every glyph.
    fn transition(&self) -> String {
        let d = self.duration;
        format!("opacity {d}s ease-out, transform {d}s ease-out")
    }

    fn total_ms(&self) -> Millis {
        (self.delay + self.random_delay + self.duration) * 1000.0
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextSpinPatch {
    pub text: Option<String>,
    pub delay: Option<f64>,
    pub duration: Option<f64>,
    pub random_delay: Option<f64>,
    #[serde(flatten)]
    pub trigger: TriggerPatch,
    #[serde(skip)]
    pub on_start: Option<Callback>,
    #[serde(skip)]
    pub on_complete: Option<Callback>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rebuild {
    Nothing,
    Transitions,
    Glyphs,
}

struct SpinPayload {
    config: TextSpinConfig,
    surface: Rc<dyn GlyphSurface>,
    random: Rc<dyn RandomSource>,
    /// One sample in [0, 1) per character, fixed until the text changes.
    points: Vec<f64>,
    activated: bool,
    awaiting_completion: bool,
}

impl SpinPayload {
    fn build(&mut self) {
        let glyphs: Vec<char> = self.config.text.chars().collect();
        self.points = glyphs.iter().map(|_| self.random.next_f64()).collect();
        self.surface.mount_glyphs(&glyphs, &self.config.transition());
        self.activated = false;
        self.awaiting_completion = false;
    }

    fn refresh_transitions(&self) {
        let transition = self.config.transition();
        for index in 0..self.points.len() {
            self.surface.set_glyph_transition(index, &transition);
        }
    }

    fn glyph_delay(&self, index: usize) -> f64 {
        self.config.delay + self.points[index] * self.config.random_delay
    }
}

impl Payload for SpinPayload {
    fn trigger(&self) -> TriggerConfig {
        self.config.trigger.clone()
    }

    fn hide_policy(&self) -> HidePolicy {
        HidePolicy::Reset
    }

    fn prepare(&mut self, _out: &mut Outbox) -> bool {
        self.surface.ensure_stylesheet();
        self.build();
        true
    }

    fn rest(&mut self) {
        for index in 0..self.points.len() {
            self.surface.set_glyph_active(index, false);
            self.surface.set_glyph_delay(index, None);
        }
        self.activated = false;
        self.awaiting_completion = false;
    }

    fn begin(&mut self, out: &mut Outbox) -> Step {
        out.emit(&self.config.on_start, ());
        for index in 0..self.points.len() {
            self.surface.set_glyph_delay(index, Some(self.glyph_delay(index)));
        }
        self.activated = false;
        self.awaiting_completion = false;
        // Activate on the next frame so the delays are in place first.
        Step::Frame
    }

    fn tick(&mut self, clock: Clock, _out: &mut Outbox) -> Step {
        if self.awaiting_completion {
            return Step::Done;
        }
        if !self.activated {
            for index in 0..self.points.len() {
                self.surface.set_glyph_active(index, true);
            }
            self.activated = true;
        }
        self.awaiting_completion = true;
        Step::After((self.config.total_ms() - clock.elapsed).max(0.0))
    }

    fn resume(&mut self) -> Step {
        self.awaiting_completion = false;
        Step::Frame
    }

    fn complete(&mut self, out: &mut Outbox) {
        self.awaiting_completion = false;
        out.emit(&self.config.on_complete, ());
    }

    fn teardown(&mut self) {
        self.surface.clear_glyphs();
        self.points.clear();
    }
}

/// Per-character spin-in reveal bound to one element.
pub struct TextSpin {
    anim: GatedAnimation<SpinPayload>,
}

impl TextSpin {
    /// Replaces the element content with one span per character. Fails when
    /// `config.text` is empty.
    pub fn new(
        surface: Rc<dyn GlyphSurface>,
        host: Host,
        config: TextSpinConfig,
    ) -> EffectResult<Self> {
        if config.text.is_empty() {
            return Err(EffectError::MissingField("text"));
        }
        let payload = SpinPayload {
            config,
            surface,
            random: Rc::clone(&host.random),
            points: Vec::new(),
            activated: false,
            awaiting_completion: false,
        };
        Ok(Self {
            anim: GatedAnimation::new(payload, host),
        })
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

    /// Merges `patch`. New text rebuilds the glyphs; a new duration alone
    /// only refreshes their transitions. Turning `enabled` off hides the
    /// glyphs, turning it on restarts while visible.
    pub fn update_config(&self, patch: TextSpinPatch) {
        self.anim.reconfigure(|payload| {
            let (change, rebuild) = payload.config.apply(patch);
            match rebuild {
                Rebuild::Glyphs => payload.build(),
                Rebuild::Transitions => payload.refresh_transitions(),
                Rebuild::Nothing => {}
            }
            change
        });
    }

    pub fn update_text(&self, text: impl Into<String>) {
        self.update_config(TextSpinPatch {
            text: Some(text.into()),
            ..TextSpinPatch::default()
        });
    }

    /// Stops and empties the element.
    pub fn destroy(&self) {
        self.anim.destroy();
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

    /// Per-character delays in seconds.
    pub fn glyph_delays(&self) -> Vec<f64> {
        self.anim.with_payload(|payload| {
            (0..payload.points.len())
                .map(|index| payload.glyph_delay(index))
                .collect()
        })
    }
}
