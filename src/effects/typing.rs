//! Types text out keystroke by keystroke, with an optional cursor.
//!
//! Hangul syllables are typed as their jamo (see [`crate::hangul`]).

use std::rc::Rc;

use serde::Deserialize;

use crate::config::{merge, Callback, TriggerConfig, TriggerPatch};
use crate::error::{EffectError, EffectResult};
use crate::hangul::TypingPlan;
use crate::host::{Host, Millis};
use crate::lifecycle::{
    Clock, GatedAnimation, HidePolicy, Outbox, Payload, Phase, Reconfigure, Step,
};
use crate::surface::TextSurface;

#[derive(Clone, Debug)]
pub struct TypingConfig {
    pub text: String,
    /// Time between keystrokes.
    pub speed: Millis,
    /// Time before the first keystroke.
    pub delay: Millis,
    pub show_cursor: bool,
    pub cursor_char: String,
    pub trigger: TriggerConfig,
    /// Receives the displayed text, without the cursor.
    pub on_update: Option<Callback<String>>,
    pub on_complete: Option<Callback>,
}

impl TypingConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speed: 50.0,
            delay: 0.0,
            show_cursor: true,
            cursor_char: "|".to_string(),
            trigger: TriggerConfig::new(0.2, "0px 0px -100px 0px"),
            on_update: None,
            on_complete: None,
        }
    }

    pub fn from_patch(patch: TypingPatch) -> EffectResult<Self> {
        let mut config = Self::new(String::new());
        config.apply(patch);
        if config.text.is_empty() {
            return Err(EffectError::MissingField("text"));
        }
        Ok(config)
    }

    fn apply(&mut self, patch: TypingPatch) -> Reconfigure {
        // Empty text would leave nothing to animate.
        let retext = merge(&mut self.text, patch.text.filter(|text| !text.is_empty()));
        merge(&mut self.speed, patch.speed);
        merge(&mut self.delay, patch.delay);
        merge(&mut self.show_cursor, patch.show_cursor);
        merge(&mut self.cursor_char, patch.cursor_char);
        if patch.on_update.is_some() {
            self.on_update = patch.on_update;
        }
        if patch.on_complete.is_some() {
            self.on_complete = patch.on_complete;
        }
        let trigger = patch.trigger.apply(&mut self.trigger);
        Reconfigure {
            observe_changed: trigger.observe_changed,
            reset: retext,
            force_restart: trigger.enabled_changed == Some(true),
            restart_requires_visible: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypingPatch {
    pub text: Option<String>,
    pub speed: Option<Millis>,
    pub delay: Option<Millis>,
    pub show_cursor: Option<bool>,
    pub cursor_char: Option<String>,
    #[serde(flatten)]
    pub trigger: TriggerPatch,
    #[serde(skip)]
    pub on_update: Option<Callback<String>>,
    #[serde(skip)]
    pub on_complete: Option<Callback>,
}

struct TypingPayload {
    config: TypingConfig,
    plan: TypingPlan,
    surface: Rc<dyn TextSurface>,
    /// Keystrokes typed so far.
    typed: usize,
}

impl TypingPayload {
    fn replan(&mut self) {
        self.plan = TypingPlan::new(&self.config.text);
    }
}

impl Payload for TypingPayload {
    fn trigger(&self) -> TriggerConfig {
        self.config.trigger.clone()
    }

    fn hide_policy(&self) -> HidePolicy {
        HidePolicy::Pause
    }

    fn rest(&mut self) {
        self.typed = 0;
        self.surface.set_text("");
    }

    fn begin(&mut self, _out: &mut Outbox) -> Step {
        self.rest();
        Step::After(self.config.delay)
    }

    fn tick(&mut self, _clock: Clock, out: &mut Outbox) -> Step {
        if self.typed >= self.plan.units() {
            return Step::Done;
        }
        self.typed += 1;
        let shown = self.plan.text_after(self.typed);
        if self.config.show_cursor {
            let cursor = &self.config.cursor_char;
            self.surface.set_text(&format!("{shown}{cursor}"));
        } else {
            self.surface.set_text(&shown);
        }
        out.emit(&self.config.on_update, shown);
        Step::After(self.config.speed)
    }

    fn resume(&mut self) -> Step {
        if self.typed == 0 {
            Step::After(self.config.delay)
        } else {
            Step::After(self.config.speed)
        }
    }

    fn complete(&mut self, out: &mut Outbox) {
        self.surface.set_text(&self.plan.full_text());
        out.emit(&self.config.on_complete, ());
    }
}

/// Typewriter effect bound to one element.
pub struct Typing {
    anim: GatedAnimation<TypingPayload>,
}

impl Typing {
    /// Clears the element and starts watching visibility. Fails when
    /// `config.text` is empty.
    pub fn new(
        surface: Rc<dyn TextSurface>,
        host: Host,
        config: TypingConfig,
    ) -> EffectResult<Self> {
        if config.text.is_empty() {
            return Err(EffectError::MissingField("text"));
        }
        let plan = TypingPlan::new(&config.text);
        let payload = TypingPayload {
            config,
            plan,
            surface,
            typed: 0,
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

    /// Merges `patch`. New text starts over.
    pub fn update_config(&self, patch: TypingPatch) {
        self.anim.reconfigure(|payload| {
            let change = payload.config.apply(patch);
            if change.reset {
                payload.replan();
            }
            change
        });
    }

    /// Replaces the text and types it again from the start while visible.
    pub fn set_text(&self, text: impl Into<String>) {
        self.update_config(TypingPatch {
            text: Some(text.into()),
            ..TypingPatch::default()
        });
    }

    pub fn destroy(&self) {
        self.anim.destroy();
    }

    /// Keystrokes typed in the current run.
    pub fn typed_units(&self) -> usize {
        self.anim.with_payload(|payload| payload.typed)
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
