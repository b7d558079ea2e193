//! Visibility-gated text and number effects for the browser.
//!
//! Every effect is a [`lifecycle::GatedAnimation`] over an effect-specific
//! payload: it arms when constructed, runs while its element is in view and
//! the tab is foregrounded, and is driven by a host [`host::Scheduler`]. The
//! browser build wires the host seams to `web-sys`; everything else runs
//! headless against [`host::manual`].

#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

pub mod config;
pub mod debounce;
pub mod distance;
pub mod easing;
pub mod effects;
pub mod error;
pub mod hangul;
pub mod host;
pub mod lifecycle;
pub mod surface;
pub mod visibility;

pub use config::{Callback, TriggerConfig, TriggerPatch};
pub use easing::Easing;
pub use effects::{
    Count, CountConfig, CountPatch, MemoryCanvas, ScrollFadeIn, ScrollFadeInConfig, ScrollFadeInPatch, TextSpin,
    TextSpinConfig, TextSpinPatch, TextToParticle, TextToParticleConfig, TextToParticlePatch,
    Typing, TypingConfig, TypingPatch,
};
pub use error::{EffectError, EffectResult};
pub use host::{Host, Size};
pub use lifecycle::Phase;

#[cfg(target_arch = "wasm32")]
pub use wasm::bindings::{JsCount, JsScrollFadeIn, JsTextSpin, JsTextToParticle, JsTyping};

// Only compile wasm-specific code when targeting wasm32.

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    use crate::error::EffectError;

    pub mod bindings;
    mod console;
    mod scheduler;
    mod surface;
    mod visibility;

    fn host_error(err: JsValue) -> EffectError {
        EffectError::host(format!("{err:?}"))
    }

    #[wasm_bindgen(start)]
    pub fn main() {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();
        console::install();
    }
}
