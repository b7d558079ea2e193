//! The effects. Each one is a [`Payload`](crate::lifecycle::Payload) plus a
//! thin public handle around a [`GatedAnimation`](crate::lifecycle::GatedAnimation).

pub mod count;
pub mod particles;
pub mod scroll_fade_in;
pub mod text_spin;
pub mod text_to_particle;
pub mod typing;

pub use count::{format_count, Count, CountConfig, CountPatch};
pub use scroll_fade_in::{ScrollFadeIn, ScrollFadeInConfig, ScrollFadeInPatch};
pub use text_spin::{TextSpin, TextSpinConfig, TextSpinPatch};
pub use text_to_particle::{
    MemoryCanvas, Morph, ParticleCanvas, TextToParticle, TextToParticleConfig,
    TextToParticlePatch,
};
pub use typing::{Typing, TypingConfig, TypingPatch};
