//! Text drawn as a field of particles that spring towards sampled glyph
//! pixels and shy away from the pointer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{explicit_null, merge, Callback, TriggerConfig};
use crate::debounce::Debouncer;
use crate::effects::particles::{
    backing_size, layout_text, retarget, sample_targets, scatter, step, thin_targets, Particle,
    Physics, Pointer, TextLayout,
};
use crate::host::{Host, Millis, RandomSource, Size};
use crate::lifecycle::{
    Clock, GatedAnimation, HidePolicy, Outbox, Payload, Phase, Reconfigure, Step,
};

const DPR_CAP: f64 = 1.8;
const FALLBACK_HEIGHT_RATIO: f64 = 0.7;
const MIN_DENSITY_STEP: usize = 2;

/// The canvas an effect draws into, plus the metrics it sizes itself by.
pub trait ParticleCanvas {
    /// Client size of the container in CSS px.
    fn container_size(&self) -> Size;

    fn viewport_size(&self) -> Size;

    fn device_pixel_ratio(&self) -> f64;

    /// Sets the backing store to `backing` pixels and the CSS box to `css`.
    fn resize(&self, backing: Size, css: Size);

    /// Advance width of `text` in the canvas `font` shorthand.
    fn measure_text(&self, text: &str, font: &str) -> f64;

    /// Draws `layout` white on black off-screen and returns the RGBA pixels,
    /// `field` sized. `None` when no 2D context is available.
    fn rasterize(&self, layout: &TextLayout, field: Size) -> Option<Vec<u8>>;

    /// Clears the canvas and draws every particle as a dot.
    fn draw(&self, particles: &[Particle], radius: f64, color: &str);

    /// Removes the canvas from the container.
    fn detach(&self);
}

#[derive(Clone, Debug)]
pub struct TextToParticleConfig {
    /// Lines are separated by `\n`.
    pub text: String,
    /// Sampling grid in backing pixels, at least 2.
    pub density_step: usize,
    pub max_particles: usize,
    /// Dot radius in CSS px.
    pub point_size: f64,
    pub ease: f64,
    /// Pointer influence radius in CSS px.
    pub repel_radius: f64,
    pub repel_strength: f64,
    pub particle_color: String,
    pub font_family: String,
    /// Fixed starting font size; fitted from the canvas size when `None`.
    pub font_size: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub device_pixel_ratio: Option<f64>,
    /// Applies to `morph`, `update_config` and resize handling.
    pub debounce_delay: Millis,
    pub on_ready: Option<Callback>,
    /// Receives the particle count after every frame.
    pub on_update: Option<Callback<usize>>,
}

impl Default for TextToParticleConfig {
    fn default() -> Self {
        Self {
            text: "mason effect".to_string(),
            density_step: 2,
            max_particles: 3200,
            point_size: 0.5,
            ease: 0.05,
            repel_radius: 150.0,
            repel_strength: 1.0,
            particle_color: "#fff".to_string(),
            font_family: "Inter, system-ui, Arial".to_string(),
            font_size: None,
            width: None,
            height: None,
            device_pixel_ratio: None,
            debounce_delay: 150.0,
            on_ready: None,
            on_update: None,
        }
    }
}

/// What a config change requires from the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Rebuild {
    Nothing,
    Targets,
    Canvas,
}

impl TextToParticleConfig {
    pub fn from_patch(patch: TextToParticlePatch) -> Self {
        let mut config = Self::default();
        config.apply(patch);
        config
    }

    fn apply(&mut self, patch: TextToParticlePatch) -> Rebuild {
        let mut rebuild = Rebuild::Nothing;
        if let Some(text) = patch.text.filter(|text| !text.is_empty()) {
            self.text = text;
            rebuild = Rebuild::Targets;
        }
        let regrid = merge(&mut self.density_step, patch.density_step);
        let recap = merge(&mut self.max_particles, patch.max_particles);
        let refont = merge(&mut self.font_family, patch.font_family)
            | merge(&mut self.font_size, patch.font_size);
        if regrid || recap || refont {
            rebuild = rebuild.max(Rebuild::Targets);
        }
        merge(&mut self.point_size, patch.point_size);
        merge(&mut self.ease, patch.ease);
        merge(&mut self.repel_radius, patch.repel_radius);
        merge(&mut self.repel_strength, patch.repel_strength);
        merge(&mut self.particle_color, patch.particle_color);
        merge(&mut self.debounce_delay, patch.debounce_delay);
        let resized = merge(&mut self.width, patch.width)
            | merge(&mut self.height, patch.height)
            | merge(&mut self.device_pixel_ratio, patch.device_pixel_ratio);
        if resized {
            rebuild = Rebuild::Canvas;
        }
        if patch.on_ready.is_some() {
            self.on_ready = patch.on_ready;
        }
        if patch.on_update.is_some() {
            self.on_update = patch.on_update;
        }
        rebuild
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextToParticlePatch {
    pub text: Option<String>,
    pub density_step: Option<usize>,
    pub max_particles: Option<usize>,
    pub point_size: Option<f64>,
    pub ease: Option<f64>,
    pub repel_radius: Option<f64>,
    pub repel_strength: Option<f64>,
    pub particle_color: Option<String>,
    pub font_family: Option<String>,
    #[serde(deserialize_with = "explicit_null")]
    pub font_size: Option<Option<f64>>,
    #[serde(deserialize_with = "explicit_null")]
    pub width: Option<Option<f64>>,
    #[serde(deserialize_with = "explicit_null")]
    pub height: Option<Option<f64>>,
    #[serde(deserialize_with = "explicit_null")]
    pub device_pixel_ratio: Option<Option<f64>>,
    /// Only read at construction.
    pub debounce_delay: Option<Millis>,
    #[serde(skip)]
    pub on_ready: Option<Callback>,
    #[serde(skip)]
    pub on_update: Option<Callback<usize>>,
}

/// Argument of [`TextToParticle::morph`].
#[derive(Clone, Debug)]
pub enum Morph {
    /// Rebuild targets for the current text.
    Rebuild,
    Text(String),
    Patch(TextToParticlePatch),
}

impl From<&str> for Morph {
    fn from(text: &str) -> Self {
        Morph::Text(text.to_string())
    }
}

impl From<String> for Morph {
    fn from(text: String) -> Self {
        Morph::Text(text)
    }
}

impl From<TextToParticlePatch> for Morph {
    fn from(patch: TextToParticlePatch) -> Self {
        Morph::Patch(patch)
    }
}

struct FieldPayload {
    config: TextToParticleConfig,
    canvas: Rc<dyn ParticleCanvas>,
    random: Rc<dyn RandomSource>,
    /// Backing-store size.
    field: Size,
    dpr: f64,
    particles: Vec<Particle>,
    pointer: Pointer,
    ready: bool,
}

impl FieldPayload {
    /// Sizes the canvas from the config, the container or the viewport, in
    /// that order, and rebuilds the targets. `false` while there is no area.
    fn resize(&mut self) -> bool {
        let container = self.canvas.container_size();
        let viewport = self.canvas.viewport_size();
        let positive = |v: &f64| *v > 0.0;
        let width = self
            .config
            .width
            .filter(positive)
            .or(Some(container.width).filter(positive))
            .unwrap_or(viewport.width);
        let height = self
            .config
            .height
            .filter(positive)
            .or(Some(container.height).filter(positive))
            .unwrap_or(viewport.height * FALLBACK_HEIGHT_RATIO);
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let dpr = self
            .config
            .device_pixel_ratio
            .filter(positive)
            .unwrap_or_else(|| self.canvas.device_pixel_ratio().min(DPR_CAP));
        let css = Size::new(width, height);
        let (backing, dpr) = backing_size(css, dpr);
        if backing.is_empty() {
            return false;
        }
        self.field = backing;
        self.dpr = dpr;
        self.canvas.resize(backing, css);
        self.build_targets();
        true
    }

    fn build_targets(&mut self) {
        if self.field.is_empty() {
            return;
        }
        let canvas = Rc::clone(&self.canvas);
        let measure = |text: &str, font: &str| canvas.measure_text(text, font);
        let layout = layout_text(
            &measure,
            &self.config.text,
            &self.config.font_family,
            self.field,
            self.config.font_size,
        );
        let Some(pixels) = canvas.rasterize(&layout, self.field) else {
            warn!("text rasterization unavailable; targets unchanged");
            return;
        };
        let (width, height) = (self.field.width as usize, self.field.height as usize);
        let grid = self.config.density_step.max(MIN_DENSITY_STEP);
        let mut targets = sample_targets(&pixels, width, height, grid);
        thin_targets(&mut targets, self.config.max_particles, &*self.random);
        let random = Rc::clone(&self.random);
        let field = self.field;
        retarget(&mut self.particles, &targets, || {
            Particle::spawn(&*random, field.width, field.height)
        });
        debug!(
            particles = self.particles.len(),
            font_size = layout.font_size,
            "particle targets rebuilt"
        );
    }

    fn rebuild(&mut self, rebuild: Rebuild) {
        match rebuild {
            Rebuild::Canvas => {
                self.resize();
            }
            Rebuild::Targets => self.build_targets(),
            Rebuild::Nothing => {}
        }
    }

    fn morph(&mut self, input: Morph) {
        if self.field.is_empty() && !self.resize() {
            return;
        }
        match input {
            Morph::Rebuild => self.build_targets(),
            Morph::Text(text) => {
                self.config.text = text;
                self.build_targets();
            }
            Morph::Patch(patch) => {
                let rebuild = self.config.apply(patch);
                self.rebuild(rebuild);
            }
        }
    }

    fn frame(&mut self, out: &mut Outbox) {
        let physics = Physics {
            ease: self.config.ease,
            repel_radius: self.config.repel_radius * self.dpr,
            repel_strength: self.config.repel_strength,
        };
        step(&mut self.particles, &physics, &self.pointer, &*self.random);
        self.canvas.draw(
            &self.particles,
            self.config.point_size * self.dpr,
            &self.config.particle_color,
        );
        out.emit(&self.config.on_update, self.particles.len());
    }
}

impl Payload for FieldPayload {
    fn trigger(&self) -> TriggerConfig {
        TriggerConfig::new(0.1, "0px")
    }

    fn hide_policy(&self) -> HidePolicy {
        HidePolicy::Pause
    }

    fn prepare(&mut self, out: &mut Outbox) -> bool {
        if !self.resize() {
            return false;
        }
        self.ready = true;
        out.emit(&self.config.on_ready, ());
        true
    }

    fn rest(&mut self) {}

    fn begin(&mut self, out: &mut Outbox) -> Step {
        self.frame(out);
        Step::Frame
    }

    fn tick(&mut self, _clock: Clock, out: &mut Outbox) -> Step {
        self.frame(out);
        Step::Frame
    }

    fn teardown(&mut self) {
        self.canvas.detach();
    }
}

/// Particle text bound to one container.
pub struct TextToParticle {
    anim: GatedAnimation<FieldPayload>,
    morphs: Debouncer,
    updates: Debouncer,
    resizes: Debouncer,
}

impl TextToParticle {
    /// Sizes the canvas and starts watching visibility. While the container
    /// has no area the effect stays idle and retries every frame.
    pub fn new(canvas: Rc<dyn ParticleCanvas>, host: Host, config: TextToParticleConfig) -> Self {
        let delay = config.debounce_delay;
        let scheduler = Rc::clone(&host.scheduler);
        let payload = FieldPayload {
            config,
            canvas,
            random: Rc::clone(&host.random),
            field: Size::default(),
            dpr: 1.0,
            particles: Vec::new(),
            pointer: Pointer::default(),
            ready: false,
        };
        Self {
            anim: GatedAnimation::new(payload, host),
            morphs: Debouncer::new(Rc::clone(&scheduler), delay),
            updates: Debouncer::new(Rc::clone(&scheduler), delay),
            resizes: Debouncer::new(scheduler, delay),
        }
    }

    fn initialized(&self, op: &str) -> bool {
        match self.anim.phase() {
            Phase::Idle => {
                warn!(op, "called before initialization; skipped");
                false
            }
            Phase::Destroyed => false,
            _ => true,
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

    /// Retargets the particles to new text, a config patch, or (with
    /// [`Morph::Rebuild`]) the current text. Debounced.
    pub fn morph(&self, input: impl Into<Morph>) {
        if !self.initialized("morph") {
            return;
        }
        let input = input.into();
        let weak = self.anim.downgrade();
        self.morphs
            .call(move || weak.update_payload(|payload, _| payload.morph(input)));
    }

    /// Sends every particle back to its spawn point.
    pub fn scatter(&self) {
        if !self.initialized("scatter") {
            return;
        }
        self.anim
            .update_payload(|payload, _| scatter(&mut payload.particles));
    }

    /// Merges `patch`; new text, font or sampling settings rebuild the
    /// targets and new dimensions resize the canvas. Debounced.
    pub fn update_config(&self, patch: TextToParticlePatch) {
        let weak = self.anim.downgrade();
        self.updates.call(move || {
            weak.reconfigure(|payload| {
                let rebuild = payload.config.apply(patch);
                if payload.ready {
                    payload.rebuild(rebuild);
                }
                Reconfigure::default()
            })
        });
    }

    /// Window resize notification. Debounced.
    pub fn handle_resize(&self) {
        let weak = self.anim.downgrade();
        self.resizes.call(move || {
            weak.update_payload(|payload, _| {
                payload.resize();
            })
        });
    }

    /// Pointer moved to `(x, y)` CSS px relative to the canvas.
    pub fn pointer_move(&self, x: f64, y: f64) {
        self.anim.update_payload(|payload, _| {
            payload.pointer.position = Some((x * payload.dpr, y * payload.dpr));
        });
    }

    pub fn pointer_leave(&self) {
        self.anim
            .update_payload(|payload, _| payload.pointer.position = None);
    }

    pub fn pointer_down(&self) {
        self.anim.update_payload(|payload, _| payload.pointer.down = true);
    }

    pub fn pointer_up(&self) {
        self.anim.update_payload(|payload, _| payload.pointer.down = false);
    }

    /// Stops, cancels pending debounced calls and removes the canvas.
    pub fn destroy(&self) {
        self.morphs.cancel();
        self.updates.cancel();
        self.resizes.cancel();
        self.anim.destroy();
    }

    pub fn phase(&self) -> Phase {
        self.anim.phase()
    }

    pub fn is_running(&self) -> bool {
        self.anim.is_running()
    }

    pub fn is_ready(&self) -> bool {
        self.anim.with_payload(|payload| payload.ready)
    }

    pub fn particle_count(&self) -> usize {
        self.anim.with_payload(|payload| payload.particles.len())
    }

    pub fn particles(&self) -> Vec<Particle> {
        self.anim.with_payload(|payload| payload.particles.clone())
    }

    /// Backing-store size and effective pixel ratio.
    pub fn field(&self) -> (Size, f64) {
        self.anim.with_payload(|payload| (payload.field, payload.dpr))
    }

    pub fn config(&self) -> TextToParticleConfig {
        self.anim.with_payload(|payload| payload.config.clone())
    }
}

/// Headless canvas with a block-glyph font: every character is 0.6em wide
/// and rasterizes as a solid box.
pub struct MemoryCanvas {
    container: Cell<Size>,
    viewport: Size,
    dpr: f64,
    backing: Cell<Size>,
    draws: Cell<usize>,
    last_draw: RefCell<Option<(usize, f64, String)>>,
    detached: Cell<bool>,
}

impl MemoryCanvas {
    pub fn new(container: Size) -> Self {
        Self {
            container: Cell::new(container),
            viewport: Size::new(1280.0, 800.0),
            dpr: 1.0,
            backing: Cell::new(Size::default()),
            draws: Cell::new(0),
            last_draw: RefCell::new(None),
            detached: Cell::new(false),
        }
    }

    pub fn with_viewport(mut self, viewport: Size) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.dpr = dpr;
        self
    }

    pub fn set_container_size(&self, size: Size) {
        self.container.set(size);
    }

    pub fn backing(&self) -> Size {
        self.backing.get()
    }

    pub fn draws(&self) -> usize {
        self.draws.get()
    }

    /// Particle count, radius and color of the last draw.
    pub fn last_draw(&self) -> Option<(usize, f64, String)> {
        self.last_draw.borrow().clone()
    }

    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    fn font_px(font: &str) -> f64 {
        font.split_whitespace()
            .find_map(|part| part.strip_suffix("px")?.parse().ok())
            .unwrap_or(16.0)
    }
}

impl ParticleCanvas for MemoryCanvas {
    fn container_size(&self) -> Size {
        self.container.get()
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }

    fn resize(&self, backing: Size, _css: Size) {
        self.backing.set(backing);
    }

    fn measure_text(&self, text: &str, font: &str) -> f64 {
        text.chars().count() as f64 * Self::font_px(font) * 0.6
    }

    fn rasterize(&self, layout: &TextLayout, field: Size) -> Option<Vec<u8>> {
        let (width, height) = (field.width as usize, field.height as usize);
        let mut rgba = vec![0u8; width * height * 4];
        let half_w = layout.font_size * 0.3;
        let half_h = layout.font_size * 0.35;
        for glyph in layout.glyphs.iter().filter(|g| !g.ch.is_whitespace()) {
            let x0 = (glyph.x - half_w).max(0.0) as usize;
            let x1 = ((glyph.x + half_w).max(0.0) as usize).min(width);
            let y0 = (glyph.y - half_h).max(0.0) as usize;
            let y1 = ((glyph.y + half_h).max(0.0) as usize).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = (y * width + x) * 4;
                    rgba[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
                }
            }
        }
        Some(rgba)
    }

    fn draw(&self, particles: &[Particle], radius: f64, color: &str) {
        self.draws.set(self.draws.get() + 1);
        *self.last_draw.borrow_mut() = Some((particles.len(), radius, color.to_string()));
    }

    fn detach(&self) {
        self.detached.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_in_a_patch_keeps_the_current_text() {
        let mut config = TextToParticleConfig::default();
        let rebuild = config.apply(TextToParticlePatch {
            text: Some(String::new()),
            ..TextToParticlePatch::default()
        });
        assert_eq!(config.text, "mason effect");
        assert_eq!(rebuild, Rebuild::Nothing);
    }

    #[test]
    fn dimension_changes_resize_the_canvas() {
        let mut config = TextToParticleConfig::default();
        let patch: TextToParticlePatch =
            serde_json::from_str(r#"{"text":"hi","width":300}"#).unwrap();
        assert_eq!(config.apply(patch), Rebuild::Canvas);
        assert_eq!(config.width, Some(300.0));

        let patch: TextToParticlePatch = serde_json::from_str(r#"{"width":null}"#).unwrap();
        assert_eq!(config.apply(patch), Rebuild::Canvas);
        assert_eq!(config.width, None);

        let patch: TextToParticlePatch =
            serde_json::from_str(r##"{"particleColor":"#f00"}"##).unwrap();
        assert_eq!(config.apply(patch), Rebuild::Nothing);
        assert_eq!(config.particle_color, "#f00");
    }

    #[test]
    fn memory_canvas_rasterizes_blocks() {
        let canvas = MemoryCanvas::new(Size::new(100.0, 100.0));
        assert_eq!(canvas.measure_text("ab", "400 20px Inter"), 24.0);
        let layout = TextLayout {
            font_size: 20.0,
            font: "400 20px Inter".into(),
            glyphs: vec![crate::effects::particles::PlacedGlyph {
                ch: 'a',
                x: 50.0,
                y: 50.0,
            }],
        };
        let rgba = canvas.rasterize(&layout, Size::new(100.0, 100.0)).unwrap();
        let lit = rgba.chunks(4).filter(|px| px[0] == 255).count();
        assert_eq!(lit, 12 * 14);
    }
}
