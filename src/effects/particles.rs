//! Particle field: text layout, target sampling and per-frame integration.
//!
//! All coordinates are backing-store pixels (CSS px times the pixel ratio).

use std::f64::consts::TAU;

use crate::host::{RandomSource, Size};

/// Largest backing-store edge the browser reliably allocates.
pub const MAX_CANVAS_EDGE: f64 = 4096.0;
const MIN_FONT_SIZE: f64 = 12.0;
const FIT_PADDING: f64 = 40.0;
const LETTER_SPACING: f64 = 0.05;
const LINE_SPACING: f64 = 0.1;
/// Sum of RGB above which a sampled pixel counts as ink.
const INK_THRESHOLD: u32 = 600;
const REPEL_GAIN: f64 = 6.0;
const JITTER: f64 = 0.05;
const JITTER_PHASE_STEP: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Where the particle is pulled towards.
    pub tx: f64,
    pub ty: f64,
    /// Spawn position, the target of [`scatter`].
    pub home_x: f64,
    pub home_y: f64,
    /// Jitter phase.
    pub phase: f64,
}

impl Particle {
    /// A particle at rest on a random spot of a `width` x `height` field.
    pub fn spawn(random: &dyn RandomSource, width: f64, height: f64) -> Self {
        let x = random.next_f64() * width;
        let y = random.next_f64() * height;
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            tx: x,
            ty: y,
            home_x: x,
            home_y: y,
            phase: random.next_f64() * TAU,
        }
    }
}

/// Pointer state in backing pixels. `position` is `None` when the pointer is
/// outside the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pointer {
    pub position: Option<(f64, f64)>,
    /// Pressed pointers attract instead of repel.
    pub down: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Physics {
    /// Fraction of the distance to target applied as acceleration.
    pub ease: f64,
    /// Pointer influence radius in backing pixels.
    pub repel_radius: f64,
    pub repel_strength: f64,
}

/// Advances every particle one frame.
pub fn step(
    particles: &mut [Particle],
    physics: &Physics,
    pointer: &Pointer,
    random: &dyn RandomSource,
) {
    let radius = physics.repel_radius;
    for p in particles.iter_mut() {
        let mut ax = (p.tx - p.x) * physics.ease;
        let mut ay = (p.ty - p.y) * physics.ease;

        if let Some((mx, my)) = pointer.position {
            let dx = p.x - mx;
            let dy = p.y - my;
            let d2 = dx * dx + dy * dy;
            if d2 < radius * radius {
                let d = d2.sqrt() + 0.0001;
                let sign = if pointer.down { -1.0 } else { 1.0 };
                let force = sign * physics.repel_strength * (1.0 - d / radius);
                ax += dx / d * force * REPEL_GAIN;
                ay += dy / d * force * REPEL_GAIN;
            }
        }

        p.phase += JITTER_PHASE_STEP;
        ax += p.phase.cos() * JITTER;
        ay += (p.phase * 1.3).sin() * JITTER;

        p.vx = (p.vx + ax) * random.next_f64();
        p.vy = (p.vy + ay) * random.next_f64();
        p.x += p.vx;
        p.y += p.vy;
    }
}

/// Sends every particle back to where it spawned.
pub fn scatter(particles: &mut [Particle]) {
    for p in particles {
        p.tx = p.home_x;
        p.ty = p.home_y;
    }
}

/// Grows or truncates `particles` to one per target and assigns targets in
/// order. New particles come from `spawn`.
pub fn retarget(
    particles: &mut Vec<Particle>,
    targets: &[(f64, f64)],
    mut spawn: impl FnMut() -> Particle,
) {
    if particles.len() < targets.len() {
        let need = targets.len() - particles.len();
        particles.extend((0..need).map(|_| spawn()));
    } else {
        particles.truncate(targets.len());
    }
    for (p, &(tx, ty)) in particles.iter_mut().zip(targets) {
        p.tx = tx;
        p.ty = ty;
    }
}

/// Backing-store size for a `css` box at `dpr`, clamped to
/// [`MAX_CANVAS_EDGE`]. Returns the size and the effective pixel ratio.
pub fn backing_size(css: Size, dpr: f64) -> (Size, f64) {
    let width = (css.width * dpr).floor();
    let height = (css.height * dpr).floor();
    if width <= MAX_CANVAS_EDGE && height <= MAX_CANVAS_EDGE {
        return (Size::new(width, height), dpr);
    }
    let scale = (MAX_CANVAS_EDGE / width).min(MAX_CANVAS_EDGE / height);
    (
        Size::new((width * scale).floor(), (height * scale).floor()),
        dpr * scale,
    )
}

pub fn font_spec(size: f64, family: &str) -> String {
    format!("400 {size}px {family}")
}

/// One glyph to draw, centred on `(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub font_size: f64,
    /// Canvas font shorthand.
    pub font: String,
    pub glyphs: Vec<PlacedGlyph>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Extent {
    width: f64,
    height: f64,
}

/// Width and height of `text` set at `size`, letter and line spacing included.
fn measure_block(
    measure: &impl Fn(&str, &str) -> f64,
    text: &str,
    size: f64,
    family: &str,
) -> Extent {
    let font = font_spec(size, family);
    let spacing = size * LETTER_SPACING;
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines
        .iter()
        .copied()
        .filter(|line| !line.is_empty())
        .map(|line| measure(line, &font) + spacing * (line.chars().count() - 1) as f64)
        .fold(0.0, f64::max);
    let rows = lines.len() as f64;
    Extent {
        width,
        height: size * rows + size * LINE_SPACING * (rows - 1.0),
    }
}

/// Largest whole font size not above `initial` whose block fits in
/// `max_width` x `max_height`, never below 12px.
pub fn fit_font_size(
    measure: &impl Fn(&str, &str) -> f64,
    text: &str,
    family: &str,
    max_width: f64,
    max_height: f64,
    initial: f64,
) -> f64 {
    let fits = |size: f64| {
        let extent = measure_block(measure, text, size, family);
        extent.width <= max_width && extent.height <= max_height
    };
    if fits(initial) {
        return initial;
    }
    if initial <= MIN_FONT_SIZE {
        return MIN_FONT_SIZE;
    }
    let (mut low, mut high) = (MIN_FONT_SIZE, initial.floor());
    let mut best = MIN_FONT_SIZE;
    while low <= high {
        let mid = ((low + high) / 2.0).floor();
        if fits(mid) {
            best = mid;
            low = mid + 1.0;
        } else {
            high = mid - 1.0;
        }
    }
    best
}

/// Centres `text` (lines split on `\n`) in a `field`-sized canvas.
///
/// Without an explicit `font_size` the text starts at
/// `max(80, 0.18 * min(width, height))` and shrinks to fit within a 40px
/// padding.
pub fn layout_text(
    measure: &impl Fn(&str, &str) -> f64,
    text: &str,
    family: &str,
    field: Size,
    font_size: Option<f64>,
) -> TextLayout {
    let base = field.width.min(field.height);
    let initial = font_size
        .filter(|size| *size > 0.0)
        .unwrap_or_else(|| (base * 0.18).floor().max(80.0));
    let size = fit_font_size(
        measure,
        text,
        family,
        field.width - FIT_PADDING * 2.0,
        field.height - FIT_PADDING * 2.0,
        initial,
    );
    let font = font_spec(size, family);
    let spacing = size * LETTER_SPACING;
    let line_gap = size * LINE_SPACING;
    let lines: Vec<&str> = text.split('\n').collect();
    let rows = lines.len() as f64;
    let block_height = size * rows + line_gap * (rows - 1.0);

    let mut glyphs = Vec::new();
    let mut y = field.height / 2.0 - block_height / 2.0 + size / 2.0;
    for line in lines {
        if !line.is_empty() {
            let count = line.chars().count() as f64;
            let line_width = measure(line, &font) + spacing * (count - 1.0);
            let mut x = field.width / 2.0 - line_width / 2.0;
            let mut buf = [0u8; 4];
            for ch in line.chars() {
                let advance = measure(&*ch.encode_utf8(&mut buf), &font);
                glyphs.push(PlacedGlyph {
                    ch,
                    x: x + advance / 2.0,
                    y,
                });
                x += advance + spacing;
            }
        }
        y += size + line_gap;
    }
    TextLayout {
        font_size: size,
        font,
        glyphs,
    }
}

/// Every `step`-th pixel of an RGBA buffer whose RGB sum exceeds the ink
/// threshold.
pub fn sample_targets(rgba: &[u8], width: usize, height: usize, step: usize) -> Vec<(f64, f64)> {
    let step = step.max(1);
    let mut targets = Vec::new();
    for y in (0..height).step_by(step) {
        for x in (0..width).step_by(step) {
            let i = (y * width + x) * 4;
            let Some(px) = rgba.get(i..i + 3) else {
                continue;
            };
            let ink: u32 = px.iter().map(|&c| u32::from(c)).sum();
            if ink > INK_THRESHOLD {
                targets.push((x as f64, y as f64));
            }
        }
    }
    targets
}

/// Drops random targets until at most `max` remain.
pub fn thin_targets(targets: &mut Vec<(f64, f64)>, max: usize, random: &dyn RandomSource) {
    while targets.len() > max {
        let index = ((random.next_f64() * targets.len() as f64) as usize).min(targets.len() - 1);
        targets.swap_remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::manual::SequenceRandom;

    /// Monospace stand-in: every char is 0.6em wide.
    fn mono(text: &str, font: &str) -> f64 {
        let size: f64 = font
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.trim_end_matches("px").parse().ok())
            .unwrap_or(10.0);
        text.chars().count() as f64 * size * 0.6
    }

    #[test]
    fn keeps_initial_size_when_it_fits() {
        let size = fit_font_size(&mono, "hi", "Inter", 1000.0, 1000.0, 80.0);
        assert_eq!(size, 80.0);
    }

    #[test]
    fn shrinks_to_the_largest_fitting_size() {
        // 10 chars: width = 6 * size + 0.45 * size = 6.45 * size <= 200
        let size = fit_font_size(&mono, "abcdefghij", "Inter", 200.0, 1000.0, 80.0);
        assert_eq!(size, 31.0);
        assert!(fit_font_size(&mono, "abcdefghij", "Inter", 1.0, 1.0, 80.0) >= 12.0);
    }

    #[test]
    fn layout_centres_lines() {
        let layout = layout_text(&mono, "ab\ncd", "Inter", Size::new(800.0, 600.0), Some(50.0));
        assert_eq!(layout.font_size, 50.0);
        assert_eq!(layout.font, "400 50px Inter");
        assert_eq!(layout.glyphs.len(), 4);
        let first = &layout.glyphs[0];
        let third = &layout.glyphs[2];
        assert_eq!(first.ch, 'a');
        assert!(first.y < 300.0 && third.y > 300.0);
        assert!((third.y - first.y - 55.0).abs() < 1e-9);
        let mid = (layout.glyphs[0].x + layout.glyphs[1].x) / 2.0;
        assert!((mid - 400.0).abs() < 1e-9);
    }

    #[test]
    fn samples_only_bright_pixels_on_the_grid() {
        let (w, h) = (4, 4);
        let mut rgba = vec![0u8; w * h * 4];
        for (x, y) in [(0, 0), (2, 2), (1, 1)] {
            let i = (y * w + x) * 4;
            rgba[i..i + 3].copy_from_slice(&[255, 255, 255]);
        }
        let targets = sample_targets(&rgba, w, h, 2);
        assert_eq!(targets, vec![(0.0, 0.0), (2.0, 2.0)]);
    }

    #[test]
    fn thinning_caps_the_count() {
        let random = SequenceRandom::new(vec![0.0, 0.5, 0.99]);
        let mut targets: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 0.0)).collect();
        thin_targets(&mut targets, 4, &random);
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn particles_move_towards_their_target() {
        let random = SequenceRandom::constant(1.0);
        let mut particles = vec![Particle::spawn(&SequenceRandom::constant(0.0), 100.0, 100.0)];
        retarget(&mut particles, &[(50.0, 50.0)], || unreachable!());
        let physics = Physics {
            ease: 0.05,
            repel_radius: 150.0,
            repel_strength: 1.0,
        };
        for _ in 0..10 {
            step(&mut particles, &physics, &Pointer::default(), &random);
        }
        assert!(particles[0].x > 0.0 && particles[0].y > 0.0);
    }

    #[test]
    fn pointer_repels_and_pressed_pointer_attracts() {
        let random = SequenceRandom::constant(1.0);
        let physics = Physics {
            ease: 0.0,
            repel_radius: 100.0,
            repel_strength: 1.0,
        };
        let at = |x: f64| Particle {
            x,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            tx: x,
            ty: 0.0,
            home_x: x,
            home_y: 0.0,
            phase: 0.0,
        };
        let mut pushed = vec![at(10.0)];
        let pointer = Pointer {
            position: Some((0.0, 0.0)),
            down: false,
        };
        step(&mut pushed, &physics, &pointer, &random);
        assert!(pushed[0].x > 15.0);

        let mut pulled = vec![at(10.0)];
        let pointer = Pointer {
            position: Some((0.0, 0.0)),
            down: true,
        };
        step(&mut pulled, &physics, &pointer, &random);
        assert!(pulled[0].x < 5.0);
    }

    #[test]
    fn retarget_grows_and_truncates() {
        let random = SequenceRandom::constant(0.5);
        let mut particles = Vec::new();
        retarget(&mut particles, &[(1.0, 1.0), (2.0, 2.0)], || {
            Particle::spawn(&random, 10.0, 10.0)
        });
        assert_eq!(particles.len(), 2);
        assert_eq!((particles[1].tx, particles[1].ty), (2.0, 2.0));
        retarget(&mut particles, &[(3.0, 3.0)], || unreachable!());
        assert_eq!(particles.len(), 1);
        scatter(&mut particles);
        assert_eq!((particles[0].tx, particles[0].ty), (5.0, 5.0));
    }

    #[test]
    fn backing_store_is_clamped() {
        let (size, dpr) = backing_size(Size::new(1000.0, 500.0), 2.0);
        assert_eq!(size, Size::new(2000.0, 1000.0));
        assert_eq!(dpr, 2.0);
        let (size, dpr) = backing_size(Size::new(5000.0, 1000.0), 1.0);
        assert!(size.width <= 4096.0 && size.width >= 4095.0);
        assert!(size.height <= 820.0 && size.height >= 819.0);
        assert!(dpr < 1.0);
    }
}
