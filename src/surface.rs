//! Element-side seams: what each effect writes into.
//!
//! An effect exclusively owns the content and inline styles of its element.
//! [`MemorySurface`] records the latest state instead of touching a DOM, for
//! headless evaluation.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::host::Size;

/// Plain text content (Count, Typing).
pub trait TextSurface {
    fn set_text(&self, text: &str);
}

/// Inline style and layout metrics (ScrollFadeIn).
pub trait StyleSurface {
    /// Sets an inline style property; an empty value removes it.
    fn set_style(&self, property: &str, value: &str);

    /// The computed `transform` before the effect touched the element.
    /// `None` when there is none.
    fn computed_transform(&self) -> Option<String>;

    fn bounding_size(&self) -> Size;

    /// Root element font size in px, when it can be determined.
    fn root_font_size(&self) -> Option<f64>;

    fn viewport_size(&self) -> Size;
}

/// Per-character spans (TextSpin).
pub trait GlyphSurface {
    /// Installs the shared stylesheet once per document.
    fn ensure_stylesheet(&self);

    /// Replaces the element content with one span per character.
    fn mount_glyphs(&self, glyphs: &[char], transition: &str);

    fn set_glyph_transition(&self, index: usize, transition: &str);

    /// Sets (or clears, with `None`) the transition delay in seconds.
    fn set_glyph_delay(&self, index: usize, delay: Option<f64>);

    fn set_glyph_active(&self, index: usize, active: bool);

    /// Removes every span and the container class.
    fn clear_glyphs(&self);
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphState {
    pub ch: char,
    pub active: bool,
    pub delay: Option<f64>,
    pub transition: String,
}

#[derive(Default)]
struct MemoryState {
    text: String,
    text_writes: usize,
    styles: BTreeMap<String, String>,
    glyphs: Vec<GlyphState>,
    stylesheet_installs: usize,
}

/// Records every write in memory.
pub struct MemorySurface {
    state: RefCell<MemoryState>,
    computed_transform: Option<String>,
    size: Size,
    root_font_size: Option<f64>,
    viewport: Size,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            state: RefCell::default(),
            computed_transform: None,
            size: Size::new(300.0, 200.0),
            root_font_size: Some(16.0),
            viewport: Size::new(1280.0, 800.0),
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.computed_transform = Some(transform.into());
        self
    }

    pub fn with_root_font_size(mut self, px: Option<f64>) -> Self {
        self.root_font_size = px;
        self
    }

    pub fn with_viewport(mut self, viewport: Size) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    pub fn text_writes(&self) -> usize {
        self.state.borrow().text_writes
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.state.borrow().styles.get(property).cloned()
    }

    pub fn glyphs(&self) -> Vec<GlyphState> {
        self.state.borrow().glyphs.clone()
    }

    pub fn active_glyphs(&self) -> usize {
        self.state.borrow().glyphs.iter().filter(|g| g.active).count()
    }

    pub fn stylesheet_installs(&self) -> usize {
        self.state.borrow().stylesheet_installs
    }
}

impl TextSurface for MemorySurface {
    fn set_text(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        state.text.clear();
        state.text.push_str(text);
        state.text_writes += 1;
    }
}

impl StyleSurface for MemorySurface {
    fn set_style(&self, property: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        if value.is_empty() {
            state.styles.remove(property);
        } else {
            state.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn computed_transform(&self) -> Option<String> {
        self.computed_transform.clone()
    }

    fn bounding_size(&self) -> Size {
        self.size
    }

    fn root_font_size(&self) -> Option<f64> {
        self.root_font_size
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }
}

impl GlyphSurface for MemorySurface {
    fn ensure_stylesheet(&self) {
        let mut state = self.state.borrow_mut();
        if state.stylesheet_installs == 0 {
            state.stylesheet_installs = 1;
        }
    }

    fn mount_glyphs(&self, glyphs: &[char], transition: &str) {
        self.state.borrow_mut().glyphs = glyphs
            .iter()
            .map(|&ch| GlyphState {
                ch,
                transition: transition.to_string(),
                ..GlyphState::default()
            })
            .collect();
    }

    fn set_glyph_transition(&self, index: usize, transition: &str) {
        if let Some(glyph) = self.state.borrow_mut().glyphs.get_mut(index) {
            glyph.transition = transition.to_string();
        }
    }

    fn set_glyph_delay(&self, index: usize, delay: Option<f64>) {
        if let Some(glyph) = self.state.borrow_mut().glyphs.get_mut(index) {
            glyph.delay = delay;
        }
    }

    fn set_glyph_active(&self, index: usize, active: bool) {
        if let Some(glyph) = self.state.borrow_mut().glyphs.get_mut(index) {
            glyph.active = active;
        }
    }

    fn clear_glyphs(&self) {
        self.state.borrow_mut().glyphs.clear();
    }
}
