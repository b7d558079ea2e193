use std::cell::RefCell;
use std::f64::consts::TAU;

use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, Window};

use crate::effects::particles::{Particle, TextLayout};
use crate::effects::ParticleCanvas;
use crate::error::{EffectError, EffectResult};
use crate::host::Size;
use crate::surface::{GlyphSurface, StyleSurface, TextSurface};

use super::host_error;

const STYLESHEET_ID: &str = "masoneffect-textspin-styles";
const SPIN_CLASS: &str = "masoneffect-textspin";
const GLYPH_CLASS: &str = "masoneffect-textspin-char";

const SPIN_CSS: &str = "
.masoneffect-textspin { display: inline-block; }
.masoneffect-textspin-char { display: inline-block; opacity: 0; transform: rotateY(90deg); }
.masoneffect-textspin-char.active { opacity: 1; transform: rotateY(0deg); }
.masoneffect-textspin-char.space { width: 0.25em; }
";

fn viewport(window: &Window) -> Size {
    let read = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    Size::new(read(window.inner_width()), read(window.inner_height()))
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

/// One DOM element, written through inline styles and child spans.
pub struct WebSurface {
    window: Window,
    document: Document,
    element: HtmlElement,
    glyphs: RefCell<Vec<HtmlElement>>,
}

impl WebSurface {
    pub fn new(window: Window, document: Document, element: HtmlElement) -> Self {
        Self {
            window,
            document,
            element,
            glyphs: RefCell::new(Vec::new()),
        }
    }

    fn glyph(&self, index: usize) -> Option<HtmlElement> {
        self.glyphs.borrow().get(index).cloned()
    }

    fn make_glyph(&self, ch: char, transition: &str) -> EffectResult<HtmlElement> {
        let span: HtmlElement = self
            .document
            .create_element("span")
            .map_err(host_error)?
            .dyn_into()
            .map_err(|_| EffectError::host("span is not an HtmlElement"))?;
        span.set_class_name(GLYPH_CLASS);
        let _ = span.style().set_property("transition", transition);
        if ch == ' ' {
            let _ = span.class_list().add_1("space");
            span.set_text_content(Some("\u{00A0}"));
        } else {
            let mut buf = [0; 4];
            span.set_text_content(Some(&*ch.encode_utf8(&mut buf)));
        }
        self.element.append_child(&span).map_err(host_error)?;
        Ok(span)
    }
}

impl TextSurface for WebSurface {
    fn set_text(&self, text: &str) {
        self.element.set_text_content(Some(text));
    }
}

impl StyleSurface for WebSurface {
    fn set_style(&self, property: &str, value: &str) {
        let style = self.element.style();
        let result = if value.is_empty() {
            style.remove_property(property).map(drop)
        } else {
            style.set_property(property, value)
        };
        if let Err(err) = result {
            warn!(property, ?err, "style update rejected");
        }
    }

    fn computed_transform(&self) -> Option<String> {
        let style = self.window.get_computed_style(&self.element).ok()??;
        style.get_property_value("transform").ok()
    }

    fn bounding_size(&self) -> Size {
        let rect = self.element.get_bounding_client_rect();
        Size::new(rect.width(), rect.height())
    }

    fn root_font_size(&self) -> Option<f64> {
        let root = self.document.document_element()?;
        let style = self.window.get_computed_style(&root).ok()??;
        parse_px(&style.get_property_value("font-size").ok()?)
    }

    fn viewport_size(&self) -> Size {
        viewport(&self.window)
    }
}

impl GlyphSurface for WebSurface {
    fn ensure_stylesheet(&self) {
        if self.document.get_element_by_id(STYLESHEET_ID).is_some() {
            return;
        }
        let (Ok(style), Some(head)) = (self.document.create_element("style"), self.document.head())
        else {
            warn!("cannot install the text spin stylesheet");
            return;
        };
        style.set_id(STYLESHEET_ID);
        style.set_text_content(Some(SPIN_CSS));
        if let Err(err) = head.append_child(&style) {
            warn!(?err, "cannot install the text spin stylesheet");
        }
    }

    fn mount_glyphs(&self, glyphs: &[char], transition: &str) {
        self.element.set_text_content(None);
        let mut spans = Vec::with_capacity(glyphs.len());
        for &ch in glyphs {
            match self.make_glyph(ch, transition) {
                Ok(span) => spans.push(span),
                Err(err) => warn!(%err, "glyph not mounted"),
            }
        }
        let _ = self.element.class_list().add_1(SPIN_CLASS);
        *self.glyphs.borrow_mut() = spans;
    }

    fn set_glyph_transition(&self, index: usize, transition: &str) {
        if let Some(span) = self.glyph(index) {
            let _ = span.style().set_property("transition", transition);
        }
    }

    fn set_glyph_delay(&self, index: usize, delay: Option<f64>) {
        let Some(span) = self.glyph(index) else {
            return;
        };
        let style = span.style();
        let _ = match delay {
            Some(delay) => style.set_property("transition-delay", &format!("{delay}s")),
            None => style.remove_property("transition-delay").map(drop),
        };
    }

    fn set_glyph_active(&self, index: usize, active: bool) {
        if let Some(span) = self.glyph(index) {
            let _ = span.class_list().toggle_with_force("active", active);
        }
    }

    fn clear_glyphs(&self) {
        self.glyphs.borrow_mut().clear();
        self.element.set_text_content(None);
        let _ = self.element.class_list().remove_1(SPIN_CLASS);
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> EffectResult<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .map_err(host_error)?
        .ok_or_else(|| EffectError::host("canvas 2d context not available"))?
        .dyn_into()
        .map_err(|_| EffectError::host("unexpected canvas context type"))
}

/// A visible canvas appended to the container, and an off-screen one used
/// for text rasterization.
pub struct WebCanvas {
    window: Window,
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    off: HtmlCanvasElement,
    off_ctx: CanvasRenderingContext2d,
}

impl WebCanvas {
    pub fn mount(window: Window, document: &Document, container: HtmlElement) -> EffectResult<Self> {
        let create = || -> EffectResult<HtmlCanvasElement> {
            document
                .create_element("canvas")
                .map_err(host_error)?
                .dyn_into()
                .map_err(|_| EffectError::host("canvas is not an HtmlCanvasElement"))
        };
        let canvas = create()?;
        let ctx = context_2d(&canvas)?;
        let off = create()?;
        let off_ctx = context_2d(&off)?;
        container.append_child(&canvas).map_err(host_error)?;
        let _ = canvas.style().set_property("display", "block");
        Ok(Self {
            window,
            container,
            canvas,
            ctx,
            off,
            off_ctx,
        })
    }

    pub fn element(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl ParticleCanvas for WebCanvas {
    fn container_size(&self) -> Size {
        Size::new(
            self.container.client_width() as f64,
            self.container.client_height() as f64,
        )
    }

    fn viewport_size(&self) -> Size {
        viewport(&self.window)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn resize(&self, backing: Size, css: Size) {
        let (width, height) = (backing.width as u32, backing.height as u32);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.off.set_width(width);
        self.off.set_height(height);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", css.width));
        let _ = style.set_property("height", &format!("{}px", css.height));
    }

    fn measure_text(&self, text: &str, font: &str) -> f64 {
        self.off_ctx.set_font(font);
        self.off_ctx
            .measure_text(text)
            .map(|metrics| metrics.width())
            .unwrap_or(0.0)
    }

    fn rasterize(&self, layout: &TextLayout, field: Size) -> Option<Vec<u8>> {
        let ctx = &self.off_ctx;
        ctx.clear_rect(0.0, 0.0, field.width, field.height);
        ctx.set_fill_style_str("#ffffff");
        ctx.set_text_align("center");
        ctx.set_text_baseline("middle");
        ctx.set_font(&layout.font);
        let mut buf = [0; 4];
        for glyph in &layout.glyphs {
            let _ = ctx.fill_text(glyph.ch.encode_utf8(&mut buf), glyph.x, glyph.y);
        }
        match ctx.get_image_data(0.0, 0.0, field.width, field.height) {
            Ok(image) => Some(image.data().0),
            Err(err) => {
                warn!(?err, "getImageData failed");
                None
            }
        }
    }

    fn draw(&self, particles: &[Particle], radius: f64, color: &str) {
        let ctx = &self.ctx;
        ctx.clear_rect(0.0, 0.0, self.canvas.width() as f64, self.canvas.height() as f64);
        ctx.set_fill_style_str(color);
        for p in particles {
            ctx.begin_path();
            if ctx.arc(p.x, p.y, radius, 0.0, TAU).is_ok() {
                ctx.fill();
            }
        }
    }

    fn detach(&self) {
        self.canvas.remove();
    }
}
