//! JavaScript classes: `new Count(container, options)` and friends.
//!
//! `container` is a selector string or an element. `options` is a plain
//! object; its data fields are read as JSON and its `on*` functions become
//! callbacks.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use tracing::warn;
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, MouseEvent, Window};

use crate::config::{Callback, TriggerPatch};
use crate::effects::{
    Count, CountConfig, CountPatch, Morph, ScrollFadeIn, ScrollFadeInConfig, ScrollFadeInPatch,
    TextSpin, TextSpinConfig, TextSpinPatch, TextToParticle, TextToParticleConfig,
    TextToParticlePatch, Typing, TypingConfig, TypingPatch,
};
use crate::error::{EffectError, EffectResult};
use crate::host::{Host, RandomSource};

use super::scheduler::WebScheduler;
use super::surface::{WebCanvas, WebSurface};
use super::visibility::WebVisibility;

fn to_js(err: EffectError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

struct MathRandom;

impl RandomSource for MathRandom {
    fn next_f64(&self) -> f64 {
        js_sys::Math::random()
    }
}

struct Page {
    window: Window,
    document: Document,
}

impl Page {
    fn current() -> EffectResult<Self> {
        let window = web_sys::window().ok_or_else(|| EffectError::host("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| EffectError::host("no document"))?;
        Ok(Self { window, document })
    }

    fn container(&self, container: &JsValue) -> EffectResult<HtmlElement> {
        if let Some(selector) = container.as_string() {
            return self
                .document
                .query_selector(&selector)
                .ok()
                .flatten()
                .and_then(|element| element.dyn_into::<HtmlElement>().ok())
                .ok_or_else(|| EffectError::container_not_found(selector));
        }
        container
            .clone()
            .dyn_into::<HtmlElement>()
            .map_err(|_| EffectError::container_not_found("container is not an element"))
    }

    fn visibility(&self, element: &HtmlElement) -> Rc<WebVisibility> {
        let element: &Element = element.as_ref();
        Rc::new(WebVisibility::new(
            self.window.clone(),
            self.document.clone(),
            element.clone(),
        ))
    }

    fn host(&self, visibility: &Rc<WebVisibility>) -> Host {
        Host::new(
            Rc::new(WebScheduler::new(self.window.clone())),
            visibility.clone(),
            Rc::new(MathRandom),
        )
    }

    fn surface(&self, element: &HtmlElement) -> Rc<WebSurface> {
        Rc::new(WebSurface::new(
            self.window.clone(),
            self.document.clone(),
            element.clone(),
        ))
    }
}

fn parse<T: DeserializeOwned + Default>(options: &JsValue) -> Result<T, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(T::default());
    }
    let json: String = js_sys::JSON::stringify(options)?.into();
    let mut value: serde_json::Value =
        serde_json::from_str(&json).map_err(|err| to_js(err.into()))?;
    // An element `root` stringifies to `{}`; `scroll_root` reads it directly.
    if let Some(fields) = value.as_object_mut() {
        if fields.get("root").is_some_and(serde_json::Value::is_object) {
            fields.remove("root");
        }
    }
    serde_json::from_value(value).map_err(|err| to_js(err.into()))
}

/// `Some` when `options.root` is an element or `null`.
fn root_element(options: &JsValue) -> Option<Option<Element>> {
    if !options.is_object() {
        return None;
    }
    let root = js_sys::Reflect::get(options, &JsValue::from_str("root")).ok()?;
    if root.is_null() {
        return Some(None);
    }
    root.dyn_into::<Element>().ok().map(Some)
}

/// Hands an element `root` to the visibility host. The trigger patch then
/// clears any selector root so the element is observed against.
fn scroll_root(visibility: &WebVisibility, options: &JsValue, trigger: &mut TriggerPatch) {
    match root_element(options) {
        Some(Some(root)) => {
            visibility.set_root_element(Some(root));
            trigger.root = Some(None);
        }
        Some(None) => visibility.set_root_element(None),
        None if matches!(trigger.root, Some(Some(_))) => visibility.set_root_element(None),
        None => {}
    }
}

fn callback<T: 'static>(
    options: &JsValue,
    key: &'static str,
    convert: fn(T) -> JsValue,
) -> Option<Callback<T>> {
    if !options.is_object() {
        return None;
    }
    let function = js_sys::Reflect::get(options, &JsValue::from_str(key))
        .ok()?
        .dyn_into::<js_sys::Function>()
        .ok()?;
    Some(Callback::new(move |value: T| {
        if let Err(err) = function.call1(&JsValue::NULL, &convert(value)) {
            warn!(key, ?err, "callback threw");
        }
    }))
}

fn unit(_: ()) -> JsValue {
    JsValue::UNDEFINED
}

fn string(value: String) -> JsValue {
    JsValue::from_str(&value)
}

fn number(value: usize) -> JsValue {
    JsValue::from_f64(value as f64)
}

fn count_patch(options: &JsValue, visibility: &WebVisibility) -> Result<CountPatch, JsValue> {
    let mut patch: CountPatch = parse(options)?;
    scroll_root(visibility, options, &mut patch.trigger);
    patch.on_update = callback(options, "onUpdate", JsValue::from_f64);
    patch.on_complete = callback(options, "onComplete", unit);
    Ok(patch)
}

#[wasm_bindgen(js_name = Count)]
pub struct JsCount {
    effect: Count,
    visibility: Rc<WebVisibility>,
}

#[wasm_bindgen(js_class = Count)]
impl JsCount {
    #[wasm_bindgen(constructor)]
    pub fn new(container: JsValue, options: JsValue) -> Result<JsCount, JsValue> {
        let page = Page::current().map_err(to_js)?;
        let element = page.container(&container).map_err(to_js)?;
        let visibility = page.visibility(&element);
        let config = CountConfig::from_patch(count_patch(&options, &visibility)?).map_err(to_js)?;
        let effect = Count::new(page.surface(&element), page.host(&visibility), config);
        Ok(Self { effect, visibility })
    }

    pub fn start(&self) {
        self.effect.start();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn reset(&self) {
        self.effect.reset();
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&self, options: JsValue) -> Result<(), JsValue> {
        self.effect.update_config(count_patch(&options, &self.visibility)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = getValue)]
    pub fn value(&self) -> f64 {
        self.effect.value()
    }

    pub fn destroy(&self) {
        self.effect.destroy();
    }
}

fn fade_patch(options: &JsValue, visibility: &WebVisibility) -> Result<ScrollFadeInPatch, JsValue> {
    let mut patch: ScrollFadeInPatch = parse(options)?;
    scroll_root(visibility, options, &mut patch.trigger);
    patch.on_start = callback(options, "onStart", unit);
    patch.on_complete = callback(options, "onComplete", unit);
    Ok(patch)
}

#[wasm_bindgen(js_name = ScrollFadeIn)]
pub struct JsScrollFadeIn {
    effect: ScrollFadeIn,
    visibility: Rc<WebVisibility>,
}

#[wasm_bindgen(js_class = ScrollFadeIn)]
impl JsScrollFadeIn {
    #[wasm_bindgen(constructor)]
    pub fn new(container: JsValue, options: JsValue) -> Result<JsScrollFadeIn, JsValue> {
        let page = Page::current().map_err(to_js)?;
        let element = page.container(&container).map_err(to_js)?;
        let visibility = page.visibility(&element);
        let config = ScrollFadeInConfig::from_patch(fade_patch(&options, &visibility)?);
        let effect = ScrollFadeIn::new(page.surface(&element), page.host(&visibility), config);
        Ok(Self { effect, visibility })
    }

    pub fn start(&self) {
        self.effect.start();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn reset(&self) {
        self.effect.reset();
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&self, options: JsValue) -> Result<(), JsValue> {
        self.effect.update_config(fade_patch(&options, &self.visibility)?);
        Ok(())
    }

    pub fn destroy(&self) {
        self.effect.destroy();
    }
}

fn spin_patch(options: &JsValue, visibility: &WebVisibility) -> Result<TextSpinPatch, JsValue> {
    let mut patch: TextSpinPatch = parse(options)?;
    scroll_root(visibility, options, &mut patch.trigger);
    patch.on_start = callback(options, "onStart", unit);
    patch.on_complete = callback(options, "onComplete", unit);
    Ok(patch)
}

#[wasm_bindgen(js_name = TextSpin)]
pub struct JsTextSpin {
    effect: TextSpin,
    visibility: Rc<WebVisibility>,
}

#[wasm_bindgen(js_class = TextSpin)]
impl JsTextSpin {
    #[wasm_bindgen(constructor)]
    pub fn new(container: JsValue, options: JsValue) -> Result<JsTextSpin, JsValue> {
        let page = Page::current().map_err(to_js)?;
        let element = page.container(&container).map_err(to_js)?;
        let visibility = page.visibility(&element);
        let config = TextSpinConfig::from_patch(spin_patch(&options, &visibility)?).map_err(to_js)?;
        let effect =
            TextSpin::new(page.surface(&element), page.host(&visibility), config).map_err(to_js)?;
        Ok(Self { effect, visibility })
    }

    pub fn start(&self) {
        self.effect.start();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn reset(&self) {
        self.effect.reset();
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&self, options: JsValue) -> Result<(), JsValue> {
        self.effect.update_config(spin_patch(&options, &self.visibility)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = updateText)]
    pub fn update_text(&self, text: String) {
        self.effect.update_text(text);
    }

    pub fn destroy(&self) {
        self.effect.destroy();
    }
}

fn typing_patch(options: &JsValue, visibility: &WebVisibility) -> Result<TypingPatch, JsValue> {
    let mut patch: TypingPatch = parse(options)?;
    scroll_root(visibility, options, &mut patch.trigger);
    patch.on_update = callback(options, "onUpdate", string);
    patch.on_complete = callback(options, "onComplete", unit);
    Ok(patch)
}

#[wasm_bindgen(js_name = Typing)]
pub struct JsTyping {
    effect: Typing,
    visibility: Rc<WebVisibility>,
}

#[wasm_bindgen(js_class = Typing)]
impl JsTyping {
    #[wasm_bindgen(constructor)]
    pub fn new(container: JsValue, options: JsValue) -> Result<JsTyping, JsValue> {
        let page = Page::current().map_err(to_js)?;
        let element = page.container(&container).map_err(to_js)?;
        let visibility = page.visibility(&element);
        let config = TypingConfig::from_patch(typing_patch(&options, &visibility)?).map_err(to_js)?;
        let effect =
            Typing::new(page.surface(&element), page.host(&visibility), config).map_err(to_js)?;
        Ok(Self { effect, visibility })
    }

    pub fn start(&self) {
        self.effect.start();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn reset(&self) {
        self.effect.reset();
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&self, options: JsValue) -> Result<(), JsValue> {
        self.effect.update_config(typing_patch(&options, &self.visibility)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = setText)]
    pub fn set_text(&self, text: String) {
        self.effect.set_text(text);
    }

    pub fn destroy(&self) {
        self.effect.destroy();
    }
}

fn particle_patch(options: &JsValue) -> Result<TextToParticlePatch, JsValue> {
    let mut patch: TextToParticlePatch = parse(options)?;
    patch.on_ready = callback(options, "onReady", unit);
    patch.on_update = callback(options, "onUpdate", number);
    Ok(patch)
}

/// DOM listener removed on drop.
struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            closure,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref());
    }
}

fn forward(effect: &Rc<TextToParticle>, f: fn(&TextToParticle)) -> impl FnMut(Event) + 'static {
    let weak: Weak<TextToParticle> = Rc::downgrade(effect);
    move |_| {
        if let Some(effect) = weak.upgrade() {
            f(&effect);
        }
    }
}

#[wasm_bindgen(js_name = TextToParticle)]
pub struct JsTextToParticle {
    effect: Rc<TextToParticle>,
    listeners: RefCell<Vec<Listener>>,
}

#[wasm_bindgen(js_class = TextToParticle)]
impl JsTextToParticle {
    /// Appends a canvas to the container and wires pointer and resize
    /// listeners to it.
    #[wasm_bindgen(constructor)]
    pub fn new(container: JsValue, options: JsValue) -> Result<JsTextToParticle, JsValue> {
        let page = Page::current().map_err(to_js)?;
        let element = page.container(&container).map_err(to_js)?;
        let config = TextToParticleConfig::from_patch(particle_patch(&options)?);
        let canvas = Rc::new(
            WebCanvas::mount(page.window.clone(), &page.document, element.clone())
                .map_err(to_js)?,
        );
        let target: EventTarget = canvas.element().clone().into();
        let effect = Rc::new(TextToParticle::new(
            canvas.clone(),
            page.host(&page.visibility(&element)),
            config,
        ));
        let listeners = Self::listen(&effect, &page.window, &target, canvas)?;
        Ok(Self {
            effect,
            listeners: RefCell::new(listeners),
        })
    }

    fn listen(
        effect: &Rc<TextToParticle>,
        window: &Window,
        target: &EventTarget,
        canvas: Rc<WebCanvas>,
    ) -> Result<Vec<Listener>, JsValue> {
        let window: &EventTarget = window.as_ref();
        let weak = Rc::downgrade(effect);
        let pointer_move = move |event: Event| {
            let (Some(effect), Some(event)) = (weak.upgrade(), event.dyn_ref::<MouseEvent>())
            else {
                return;
            };
            let rect = canvas.element().get_bounding_client_rect();
            effect.pointer_move(
                event.client_x() as f64 - rect.left(),
                event.client_y() as f64 - rect.top(),
            );
        };
        Ok(vec![
            Listener::attach(target, "mousemove", pointer_move)?,
            Listener::attach(target, "mouseleave", forward(effect, TextToParticle::pointer_leave))?,
            Listener::attach(target, "mousedown", forward(effect, TextToParticle::pointer_down))?,
            Listener::attach(window, "mouseup", forward(effect, TextToParticle::pointer_up))?,
            Listener::attach(window, "resize", forward(effect, TextToParticle::handle_resize))?,
        ])
    }

    pub fn start(&self) {
        self.effect.start();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn reset(&self) {
        self.effect.reset();
    }

    /// `morph("text")`, `morph({ ...options })` or `morph()` to rebuild.
    pub fn morph(&self, input: JsValue) -> Result<(), JsValue> {
        let input = if let Some(text) = input.as_string() {
            Morph::Text(text)
        } else if input.is_object() {
            Morph::Patch(particle_patch(&input)?)
        } else {
            Morph::Rebuild
        };
        self.effect.morph(input);
        Ok(())
    }

    pub fn scatter(&self) {
        self.effect.scatter();
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&self, options: JsValue) -> Result<(), JsValue> {
        self.effect.update_config(particle_patch(&options)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = particleCount)]
    pub fn particle_count(&self) -> usize {
        self.effect.particle_count()
    }

    /// Removes the listeners and the canvas.
    pub fn destroy(&self) {
        self.listeners.borrow_mut().clear();
        self.effect.destroy();
    }
}
