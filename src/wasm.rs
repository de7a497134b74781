//! Browser bindings for embedded scenes.
//!
//! Provides DOM implementations of the script host, scene runtime and
//! graphics probe, plus a `SceneElement` class for JavaScript callers.
//! One page-level script registry is shared by every element.
//! Build with: `wasm-pack build --target web --features wasm`

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, HtmlCanvasElement, HtmlScriptElement};

use crate::capability::GraphicsProbe;
use crate::component::{EmbeddedScene, HostContext};
use crate::config::{SceneConfig, SceneProps};
use crate::constants::{LOADED_MARKER_ATTR, RUNTIME_GLOBAL};
use crate::lifecycle::{AttemptId, SceneHandle, SceneOutcome, SceneRuntime};
use crate::loader::{LoadStrategy, ScriptHost, ScriptRegistry};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"scene-embed: logger already initialized".into());
    }
}

// ── Page state ────────────────────────────────────────────────────────

struct Page {
    scripts: ScriptRegistry,
    elements: HashMap<u32, EmbeddedScene>,
    next_key: u32,
}

/// Callback invocations queued while the page is borrowed, delivered
/// once it is released so JS callbacks may call back in.
enum Notice {
    Loaded(u32),
    Failed(u32, String),
}

#[derive(Default)]
struct Listeners {
    on_load: Option<js_sys::Function>,
    on_error: Option<js_sys::Function>,
}

thread_local! {
    static PAGE: RefCell<Page> = RefCell::new(Page {
        scripts: ScriptRegistry::new(Box::new(DomScripts)),
        elements: HashMap::new(),
        next_key: 1,
    });
    static NOTICES: RefCell<Vec<Notice>> = const { RefCell::new(Vec::new()) };
    static LISTENERS: RefCell<HashMap<u32, Listeners>> = RefCell::new(HashMap::new());
}

fn with_page<R>(f: impl FnOnce(&mut Page) -> R) -> R {
    let result = PAGE.with(|page| f(&mut page.borrow_mut()));
    flush_notices();
    result
}

fn flush_notices() {
    let notices = NOTICES.with(|n| std::mem::take(&mut *n.borrow_mut()));
    for notice in notices {
        let (key, arg) = match &notice {
            Notice::Loaded(key) => (*key, None),
            Notice::Failed(key, msg) => (*key, Some(JsValue::from(js_sys::Error::new(msg)))),
        };
        let callback = LISTENERS.with(|l| {
            let listeners = l.borrow();
            let entry = listeners.get(&key)?;
            match notice {
                Notice::Loaded(_) => entry.on_load.clone(),
                Notice::Failed(..) => entry.on_error.clone(),
            }
        });
        let Some(callback) = callback else { continue };
        let result = match arg {
            Some(arg) => callback.call1(&JsValue::NULL, &arg),
            None => callback.call0(&JsValue::NULL),
        };
        if let Err(e) = result {
            log::warn!("scene callback threw: {}", js_err(e));
        }
    }
}

fn push_notice(notice: Notice) {
    NOTICES.with(|n| n.borrow_mut().push(notice));
}

fn now() -> Duration {
    Duration::from_secs_f64(js_sys::Date::now() / 1000.0)
}

fn js_err(e: JsValue) -> String {
    e.dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| e.as_string())
        .unwrap_or_else(|| format!("{e:?}"))
}

fn document() -> Option<Document> {
    web_sys::window()?.document()
}

impl Page {
    fn insert(&mut self, props: SceneProps) -> u32 {
        let key = self.next_key;
        self.next_key += 1;
        let scene = EmbeddedScene::new(props)
            .on_load(move || push_notice(Notice::Loaded(key)))
            .on_error(move |e| push_notice(Notice::Failed(key, e.to_string())));
        self.elements.insert(key, scene);
        key
    }

    /// Run `f` on one element with a live host context, then arm the
    /// timeout timer if a new attempt started.
    fn drive(&mut self, key: u32, f: impl FnOnce(&mut EmbeddedScene, &mut HostContext<'_>)) {
        let Some(scene) = self.elements.get_mut(&key) else {
            return;
        };
        let before = scene.deadline();
        let mut runtime = BrowserRuntime { key };
        let now = now();
        let mut ctx = HostContext {
            scripts: &mut self.scripts,
            runtime: &mut runtime,
            now,
        };
        f(scene, &mut ctx);
        if let Some(deadline) = scene.deadline() {
            if before != Some(deadline) {
                schedule_tick(key, deadline.saturating_sub(now));
            }
        }
    }

    fn refresh_all(&mut self) {
        let keys: Vec<u32> = self.elements.keys().copied().collect();
        for key in keys {
            self.drive(key, |scene, ctx| scene.refresh(ctx));
        }
    }

    fn settle(&mut self, key: u32, attempt: AttemptId, outcome: SceneOutcome) {
        match self.elements.get_mut(&key) {
            Some(scene) => scene.settle(attempt, outcome),
            None => {
                // element already gone; don't leave its scene running
                if let Ok(Some(scene)) = outcome {
                    scene.destroy();
                }
            }
        }
    }
}

fn schedule_tick(key: u32, delay: Duration) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once_into_js(move || {
        with_page(|page| {
            if let Some(scene) = page.elements.get_mut(&key) {
                scene.tick(now());
            }
        });
    });
    let millis = (delay.as_millis().min(i32::MAX as u128) as i32).saturating_add(1);
    if let Err(e) = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
    {
        log::warn!("cannot schedule scene timeout: {}", js_err(e));
    }
}

// ── Script host ───────────────────────────────────────────────────────

struct DomScripts;

fn find_script(url: &str) -> Option<Element> {
    document()?
        .query_selector(&format!("script[src=\"{url}\"]"))
        .ok()
        .flatten()
}

fn listen_for_settlement(script: &Element, url: &str) -> Result<(), String> {
    let src = url.to_string();
    let on_load = Closure::once_into_js(move || {
        with_page(|page| {
            page.scripts.finish(&src, Ok(()));
            page.refresh_all();
        });
    });
    let src = url.to_string();
    let on_error = Closure::once_into_js(move || {
        with_page(|page| {
            page.scripts.finish(&src, Err("script error event".into()));
            page.refresh_all();
        });
    });
    script
        .add_event_listener_with_callback("load", on_load.unchecked_ref())
        .map_err(js_err)?;
    script
        .add_event_listener_with_callback("error", on_error.unchecked_ref())
        .map_err(js_err)?;
    Ok(())
}

impl ScriptHost for DomScripts {
    fn is_marked_loaded(&self, url: &str) -> bool {
        find_script(url)
            .and_then(|s| s.get_attribute(LOADED_MARKER_ATTR))
            .as_deref()
            == Some("true")
    }

    fn inject(&mut self, url: &str, strategy: LoadStrategy) -> Result<(), String> {
        // a script tag rendered by the host framework: wait for it
        if let Some(existing) = find_script(url) {
            return listen_for_settlement(&existing, url);
        }

        let document = document().ok_or("no document")?;
        let script: HtmlScriptElement = document
            .create_element("script")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| "created element is not a script".to_string())?;
        script.set_src(url);
        script.set_async(true);
        if strategy == LoadStrategy::LazyOnload {
            script.set_attribute("fetchpriority", "low").map_err(js_err)?;
        }
        listen_for_settlement(&script, url)?;

        let head = document.head().ok_or("document has no head")?;
        head.append_child(&script).map_err(js_err)?;
        Ok(())
    }

    fn mark_loaded(&mut self, url: &str) {
        if let Some(script) = find_script(url) {
            if let Err(e) = script.set_attribute(LOADED_MARKER_ATTR, "true") {
                log::warn!("cannot mark {url} loaded: {}", js_err(e));
            }
        }
    }
}

// ── Scene runtime ─────────────────────────────────────────────────────

struct BrowserRuntime {
    key: u32,
}

impl SceneRuntime for BrowserRuntime {
    fn add_scene(&mut self, attempt: AttemptId, config: &SceneConfig) -> Result<(), String> {
        let window = web_sys::window().ok_or("no window")?;
        let runtime = js_sys::Reflect::get(&window, &RUNTIME_GLOBAL.into()).map_err(js_err)?;
        let add_scene = js_sys::Reflect::get(&runtime, &"addScene".into())
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| format!("{RUNTIME_GLOBAL}.addScene not found"))?;

        let js_config = config
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| e.to_string())?;
        let pending = add_scene.call1(&runtime, &js_config).map_err(js_err)?;

        let key = self.key;
        wasm_bindgen_futures::spawn_local(async move {
            let outcome = match JsFuture::from(js_sys::Promise::resolve(&pending)).await {
                Ok(scene) if scene.is_falsy() => Ok(None),
                Ok(scene) => Ok(Some(Box::new(JsScene(scene)) as Box<dyn SceneHandle>)),
                Err(e) => Err(js_err(e)),
            };
            with_page(|page| page.settle(key, attempt, outcome));
        });
        Ok(())
    }
}

/// A scene object returned by the runtime's `addScene`.
struct JsScene(JsValue);

impl JsScene {
    fn call(&self, method: &str) {
        let Ok(function) = js_sys::Reflect::get(&self.0, &method.into())
            .and_then(|f| f.dyn_into::<js_sys::Function>())
        else {
            return;
        };
        if let Err(e) = function.call0(&self.0) {
            log::warn!("scene.{method}() threw: {}", js_err(e));
        }
    }
}

impl SceneHandle for JsScene {
    fn destroy(self: Box<Self>) {
        self.call("destroy");
    }

    fn resize(&mut self) {
        self.call("resize");
    }

    fn is_attached(&self) -> bool {
        js_sys::Reflect::get(&self.0, &"element".into())
            .ok()
            .and_then(|e| e.dyn_into::<web_sys::Node>().ok())
            .map(|node| node.is_connected())
            .unwrap_or(true)
    }
}

// ── Capability probe ──────────────────────────────────────────────────

struct CanvasProbe;

impl GraphicsProbe for CanvasProbe {
    fn create_accelerated_context(&self) -> Result<bool, String> {
        let document = document().ok_or("no document")?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| "created element is not a canvas".to_string())?;
        for kind in ["webgl", "experimental-webgl"] {
            if canvas.get_context(kind).map_err(js_err)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ── JS API ────────────────────────────────────────────────────────────

/// An embedded scene bound to one DOM element.
#[wasm_bindgen]
pub struct SceneElement {
    key: u32,
}

#[wasm_bindgen]
impl SceneElement {
    /// Create from a props object (`projectId`, `scale`, `fps`, ...).
    #[wasm_bindgen(constructor)]
    pub fn new(props: JsValue) -> Result<SceneElement, JsError> {
        let props: SceneProps =
            serde_wasm_bindgen::from_value(props).map_err(|e| JsError::new(&e.to_string()))?;
        let key = with_page(|page| page.insert(props));
        Ok(SceneElement { key })
    }

    #[wasm_bindgen(js_name = onLoad)]
    pub fn on_load(&self, callback: js_sys::Function) {
        LISTENERS.with(|l| l.borrow_mut().entry(self.key).or_default().on_load = Some(callback));
    }

    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&self, callback: js_sys::Function) {
        LISTENERS.with(|l| l.borrow_mut().entry(self.key).or_default().on_error = Some(callback));
    }

    /// Bind to `element` and start loading. Elements without an id get one.
    pub fn mount(&self, element: Element) -> String {
        let existing = element.id();
        let id = with_page(|page| {
            page.elements
                .get_mut(&self.key)
                .map(|scene| scene.bind_element(Some(existing.as_str())))
                .unwrap_or_default()
        });
        // the runtime looks the element up by id as soon as the scene starts
        if existing.is_empty() {
            element.set_id(&id);
        }
        self.paint(&element);

        let probe = web_sys::window().map(|_| CanvasProbe);
        with_page(|page| {
            page.drive(self.key, |scene, ctx| {
                scene.start(probe.as_ref().map(|p| p as &dyn GraphicsProbe), ctx);
            });
        });
        id
    }

    /// Apply new props; the scene is only rebuilt if they differ materially.
    pub fn update(&self, props: JsValue) -> Result<(), JsError> {
        let props: SceneProps =
            serde_wasm_bindgen::from_value(props).map_err(|e| JsError::new(&e.to_string()))?;
        with_page(|page| page.drive(self.key, move |scene, ctx| scene.set_props(props, ctx)));
        Ok(())
    }

    pub fn resize(&self) {
        with_page(|page| {
            if let Some(scene) = page.elements.get_mut(&self.key) {
                scene.resize();
            }
        });
    }

    pub fn unmount(&self) {
        with_page(|page| {
            if let Some(scene) = page.elements.get_mut(&self.key) {
                scene.unmount();
            }
        });
    }

    /// Container markup for the current state.
    pub fn render(&self) -> String {
        with_page(|page| {
            page.elements
                .get(&self.key)
                .map(|scene| scene.render())
                .unwrap_or_default()
        })
    }

    pub fn phase(&self) -> String {
        with_page(|page| {
            page.elements
                .get(&self.key)
                .map(|scene| scene.phase().name().to_string())
                .unwrap_or_default()
        })
    }

    #[wasm_bindgen(js_name = errorMessage)]
    pub fn error_message(&self) -> Option<String> {
        with_page(|page| {
            page.elements
                .get(&self.key)
                .and_then(|scene| scene.error().map(|e| e.to_string()))
        })
    }
}

impl SceneElement {
    /// Apply the container style to an element the page rendered itself.
    fn paint(&self, element: &Element) {
        let style = with_page(|page| {
            page.elements
                .get(&self.key)
                .map(|scene| crate::render::container_style(scene.props()))
        });
        if let Some(style) = style {
            if let Err(e) = element.set_attribute("style", &style) {
                log::warn!("cannot style scene container: {}", js_err(e));
            }
        }
    }
}

impl Drop for SceneElement {
    fn drop(&mut self) {
        let key = self.key;
        with_page(|page| {
            page.elements.remove(&key);
        });
        LISTENERS.with(|l| {
            l.borrow_mut().remove(&key);
        });
    }
}
