//! The embeddable scene component: script loading, lifecycle and display
//! wired together for one element.

use std::time::Duration;

use crate::capability::{self, GraphicsProbe};
use crate::config::SceneProps;
use crate::constants::RUNTIME_SCRIPT_URL;
use crate::error::EmbedError;
use crate::lifecycle::{AttemptId, Phase, SceneManager, SceneOutcome, SceneRuntime, Transition};
use crate::loader::{LoadStrategy, ScriptLoadState, ScriptRegistry};
use crate::render;

/// What the component shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMode {
    /// The container is left to the runtime.
    Scene,
    /// Static fallback content.
    Placeholder,
    /// Error panel with a user-safe message.
    Error(String),
}

/// Page-level collaborators a component needs while it works.
pub struct HostContext<'a> {
    pub scripts: &'a mut ScriptRegistry,
    pub runtime: &'a mut dyn SceneRuntime,
    /// Monotonic page time.
    pub now: Duration,
}

type LoadCallback = Box<dyn FnMut()>;
type ErrorCallback = Box<dyn FnMut(&EmbedError)>;

pub struct EmbeddedScene {
    props: SceneProps,
    script_url: String,
    script: ScriptLoadState,
    script_error_reported: bool,
    graphics_supported: bool,
    mounted: bool,
    manager: SceneManager,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
}

impl EmbeddedScene {
    pub fn new(props: SceneProps) -> Self {
        Self {
            props,
            script_url: RUNTIME_SCRIPT_URL.to_string(),
            script: ScriptLoadState::default(),
            script_error_reported: false,
            graphics_supported: true,
            mounted: false,
            manager: SceneManager::new(),
            on_load: None,
            on_error: None,
        }
    }

    /// Load the runtime from somewhere other than the pinned CDN build.
    pub fn with_script_url(mut self, url: &str) -> Self {
        self.script_url = url.to_string();
        self
    }

    pub fn with_manager(mut self, manager: SceneManager) -> Self {
        self.manager = manager;
        self
    }

    /// Called once each time a scene becomes ready.
    pub fn on_load(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_load = Some(Box::new(callback));
        self
    }

    /// Called once for each failure: script load, validation, configuration
    /// or initialization.
    pub fn on_error(mut self, callback: impl FnMut(&EmbedError) + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Attach to an element and start loading. Returns the element id the
    /// scene is bound to (generated when `element_id` is `None`).
    ///
    /// The runtime may be asked for a scene before this returns, so a host
    /// that has to write a generated id into its DOM first should call
    /// [`bind_element`](Self::bind_element) and [`start`](Self::start).
    pub fn mount(
        &mut self,
        element_id: Option<&str>,
        probe: Option<&dyn GraphicsProbe>,
        ctx: &mut HostContext<'_>,
    ) -> String {
        let id = self.bind_element(element_id);
        self.start(probe, ctx);
        id
    }

    /// Choose the element id without touching the script or the runtime.
    pub fn bind_element(&mut self, element_id: Option<&str>) -> String {
        self.manager.bind_element(element_id)
    }

    /// Start loading against the bound element.
    pub fn start(&mut self, probe: Option<&dyn GraphicsProbe>, ctx: &mut HostContext<'_>) {
        if self.manager.element_id().is_none() {
            self.manager.bind_element(None);
        }
        self.graphics_supported = capability::graphics_supported(probe);
        self.mounted = true;
        self.refresh(ctx);
    }

    /// Re-render with new props. A materially different configuration
    /// replaces the scene; anything else leaves it alone.
    pub fn set_props(&mut self, props: SceneProps, ctx: &mut HostContext<'_>) {
        self.props = props;
        self.refresh(ctx);
    }

    /// Observe the script and drive the lifecycle forward. Hosts call this
    /// after the script settles and on every render.
    pub fn refresh(&mut self, ctx: &mut HostContext<'_>) {
        if !self.mounted {
            return;
        }
        let strategy = LoadStrategy::from_lazy_load(self.props.lazy_load);
        self.script = ctx.scripts.ensure_loaded(&self.script_url, strategy);

        if let Some(error) = self.script.error.clone() {
            if !self.script_error_reported {
                self.script_error_reported = true;
                self.emit(Some(Transition::Failed(error)));
            }
            return;
        }
        if !self.script.is_loaded {
            return;
        }

        let transition = self.manager.request(&self.props, ctx.runtime, ctx.now);
        self.emit(transition);
    }

    /// Deliver the result of a scene creation call started by this component.
    pub fn settle(&mut self, attempt: AttemptId, outcome: SceneOutcome) {
        let transition = self.manager.settle(attempt, outcome);
        self.emit(transition);
    }

    pub fn tick(&mut self, now: Duration) {
        let transition = self.manager.tick(now);
        self.emit(transition);
    }

    pub fn resize(&mut self) {
        self.manager.resize();
    }

    /// Tear the scene down unconditionally. Anything still in flight is
    /// ignored when it settles.
    pub fn unmount(&mut self) {
        self.manager.teardown();
        self.mounted = false;
        // a remount is a new lifecycle and reports the script failure again
        self.script_error_reported = false;
    }

    pub fn props(&self) -> &SceneProps {
        &self.props
    }

    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    pub fn script_state(&self) -> &ScriptLoadState {
        &self.script
    }

    pub fn phase(&self) -> &Phase {
        self.manager.phase()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.manager.deadline()
    }

    pub fn element_id(&self) -> Option<&str> {
        self.manager.element_id()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// The error being displayed, script failures first.
    pub fn error(&self) -> Option<&EmbedError> {
        self.script.error.as_ref().or_else(|| self.manager.error())
    }

    pub fn display(&self) -> DisplayMode {
        decide_display(
            &self.props,
            self.graphics_supported,
            self.manager.is_ready(),
            self.error(),
        )
    }

    pub fn render(&self) -> String {
        let id = self.element_id().unwrap_or_default();
        render::render_container(&self.props, id, &self.display())
    }

    fn emit(&mut self, transition: Option<Transition>) {
        match transition {
            Some(Transition::Ready) => {
                if let Some(on_load) = self.on_load.as_mut() {
                    on_load();
                }
            }
            Some(Transition::Failed(error)) => {
                if let Some(on_error) = self.on_error.as_mut() {
                    on_error(&error);
                }
            }
            None => {}
        }
    }
}

/// Placeholder beats error panel beats live scene.
///
/// The placeholder is only considered when one is configured, and then
/// shown without graphics support, while loading if requested, or on
/// error if requested.
pub fn decide_display(
    props: &SceneProps,
    graphics_supported: bool,
    scene_ready: bool,
    error: Option<&EmbedError>,
) -> DisplayMode {
    let show_placeholder = props.has_placeholder()
        && (!graphics_supported
            || (props.show_placeholder_while_loading && !scene_ready)
            || (props.show_placeholder_on_error && error.is_some()));

    if show_placeholder {
        DisplayMode::Placeholder
    } else if let Some(error) = error {
        DisplayMode::Error(error.to_string())
    } else {
        DisplayMode::Scene
    }
}
