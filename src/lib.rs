pub mod capability;
pub mod component;
pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod render;
pub mod validate;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use component::{DisplayMode, EmbeddedScene, HostContext};
pub use config::{Dimension, Fingerprint, ProjectSource, SceneConfig, SceneProps};
pub use error::{EmbedError, Result};
pub use lifecycle::{AttemptId, Phase, SceneHandle, SceneManager, SceneOutcome, SceneRuntime, Transition};
pub use loader::{LoadStrategy, ScriptHost, ScriptLoadState, ScriptRegistry};

/// Check a props object without mounting anything.
///
/// Runs the same validation and source resolution as scene
/// initialization and returns the runtime config the scene would get.
pub fn check_props(props: &SceneProps, element_id: &str) -> Result<SceneConfig> {
    SceneConfig::build(element_id, props)
}

/// Render the static container markup for `props` in the given state.
pub fn render_static(props: &SceneProps, element_id: &str, display: &DisplayMode) -> String {
    render::render_container(props, element_id, display)
}
