//! Scene runtime location and default prop values.

use std::time::Duration;

/// Pinned version of the scene runtime script.
pub const RUNTIME_VERSION: &str = "1.4.26";

/// CDN location of the pinned runtime script.
pub const RUNTIME_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/gh/hiunicornstudio/unicornstudio.js@v1.4.26/dist/unicornStudio.umd.js";

/// Name of the global object the runtime installs on `window`.
pub const RUNTIME_GLOBAL: &str = "UnicornStudio";

/// Attribute set on the script element once it has executed. Survives
/// component remounts, unlike any in-memory state.
pub const LOADED_MARKER_ATTR: &str = "data-loaded";

/// How long a single scene creation may take before it is abandoned.
pub const INIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Prefix for ids generated for elements that have none.
pub const ELEMENT_ID_PREFIX: &str = "scene-";

pub const DEFAULT_DIMENSION: &str = "100%";
pub const DEFAULT_SCALE: f64 = 1.0;
pub const DEFAULT_DPI: f64 = 1.5;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_ALT_TEXT: &str = "Scene";
pub const DEFAULT_LAZY_LOAD: bool = true;
pub const DEFAULT_PRODUCTION: bool = true;
pub const DEFAULT_SHOW_PLACEHOLDER_ON_ERROR: bool = true;
pub const DEFAULT_SHOW_PLACEHOLDER_WHILE_LOADING: bool = true;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_pins_runtime_version() {
        assert!(RUNTIME_SCRIPT_URL.contains(&format!("@v{RUNTIME_VERSION}/")));
    }
}
