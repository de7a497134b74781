//! Component props, the resolved scene configuration handed to the
//! runtime, and the fingerprint used to detect material changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{EmbedError, Result};
use crate::validate::{self, Fps};

/// A width or height: a pixel count or any CSS length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(f64),
    Css(String),
}

impl Dimension {
    pub fn to_css(&self) -> String {
        match self {
            Dimension::Pixels(px) => format!("{px}px"),
            Dimension::Css(value) => value.clone(),
        }
    }
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension::Css(DEFAULT_DIMENSION.to_string())
    }
}

/// Everything a host page can configure on an embedded scene.
///
/// Deserializes from the camelCase props object; missing keys take the
/// defaults from [`crate::constants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneProps {
    pub project_id: Option<String>,
    pub json_file_path: Option<String>,
    pub width: Dimension,
    pub height: Dimension,
    pub scale: f64,
    pub dpi: f64,
    pub fps: u32,
    pub alt_text: String,
    pub aria_label: Option<String>,
    pub class_name: String,
    pub lazy_load: bool,
    pub production: bool,
    /// Image shown instead of the scene under the conditions below.
    pub placeholder: Option<String>,
    /// Class for a placeholder element styled by the host page.
    pub placeholder_class_name: Option<String>,
    pub show_placeholder_on_error: bool,
    pub show_placeholder_while_loading: bool,
}

impl Default for SceneProps {
    fn default() -> Self {
        Self {
            project_id: None,
            json_file_path: None,
            width: Dimension::default(),
            height: Dimension::default(),
            scale: DEFAULT_SCALE,
            dpi: DEFAULT_DPI,
            fps: DEFAULT_FPS,
            alt_text: DEFAULT_ALT_TEXT.to_string(),
            aria_label: None,
            class_name: String::new(),
            lazy_load: DEFAULT_LAZY_LOAD,
            production: DEFAULT_PRODUCTION,
            placeholder: None,
            placeholder_class_name: None,
            show_placeholder_on_error: DEFAULT_SHOW_PLACEHOLDER_ON_ERROR,
            show_placeholder_while_loading: DEFAULT_SHOW_PLACEHOLDER_WHILE_LOADING,
        }
    }
}

impl SceneProps {
    pub fn with_project_id(project_id: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_file_path(path: &str) -> Self {
        Self {
            json_file_path: Some(path.to_string()),
            ..Self::default()
        }
    }

    /// Parse a props object from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Accessible label, falling back to the alt text.
    pub fn effective_aria_label(&self) -> &str {
        match self.aria_label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.alt_text,
        }
    }

    pub fn has_placeholder(&self) -> bool {
        non_empty(self.placeholder.as_deref()).is_some()
            || non_empty(self.placeholder_class_name.as_deref()).is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Where the runtime should fetch the scene from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectSource {
    /// Hosted project id, without any query-string suffix.
    ProjectId(String),
    /// Self-hosted exported scene file.
    FilePath(String),
}

impl ProjectSource {
    /// Exactly one of the two must be present. Empty strings count as absent.
    pub fn resolve(project_id: Option<&str>, json_file_path: Option<&str>) -> Result<Self> {
        match (non_empty(project_id), non_empty(json_file_path)) {
            (Some(id), None) => {
                let id = id.split('?').next().unwrap_or(id);
                Ok(ProjectSource::ProjectId(id.to_string()))
            }
            (None, Some(path)) => Ok(ProjectSource::FilePath(path.to_string())),
            (None, None) => Err(EmbedError::missing_source()),
            (Some(_), Some(_)) => Err(EmbedError::conflicting_source()),
        }
    }

    pub fn from_props(props: &SceneProps) -> Result<Self> {
        Self::resolve(props.project_id.as_deref(), props.json_file_path.as_deref())
    }
}

/// The configuration object passed to the runtime's `addScene`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConfig {
    pub element_id: String,
    #[serde(flatten)]
    pub source: ProjectSource,
    pub scale: f64,
    pub dpi: f64,
    pub fps: Fps,
    pub lazy_load: bool,
    pub alt_text: String,
    pub aria_label: String,
    pub production: bool,
}

impl SceneConfig {
    /// Resolve props into a runtime config for the given element.
    pub fn build(element_id: &str, props: &SceneProps) -> Result<Self> {
        if let Some(msg) = validate::validate(props.scale, props.fps) {
            return Err(EmbedError::Validation(msg));
        }
        let fps = Fps::try_from(props.fps).map_err(|e| EmbedError::Validation(e.to_string()))?;
        let source = ProjectSource::from_props(props)?;
        Ok(Self {
            element_id: element_id.to_string(),
            source,
            scale: props.scale,
            dpi: props.dpi,
            fps,
            lazy_load: props.lazy_load,
            alt_text: props.alt_text.clone(),
            aria_label: props.effective_aria_label().to_string(),
            production: props.production,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Key over the props that force a re-initialization when changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(props: &SceneProps) -> Self {
        Self(format!(
            "{}-{}-{}-{}-{}-{}",
            props.project_id.as_deref().unwrap_or(""),
            props.json_file_path.as_deref().unwrap_or(""),
            props.scale,
            props.dpi,
            props.fps,
            if props.production { "prod" } else { "dev" },
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_defaults() {
        let props = SceneProps::from_json(r#"{ "projectId": "abc" }"#).unwrap();
        assert_eq!(props.project_id.as_deref(), Some("abc"));
        assert_eq!(props.scale, 1.0);
        assert_eq!(props.dpi, 1.5);
        assert_eq!(props.fps, 30);
        assert_eq!(props.width, Dimension::Css("100%".into()));
        assert!(props.lazy_load);
        assert!(props.production);
        assert_eq!(props.effective_aria_label(), "Scene");
        assert!(!props.has_placeholder());
    }

    #[test]
    fn props_numeric_and_string_dimensions() {
        let props =
            SceneProps::from_json(r#"{ "projectId": "abc", "width": 640, "height": "50vh" }"#)
                .unwrap();
        assert_eq!(props.width.to_css(), "640px");
        assert_eq!(props.height.to_css(), "50vh");
    }

    #[test]
    fn project_id_query_stripped() {
        let source = ProjectSource::resolve(Some("abc?update=1"), None).unwrap();
        assert_eq!(source, ProjectSource::ProjectId("abc".into()));
    }

    #[test]
    fn source_must_be_exactly_one() {
        assert_eq!(ProjectSource::resolve(None, None), Err(EmbedError::missing_source()));
        assert_eq!(
            ProjectSource::resolve(Some(""), Some("")),
            Err(EmbedError::missing_source())
        );
        assert_eq!(
            ProjectSource::resolve(Some("abc"), Some("/scene.json")),
            Err(EmbedError::conflicting_source())
        );
        assert_eq!(
            ProjectSource::resolve(None, Some("/scene.json")),
            Ok(ProjectSource::FilePath("/scene.json".into()))
        );
    }

    #[test]
    fn config_serializes_for_runtime() {
        let mut props = SceneProps::with_project_id("abc?x=1");
        props.aria_label = Some("Hero".into());
        let config = SceneConfig::build("scene-1", &props).unwrap();
        let value: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(value["elementId"], "scene-1");
        assert_eq!(value["projectId"], "abc");
        assert!(value.get("filePath").is_none());
        assert_eq!(value["fps"], 30);
        assert_eq!(value["ariaLabel"], "Hero");
        assert_eq!(value["lazyLoad"], true);
    }

    #[test]
    fn config_build_rejects_bad_props() {
        let mut props = SceneProps::with_file_path("/s.json");
        props.fps = 45;
        assert!(matches!(SceneConfig::build("e", &props), Err(EmbedError::Validation(_))));
        assert_eq!(
            SceneConfig::build("e", &SceneProps::default()),
            Err(EmbedError::missing_source())
        );
    }

    #[test]
    fn fingerprint_tracks_material_props_only() {
        let base = SceneProps::with_project_id("abc");
        let fp = Fingerprint::of(&base);
        assert_eq!(fp.as_str(), "abc--1-1.5-30-prod");

        let mut cosmetic = base.clone();
        cosmetic.alt_text = "Other".into();
        cosmetic.class_name = "hero".into();
        cosmetic.lazy_load = false;
        assert_eq!(Fingerprint::of(&cosmetic), fp);

        let mut material = base.clone();
        material.production = false;
        assert_ne!(Fingerprint::of(&material), fp);
        material = base;
        material.scale = 0.5;
        assert_ne!(Fingerprint::of(&material), fp);
    }
}
