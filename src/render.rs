//! HTML markup for the scene container, placeholder overlay and error
//! panel. The runtime draws into the container; everything else here is
//! static fallback content.

use crate::component::DisplayMode;
use crate::config::{Dimension, SceneProps};

const CONTAINER_STYLE: &str =
    "position: relative; width: var(--scene-width); height: var(--scene-height);";
const OVERLAY_STYLE: &str = "position: absolute; inset: 0;";
const ERROR_WRAPPER_STYLE: &str =
    "display: flex; align-items: center; justify-content: center; height: 100%;";
const ERROR_BOX_STYLE: &str = "text-align: center; padding: 1rem; border-radius: 0.5rem; \
     background-color: rgb(254 242 242); color: rgb(239 68 68);";
const ERROR_TITLE_STYLE: &str = "font-weight: 600; margin-bottom: 0.25rem;";
const ERROR_MESSAGE_STYLE: &str = "font-size: 0.875rem; margin-top: 0.25rem;";

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Inline style for the container, including the resolved dimensions as
/// CSS custom properties.
pub fn container_style(props: &SceneProps) -> String {
    format!(
        "{CONTAINER_STYLE} --scene-width: {}; --scene-height: {};",
        props.width.to_css(),
        props.height.to_css()
    )
}

/// Render the full container for the given display decision.
pub fn render_container(props: &SceneProps, element_id: &str, display: &DisplayMode) -> String {
    let mut html = format!(
        r#"<div id="{}" style="{}""#,
        html_escape(element_id),
        html_escape(&container_style(props))
    );
    if !props.class_name.is_empty() {
        html.push_str(&format!(r#" class="{}""#, html_escape(&props.class_name)));
    }
    html.push('>');

    match display {
        DisplayMode::Scene => {}
        DisplayMode::Placeholder => html.push_str(&render_placeholder(props)),
        DisplayMode::Error(message) => html.push_str(&render_error_panel(message)),
    }

    html.push_str("</div>");
    html
}

/// Placeholder overlay: an image when `placeholder` is set, otherwise an
/// empty element carrying `placeholderClassName`.
pub fn render_placeholder(props: &SceneProps) -> String {
    let alt = html_escape(&props.alt_text);
    let inner = match (props.placeholder.as_deref(), props.placeholder_class_name.as_deref()) {
        (Some(src), _) if !src.is_empty() => {
            let size = match (&props.width, &props.height) {
                (Dimension::Pixels(w), Dimension::Pixels(h)) => {
                    format!(r#" width="{w}" height="{h}""#)
                }
                _ => String::new(),
            };
            format!(
                r#"<img src="{}" alt="{alt}"{size} style="width: 100%; height: 100%; object-fit: cover;">"#,
                html_escape(src)
            )
        }
        (_, Some(class)) if !class.is_empty() => format!(
            r#"<div class="{}" style="width: 100%; height: 100%;" aria-label="{alt}"></div>"#,
            html_escape(class)
        ),
        _ => String::new(),
    };
    format!(r#"<div style="{OVERLAY_STYLE}">{inner}</div>"#)
}

pub fn render_error_panel(message: &str) -> String {
    format!(
        r#"<div style="{ERROR_WRAPPER_STYLE}"><div style="{ERROR_BOX_STYLE}"><p style="{ERROR_TITLE_STYLE}">Error loading scene</p><p style="{ERROR_MESSAGE_STYLE}">{}</p></div></div>"#,
        html_escape(message)
    )
}
