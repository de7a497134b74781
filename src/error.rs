/// All errors surfaced by an embedded scene.
///
/// Every variant carries a message that is safe to show to end users.
/// Raw runtime messages go through [`sanitize_message`] before they are
/// stored, so resource locations never reach the display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbedError {
    /// Neither or both of `projectId` / `jsonFilePath` were given.
    #[error("{0}")]
    Configuration(String),
    /// `scale` or `fps` outside their allowed domains.
    #[error("{0}")]
    Validation(String),
    /// The scene runtime script failed to fetch or execute.
    #[error("Failed to load script")]
    ScriptLoad,
    /// Scene creation rejected, returned nothing, or timed out.
    #[error("{0}")]
    Initialization(String),
}

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Shorthand constructors.
impl EmbedError {
    pub fn missing_source() -> Self {
        Self::Configuration("No project ID or JSON file path provided".to_string())
    }

    pub fn conflicting_source() -> Self {
        Self::Configuration(
            "Provide either a project ID or a JSON file path, not both".to_string(),
        )
    }

    /// Initialization failure from a raw runtime message. The raw text is
    /// logged and replaced by its user-safe category.
    pub fn initialization(raw: &str) -> Self {
        let message = sanitize_message(raw);
        if message != raw {
            log::warn!("scene initialization failed: {raw}");
        }
        Self::Initialization(message)
    }

    /// Whether the error came from the configuration itself rather than
    /// from loading. Configuration and validation errors only clear once
    /// the caller supplies a different configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Validation(_))
    }
}

/// Rewrite a runtime error message into one of the user-safe categories.
///
/// Messages that match no category pass through unchanged unless they
/// still contain a URL.
pub fn sanitize_message(raw: &str) -> String {
    if raw.contains("404") || raw.contains("Failed to fetch") {
        "Resource not found".to_string()
    } else if raw.contains("Network") || raw.contains("network") {
        "Network error occurred".to_string()
    } else if raw.contains("timeout") {
        "Loading timeout".to_string()
    } else if raw.contains("://") {
        "Failed to initialize scene".to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failures_become_not_found() {
        assert_eq!(sanitize_message("Failed to fetch"), "Resource not found");
        assert_eq!(
            sanitize_message("GET https://cdn.example.com/scene.json 404"),
            "Resource not found"
        );
    }

    #[test]
    fn network_and_timeout_categories() {
        assert_eq!(sanitize_message("NetworkError when attempting"), "Network error occurred");
        assert_eq!(sanitize_message("a network hiccup"), "Network error occurred");
        assert_eq!(sanitize_message("Scene initialization timeout"), "Loading timeout");
    }

    #[test]
    fn urls_never_pass_through() {
        let msg = sanitize_message("could not parse https://internal.host/projects/abc");
        assert!(!msg.contains("://"));
        assert_eq!(msg, "Failed to initialize scene");
    }

    #[test]
    fn plain_messages_pass_through() {
        assert_eq!(sanitize_message("Failed to initialize scene"), "Failed to initialize scene");
    }

    #[test]
    fn initialization_constructor_sanitizes() {
        let err = EmbedError::initialization("Failed to fetch");
        assert_eq!(err.to_string(), "Resource not found");
        assert!(!err.is_config_error());
        assert!(EmbedError::missing_source().is_config_error());
    }

    #[test]
    fn script_load_message_is_generic() {
        assert_eq!(EmbedError::ScriptLoad.to_string(), "Failed to load script");
    }
}
