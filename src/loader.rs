//! Load-once registry for the external runtime script.
//!
//! A page owns one [`ScriptRegistry`]. Each distinct URL gets exactly one
//! injection for the page's lifetime, however many components ask for it
//! and whenever they start asking. Completion is reported back by the host
//! through [`ScriptRegistry::finish`]; entries only ever move forward
//! (pending → loaded or failed).

use std::collections::HashMap;

use crate::error::EmbedError;

/// When the host should fetch the script. Only a hint; hosts with a
/// framework-level script loader map it onto their own strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Fetch as soon as the page is interactive.
    AfterInteractive,
    /// Fetch once the browser is idle.
    LazyOnload,
}

impl LoadStrategy {
    pub fn from_lazy_load(lazy_load: bool) -> Self {
        if lazy_load {
            LoadStrategy::LazyOnload
        } else {
            LoadStrategy::AfterInteractive
        }
    }
}

/// What a consumer sees of a script load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptLoadState {
    pub is_loaded: bool,
    pub error: Option<EmbedError>,
}

impl ScriptLoadState {
    fn pending() -> Self {
        Self::default()
    }

    fn loaded() -> Self {
        Self {
            is_loaded: true,
            error: None,
        }
    }

    fn failed() -> Self {
        Self {
            is_loaded: false,
            error: Some(EmbedError::ScriptLoad),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.is_loaded || self.error.is_some()
    }
}

/// The page-side effects of loading a script.
pub trait ScriptHost {
    /// Whether the resource for `url` already carries the durable
    /// "loaded" marker from an earlier load on this page.
    fn is_marked_loaded(&self, url: &str) -> bool;

    /// Start fetching and executing `url`. The outcome must later be
    /// reported through [`ScriptRegistry::finish`].
    fn inject(&mut self, url: &str, strategy: LoadStrategy) -> Result<(), String>;

    /// Set the durable "loaded" marker on the resource for `url`.
    fn mark_loaded(&mut self, url: &str);
}

/// Per-URL script load state shared by every consumer on a page.
pub struct ScriptRegistry {
    host: Box<dyn ScriptHost>,
    entries: HashMap<String, ScriptLoadState>,
}

impl ScriptRegistry {
    pub fn new(host: Box<dyn ScriptHost>) -> Self {
        Self {
            host,
            entries: HashMap::new(),
        }
    }

    /// Make sure `url` is loaded or loading, and report where it stands.
    ///
    /// The first call for a URL either picks up the resource's loaded
    /// marker or injects the script; every later call only observes.
    pub fn ensure_loaded(&mut self, url: &str, strategy: LoadStrategy) -> ScriptLoadState {
        if let Some(state) = self.entries.get(url) {
            return state.clone();
        }

        let state = if self.host.is_marked_loaded(url) {
            log::debug!("script already loaded: {url}");
            ScriptLoadState::loaded()
        } else {
            log::info!("injecting script {url} ({strategy:?})");
            match self.host.inject(url, strategy) {
                Ok(()) => ScriptLoadState::pending(),
                Err(e) => {
                    log::warn!("script injection failed for {url}: {e}");
                    ScriptLoadState::failed()
                }
            }
        };
        self.entries.insert(url.to_string(), state.clone());
        state
    }

    /// Record the outcome of a load started by [`ScriptHost::inject`].
    ///
    /// The first settlement wins; an entry that is already loaded or
    /// failed keeps its state.
    pub fn finish(&mut self, url: &str, outcome: Result<(), String>) -> ScriptLoadState {
        let entry = self
            .entries
            .entry(url.to_string())
            .or_insert_with(ScriptLoadState::pending);
        if entry.is_settled() {
            log::debug!("ignoring repeated settlement for {url}");
            return entry.clone();
        }

        match outcome {
            Ok(()) => {
                *entry = ScriptLoadState::loaded();
                self.host.mark_loaded(url);
                log::debug!("script loaded: {url}");
            }
            Err(e) => {
                *entry = ScriptLoadState::failed();
                log::warn!("script failed to load: {url}: {e}");
            }
        }
        entry.clone()
    }

    /// Observe a URL without triggering a load.
    pub fn status(&self, url: &str) -> ScriptLoadState {
        self.entries.get(url).cloned().unwrap_or_default()
    }
}
