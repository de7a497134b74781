//! Scene lifecycle for a single DOM element.
//!
//! The manager moves through `Idle → Validating → Initializing → Ready`,
//! with `Failed` reachable from validation or initialization and `Idle`
//! reachable from anywhere through [`SceneManager::teardown`]. Validation
//! runs synchronously inside [`SceneManager::request`], so `Validating` is
//! never observed between calls.
//!
//! Scene creation is asynchronous on the runtime side. Each attempt is
//! tagged with an [`AttemptId`]; a settlement or timeout only applies while
//! that attempt is still the current one, so results from abandoned
//! attempts can never touch state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, warn};

use crate::config::{Fingerprint, SceneConfig, SceneProps};
use crate::constants::{ELEMENT_ID_PREFIX, INIT_TIMEOUT};
use crate::error::EmbedError;
use crate::validate;

/// A live scene created by the runtime. Owned by exactly one manager.
pub trait SceneHandle {
    /// Release the scene and everything the runtime allocated for it.
    fn destroy(self: Box<Self>);

    /// Re-measure after the element changed size.
    fn resize(&mut self) {}

    /// Whether the scene still lives in its element.
    fn is_attached(&self) -> bool {
        true
    }
}

/// Outcome of a scene creation call: a scene, nothing, or a raw error.
pub type SceneOutcome = Result<Option<Box<dyn SceneHandle>>, String>;

/// The runtime's scene factory.
pub trait SceneRuntime {
    /// Start creating a scene. The result must be reported later through
    /// [`SceneManager::settle`] with the same `attempt`. An `Err` here means
    /// the call could not even be made (e.g. the runtime is missing).
    fn add_scene(&mut self, attempt: AttemptId, config: &SceneConfig) -> Result<(), String>;
}

/// Identifies one initialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable outcome of a lifecycle step, reported once per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Ready,
    Failed(EmbedError),
}

pub enum Phase {
    Idle,
    Initializing {
        attempt: AttemptId,
        fingerprint: Fingerprint,
        deadline: Duration,
    },
    Ready {
        fingerprint: Fingerprint,
        scene: Box<dyn SceneHandle>,
    },
    Failed {
        fingerprint: Fingerprint,
        error: EmbedError,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Initializing { .. } => "initializing",
            Phase::Ready { .. } => "ready",
            Phase::Failed { .. } => "failed",
        }
    }

    fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Phase::Idle => None,
            Phase::Initializing { fingerprint, .. }
            | Phase::Ready { fingerprint, .. }
            | Phase::Failed { fingerprint, .. } => Some(fingerprint),
        }
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("Idle"),
            Phase::Initializing {
                attempt,
                fingerprint,
                deadline,
            } => f
                .debug_struct("Initializing")
                .field("attempt", attempt)
                .field("fingerprint", fingerprint)
                .field("deadline", deadline)
                .finish(),
            Phase::Ready { fingerprint, .. } => f
                .debug_struct("Ready")
                .field("fingerprint", fingerprint)
                .finish_non_exhaustive(),
            Phase::Failed { fingerprint, error } => f
                .debug_struct("Failed")
                .field("fingerprint", fingerprint)
                .field("error", error)
                .finish(),
        }
    }
}

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

fn generate_element_id() -> String {
    let n = NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{ELEMENT_ID_PREFIX}{n}")
}

/// Owns the (at most one) scene bound to a DOM element.
#[derive(Debug)]
pub struct SceneManager {
    element_id: Option<String>,
    phase: Phase,
    last_attempt: u64,
    timeout: Duration,
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneManager {
    pub fn new() -> Self {
        Self {
            element_id: None,
            phase: Phase::Idle,
            last_attempt: 0,
            timeout: INIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind the target element, generating an id if it has none.
    /// Returns the id the runtime will be given.
    pub fn bind_element(&mut self, id: Option<&str>) -> String {
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_element_id(),
        };
        self.element_id = Some(id.clone());
        id
    }

    pub fn element_id(&self) -> Option<&str> {
        self.element_id.as_deref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready { .. })
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self.phase, Phase::Initializing { .. })
    }

    pub fn error(&self) -> Option<&EmbedError> {
        match &self.phase {
            Phase::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Deadline of the in-flight attempt, for hosts that schedule timers.
    pub fn deadline(&self) -> Option<Duration> {
        match &self.phase {
            Phase::Initializing { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// Bring the element's scene in line with `props`.
    ///
    /// Call whenever the script is loaded and the props may have changed.
    /// Unchanged configuration is a no-op in every phase: an in-flight
    /// attempt is not duplicated, a ready scene is kept, and a failure
    /// stays until the configuration changes. A changed configuration
    /// tears the current scene down before anything new is created.
    pub fn request(
        &mut self,
        props: &SceneProps,
        runtime: &mut dyn SceneRuntime,
        now: Duration,
    ) -> Option<Transition> {
        let element_id = self.element_id.clone()?;
        let fingerprint = Fingerprint::of(props);

        match &self.phase {
            Phase::Idle => {}
            Phase::Initializing { fingerprint: current, .. } if *current == fingerprint => {
                debug!("{element_id}: already initializing, skipping");
                return None;
            }
            Phase::Ready { fingerprint: current, scene } if *current == fingerprint => {
                if scene.is_attached() {
                    return None;
                }
                debug!("{element_id}: scene detached from its element, reinitializing");
                self.teardown();
            }
            Phase::Failed { fingerprint: current, .. } if *current == fingerprint => {
                return None;
            }
            _ => {
                debug!("{element_id}: configuration changed to {fingerprint}");
                self.teardown();
            }
        }

        debug!("{element_id}: validating");
        if let Some(msg) = validate::validate(props.scale, props.fps) {
            return Some(self.fail(fingerprint, EmbedError::Validation(msg)));
        }

        let config = match SceneConfig::build(&element_id, props) {
            Ok(config) => config,
            Err(e) => return Some(self.fail(fingerprint, e)),
        };

        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        debug!("{element_id}: initializing attempt {attempt}");
        self.phase = Phase::Initializing {
            attempt,
            fingerprint: fingerprint.clone(),
            deadline: now + self.timeout,
        };

        match runtime.add_scene(attempt, &config) {
            Ok(()) => None,
            Err(raw) => Some(self.fail(fingerprint, EmbedError::initialization(&raw))),
        }
    }

    /// Apply the result of a scene creation call.
    ///
    /// Only the current attempt can change state. A scene delivered for
    /// an abandoned attempt is destroyed on arrival so it cannot leak.
    pub fn settle(&mut self, attempt: AttemptId, outcome: SceneOutcome) -> Option<Transition> {
        let fingerprint = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Initializing {
                attempt: current,
                fingerprint,
                ..
            } if current == attempt => fingerprint,
            other => {
                self.phase = other;
                debug!("dropping late result for attempt {attempt}");
                if let Ok(Some(scene)) = outcome {
                    scene.destroy();
                }
                return None;
            }
        };

        match outcome {
            Ok(Some(scene)) => {
                debug!("attempt {attempt}: scene ready");
                self.phase = Phase::Ready { fingerprint, scene };
                Some(Transition::Ready)
            }
            Ok(None) => Some(self.fail(
                fingerprint,
                EmbedError::Initialization("Failed to initialize scene".to_string()),
            )),
            Err(raw) => Some(self.fail(fingerprint, EmbedError::initialization(&raw))),
        }
    }

    /// Expire the in-flight attempt if its deadline has passed.
    pub fn tick(&mut self, now: Duration) -> Option<Transition> {
        let Phase::Initializing {
            attempt,
            fingerprint,
            deadline,
        } = &self.phase
        else {
            return None;
        };
        if now < *deadline {
            return None;
        }
        warn!("attempt {attempt} timed out after {:?}", self.timeout);
        let fingerprint = fingerprint.clone();
        Some(self.fail(
            fingerprint,
            EmbedError::initialization("Scene initialization timeout"),
        ))
    }

    /// Destroy the current scene, if any, and return to `Idle`. Any
    /// in-flight attempt becomes stale.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Ready { scene, .. } => {
                debug!("destroying scene");
                scene.destroy();
            }
            Phase::Initializing { attempt, .. } => {
                debug!("abandoning attempt {attempt}");
            }
            Phase::Idle | Phase::Failed { .. } => {}
        }
    }

    pub fn resize(&mut self) {
        if let Phase::Ready { scene, .. } = &mut self.phase {
            scene.resize();
        }
    }

    /// Fingerprint of the configuration currently applied or being applied.
    pub fn applied_fingerprint(&self) -> Option<&Fingerprint> {
        self.phase.fingerprint()
    }

    fn fail(&mut self, fingerprint: Fingerprint, error: EmbedError) -> Transition {
        warn!(
            "{}: scene failed: {error}",
            self.element_id.as_deref().unwrap_or("<unbound>")
        );
        self.phase = Phase::Failed {
            fingerprint,
            error: error.clone(),
        };
        Transition::Failed(error)
    }
}

impl Drop for SceneManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct FakeScene {
        name: String,
        log: Log,
        attached: Rc<RefCell<bool>>,
    }

    impl SceneHandle for FakeScene {
        fn destroy(self: Box<Self>) {
            self.log.borrow_mut().push(format!("destroy {}", self.name));
        }

        fn resize(&mut self) {
            self.log.borrow_mut().push(format!("resize {}", self.name));
        }

        fn is_attached(&self) -> bool {
            *self.attached.borrow()
        }
    }

    #[derive(Default)]
    struct FakeRuntime {
        log: Log,
        calls: Vec<(AttemptId, SceneConfig)>,
        refuse: Option<String>,
    }

    impl SceneRuntime for FakeRuntime {
        fn add_scene(&mut self, attempt: AttemptId, config: &SceneConfig) -> Result<(), String> {
            if let Some(reason) = &self.refuse {
                return Err(reason.clone());
            }
            self.log.borrow_mut().push(format!("add {attempt}"));
            self.calls.push((attempt, config.clone()));
            Ok(())
        }
    }

    impl FakeRuntime {
        fn scene(&self, name: &str) -> Box<dyn SceneHandle> {
            Box::new(FakeScene {
                name: name.to_string(),
                log: self.log.clone(),
                attached: Rc::new(RefCell::new(true)),
            })
        }

        fn last_attempt(&self) -> AttemptId {
            self.calls.last().expect("no add_scene call").0
        }
    }

    fn bound() -> SceneManager {
        let mut mgr = SceneManager::new();
        mgr.bind_element(Some("hero"));
        mgr
    }

    const T0: Duration = Duration::ZERO;

    #[test]
    fn no_element_no_work() {
        let mut mgr = SceneManager::new();
        let mut rt = FakeRuntime::default();
        assert_eq!(mgr.request(&SceneProps::with_project_id("abc"), &mut rt, T0), None);
        assert!(rt.calls.is_empty());
        assert!(matches!(mgr.phase(), Phase::Idle));
    }

    #[test]
    fn generated_element_ids_are_unique() {
        let mut a = SceneManager::new();
        let mut b = SceneManager::new();
        let ida = a.bind_element(None);
        let idb = b.bind_element(Some(""));
        assert!(ida.starts_with(ELEMENT_ID_PREFIX));
        assert_ne!(ida, idb);
        assert_eq!(a.element_id(), Some(ida.as_str()));
    }

    #[test]
    fn successful_initialization() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let props = SceneProps::with_project_id("abc?v=2");
        assert_eq!(mgr.request(&props, &mut rt, T0), None);
        assert!(mgr.is_initializing());
        assert_eq!(mgr.deadline(), Some(INIT_TIMEOUT));

        let (attempt, config) = rt.calls[0].clone();
        assert_eq!(config.element_id, "hero");
        assert_eq!(config.source, crate::config::ProjectSource::ProjectId("abc".into()));

        let scene = rt.scene("one");
        assert_eq!(mgr.settle(attempt, Ok(Some(scene))), Some(Transition::Ready));
        assert!(mgr.is_ready());
        assert_eq!(mgr.error(), None);
    }

    #[test]
    fn duplicate_request_while_initializing_is_dropped() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let props = SceneProps::with_project_id("abc");
        mgr.request(&props, &mut rt, T0);
        mgr.request(&props, &mut rt, T0);
        assert_eq!(rt.calls.len(), 1);
    }

    #[test]
    fn unchanged_ready_scene_is_kept() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let props = SceneProps::with_project_id("abc");
        mgr.request(&props, &mut rt, T0);
        mgr.settle(rt.last_attempt(), Ok(Some(rt.scene("one"))));

        let mut cosmetic = props.clone();
        cosmetic.class_name = "wide".into();
        assert_eq!(mgr.request(&cosmetic, &mut rt, T0), None);
        assert_eq!(rt.calls.len(), 1);
        assert!(mgr.is_ready());
    }

    #[test]
    fn detached_scene_is_recreated() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let props = SceneProps::with_project_id("abc");
        mgr.request(&props, &mut rt, T0);
        let attached = Rc::new(RefCell::new(true));
        let scene = Box::new(FakeScene {
            name: "one".into(),
            log: rt.log.clone(),
            attached: attached.clone(),
        });
        mgr.settle(rt.last_attempt(), Ok(Some(scene)));

        *attached.borrow_mut() = false;
        mgr.request(&props, &mut rt, T0);
        assert_eq!(rt.calls.len(), 2);
        assert_eq!(*rt.log.borrow(), ["add #1", "destroy one", "add #2"]);
    }

    #[test]
    fn config_change_destroys_before_recreating() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let mut props = SceneProps::with_project_id("abc");
        mgr.request(&props, &mut rt, T0);
        mgr.settle(rt.last_attempt(), Ok(Some(rt.scene("one"))));

        props.fps = 60;
        mgr.request(&props, &mut rt, T0);
        assert_eq!(*rt.log.borrow(), ["add #1", "destroy one", "add #2"]);
        assert!(mgr.is_initializing());
    }

    #[test]
    fn config_change_while_initializing_abandons_attempt() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let mut props = SceneProps::with_project_id("abc");
        mgr.request(&props, &mut rt, T0);
        let stale = rt.last_attempt();

        props.scale = 0.5;
        mgr.request(&props, &mut rt, T0);
        let current = rt.last_attempt();
        assert_ne!(stale, current);

        // the stale scene shows up late: destroyed, state untouched
        assert_eq!(mgr.settle(stale, Ok(Some(rt.scene("stale")))), None);
        assert!(mgr.is_initializing());
        assert_eq!(rt.log.borrow().last().unwrap(), "destroy stale");

        assert_eq!(mgr.settle(current, Ok(Some(rt.scene("fresh")))), Some(Transition::Ready));
    }

    #[test]
    fn validation_failure_skips_runtime() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let mut props = SceneProps::with_project_id("abc");
        props.fps = 50;
        let t = mgr.request(&props, &mut rt, T0);
        assert!(matches!(t, Some(Transition::Failed(EmbedError::Validation(ref m))) if m.contains("fps")));
        assert!(rt.calls.is_empty());

        // sticky until the config changes
        assert_eq!(mgr.request(&props, &mut rt, T0), None);
        props.fps = 60;
        assert_eq!(mgr.request(&props, &mut rt, T0), None);
        assert_eq!(rt.calls.len(), 1);
    }

    #[test]
    fn missing_source_is_configuration_error() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let t = mgr.request(&SceneProps::default(), &mut rt, T0);
        assert_eq!(t, Some(Transition::Failed(EmbedError::missing_source())));
        assert!(rt.calls.is_empty());
    }

    #[test]
    fn empty_result_and_rejection() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        let mut props = SceneProps::with_project_id("abc");
        mgr.request(&props, &mut rt, T0);
        assert_eq!(
            mgr.settle(rt.last_attempt(), Ok(None)),
            Some(Transition::Failed(EmbedError::Initialization(
                "Failed to initialize scene".into()
            )))
        );

        props.dpi = 2.0;
        mgr.request(&props, &mut rt, T0);
        let t = mgr.settle(rt.last_attempt(), Err("Failed to fetch".into()));
        assert_eq!(
            t,
            Some(Transition::Failed(EmbedError::Initialization("Resource not found".into())))
        );
        assert_eq!(mgr.error().unwrap().to_string(), "Resource not found");
    }

    #[test]
    fn missing_runtime_fails_immediately() {
        let mut mgr = bound();
        let mut rt = FakeRuntime {
            refuse: Some("UnicornStudio.addScene not found".into()),
            ..FakeRuntime::default()
        };
        let t = mgr.request(&SceneProps::with_project_id("abc"), &mut rt, T0);
        assert!(matches!(t, Some(Transition::Failed(EmbedError::Initialization(_)))));
    }

    #[test]
    fn timeout_then_late_success_is_ignored() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        mgr.request(&SceneProps::with_project_id("abc"), &mut rt, T0);
        let attempt = rt.last_attempt();

        assert_eq!(mgr.tick(Duration::from_secs(14)), None);
        assert_eq!(
            mgr.tick(Duration::from_secs(15)),
            Some(Transition::Failed(EmbedError::Initialization("Loading timeout".into())))
        );
        assert_eq!(mgr.tick(Duration::from_secs(30)), None);

        assert_eq!(mgr.settle(attempt, Ok(Some(rt.scene("late")))), None);
        assert_eq!(mgr.error().unwrap().to_string(), "Loading timeout");
        assert_eq!(rt.log.borrow().last().unwrap(), "destroy late");
    }

    #[test]
    fn custom_timeout() {
        let mut mgr = SceneManager::new().with_timeout(Duration::from_millis(100));
        mgr.bind_element(Some("e"));
        let mut rt = FakeRuntime::default();
        mgr.request(&SceneProps::with_project_id("abc"), &mut rt, Duration::from_secs(1));
        assert_eq!(mgr.deadline(), Some(Duration::from_millis(1100)));
    }

    #[test]
    fn teardown_while_initializing() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        mgr.request(&SceneProps::with_project_id("abc"), &mut rt, T0);
        let attempt = rt.last_attempt();
        mgr.teardown();
        assert!(matches!(mgr.phase(), Phase::Idle));
        assert_eq!(mgr.settle(attempt, Ok(Some(rt.scene("orphan")))), None);
        assert!(matches!(mgr.phase(), Phase::Idle));
        assert_eq!(rt.log.borrow().last().unwrap(), "destroy orphan");
    }

    #[test]
    fn teardown_is_idempotent_and_drop_destroys() {
        let mut mgr = bound();
        let mut rt = FakeRuntime::default();
        mgr.request(&SceneProps::with_project_id("abc"), &mut rt, T0);
        mgr.settle(rt.last_attempt(), Ok(Some(rt.scene("one"))));
        mgr.resize();
        mgr.teardown();
        mgr.teardown();
        assert_eq!(*rt.log.borrow(), ["add #1", "resize one", "destroy one"]);

        let mut mgr = bound();
        mgr.request(&SceneProps::with_project_id("abc"), &mut rt, T0);
        mgr.settle(rt.last_attempt(), Ok(Some(rt.scene("two"))));
        drop(mgr);
        assert_eq!(rt.log.borrow().last().unwrap(), "destroy two");
    }
}
