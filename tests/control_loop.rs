use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use franz::agent::{
    Action, ControlLoop, Decider, Decision, DecisionRequest, FallbackNarrative, LoopConfig,
    RunArtifacts, ScriptedDecider, StepOutcome, StoryBounds,
};
use franz::coords::{CoordinateSpace, ScreenSize};
use franz::error::AgentError;
use franz::input::{InputTiming, Injector};
use franz::overlay::hud::HudConfig;
use franz::overlay::{AttendTarget, AttentionManager, Hud, MarkerConfig, SurfaceEvent, SurfaceKind};
use franz::platform::headless::HeadlessPlatform;
use tempfile::tempdir;

const SCREEN: ScreenSize = ScreenSize::new(1920, 1080);
const OPENING: &str = "opening story";

/// Replays queued answers and remembers the story each request carried.
#[derive(Clone, Default)]
struct QueueDecider {
    answers: Arc<Mutex<VecDeque<Result<Decision, AgentError>>>>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl QueueDecider {
    fn push(&self, answer: Result<Decision, AgentError>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Decider for QueueDecider {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> anyhow::Result<Decision> {
        self.seen.lock().unwrap().push(request.story.to_string());
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::decision("queue empty")));
        Ok(answer?)
    }
}

fn decision(action: Action, story: &str) -> Decision {
    Decision {
        action,
        story: story.to_string(),
    }
}

fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    check()
}

fn config() -> LoopConfig {
    LoopConfig {
        target: ScreenSize::new(512, 288),
        settle: Duration::ZERO,
        retry_delay: Duration::ZERO,
        ..LoopConfig::default()
    }
}

struct Fixture {
    platform: HeadlessPlatform,
    hud: Hud,
}

impl Fixture {
    fn new() -> Self {
        let platform = HeadlessPlatform::new(SCREEN);
        let hud = Hud::open(
            platform.surfaces.clone(),
            SCREEN,
            &HudConfig::default(),
            false,
            OPENING,
        )
        .unwrap();
        Self { platform, hud }
    }

    fn control(
        &self,
        decider: Box<dyn Decider>,
        config: LoopConfig,
        artifacts: Option<RunArtifacts>,
    ) -> ControlLoop<'_> {
        let markers = AttentionManager::new(
            self.platform.surfaces.clone(),
            CoordinateSpace::new(SCREEN),
            MarkerConfig::default(),
        );
        let injector = Injector::new(self.platform.input.clone(), InputTiming::immediate());
        ControlLoop::new(
            &self.hud,
            markers,
            injector,
            self.platform.screen.as_ref(),
            decider,
            artifacts,
            config,
            OPENING,
        )
    }

    fn marker_labels(&self) -> Vec<String> {
        self.platform
            .surfaces
            .live(SurfaceKind::Marker)
            .into_iter()
            .map(|v| v.text)
            .collect()
    }
}

#[test]
fn decision_timeout_leaves_hud_alone_and_next_step_captures() {
    let fx = Fixture::new();
    let decider = QueueDecider::default();
    decider.push(Err(AgentError::decision("request timed out")));
    decider.push(Ok(decision(Action::Click { x: 500.0, y: 500.0 }, "clicked the middle")));
    let mut control = fx.control(Box::new(decider.clone()), config(), None);

    assert_eq!(control.step_once(), StepOutcome::DecisionFailed);
    assert_eq!(fx.hud.text().as_deref(), Some(OPENING));
    assert_eq!(fx.platform.screen.capture_count(), 1);
    assert!(fx.marker_labels().is_empty());

    assert_eq!(control.step_once(), StepOutcome::Executed("click"));
    assert_eq!(fx.platform.screen.capture_count(), 2);
    assert_eq!(fx.hud.text().as_deref(), Some("clicked the middle"));
    assert_eq!(fx.marker_labels(), ["click"]);
    assert!(!fx.platform.input.events().is_empty());
}

#[test]
fn capture_failure_skips_the_step() {
    let fx = Fixture::new();
    fx.platform.screen.fail_next(1);
    let decider = QueueDecider::default();
    let mut control = fx.control(Box::new(decider.clone()), config(), None);

    assert_eq!(control.step_once(), StepOutcome::CaptureFailed);
    assert!(decider.seen().is_empty());
    assert_eq!(control.step(), 1);
}

#[test]
fn operator_story_reaches_the_decider() {
    let fx = Fixture::new();
    let decider = QueueDecider::default();
    decider.push(Ok(decision(Action::Scroll { dy: -240 }, "scrolled")));
    let mut control = fx.control(Box::new(decider.clone()), config(), None);

    fx.hud.update("edited while paused");
    assert_eq!(control.step_once(), StepOutcome::Executed("scroll"));
    assert_eq!(decider.seen(), ["edited while paused"]);
    assert_eq!(fx.platform.input.events().len(), 2);
    assert!(fx.marker_labels().is_empty());
}

#[test]
fn attend_shows_markers_without_input_and_next_step_clears_them() {
    let fx = Fixture::new();
    let decider = QueueDecider::default();
    let targets: Vec<AttendTarget> = (0..6)
        .map(|i| AttendTarget::new(150.0 * i as f64, 500.0, format!("spot {i}")))
        .collect();
    decider.push(Ok(decision(Action::Attend { targets }, "looking around")));
    decider.push(Ok(decision(Action::Attend { targets: vec![] }, "nothing in view")));
    let mut control = fx.control(Box::new(decider.clone()), config(), None);

    assert_eq!(control.step_once(), StepOutcome::Observed);
    assert_eq!(fx.marker_labels().len(), 4);
    assert!(fx.platform.input.events().is_empty());

    assert_eq!(control.step_once(), StepOutcome::Observed);
    assert_eq!(fx.marker_labels(), ["Default"]);
}

#[test]
fn injection_failure_recovers_with_centre_marker() {
    let fx = Fixture::new();
    fx.platform.input.accept_at_most(Some(0));
    let decider = QueueDecider::default();
    decider.push(Ok(decision(
        Action::Drag {
            x1: 0.0,
            y1: 0.0,
            x2: 1000.0,
            y2: 1000.0,
        },
        "dragging",
    )));
    let mut control = fx.control(Box::new(decider.clone()), config(), None);

    assert_eq!(control.step_once(), StepOutcome::Recovered("drag"));
    assert_eq!(fx.marker_labels(), ["exec_error_recover"]);
    let marker = fx.platform.surfaces.latest(SurfaceKind::Marker).unwrap();
    assert_eq!(marker.bounds.center(), (960, 540));
    assert_eq!(fx.hud.text().as_deref(), Some("dragging"));
}

#[test]
fn fallback_narrative_policies() {
    let fx = Fixture::new();
    fx.platform.input.accept_at_most(Some(0));
    let decider = QueueDecider::default();
    decider.push(Ok(decision(Action::TypeText { text: "hi".into() }, "typing")));
    decider.push(Ok(decision(Action::RightClick { x: 10.0, y: 10.0 }, "menu")));

    let mut cfg = config();
    cfg.fallback.narrative = FallbackNarrative::Previous;
    cfg.fallback.attend_on_injection_failure = false;
    let mut control = fx.control(Box::new(decider.clone()), cfg.clone(), None);
    assert_eq!(control.step_once(), StepOutcome::Recovered("type_text"));
    assert_eq!(fx.hud.text().as_deref(), Some(OPENING));
    assert!(fx.marker_labels().is_empty());
    drop(control);

    cfg.fallback.narrative = FallbackNarrative::Annotated;
    let mut control = fx.control(Box::new(decider.clone()), cfg, None);
    control.step_once();
    let text = fx.hud.text().unwrap();
    assert!(text.starts_with("menu"));
    assert!(text.contains("right_click failed"));
}

#[test]
fn decision_failure_marker_is_optional() {
    let fx = Fixture::new();
    let decider = QueueDecider::default();
    decider.push(Err(AgentError::decision("bad schema")));
    let mut cfg = config();
    cfg.fallback.attend_on_decision_failure = true;
    let mut control = fx.control(Box::new(decider.clone()), cfg, None);

    assert_eq!(control.step_once(), StepOutcome::DecisionFailed);
    assert_eq!(fx.marker_labels(), ["decision_error_recover"]);
    assert_eq!(fx.hud.text().as_deref(), Some(OPENING));
}

#[test]
fn scripted_run_writes_artifacts_and_cleans_up() {
    let fx = Fixture::new();
    let root = tempdir().unwrap();
    let artifacts = RunArtifacts::create(root.path()).unwrap();
    let dir = artifacts.dir().to_path_buf();
    let mut cfg = config();
    cfg.max_steps = Some(7);
    let mut control = fx.control(
        Box::new(ScriptedDecider::new(StoryBounds::default())),
        cfg,
        Some(artifacts),
    );

    assert_eq!(control.run(), 7);
    for step in 1..=7 {
        assert!(dir.join(format!("step{step:03}.png")).exists());
    }
    let log = fs::read_to_string(dir.join("execution-log.txt")).unwrap();
    assert_eq!(log.matches("=== ").count(), 7);
    assert!(log.contains("type_text"));
    assert!(fx.marker_labels().is_empty());
    assert!(fx.hud.text().unwrap().contains("TURN 007"));
}

#[test]
fn closed_hud_ends_the_loop() {
    let fx = Fixture::new();
    let id = fx.platform.surfaces.latest(SurfaceKind::Hud).unwrap().id;
    fx.platform.surfaces.emit(id, SurfaceEvent::Close);
    assert!(fx.hud.stop_signal().wait_timeout(Duration::from_secs(2)));

    let decider = QueueDecider::default();
    let mut control = fx.control(Box::new(decider.clone()), config(), None);
    assert_eq!(control.run(), 0);
    assert_eq!(fx.platform.screen.capture_count(), 0);
}

#[test]
fn paused_loop_stays_idle_until_resumed() {
    let fx = Fixture::new();
    fx.hud.toggle_pause();
    assert!(wait_until(|| fx.hud.is_paused()));

    let decider = QueueDecider::default();
    decider.push(Ok(decision(Action::Click { x: 500.0, y: 500.0 }, "clicked")));
    decider.push(Ok(decision(Action::Scroll { dy: 120 }, "scrolled")));
    let mut cfg = config();
    cfg.max_steps = Some(2);

    let fx = &fx;
    thread::scope(|scope| {
        let loop_decider = decider.clone();
        let runner = scope.spawn(move || fx.control(Box::new(loop_decider), cfg, None).run());

        thread::sleep(Duration::from_millis(300));
        assert_eq!(fx.platform.screen.capture_count(), 0);
        assert!(decider.seen().is_empty());
        assert!(fx.platform.input.events().is_empty());

        let resumed = Instant::now();
        fx.hud.toggle_pause();
        assert!(wait_until(|| fx.platform.screen.capture_count() >= 1));
        assert!(
            resumed.elapsed() <= Duration::from_millis(200),
            "first capture took {:?}",
            resumed.elapsed()
        );

        assert_eq!(runner.join().unwrap(), 2);
    });
    assert_eq!(decider.seen().len(), 2);
    assert!(!fx.platform.input.events().is_empty());
}
