//! The step loop: wait, capture, decide, route, settle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::action::{Action, Decision};
use crate::agent::artifacts::{image_name, RunArtifacts};
use crate::agent::decision::{Decider, DecisionRequest};
use crate::coords::{CoordinateSpace, ScreenSize};
use crate::error::{classify, AgentError};
use crate::input::Injector;
use crate::overlay::{AttendTarget, AttentionManager, Hud};
use crate::screen::{capture_encoded, EncodedImage, ScreenSource};

/// What the HUD shows after an action could not be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackNarrative {
    /// The failed decision's own story.
    #[default]
    Decision,
    /// Leave the HUD as it was.
    Previous,
    /// The decision's story followed by a failure note.
    Annotated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    #[serde(default)]
    pub narrative: FallbackNarrative,
    #[serde(default = "default_true")]
    pub attend_on_injection_failure: bool,
    #[serde(default)]
    pub attend_on_decision_failure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            narrative: FallbackNarrative::default(),
            attend_on_injection_failure: true,
            attend_on_decision_failure: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Size of the image handed to the decider.
    pub target: ScreenSize,
    pub settle: Duration,
    pub retry_delay: Duration,
    pub fallback: FallbackPolicy,
    pub max_steps: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target: ScreenSize::new(1536, 864),
            settle: Duration::from_millis(300),
            retry_delay: Duration::from_secs(1),
            fallback: FallbackPolicy::default(),
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    CaptureFailed,
    DecisionFailed,
    /// An `attend` decision was shown.
    Observed,
    Executed(&'static str),
    /// Execution failed and the fallback ran instead.
    Recovered(&'static str),
}

pub struct ControlLoop<'h> {
    hud: &'h Hud,
    markers: AttentionManager,
    injector: Injector,
    coords: CoordinateSpace,
    screen: &'h dyn ScreenSource,
    decider: Box<dyn Decider>,
    artifacts: Option<RunArtifacts>,
    config: LoopConfig,
    step: u64,
    last_story: String,
}

impl<'h> ControlLoop<'h> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hud: &'h Hud,
        markers: AttentionManager,
        injector: Injector,
        screen: &'h dyn ScreenSource,
        decider: Box<dyn Decider>,
        artifacts: Option<RunArtifacts>,
        config: LoopConfig,
        initial_story: &str,
    ) -> Self {
        Self {
            hud,
            markers,
            injector,
            coords: CoordinateSpace::new(screen.screen_size()),
            screen,
            decider,
            artifacts,
            config,
            step: 0,
            last_story: initial_story.to_string(),
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Run until the HUD is closed (or `max_steps` is reached). Returns the
    /// number of steps taken. Markers are gone when this returns.
    pub fn run(&mut self) -> u64 {
        tracing::info!(target = ?self.config.target, "control loop started");
        loop {
            if self.config.max_steps.is_some_and(|max| self.step >= max) {
                break;
            }
            if !self.hud.wait_until_running() {
                break;
            }
            let outcome = self.step_once();
            tracing::debug!(step = self.step, ?outcome, "step finished");
        }
        self.markers.hide_all();
        tracing::info!(steps = self.step, "control loop stopped");
        self.step
    }

    /// One full step. Every failure is absorbed here.
    pub fn step_once(&mut self) -> StepOutcome {
        self.step += 1;
        let step = self.step;

        let image = match capture_encoded(self.screen, self.config.target) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(step, kind = err.kind(), error = %err, "frame skipped");
                self.sleep(self.config.retry_delay);
                return StepOutcome::CaptureFailed;
            }
        };
        self.save_image(step, &image);

        self.markers.hide_all();

        // The operator may have rewritten the HUD while paused.
        if let Some(text) = self.hud.text() {
            self.last_story = text;
        }
        let request = DecisionRequest {
            step,
            image: &image,
            story: &self.last_story,
        };
        let decision = match self.decider.decide(&request) {
            Ok(decision) => decision,
            Err(err) => {
                let kind = classify(&err).map_or("DecisionFailure", AgentError::kind);
                tracing::warn!(step, kind, error = %err, "decision failed");
                if self.config.fallback.attend_on_decision_failure {
                    self.markers
                        .show(AttendTarget::center("decision_error_recover"), self.hud.zoom());
                }
                self.sleep(self.config.retry_delay);
                return StepOutcome::DecisionFailed;
            }
        };

        let name = decision.action.name();
        tracing::info!(step, action = name, "decided");
        let (outcome, narrative) = self.route(step, &decision);

        if let Some(text) = narrative {
            self.hud.update(&text);
            self.last_story = text;
        }
        self.append_log(step, name, &decision.story);
        self.sleep(self.config.settle);
        outcome
    }

    fn route(&mut self, step: u64, decision: &Decision) -> (StepOutcome, Option<String>) {
        let story = decision.story.clone();
        if let Action::Attend { targets } = &decision.action {
            self.markers.show_multiple(targets, self.hud.zoom());
            return (StepOutcome::Observed, Some(story));
        }

        let name = decision.action.name();
        match self.execute(&decision.action) {
            Ok(()) => {
                if let Some(target) = decision.action.feedback_target() {
                    self.markers.show(target, self.hud.zoom());
                }
                (StepOutcome::Executed(name), Some(story))
            }
            Err(err) => {
                tracing::error!(step, kind = err.kind(), action = name, error = %err, "action failed");
                let fallback = &self.config.fallback;
                if fallback.attend_on_injection_failure {
                    self.markers
                        .show(AttendTarget::center("exec_error_recover"), self.hud.zoom());
                }
                let narrative = match fallback.narrative {
                    FallbackNarrative::Decision => Some(story),
                    FallbackNarrative::Previous => None,
                    FallbackNarrative::Annotated => {
                        Some(format!("{story}\n\n[step {step:03}: {name} failed: {err}]"))
                    }
                };
                (StepOutcome::Recovered(name), narrative)
            }
        }
    }

    fn execute(&self, action: &Action) -> Result<(), AgentError> {
        let device = |x: f64, y: f64| self.coords.normalized_to_device(x, y);
        match action {
            Action::Click { x, y } => {
                let (dx, dy) = device(*x, *y);
                self.injector.click(dx, dy)
            }
            Action::DoubleClick { x, y } => {
                let (dx, dy) = device(*x, *y);
                self.injector.double_click(dx, dy)
            }
            Action::RightClick { x, y } => {
                let (dx, dy) = device(*x, *y);
                self.injector.right_click(dx, dy)
            }
            Action::Drag { x1, y1, x2, y2 } => {
                self.injector.drag(device(*x1, *y1), device(*x2, *y2))
            }
            Action::TypeText { text } => self.injector.type_text(text),
            Action::Scroll { dy } => self.injector.scroll(*dy),
            Action::Attend { .. } => Ok(()),
        }
    }

    fn save_image(&self, step: u64, image: &EncodedImage) {
        if let Some(artifacts) = &self.artifacts {
            if let Err(err) = artifacts.save_image(step, image) {
                tracing::warn!(step, error = %err, "could not save step image");
            }
        }
    }

    fn append_log(&self, step: u64, action: &str, story: &str) {
        if let Some(artifacts) = &self.artifacts {
            if let Err(err) = artifacts.append_log(&image_name(step), action, story) {
                tracing::warn!(step, error = %err, "could not append execution log");
            }
        }
    }

    /// Sleep, but wake as soon as the HUD goes away.
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            self.hud.stop_signal().wait_timeout(duration);
        }
    }
}
