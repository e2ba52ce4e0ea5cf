pub mod action;
pub mod artifacts;
pub mod control;
pub mod decision;

pub use action::{Action, Decision, StoryBounds, ACTION_NAMES};
pub use artifacts::RunArtifacts;
pub use control::{ControlLoop, FallbackNarrative, FallbackPolicy, LoopConfig, StepOutcome};
pub use decision::{Decider, DecisionRequest, DecisionSettings, HttpDecider, ScriptedDecider};
