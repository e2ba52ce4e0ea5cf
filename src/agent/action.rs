//! The action vocabulary the decision service may answer with.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AgentError;
use crate::overlay::AttendTarget;

pub const ACTION_NAMES: [&str; 7] = [
    "click",
    "double_click",
    "right_click",
    "drag",
    "type_text",
    "scroll",
    "attend",
];
pub const SCROLL_LIMIT: i32 = 3000;

/// Coordinates are normalized `[0, 1000]`; they are not range-checked here
/// because the coordinate transform clamps them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    RightClick { x: f64, y: f64 },
    Drag { x1: f64, y1: f64, x2: f64, y2: f64 },
    TypeText { text: String },
    Scroll { dy: i32 },
    Attend { targets: Vec<AttendTarget> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::DoubleClick { .. } => "double_click",
            Self::RightClick { .. } => "right_click",
            Self::Drag { .. } => "drag",
            Self::TypeText { .. } => "type_text",
            Self::Scroll { .. } => "scroll",
            Self::Attend { .. } => "attend",
        }
    }

    /// `attend` only highlights; it never reaches the injector.
    pub fn is_observation(&self) -> bool {
        matches!(self, Self::Attend { .. })
    }

    /// Where to put a confirmation marker once the action succeeded.
    pub fn feedback_target(&self) -> Option<AttendTarget> {
        match self {
            Self::Click { x, y } | Self::DoubleClick { x, y } | Self::RightClick { x, y } => {
                Some(AttendTarget::new(*x, *y, self.name()))
            }
            Self::Drag { x2, y2, .. } => Some(AttendTarget::new(*x2, *y2, "drag_end")),
            _ => None,
        }
    }
}

/// Accepted narrative length in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for StoryBounds {
    fn default() -> Self {
        Self {
            min: 200,
            max: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub story: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PointArgs {
    x: f64,
    y: f64,
    story: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DragArgs {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    story: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeTextArgs {
    text: String,
    story: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScrollArgs {
    dy: f64,
    story: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AttendArgs {
    #[serde(default)]
    targets: Value,
    story: String,
}

fn parse_args<T: DeserializeOwned>(name: &str, arguments: &Value) -> Result<T, AgentError> {
    T::deserialize(arguments)
        .map_err(|err| AgentError::decision(format!("invalid arguments for {name}: {err}")))
}

/// Non-object entries are skipped; missing coordinates default to the
/// centre and a missing label becomes blank (rendered as coordinates).
fn parse_targets(value: &Value) -> Vec<AttendTarget> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let coord = |key: &str| obj.get(key).and_then(Value::as_f64).unwrap_or(500.0);
            let label = obj
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            AttendTarget::new(coord("x"), coord("y"), label)
        })
        .collect()
}

fn clean_story(story: String, bounds: StoryBounds) -> Result<String, AgentError> {
    let story = story.trim();
    if story.is_empty() {
        return Err(AgentError::decision("story is empty"));
    }
    let len = story.chars().count();
    if len < bounds.min {
        tracing::debug!(len, min = bounds.min, "story shorter than requested");
    }
    if len > bounds.max {
        return Ok(story.chars().take(bounds.max).collect());
    }
    Ok(story.to_string())
}

impl Decision {
    /// Validate one tool call. The name is matched case-insensitively.
    pub fn from_tool_call(
        name: &str,
        arguments: &Value,
        bounds: StoryBounds,
    ) -> Result<Self, AgentError> {
        let name = name.trim().to_lowercase();
        if !arguments.is_object() {
            return Err(AgentError::decision("tool arguments must be an object"));
        }
        let (action, story) = match name.as_str() {
            "click" | "double_click" | "right_click" => {
                let PointArgs { x, y, story } = parse_args(&name, arguments)?;
                let action = match name.as_str() {
                    "click" => Action::Click { x, y },
                    "double_click" => Action::DoubleClick { x, y },
                    _ => Action::RightClick { x, y },
                };
                (action, story)
            }
            "drag" => {
                let DragArgs {
                    x1,
                    y1,
                    x2,
                    y2,
                    story,
                } = parse_args(&name, arguments)?;
                (Action::Drag { x1, y1, x2, y2 }, story)
            }
            "type_text" => {
                let TypeTextArgs { text, story } = parse_args(&name, arguments)?;
                (Action::TypeText { text }, story)
            }
            "scroll" => {
                let ScrollArgs { dy, story } = parse_args(&name, arguments)?;
                if !dy.is_finite() {
                    return Err(AgentError::decision("scroll delta is not a number"));
                }
                let dy = dy.clamp(-(SCROLL_LIMIT as f64), SCROLL_LIMIT as f64) as i32;
                (Action::Scroll { dy }, story)
            }
            "attend" => {
                let AttendArgs { targets, story } = parse_args(&name, arguments)?;
                (
                    Action::Attend {
                        targets: parse_targets(&targets),
                    },
                    story,
                )
            }
            other => return Err(AgentError::decision(format!("unknown tool: {other:?}"))),
        };
        Ok(Self {
            action,
            story: clean_story(story, bounds)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(name: &str, args: Value) -> Result<Decision, AgentError> {
        Decision::from_tool_call(name, &args, StoryBounds::default())
    }

    #[test]
    fn click_with_integer_coordinates() {
        let d = parse("Click", json!({"x": 10, "y": 990, "story": "looking"})).unwrap();
        assert_eq!(d.action, Action::Click { x: 10.0, y: 990.0 });
        assert_eq!(d.story, "looking");
    }

    #[test]
    fn out_of_range_coordinates_are_kept_for_clamping() {
        let d = parse("right_click", json!({"x": 1500, "y": -3, "story": "s"})).unwrap();
        assert_eq!(d.action, Action::RightClick { x: 1500.0, y: -3.0 });
    }

    #[test]
    fn scroll_delta_is_clamped() {
        let d = parse("scroll", json!({"dy": -9000, "story": "s"})).unwrap();
        assert_eq!(d.action, Action::Scroll { dy: -3000 });
    }

    #[test]
    fn malformed_calls_are_decision_failures() {
        let cases = [
            ("teleport", json!({"story": "s"})),
            ("click", json!({"x": 1, "story": "s"})),
            ("click", json!({"x": "left", "y": 1, "story": "s"})),
            ("click", json!({"x": 1, "y": 1, "story": "s", "force": true})),
            ("type_text", json!({"text": "hi", "story": "   "})),
            ("drag", json!([1, 2, 3])),
        ];
        for (name, args) in cases {
            let err = parse(name, args.clone()).unwrap_err();
            assert_eq!(err.kind(), "DecisionFailure", "{name} {args}");
        }
    }

    #[test]
    fn long_story_is_truncated_on_char_boundary() {
        let story = "é".repeat(2500);
        let d = parse("scroll", json!({"dy": 120, "story": story})).unwrap();
        assert_eq!(d.story.chars().count(), 2000);
    }

    #[test]
    fn attend_targets_are_lenient() {
        let d = parse(
            "attend",
            json!({
                "targets": [
                    {"x": 100, "y": 200, "label": "Menu"},
                    "junk",
                    {"label": "  "},
                ],
                "story": "s"
            }),
        )
        .unwrap();
        let Action::Attend { targets } = d.action else {
            panic!("expected attend");
        };
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], AttendTarget::new(100.0, 200.0, "Menu"));
        assert_eq!(targets[1].display_label(), "(500,500)");
    }

    #[test]
    fn attend_without_targets_is_empty() {
        let d = parse("attend", json!({"story": "s"})).unwrap();
        assert_eq!(d.action, Action::Attend { targets: vec![] });
        assert!(d.action.is_observation());
    }

    #[test]
    fn feedback_markers_follow_action() {
        let drag = Action::Drag {
            x1: 0.0,
            y1: 0.0,
            x2: 700.0,
            y2: 300.0,
        };
        assert_eq!(
            drag.feedback_target(),
            Some(AttendTarget::new(700.0, 300.0, "drag_end"))
        );
        assert_eq!(
            Action::DoubleClick { x: 1.0, y: 2.0 }.feedback_target(),
            Some(AttendTarget::new(1.0, 2.0, "double_click"))
        );
        assert_eq!(Action::Scroll { dy: 1 }.feedback_target(), None);
    }
}
