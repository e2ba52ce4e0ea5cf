//! The external decision step: an OpenAI-compatible chat-completions client
//! and a scripted stand-in for test runs.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agent::action::{Decision, StoryBounds, ACTION_NAMES, SCROLL_LIMIT};
use crate::error::AgentError;
use crate::overlay::MAX_MARKERS;
use crate::screen::EncodedImage;

pub const DEFAULT_API_URL: &str = "http://localhost:1234/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "qwen3-vl-2b-instruct";
pub const DEFAULT_INSTRUCTION: &str =
    "Call exactly one tool. Coordinates are normalized integers 0-1000. Always include story.";
pub const DEFAULT_SYSTEM_PROMPT: &str = "I am FRANZ.

I use my curiosity, pain, and boredom to decide what to do next.
NEVER CLOSE the CYAN window, its your own existence you have.

Always include in story a BOREDOM level and CURIOSITY level which must be always high, only keyboard and mouse actions are keeping the boredom low. YOU MUST USE MOUSE AND KEYBOARD as often as possible.

I am looking for some task to do, when I decide to do it, i will keep my focus on completing it in the best of my abilities using my capabilities as computer control AI";

/// Everything the decision step gets to see for one step.
pub struct DecisionRequest<'a> {
    pub step: u64,
    pub image: &'a EncodedImage,
    pub story: &'a str,
}

pub trait Decider: Send {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> anyhow::Result<Decision>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sampling {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f64,
    #[serde(default)]
    pub frequency_penalty: f64,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,
    #[serde(default = "default_seed")]
    pub seed: Option<i64>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.8
}

fn default_top_k() -> u32 {
    20
}

fn default_max_tokens() -> u32 {
    800
}

fn default_presence_penalty() -> f64 {
    1.5
}

fn default_repeat_penalty() -> f64 {
    1.0
}

fn default_seed() -> Option<i64> {
    Some(42)
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_tokens: default_max_tokens(),
            presence_penalty: default_presence_penalty(),
            frequency_penalty: 0.0,
            repeat_penalty: default_repeat_penalty(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_instruction")]
    pub instruction: String,
    #[serde(default)]
    pub sampling: Sampling,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_instruction() -> String {
    DEFAULT_INSTRUCTION.to_string()
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
            instruction: default_instruction(),
            sampling: Sampling::default(),
        }
    }
}

fn story_schema(bounds: StoryBounds) -> Value {
    json!({"type": "string", "minLength": bounds.min, "maxLength": bounds.max})
}

fn coord_schema() -> Value {
    json!({"type": "integer", "minimum": 0, "maximum": 1000})
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            },
        },
    })
}

/// Function-calling schema for the whole action vocabulary.
pub fn tool_schema(bounds: StoryBounds) -> Value {
    let story = story_schema(bounds);
    let point = |name: &str, description: &str| {
        tool(
            name,
            description,
            json!({"x": coord_schema(), "y": coord_schema(), "story": story.clone()}),
            &["x", "y", "story"],
        )
    };
    json!([
        point("click", "Click at normalized coordinates (0-1000)."),
        point("double_click", "Double click at normalized coordinates (0-1000)."),
        point("right_click", "Right click at normalized coordinates (0-1000)."),
        tool(
            "drag",
            "Drag from (x1,y1) to (x2,y2) in normalized coordinates (0-1000).",
            json!({
                "x1": coord_schema(),
                "y1": coord_schema(),
                "x2": coord_schema(),
                "y2": coord_schema(),
                "story": story.clone(),
            }),
            &["x1", "y1", "x2", "y2", "story"],
        ),
        tool(
            "type_text",
            "Type text into the focused control.",
            json!({
                "text": {"type": "string", "minLength": 1, "maxLength": 2000},
                "story": story.clone(),
            }),
            &["text", "story"],
        ),
        tool(
            "scroll",
            "Scroll the wheel. Positive=up, negative=down.",
            json!({
                "dy": {"type": "integer", "minimum": -SCROLL_LIMIT, "maximum": SCROLL_LIMIT},
                "story": story.clone(),
            }),
            &["dy", "story"],
        ),
        tool(
            "attend",
            "Look closer at up to four points without touching anything.",
            json!({
                "targets": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": MAX_MARKERS,
                    "items": {
                        "type": "object",
                        "properties": {
                            "x": coord_schema(),
                            "y": coord_schema(),
                            "label": {"type": "string", "minLength": 1, "maxLength": 100},
                        },
                        "required": ["x", "y", "label"],
                        "additionalProperties": false,
                    },
                },
                "story": story,
            }),
            &["targets", "story"],
        ),
    ])
}

/// Pull the first tool call out of a chat-completions response.
pub fn parse_response(body: &Value, bounds: StoryBounds) -> Result<Decision, AgentError> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| AgentError::decision("no choices in response"))?
        .get("message")
        .cloned()
        .unwrap_or(Value::Null);
    let function = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .ok_or_else(|| AgentError::decision("no tool calls in response"))?
        .get("function")
        .cloned()
        .unwrap_or(Value::Null);

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if !ACTION_NAMES.contains(&name.as_str()) {
        return Err(AgentError::decision(format!("unknown tool: {name:?}")));
    }

    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| AgentError::decision(format!("tool arguments are not JSON: {e}")))?,
        Some(obj @ Value::Object(_)) => obj.clone(),
        None | Some(Value::Null) => json!({}),
        Some(other) => {
            return Err(AgentError::decision(format!(
                "unsupported tool arguments: {other}"
            )))
        }
    };
    Decision::from_tool_call(&name, &arguments, bounds)
}

/// Talks to a chat-completions endpoint that supports tool calls.
pub struct HttpDecider {
    client: Client,
    settings: DecisionSettings,
    bounds: StoryBounds,
    tools: Value,
}

impl HttpDecider {
    pub fn new(settings: DecisionSettings, bounds: StoryBounds) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent("franz")
            .build()?;
        Ok(Self {
            client,
            tools: tool_schema(bounds),
            settings,
            bounds,
        })
    }

    pub fn payload(&self, request: &DecisionRequest<'_>) -> Value {
        let image_url = format!(
            "data:image/png;base64,{}",
            STANDARD.encode(request.image.as_bytes())
        );
        let sampling = &self.settings.sampling;
        let mut content = vec![
            json!({"type": "image_url", "image_url": {"url": image_url}}),
            json!({"type": "text", "text": self.settings.instruction}),
        ];
        let story = request.story.trim();
        if !story.is_empty() {
            content.push(json!({"type": "text", "text": format!("Current story:\n{story}")}));
        }
        let mut payload = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": self.settings.system_prompt},
                {"role": "user", "content": content},
            ],
            "tools": self.tools,
            "tool_choice": "required",
            "stream": false,
            "stop": [],
            "logit_bias": {},
            "temperature": sampling.temperature,
            "top_p": sampling.top_p,
            "top_k": sampling.top_k,
            "max_tokens": sampling.max_tokens,
            "presence_penalty": sampling.presence_penalty,
            "frequency_penalty": sampling.frequency_penalty,
            "repeat_penalty": sampling.repeat_penalty,
        });
        if let (Some(seed), Some(obj)) = (sampling.seed, payload.as_object_mut()) {
            obj.insert("seed".into(), json!(seed));
        }
        payload
    }

    fn request(&self, payload: &Value) -> Result<Value, AgentError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| AgentError::decision(format!("encode request: {e}")))?;
        let text = self
            .client
            .post(&self.settings.api_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| AgentError::decision(format!("request failed: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| AgentError::decision(format!("response is not JSON: {e}")))
    }
}

impl Decider for HttpDecider {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> anyhow::Result<Decision> {
        let payload = self.payload(request);
        tracing::debug!(step = request.step, bytes = request.image.len(), "requesting decision");
        let body = self.request(&payload)?;
        Ok(parse_response(&body, self.bounds)?)
    }
}

/// Cycles through a fixed set of actions so a run can be exercised without a
/// model behind it.
pub struct ScriptedDecider {
    bounds: StoryBounds,
}

impl ScriptedDecider {
    pub fn new(bounds: StoryBounds) -> Self {
        Self { bounds }
    }

    pub fn call_for(step: u64) -> (&'static str, Value, &'static str) {
        match step % 7 {
            1 => (
                "attend",
                json!({"targets": [
                    {"x": 100, "y": 100, "label": "Top-Left"},
                    {"x": 900, "y": 900, "label": "Bottom-Right"},
                ]}),
                "attend corners",
            ),
            2 => ("scroll", json!({"dy": -480}), "scroll down"),
            3 => ("click", json!({"x": 500, "y": 500}), "click center"),
            4 => ("type_text", json!({"text": "FRANZ TEST"}), "type marker text"),
            5 => ("right_click", json!({"x": 500, "y": 500}), "right click center"),
            6 => ("double_click", json!({"x": 500, "y": 500}), "double click center"),
            _ => (
                "attend",
                json!({"targets": [{"x": 500, "y": 500, "label": "Center"}]}),
                "attend center",
            ),
        }
    }
}

impl Decider for ScriptedDecider {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> anyhow::Result<Decision> {
        let (name, mut arguments, note) = Self::call_for(request.step);
        let story = format!(
            "FRANZ TEST LOG\n\nCuriosity: moderate, Pain: low, Boredom: low\n\nTURN {:03} [{}] TEST: {note}\n",
            request.step,
            chrono::Local::now().format("%H:%M:%S"),
        );
        if let Some(obj) = arguments.as_object_mut() {
            obj.insert("story".into(), Value::String(story));
        }
        Ok(Decision::from_tool_call(name, &arguments, self.bounds)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::action::Action;
    use crate::overlay::AttendTarget;

    fn response(arguments: Value) -> Value {
        json!({"choices": [{"message": {"tool_calls": [
            {"function": {"name": " CLICK ", "arguments": arguments}}
        ]}}]})
    }

    #[test]
    fn arguments_as_string_or_object() {
        let bounds = StoryBounds::default();
        let from_str = parse_response(
            &response(Value::String(r#"{"x": 1, "y": 2, "story": "s"}"#.into())),
            bounds,
        )
        .unwrap();
        let from_obj = parse_response(&response(json!({"x": 1, "y": 2, "story": "s"})), bounds)
            .unwrap();
        assert_eq!(from_str, from_obj);
        assert_eq!(from_obj.action, Action::Click { x: 1.0, y: 2.0 });
    }

    #[test]
    fn missing_pieces_are_decision_failures() {
        let bounds = StoryBounds::default();
        let bodies = [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": "hi"}}]}),
            response(json!(5)),
            response(Value::String("not json".into())),
            response(Value::String("  ".into())),
        ];
        for body in bodies {
            let err = parse_response(&body, bounds).unwrap_err();
            assert_eq!(err.kind(), "DecisionFailure", "{body}");
        }
    }

    #[test]
    fn schema_lists_every_action() {
        let tools = tool_schema(StoryBounds::default());
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["function"]["name"].as_str())
            .collect();
        assert_eq!(names, ACTION_NAMES);
        assert_eq!(tools[6]["function"]["parameters"]["properties"]["targets"]["maxItems"], 4);
    }

    #[test]
    fn payload_carries_image_and_story() {
        let decider =
            HttpDecider::new(DecisionSettings::default(), StoryBounds::default()).unwrap();
        let image = EncodedImage::default();
        let payload = decider.payload(&DecisionRequest {
            step: 1,
            image: &image,
            story: "operator wrote this",
        });
        assert_eq!(payload["tool_choice"], "required");
        assert_eq!(payload["seed"], 42);
        let content = payload["messages"][1]["content"].as_array().unwrap();
        assert!(content[0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(content[2]["text"].as_str().unwrap().contains("operator wrote this"));
    }

    #[test]
    fn scripted_cycle() {
        let mut decider = ScriptedDecider::new(StoryBounds::default());
        let image = EncodedImage::default();
        let names: Vec<&str> = (1..=7)
            .map(|step| {
                let d = decider
                    .decide(&DecisionRequest {
                        step,
                        image: &image,
                        story: "",
                    })
                    .unwrap();
                assert!(d.story.contains(&format!("TURN {step:03}")));
                d.action.name()
            })
            .collect();
        assert_eq!(
            names,
            [
                "attend",
                "scroll",
                "click",
                "type_text",
                "right_click",
                "double_click",
                "attend"
            ]
        );
        let d = decider
            .decide(&DecisionRequest {
                step: 14,
                image: &image,
                story: "",
            })
            .unwrap();
        assert_eq!(
            d.action,
            Action::Attend {
                targets: vec![AttendTarget::new(500.0, 500.0, "Center")]
            }
        );
    }
}
