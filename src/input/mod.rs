//! Pointer and keyboard synthesis on top of a platform [`InputSink`].
//!
//! All coordinates here are already in the device-absolute range; callers map
//! model output through [`crate::coords::CoordinateSpace`] first.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// One logical wheel notch.
pub const WHEEL_DELTA: i32 = 120;
/// Minimum number of interpolated moves between drag press and release.
pub const DRAG_STEPS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Pointer move in device-absolute coordinates.
    MoveAbsolute { x: i32, y: i32 },
    Button { button: MouseButton, pressed: bool },
    Wheel { delta: i32 },
    /// Raw UTF-16 code unit, not a virtual key.
    UnicodeKey { code_unit: u16, pressed: bool },
}

/// Delivers one batch atomically and reports how many events were accepted.
pub trait InputSink: Send + Sync {
    fn send(&self, batch: &[InputEvent]) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTiming {
    /// Pause after every delivered batch so the OS can settle.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_double_click_gap_ms")]
    pub double_click_gap_ms: u64,
    #[serde(default = "default_drag_step_ms")]
    pub drag_step_ms: u64,
}

fn default_settle_ms() -> u64 {
    50
}

fn default_double_click_gap_ms() -> u64 {
    50
}

fn default_drag_step_ms() -> u64 {
    10
}

impl Default for InputTiming {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            double_click_gap_ms: default_double_click_gap_ms(),
            drag_step_ms: default_drag_step_ms(),
        }
    }
}

impl InputTiming {
    /// No delays at all; used by tests and benches.
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            double_click_gap_ms: 0,
            drag_step_ms: 0,
        }
    }
}

#[derive(Clone)]
pub struct Injector {
    sink: Arc<dyn InputSink>,
    timing: InputTiming,
}

impl Injector {
    pub fn new(sink: Arc<dyn InputSink>, timing: InputTiming) -> Self {
        Self { sink, timing }
    }

    pub fn click(&self, x: i32, y: i32) -> Result<(), AgentError> {
        self.deliver(&click_batch(Some((x, y)), MouseButton::Left))
    }

    pub fn right_click(&self, x: i32, y: i32) -> Result<(), AgentError> {
        self.deliver(&click_batch(Some((x, y)), MouseButton::Right))
    }

    /// Two separate press/release pairs rather than a platform double-click.
    pub fn double_click(&self, x: i32, y: i32) -> Result<(), AgentError> {
        self.deliver(&click_batch(Some((x, y)), MouseButton::Left))?;
        pause(self.timing.double_click_gap_ms);
        self.deliver(&click_batch(None, MouseButton::Left))
    }

    pub fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<(), AgentError> {
        self.deliver(&[
            InputEvent::MoveAbsolute {
                x: from.0,
                y: from.1,
            },
            InputEvent::Button {
                button: MouseButton::Left,
                pressed: true,
            },
        ])?;
        for (x, y) in drag_path(from, to, DRAG_STEPS) {
            self.send_batch(&[InputEvent::MoveAbsolute { x, y }])?;
            pause(self.timing.drag_step_ms);
        }
        self.deliver(&[InputEvent::Button {
            button: MouseButton::Left,
            pressed: false,
        }])
    }

    /// Every UTF-16 code unit becomes a raw-character press and release, so
    /// astral characters expand to a surrogate pair.
    pub fn type_text(&self, text: &str) -> Result<(), AgentError> {
        if text.is_empty() {
            return Ok(());
        }
        let batch: Vec<InputEvent> = text
            .encode_utf16()
            .flat_map(|code_unit| {
                [
                    InputEvent::UnicodeKey {
                        code_unit,
                        pressed: true,
                    },
                    InputEvent::UnicodeKey {
                        code_unit,
                        pressed: false,
                    },
                ]
            })
            .collect();
        self.deliver(&batch)
    }

    pub fn scroll(&self, dy: i32) -> Result<(), AgentError> {
        self.deliver(&scroll_batch(dy))
    }

    fn deliver(&self, batch: &[InputEvent]) -> Result<(), AgentError> {
        self.send_batch(batch)?;
        pause(self.timing.settle_ms);
        Ok(())
    }

    fn send_batch(&self, batch: &[InputEvent]) -> Result<(), AgentError> {
        let accepted = self.sink.send(batch);
        if accepted < batch.len() {
            return Err(AgentError::Injection {
                requested: batch.len(),
                accepted,
            });
        }
        Ok(())
    }
}

fn click_batch(at: Option<(i32, i32)>, button: MouseButton) -> Vec<InputEvent> {
    let mut batch = Vec::with_capacity(3);
    if let Some((x, y)) = at {
        batch.push(InputEvent::MoveAbsolute { x, y });
    }
    batch.push(InputEvent::Button {
        button,
        pressed: true,
    });
    batch.push(InputEvent::Button {
        button,
        pressed: false,
    });
    batch
}

/// Positive deltas scroll up; zero and negative scroll down. At least one
/// notch is always sent.
pub fn scroll_batch(dy: i32) -> Vec<InputEvent> {
    let direction = if dy > 0 { 1 } else { -1 };
    let notches = (dy.unsigned_abs() / WHEEL_DELTA as u32).max(1);
    (0..notches)
        .map(|_| InputEvent::Wheel {
            delta: WHEEL_DELTA * direction,
        })
        .collect()
}

/// Linear interpolation excluding the start and ending exactly at `to`.
pub fn drag_path(from: (i32, i32), to: (i32, i32), steps: u32) -> Vec<(i32, i32)> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let lerp = |a: i32, b: i32| {
                let (a, b) = (i64::from(a), i64::from(b));
                (a + (b - a) * i64::from(i) / i64::from(steps)) as i32
            };
            (lerp(from.0, to.0), lerp(from.1, to.1))
        })
        .collect()
}

fn pause(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}
