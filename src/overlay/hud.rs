//! The operator HUD: one editable narrative window with a pause toggle.

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coords::ScreenSize;
use crate::error::AgentError;
use crate::overlay::gate::{PauseGate, POLL_INTERVAL};
use crate::overlay::messages::{SurfaceCommand, SurfaceSnapshot};
use crate::overlay::signal::Signal;
use crate::overlay::surface::{
    spawn_surface, Flow, NativeSurface, Rect, SurfaceFactory, SurfaceHandle, SurfaceHandler,
    SurfaceKind, SurfaceSpec, Tint, ToggleSpec, JOIN_TIMEOUT,
};
use crate::overlay::zoom::{TextZoom, ZoomDirection, DEFAULT_ZOOM};

pub const TOGGLE_ID: u16 = 1001;
pub const LABEL_PAUSE: &str = "PAUSE";
pub const LABEL_RESUME: &str = "RESUME";
pub const HUD_TITLE: &str = "FRANZ";

const READY_TIMEOUT: Duration = Duration::from_secs(2);
const SNAPSHOT_TIMEOUT: Duration = Duration::from_millis(500);
const LAYOUT_PAD: i32 = 10;
const BUTTON_HEIGHT: i32 = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HudConfig {
    /// Left edge as a fraction of the screen width.
    #[serde(default = "default_hud_x")]
    pub x: f64,
    #[serde(default = "default_hud_y")]
    pub y: f64,
    #[serde(default = "default_hud_width")]
    pub width: f64,
    #[serde(default = "default_hud_height")]
    pub height: f64,
    #[serde(default = "default_hud_min_width")]
    pub min_width: i32,
    #[serde(default = "default_hud_min_height")]
    pub min_height: i32,
    #[serde(default = "default_hud_tint")]
    pub tint: String,
    #[serde(default = "default_hud_zoom")]
    pub zoom: u32,
}

fn default_hud_x() -> f64 {
    0.65
}

fn default_hud_y() -> f64 {
    0.05
}

fn default_hud_width() -> f64 {
    0.30
}

fn default_hud_height() -> f64 {
    0.90
}

fn default_hud_min_width() -> i32 {
    360
}

fn default_hud_min_height() -> i32 {
    260
}

fn default_hud_tint() -> String {
    "cyan".into()
}

fn default_hud_zoom() -> u32 {
    DEFAULT_ZOOM
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            x: default_hud_x(),
            y: default_hud_y(),
            width: default_hud_width(),
            height: default_hud_height(),
            min_width: default_hud_min_width(),
            min_height: default_hud_min_height(),
            tint: default_hud_tint(),
            zoom: default_hud_zoom(),
        }
    }
}

/// Window rectangle for the HUD: fractional placement, at least the minimum
/// size, never larger than the screen and never hanging off it.
pub fn hud_bounds(screen: ScreenSize, config: &HudConfig) -> Rect {
    let (sw, sh) = (screen.width.max(0), screen.height.max(0));
    let width = ((sw as f64 * config.width) as i32)
        .max(config.min_width)
        .min(sw);
    let height = ((sh as f64 * config.height) as i32)
        .max(config.min_height)
        .min(sh);
    let x = ((sw as f64 * config.x) as i32).clamp(0, (sw - width).max(0));
    let y = ((sh as f64 * config.y) as i32).clamp(0, (sh - height).max(0));
    Rect::new(x, y, width, height)
}

/// Text region above a full-width toggle button, in client coordinates.
pub fn hud_layout(client_width: i32, client_height: i32) -> (Rect, Rect) {
    let (cw, ch) = (client_width.max(1), client_height.max(1));
    let button_y = (ch - LAYOUT_PAD - BUTTON_HEIGHT).max(LAYOUT_PAD);
    let text = Rect::new(
        LAYOUT_PAD,
        LAYOUT_PAD,
        (cw - 2 * LAYOUT_PAD).max(10),
        (button_y - 2 * LAYOUT_PAD).max(10),
    );
    let toggle = Rect::new(
        LAYOUT_PAD,
        button_y,
        (cw - 2 * LAYOUT_PAD).max(80),
        BUTTON_HEIGHT,
    );
    (text, toggle)
}

fn toggle_label(paused: bool) -> &'static str {
    if paused {
        LABEL_RESUME
    } else {
        LABEL_PAUSE
    }
}

struct HudHandler {
    gate: PauseGate,
}

impl HudHandler {
    fn apply_paused(&self, surface: &mut dyn NativeSurface, paused: bool) {
        self.gate.set_paused(paused);
        surface.set_toggle_label(toggle_label(paused));
        // The narrative is editable only while the loop is held.
        surface.set_readonly(!paused);
        tracing::info!(paused, "HUD pause toggled");
    }

    fn relayout(&self, surface: &mut dyn NativeSurface, width: i32, height: i32) {
        let (text, toggle) = hud_layout(width, height);
        surface.place_children(text, Some(toggle));
    }
}

impl SurfaceHandler for HudHandler {
    fn on_created(&mut self, surface: &mut dyn NativeSurface) {
        let (w, h) = surface.client_size();
        self.relayout(surface, w, h);
        let paused = self.gate.is_paused();
        surface.set_toggle_label(toggle_label(paused));
        surface.set_readonly(!paused);
    }

    fn on_close(&mut self, _surface: &mut dyn NativeSurface) -> Flow {
        tracing::info!("HUD closed by operator");
        self.gate.close();
        Flow::Stop
    }

    fn on_resize(&mut self, surface: &mut dyn NativeSurface, width: i32, height: i32) -> Flow {
        self.relayout(surface, width, height);
        Flow::Continue
    }

    fn on_command(&mut self, surface: &mut dyn NativeSurface, id: u16) -> Flow {
        if id == TOGGLE_ID {
            self.on_toggle_pause(surface);
        }
        Flow::Continue
    }

    fn on_toggle_pause(&mut self, surface: &mut dyn NativeSurface) {
        let paused = !self.gate.is_paused();
        self.apply_paused(surface, paused);
    }

    fn on_stopping(&mut self) {
        self.gate.close();
    }
}

/// Owner handle for the single HUD surface.
pub struct Hud {
    handle: SurfaceHandle,
    gate: PauseGate,
}

impl Hud {
    /// Create the HUD window and wait for it to come up.
    pub fn open(
        factory: Arc<dyn SurfaceFactory>,
        screen: ScreenSize,
        config: &HudConfig,
        start_paused: bool,
        story: &str,
    ) -> anyhow::Result<Self> {
        let gate = PauseGate::new(start_paused);
        let spec = SurfaceSpec {
            kind: SurfaceKind::Hud,
            title: HUD_TITLE.to_string(),
            bounds: hud_bounds(screen, config),
            tint: Tint::from_name(&config.tint),
            opacity: 100,
            text: story.to_string(),
            readonly: !start_paused,
            toggle: Some(ToggleSpec {
                id: TOGGLE_ID,
                label: toggle_label(start_paused).to_string(),
            }),
            zoom: TextZoom::new(config.zoom),
        };
        let handle = spawn_surface(factory, spec, HudHandler { gate: gate.clone() })?;
        if !handle.wait_ready(READY_TIMEOUT) || !handle.is_live() {
            gate.close();
            return Err(AgentError::SurfaceCreation("HUD window did not come up".into()).into());
        }
        Ok(Self { handle, gate })
    }

    /// Replace the narrative text. Updates are applied in posting order.
    pub fn update(&self, story: &str) {
        if !self.handle.post(SurfaceCommand::SetText(story.to_string())) {
            tracing::warn!("HUD is gone; narrative update dropped");
        }
    }

    /// Current text and zoom, read on the HUD thread.
    pub fn snapshot(&self) -> Option<SurfaceSnapshot> {
        let (tx, rx) = channel();
        if !self.handle.post(SurfaceCommand::Snapshot(tx)) {
            return None;
        }
        rx.recv_timeout(SNAPSHOT_TIMEOUT).ok()
    }

    pub fn text(&self) -> Option<String> {
        self.snapshot().map(|s| s.text)
    }

    pub fn zoom(&self) -> TextZoom {
        self.snapshot().map(|s| s.zoom).unwrap_or_default()
    }

    pub fn zoom_step(&self, direction: ZoomDirection) {
        let _ = self.handle.post(SurfaceCommand::Zoom(direction));
    }

    /// Ask the HUD thread to flip the gate, as if the button were pressed.
    pub fn toggle_pause(&self) {
        let _ = self.handle.post(SurfaceCommand::TogglePause);
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    pub fn gate(&self) -> PauseGate {
        self.gate.clone()
    }

    /// Block while paused. Returns `false` when the HUD was closed instead.
    pub fn wait_until_running(&self) -> bool {
        self.gate.wait_while_paused(POLL_INTERVAL) && !self.is_stopped()
    }

    pub fn stop_signal(&self) -> Signal {
        self.handle.stop_signal()
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.stop_signal().is_set()
    }

    pub fn close(mut self) {
        self.gate.close();
        self.handle.shutdown(JOIN_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::{hud_bounds, hud_layout, HudConfig};
    use crate::coords::ScreenSize;
    use crate::overlay::surface::Rect;

    #[test]
    fn bounds_follow_fractions_on_large_screen() {
        let rect = hud_bounds(ScreenSize::new(1920, 1080), &HudConfig::default());
        assert_eq!(rect, Rect::new(1248, 54, 576, 972));
        assert!(rect.right() <= 1920 && rect.bottom() <= 1080);
    }

    #[test]
    fn bounds_respect_minimum_and_screen() {
        let rect = hud_bounds(ScreenSize::new(800, 300), &HudConfig::default());
        assert_eq!(rect.width, 360);
        assert_eq!(rect.height, 270);
        assert_eq!(rect.x, 440);
        assert!(rect.bottom() <= 300);

        let tiny = hud_bounds(ScreenSize::new(200, 100), &HudConfig::default());
        assert_eq!(tiny, Rect::new(0, 0, 200, 100));
    }

    #[test]
    fn layout_puts_button_under_text() {
        let (text, toggle) = hud_layout(400, 600);
        assert_eq!(text, Rect::new(10, 10, 380, 530));
        assert_eq!(toggle, Rect::new(10, 550, 380, 40));
        assert!(text.bottom() < toggle.y);
    }
}
