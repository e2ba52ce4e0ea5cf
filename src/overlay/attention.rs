//! Transient labelled markers, created and destroyed as one batch per step.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coords::{CoordinateSpace, ScreenSize};
use crate::overlay::surface::{
    spawn_surface, PassiveHandler, Rect, SurfaceFactory, SurfaceHandle, SurfaceKind, SurfaceSpec,
    Tint, JOIN_TIMEOUT,
};
use crate::overlay::zoom::TextZoom;

pub const MAX_MARKERS: usize = 4;
const READY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_marker_width")]
    pub width: f64,
    #[serde(default = "default_marker_height")]
    pub height: f64,
    #[serde(default = "default_marker_min_width")]
    pub min_width: i32,
    #[serde(default = "default_marker_min_height")]
    pub min_height: i32,
    #[serde(default = "default_marker_tint")]
    pub tint: String,
    /// Percent.
    #[serde(default = "default_marker_opacity")]
    pub opacity: u8,
}

fn default_marker_width() -> f64 {
    0.20
}

fn default_marker_height() -> f64 {
    0.15
}

fn default_marker_min_width() -> i32 {
    80
}

fn default_marker_min_height() -> i32 {
    60
}

fn default_marker_tint() -> String {
    "blue".into()
}

fn default_marker_opacity() -> u8 {
    60
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            width: default_marker_width(),
            height: default_marker_height(),
            min_width: default_marker_min_width(),
            min_height: default_marker_min_height(),
            tint: default_marker_tint(),
            opacity: default_marker_opacity(),
        }
    }
}

/// A point of interest in normalized coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendTarget {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

impl AttendTarget {
    pub fn new(x: f64, y: f64, label: impl Into<String>) -> Self {
        Self {
            x,
            y,
            label: label.into(),
        }
    }

    pub fn center(label: impl Into<String>) -> Self {
        Self::new(500.0, 500.0, label)
    }

    /// The caller's label, or `(x,y)` when it is blank.
    pub fn display_label(&self) -> String {
        let label = self.label.trim();
        if label.is_empty() {
            format!("({},{})", self.x as i64, self.y as i64)
        } else {
            label.to_string()
        }
    }

    fn is_usable(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Marker rectangle centred on `(cx, cy)` and shifted so it stays on screen.
pub fn marker_bounds(screen: ScreenSize, config: &MarkerConfig, cx: i32, cy: i32) -> Rect {
    let (sw, sh) = (screen.width.max(0), screen.height.max(0));
    let width = ((sw as f64 * config.width) as i32).max(config.min_width);
    let height = ((sh as f64 * config.height) as i32).max(config.min_height);
    let x = (cx - width / 2).clamp(0, (sw - width).max(0));
    let y = (cy - height / 2).clamp(0, (sh - height).max(0));
    Rect::new(x, y, width, height)
}

/// Owns every live marker surface.
pub struct AttentionManager {
    factory: Arc<dyn SurfaceFactory>,
    coords: CoordinateSpace,
    config: MarkerConfig,
    markers: Vec<SurfaceHandle>,
}

impl AttentionManager {
    pub fn new(
        factory: Arc<dyn SurfaceFactory>,
        coords: CoordinateSpace,
        config: MarkerConfig,
    ) -> Self {
        Self {
            factory,
            coords,
            config,
            markers: Vec::new(),
        }
    }

    /// Replace the current batch. Old markers are fully torn down before the
    /// first new one is created. At most [`MAX_MARKERS`] are shown; an empty
    /// or unusable list shows one marker at the screen centre.
    pub fn show_multiple(&mut self, targets: &[AttendTarget], zoom: TextZoom) {
        self.hide_all();

        let mut batch: Vec<AttendTarget> = targets
            .iter()
            .filter(|t| t.is_usable())
            .take(MAX_MARKERS)
            .cloned()
            .collect();
        if batch.is_empty() {
            batch.push(AttendTarget::center("Default"));
        }

        let screen = self.coords.screen();
        for target in batch {
            let (cx, cy) = self.coords.to_screen(target.x, target.y);
            let label = target.display_label();
            let spec = SurfaceSpec {
                kind: SurfaceKind::Marker,
                title: format!("marker {}", self.markers.len() + 1),
                bounds: marker_bounds(screen, &self.config, cx, cy),
                tint: Tint::from_name(&self.config.tint),
                opacity: self.config.opacity.min(100),
                text: label.clone(),
                readonly: true,
                toggle: None,
                zoom,
            };
            match spawn_surface(self.factory.clone(), spec, PassiveHandler) {
                Ok(handle) => {
                    if !handle.wait_ready(READY_TIMEOUT) {
                        tracing::warn!(%label, "attention marker slow to start");
                    }
                    self.markers.push(handle);
                }
                Err(err) => tracing::error!(%label, error = %err, "failed to start attention marker"),
            }
        }
        tracing::debug!(live = self.live_count(), "attention markers shown");
    }

    pub fn show(&mut self, target: AttendTarget, zoom: TextZoom) {
        self.show_multiple(std::slice::from_ref(&target), zoom);
    }

    /// Stop every marker and wait for each thread before returning.
    pub fn hide_all(&mut self) {
        for marker in &self.markers {
            marker.request_stop();
        }
        for mut marker in self.markers.drain(..) {
            marker.shutdown(JOIN_TIMEOUT);
        }
    }

    pub fn live_count(&self) -> usize {
        self.markers.iter().filter(|m| m.is_live()).count()
    }
}

impl Drop for AttentionManager {
    fn drop(&mut self) {
        self.hide_all();
    }
}
