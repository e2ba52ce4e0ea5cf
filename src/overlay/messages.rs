use std::sync::mpsc::Sender;

use crate::overlay::zoom::{TextZoom, ZoomDirection};

/// Native input observed by a surface's own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Close,
    Resize { width: i32, height: i32 },
    Wheel { delta: i32, modifier: bool },
    /// A child control was activated; carries its control id.
    Command(u16),
}

/// Requests posted to a surface thread by other threads.
#[derive(Debug)]
pub enum SurfaceCommand {
    SetText(String),
    Zoom(ZoomDirection),
    TogglePause,
    Snapshot(Sender<SurfaceSnapshot>),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    pub text: String,
    pub zoom: TextZoom,
}
