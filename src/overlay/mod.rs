pub mod attention;
pub mod gate;
pub mod hud;
pub mod messages;
pub mod signal;
pub mod state;
pub mod surface;
pub mod zoom;

pub use attention::{AttendTarget, AttentionManager, MarkerConfig, MAX_MARKERS};
pub use gate::PauseGate;
pub use hud::{Hud, HudConfig};
pub use messages::{SurfaceCommand, SurfaceEvent, SurfaceSnapshot};
pub use signal::Signal;
pub use state::SurfaceLifecycle;
pub use surface::{
    spawn_surface, NativeSurface, Rect, SurfaceFactory, SurfaceHandle, SurfaceHandler,
    SurfaceKind, SurfaceSpec, Tint,
};
pub use zoom::{TextZoom, ZoomDirection};
