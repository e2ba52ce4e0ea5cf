//! The process-wide capability object. Built once in `main` and handed to the
//! pieces that need native access; nothing reaches the OS ambiently.

use std::sync::Arc;

use crate::input::InputSink;
use crate::overlay::SurfaceFactory;
use crate::screen::ScreenSource;

pub mod headless;
// The overlay windows keep per-window state through the pointer-sized
// window-long API, which the bindings only expose on 64-bit targets.
#[cfg(all(windows, target_pointer_width = "64"))]
pub mod windows;

#[derive(Clone)]
pub struct Platform {
    pub name: &'static str,
    pub screen: Arc<dyn ScreenSource>,
    pub input: Arc<dyn InputSink>,
    pub surfaces: Arc<dyn SurfaceFactory>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("name", &self.name)
            .field("screen", &self.screen.screen_size())
            .finish()
    }
}

/// Pick the native backend for this OS, or the headless one when forced or
/// when no native backend exists.
pub fn create_platform(force_headless: bool) -> anyhow::Result<Platform> {
    if force_headless {
        tracing::info!("using headless platform");
        return Ok(headless::HeadlessPlatform::default().platform());
    }
    #[cfg(all(windows, target_pointer_width = "64"))]
    {
        windows::create()
    }
    #[cfg(not(all(windows, target_pointer_width = "64")))]
    {
        tracing::warn!("no native backend for this OS; falling back to headless platform");
        Ok(headless::HeadlessPlatform::default().platform())
    }
}
