//! Win32 backend: GDI capture, `SendInput` injection and layered overlay
//! windows with a rich-edit text region.

use std::sync::Arc;

use anyhow::Context;
use windows::core::w;
use windows::Win32::System::LibraryLoader::LoadLibraryW;
use windows::Win32::UI::HiDpi::{SetProcessDpiAwareness, PROCESS_PER_MONITOR_DPI_AWARE};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::coords::ScreenSize;
use crate::error::AgentError;
use crate::platform::Platform;
use crate::screen::capture::capture_desktop;
use crate::screen::{FrameBuffer, ScreenSource};

mod input;
mod surface;

pub use input::SendInputSink;
pub use surface::Win32SurfaceFactory;

pub struct DesktopScreen;

impl ScreenSource for DesktopScreen {
    fn screen_size(&self) -> ScreenSize {
        unsafe { ScreenSize::new(GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
    }

    fn capture(&self) -> Result<FrameBuffer, AgentError> {
        capture_desktop(self.screen_size())
    }
}

/// One-time process setup, then the platform object.
pub fn create() -> anyhow::Result<Platform> {
    unsafe {
        // Fails harmlessly when a manifest already set the awareness.
        if let Err(err) = SetProcessDpiAwareness(PROCESS_PER_MONITOR_DPI_AWARE) {
            tracing::debug!(error = %err, "DPI awareness not changed");
        }
        LoadLibraryW(w!("Msftedit.dll")).context("load rich edit library")?;
    }
    let screen = DesktopScreen;
    tracing::info!(size = ?screen.screen_size(), "using Win32 platform");
    Ok(Platform {
        name: "win32",
        screen: Arc::new(screen),
        input: Arc::new(SendInputSink),
        surfaces: Arc::new(Win32SurfaceFactory),
    })
}
