pub mod capture;
pub mod downsample;
pub mod frame;
pub mod png;

pub use downsample::downsample;
pub use frame::FrameBuffer;
pub use png::{encode_png, EncodedImage};

use crate::coords::ScreenSize;
use crate::error::AgentError;

/// Something that can hand out full-screen BGRA frames.
pub trait ScreenSource: Send + Sync {
    fn screen_size(&self) -> ScreenSize;
    fn capture(&self) -> Result<FrameBuffer, AgentError>;
}

/// Capture, shrink to `target` and encode. A downsample glitch surfaces as an
/// `EncodeFailure` from the empty frame it produces.
pub fn capture_encoded(
    source: &dyn ScreenSource,
    target: ScreenSize,
) -> Result<EncodedImage, AgentError> {
    let frame = source.capture()?;
    let small = downsample(
        frame,
        target.width.max(0) as u32,
        target.height.max(0) as u32,
    );
    encode_png(&small)
}
