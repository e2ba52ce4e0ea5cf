pub const BYTES_PER_PIXEL: usize = 4;

/// Raw pixels in blue, green, red, alpha order. Each pipeline stage consumes
/// one buffer and produces the next.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap platform bytes as-is. The length is not validated here; use
    /// [`FrameBuffer::is_complete`] before trusting it.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn solid(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let mut pixels = vec![0u8; expected_len(width, height)];
        for chunk in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&bgra);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    pub fn expected_len(&self) -> usize {
        expected_len(self.width, self.height)
    }

    /// True when the buffer holds at least `width * height * 4` bytes.
    pub fn is_complete(&self) -> bool {
        !self.is_empty() && self.pixels.len() >= self.expected_len()
    }

    pub fn pixel_bgra(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(idx..idx + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

pub fn expected_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(BYTES_PER_PIXEL)
}
