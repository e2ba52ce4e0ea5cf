use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};

use crate::screen::frame::FrameBuffer;

/// Stretch `source` to `dest_width` x `dest_height` with linear filtering.
///
/// Equal sizes hand the source back untouched. Non-positive sizes or a short
/// pixel buffer yield [`FrameBuffer::empty`] instead of an error so a glitched
/// capture only costs one step.
pub fn downsample(source: FrameBuffer, dest_width: u32, dest_height: u32) -> FrameBuffer {
    if source.width == dest_width && source.height == dest_height {
        return source;
    }
    if dest_width == 0 || dest_height == 0 || !source.is_complete() {
        tracing::warn!(
            src_width = source.width,
            src_height = source.height,
            src_len = source.pixels.len(),
            dest_width,
            dest_height,
            "skipping downsample of unusable frame"
        );
        return FrameBuffer::empty();
    }

    let FrameBuffer {
        width,
        height,
        mut pixels,
    } = source;
    pixels.truncate(crate::screen::frame::expected_len(width, height));
    // The filter treats all four channels alike, so BGRA can pass as RGBA.
    let Some(buffer) = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, pixels) else {
        return FrameBuffer::empty();
    };
    let resized = imageops::resize(&buffer, dest_width, dest_height, FilterType::Triangle);
    FrameBuffer::from_raw(dest_width, dest_height, resized.into_raw())
}

#[cfg(test)]
mod tests {
    use super::downsample;
    use crate::screen::frame::FrameBuffer;

    #[test]
    fn equal_size_is_identity() {
        let frame = FrameBuffer::solid(7, 5, [9, 8, 7, 255]);
        assert_eq!(downsample(frame.clone(), 7, 5), frame);
    }

    #[test]
    fn shrinks_to_requested_size() {
        let frame = FrameBuffer::solid(64, 32, [10, 20, 30, 255]);
        let small = downsample(frame, 16, 8);
        assert_eq!((small.width, small.height), (16, 8));
        assert!(small.is_complete());
        assert_eq!(small.pixel_bgra(5, 5), Some([10, 20, 30, 255]));
    }

    #[test]
    fn averages_instead_of_picking_neighbours() {
        // Alternating black and white columns should blend to grey.
        let mut frame = FrameBuffer::solid(8, 2, [0, 0, 0, 255]);
        for (i, px) in frame.pixels.chunks_exact_mut(4).enumerate() {
            if i % 2 == 1 {
                px.copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        let small = downsample(frame, 2, 1);
        let [b, _, _, _] = small.pixel_bgra(0, 0).unwrap();
        assert!(b > 60 && b < 200, "expected a blend, got {b}");
    }

    #[test]
    fn bad_input_returns_empty_frame() {
        let frame = FrameBuffer::solid(4, 4, [0, 0, 0, 255]);
        assert!(downsample(frame.clone(), 0, 2).is_empty());
        assert!(downsample(frame, 2, 0).is_empty());

        let short = FrameBuffer::from_raw(4, 4, vec![0; 12]);
        assert!(downsample(short, 2, 2).is_empty());
    }
}
