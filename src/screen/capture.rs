use crate::coords::ScreenSize;
use crate::error::AgentError;
use crate::screen::frame::FrameBuffer;

/// Grab the whole screen rectangle as a BGRA frame. All device contexts and
/// bitmaps are released before returning, on success and on every failure.
#[cfg(windows)]
pub fn capture_desktop(size: ScreenSize) -> Result<FrameBuffer, AgentError> {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT,
        DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
    };

    struct ScreenDc(HDC);
    impl Drop for ScreenDc {
        fn drop(&mut self) {
            unsafe {
                let _ = ReleaseDC(HWND::default(), self.0);
            }
        }
    }

    struct MemoryDc(HDC);
    impl Drop for MemoryDc {
        fn drop(&mut self) {
            unsafe {
                let _ = DeleteDC(self.0);
            }
        }
    }

    struct Bitmap(HBITMAP);
    impl Drop for Bitmap {
        fn drop(&mut self) {
            unsafe {
                let _ = DeleteObject(self.0);
            }
        }
    }

    // Restores the previous selection before the bitmap guard deletes it.
    struct Selection {
        dc: HDC,
        previous: HGDIOBJ,
    }
    impl Drop for Selection {
        fn drop(&mut self) {
            unsafe {
                let _ = SelectObject(self.dc, self.previous);
            }
        }
    }

    if size.width <= 0 || size.height <= 0 {
        return Err(AgentError::Capture("screen bounds are empty".into()));
    }

    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.0.is_null() {
            return Err(AgentError::Capture("GetDC failed for desktop capture".into()));
        }
        let screen_dc = ScreenDc(screen_dc);

        let mem_dc = CreateCompatibleDC(screen_dc.0);
        if mem_dc.0.is_null() {
            return Err(AgentError::Capture(
                "CreateCompatibleDC failed for desktop capture".into(),
            ));
        }
        let mem_dc = MemoryDc(mem_dc);

        let bmp = CreateCompatibleBitmap(screen_dc.0, size.width, size.height);
        if bmp.0.is_null() {
            return Err(AgentError::Capture(
                "CreateCompatibleBitmap failed for desktop capture".into(),
            ));
        }
        let bmp = Bitmap(bmp);

        let selection = Selection {
            dc: mem_dc.0,
            previous: SelectObject(mem_dc.0, HGDIOBJ(bmp.0 .0)),
        };

        BitBlt(
            mem_dc.0,
            0,
            0,
            size.width,
            size.height,
            screen_dc.0,
            0,
            0,
            ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        )
        .map_err(|err| AgentError::Capture(format!("BitBlt failed: {err}")))?;

        let mut bmi = BITMAPINFO::default();
        bmi.bmiHeader = BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: size.width,
            biHeight: -size.height,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        };

        let mut bgra = vec![0u8; (size.width as usize) * (size.height as usize) * 4];
        // GetDIBits wants the bitmap deselected.
        drop(selection);
        let rows = GetDIBits(
            mem_dc.0,
            bmp.0,
            0,
            size.height as u32,
            Some(bgra.as_mut_ptr() as *mut _),
            &mut bmi,
            DIB_RGB_COLORS,
        );
        if rows == 0 {
            return Err(AgentError::Capture(
                "GetDIBits failed for desktop capture".into(),
            ));
        }

        Ok(FrameBuffer::from_raw(
            size.width as u32,
            size.height as u32,
            bgra,
        ))
    }
}

#[cfg(not(windows))]
pub fn capture_desktop(_size: ScreenSize) -> Result<FrameBuffer, AgentError> {
    Err(AgentError::Capture(
        "desktop capture is only implemented for Windows".into(),
    ))
}

/// Procedural test pattern used by the headless platform: a diagonal gradient
/// with a bright cross through the centre so downsampling has edges to keep.
pub fn synthetic_frame(size: ScreenSize, seed: u64) -> FrameBuffer {
    let width = size.width.max(0) as u32;
    let height = size.height.max(0) as u32;
    let mut frame = FrameBuffer::solid(width, height, [0, 0, 0, 255]);
    let shift = (seed % 256) as u32;
    let (cx, cy) = (width / 2, height / 2);
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 4) as usize;
            let on_cross = x.abs_diff(cx) < 2 || y.abs_diff(cy) < 2;
            let px = &mut frame.pixels[idx..idx + 4];
            if on_cross {
                px.copy_from_slice(&[255, 255, 255, 255]);
            } else {
                px[0] = ((x + shift) % 256) as u8;
                px[1] = ((y + shift) % 256) as u8;
                px[2] = (((x + y) / 2) % 256) as u8;
            }
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::synthetic_frame;
    use crate::coords::ScreenSize;

    #[test]
    fn synthetic_frame_is_complete_and_opaque() {
        let frame = synthetic_frame(ScreenSize::new(64, 36), 3);
        assert!(frame.is_complete());
        assert!(frame.pixels.chunks_exact(4).all(|px| px[3] == 255));
        assert_eq!(frame.pixel_bgra(32, 18), Some([255, 255, 255, 255]));
    }

    #[cfg(not(windows))]
    #[test]
    fn desktop_capture_reports_capture_failure_off_windows() {
        let err = super::capture_desktop(ScreenSize::new(10, 10)).unwrap_err();
        assert_eq!(err.kind(), "CaptureFailure");
    }
}
