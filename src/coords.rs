//! Mapping between the three coordinate spaces the agent deals with:
//! model-normalized `[0, 1000]`, screen pixels, and the injector's
//! device-absolute `[0, 65535]` range.

pub const NORMALIZED_MAX: f64 = 1000.0;
pub const DEVICE_MAX: i64 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl ScreenSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn center(self) -> (i32, i32) {
        (self.width / 2, self.height / 2)
    }
}

/// Immutable per-run converter. Both mappings are monotonic and never leave
/// their destination range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateSpace {
    screen: ScreenSize,
}

impl CoordinateSpace {
    pub fn new(screen: ScreenSize) -> Self {
        Self { screen }
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Normalized model coordinates to screen pixels. Each axis is clamped to
    /// `[0, 1000]` independently, so a stray coordinate becomes an edge click.
    pub fn to_screen(&self, norm_x: f64, norm_y: f64) -> (i32, i32) {
        (
            scale_normalized(norm_x, self.screen.width),
            scale_normalized(norm_y, self.screen.height),
        )
    }

    /// Screen pixels to the injector's absolute range. A zero-sized axis maps
    /// to 0.
    pub fn to_device(&self, pixel_x: i32, pixel_y: i32) -> (i32, i32) {
        (
            scale_to_device(pixel_x, self.screen.width),
            scale_to_device(pixel_y, self.screen.height),
        )
    }

    /// Shortcut for the full normalized → device chain.
    pub fn normalized_to_device(&self, norm_x: f64, norm_y: f64) -> (i32, i32) {
        let (px, py) = self.to_screen(norm_x, norm_y);
        self.to_device(px, py)
    }
}

fn scale_normalized(value: f64, extent: i32) -> i32 {
    if extent <= 0 {
        return 0;
    }
    // NaN compares false against both bounds; treat it as the origin.
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, NORMALIZED_MAX)
    };
    (clamped * extent as f64 / NORMALIZED_MAX) as i32
}

fn scale_to_device(pixel: i32, extent: i32) -> i32 {
    if extent <= 0 {
        return 0;
    }
    let pixel = i64::from(pixel.clamp(0, extent));
    (pixel * DEVICE_MAX / i64::from(extent)) as i32
}
