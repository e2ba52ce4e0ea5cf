pub const ZOOM_DENOMINATOR: u32 = 100;
pub const ZOOM_MIN: u32 = 20;
pub const ZOOM_MAX: u32 = 400;
pub const DEFAULT_ZOOM: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Wheel deltas above zero zoom in.
    pub fn from_wheel(delta: i32) -> Option<Self> {
        match delta {
            d if d > 0 => Some(Self::In),
            d if d < 0 => Some(Self::Out),
            _ => None,
        }
    }
}

/// Text zoom ratio `numerator / 100`, kept within `[20, 400]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextZoom {
    numerator: u32,
}

impl Default for TextZoom {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM)
    }
}

impl TextZoom {
    pub fn new(numerator: u32) -> Self {
        Self {
            numerator: numerator.clamp(ZOOM_MIN, ZOOM_MAX),
        }
    }

    pub fn numerator(self) -> u32 {
        self.numerator
    }

    pub fn denominator(self) -> u32 {
        ZOOM_DENOMINATOR
    }

    /// One wheel notch: x1.1 in, x0.9 out, truncated and clamped.
    pub fn step(self, direction: ZoomDirection) -> Self {
        let scaled = match direction {
            ZoomDirection::In => self.numerator * 11 / 10,
            ZoomDirection::Out => self.numerator * 9 / 10,
        };
        Self::new(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::{TextZoom, ZoomDirection, ZOOM_MAX, ZOOM_MIN};

    #[test]
    fn steps_scale_by_ten_percent() {
        let zoom = TextZoom::default();
        assert_eq!(zoom.step(ZoomDirection::In).numerator(), 198);
        assert_eq!(zoom.step(ZoomDirection::Out).numerator(), 162);
    }

    #[test]
    fn repeated_steps_stay_clamped() {
        let mut zoom = TextZoom::default();
        for _ in 0..100 {
            zoom = zoom.step(ZoomDirection::In);
        }
        assert_eq!(zoom.numerator(), ZOOM_MAX);
        for _ in 0..100 {
            zoom = zoom.step(ZoomDirection::Out);
        }
        assert_eq!(zoom.numerator(), ZOOM_MIN);
        assert_eq!(TextZoom::new(5).numerator(), ZOOM_MIN);
    }

    #[test]
    fn wheel_direction() {
        assert_eq!(ZoomDirection::from_wheel(120), Some(ZoomDirection::In));
        assert_eq!(ZoomDirection::from_wheel(-240), Some(ZoomDirection::Out));
        assert_eq!(ZoomDirection::from_wheel(0), None);
    }
}
