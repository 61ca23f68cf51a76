/// Window geometry: sizes, UA size bounds and aspect-ratio math

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `width / height`; `None` for a degenerate size
    pub fn ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }
}

/// Inclusive window size limits imposed by the UA
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBounds {
    pub min: Size,
    pub max: Size,
}

impl SizeBounds {
    pub fn new(min: Size, max: Size) -> Result<Self> {
        if min.width == 0 || min.height == 0 {
            return Err(Error::ConfigError("minimum size must be non-zero".to_string()));
        }
        if min.width > max.width || min.height > max.height {
            return Err(Error::ConfigError(format!(
                "minimum size {}x{} exceeds maximum {}x{}",
                min.width, min.height, max.width, max.height
            )));
        }
        Ok(Self { min, max })
    }

    /// Clamp each dimension independently.
    pub fn clamp(&self, size: Size) -> Size {
        Size {
            width: size.width.clamp(self.min.width, self.max.width),
            height: size.height.clamp(self.min.height, self.max.height),
        }
    }

    /// Clamp while keeping `width / height` as close to `ratio` as integer
    /// pixels allow. Width drives; height follows. If the bounds cannot
    /// hold the ratio at all the bounds win.
    pub fn clamp_with_ratio(&self, size: Size, ratio: f64) -> Size {
        let mut width = size.width.clamp(self.min.width, self.max.width);
        let mut height = height_for(width, ratio);

        if height > self.max.height {
            height = self.max.height;
            width = width_for(height, ratio);
        } else if height < self.min.height {
            height = self.min.height;
            width = width_for(height, ratio);
        }

        self.clamp(Size { width, height })
    }
}

/// Validate an aspect ratio passed from script.
pub fn validate_aspect_ratio(ratio: f32) -> Result<f64> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(Error::Validation(format!(
            "aspect ratio must be a positive finite number, got {}",
            ratio
        )));
    }
    Ok(ratio as f64)
}

pub(crate) fn height_for(width: u32, ratio: f64) -> u32 {
    ((width as f64 / ratio).round() as u32).max(1)
}

pub(crate) fn width_for(height: u32, ratio: f64) -> u32 {
    ((height as f64 * ratio).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> SizeBounds {
        SizeBounds::new(Size::new(100, 100), Size::new(1536, 864)).unwrap()
    }

    #[test]
    fn clamp_limits_each_axis() {
        let b = bounds();
        assert_eq!(b.clamp(Size::new(10, 5000)), Size::new(100, 864));
        assert_eq!(b.clamp(Size::new(300, 200)), Size::new(300, 200));
    }

    #[test]
    fn clamp_with_ratio_keeps_ratio_when_too_tall() {
        let b = bounds();
        // 1:2 at width 1000 would be 2000 tall; height caps at 864
        let s = b.clamp_with_ratio(Size::new(1000, 0), 0.5);
        assert_eq!(s, Size::new(432, 864));
    }

    #[test]
    fn clamp_with_ratio_grows_when_too_short() {
        let b = bounds();
        let s = b.clamp_with_ratio(Size::new(120, 0), 4.0);
        assert_eq!(s, Size::new(400, 100));
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        assert!(validate_aspect_ratio(0.0).is_err());
        assert!(validate_aspect_ratio(-1.5).is_err());
        assert!(validate_aspect_ratio(f32::NAN).is_err());
        assert!(validate_aspect_ratio(f32::INFINITY).is_err());
        assert_eq!(validate_aspect_ratio(2.0).unwrap(), 2.0);
    }

    #[test]
    fn inverted_bounds_are_a_config_error() {
        let err = SizeBounds::new(Size::new(500, 500), Size::new(400, 800)).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
