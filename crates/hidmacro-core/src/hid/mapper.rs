//! Pixel → absolute coordinate mapping.
//!
//! An absolute pointer does not know anything about the host's screen
//! resolution.  Its X and Y fields span a fixed logical range (here
//! `0..=32767`) and the host operating system scales that range onto whatever
//! display it is driving.  To click on pixel `(100, 200)` of a 2560×1440
//! screen the device therefore has to send
//! `(100 / 2560 * 32767, 200 / 1440 * 32767)`.
//!
//! The mapping is pure and deterministic.  Pixels outside the configured
//! screen are not rejected; they clamp to the nearest edge.

use thiserror::Error;

/// Largest value of an absolute X or Y field.
pub const ABSOLUTE_MAX: u16 = 32767;

/// Errors raised when building a [`ScreenGeometry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Width or height is zero, which would divide by zero when mapping.
    #[error("screen dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
}

/// Screen resolution of the host the device is plugged into.
///
/// Fixed at process start.  Construction fails for a zero dimension, so every
/// `ScreenGeometry` that exists is safe to divide by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    width: u32,
    height: u32,
}

impl ScreenGeometry {
    /// Creates a geometry of `width` × `height` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroDimension`] if either dimension is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hidmacro_core::ScreenGeometry;
    ///
    /// assert!(ScreenGeometry::new(2560, 1440).is_ok());
    /// assert!(ScreenGeometry::new(0, 1440).is_err());
    /// ```
    pub fn new(width: u32, height: u32) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::ZeroDimension { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Converts pixel coordinates into the device's absolute `0..=32767` range.
///
/// Each axis is computed independently as `round(p / size * 32767)` and then
/// clamped, so negative pixels land on 0 and pixels beyond the screen land on
/// 32767.
///
/// # Examples
///
/// ```rust
/// use hidmacro_core::{pixel_to_absolute, ScreenGeometry};
///
/// let screen = ScreenGeometry::new(1920, 1080).unwrap();
/// assert_eq!(pixel_to_absolute(0, 0, &screen), (0, 0));
/// assert_eq!(pixel_to_absolute(1920, 1080, &screen), (32767, 32767));
/// assert_eq!(pixel_to_absolute(960, 540, &screen), (16384, 16384));
/// ```
pub fn pixel_to_absolute(px: i64, py: i64, geometry: &ScreenGeometry) -> (u16, u16) {
    (
        scale_axis(px, geometry.width),
        scale_axis(py, geometry.height),
    )
}

fn scale_axis(pixel: i64, size: u32) -> u16 {
    let scaled = (pixel as f64 / f64::from(size) * f64::from(ABSOLUTE_MAX)).round();
    scaled.clamp(0.0, f64::from(ABSOLUTE_MAX)) as u16
}

// ── Tests ─────────────────────────────────────────────────────────────────────
