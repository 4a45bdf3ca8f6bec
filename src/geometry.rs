//! Guide-to-frame coordinate conversion.
//!
//! Maps the on-screen alignment guide (a screen-centered 3:4 rectangle sized
//! as a fraction of the logical screen width) to a crop rectangle in the pixel
//! space of the full-resolution captured frame.

use serde::{Deserialize, Serialize};

use crate::config::OversizePolicy;

/// Guide height divided by guide width.
pub const GUIDE_ASPECT: f64 = 4.0 / 3.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("screen width must be positive (got {0})")]
    InvalidScreenWidth(f64),
    #[error("guide width fraction must be in (0, 1] (got {0})")]
    InvalidGuideFraction(f64),
    #[error("captured frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("guide needs {needed}px of height but the frame has {available}px")]
    CropTooTall { needed: u32, available: u32 },
}

/// The alignment guide, relative to the logical screen.
///
/// Only the width is stored; the height always follows from [`GUIDE_ASPECT`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GuideRegion {
    width_fraction: f64,
}

impl GuideRegion {
    pub fn new(width_fraction: f64) -> Result<Self, GeometryError> {
        if !(width_fraction > 0.0 && width_fraction <= 1.0) {
            return Err(GeometryError::InvalidGuideFraction(width_fraction));
        }
        Ok(Self { width_fraction })
    }

    /// Guide size in logical screen units: (width, height).
    pub fn size_on_screen(&self, screen_width: f64) -> (f64, f64) {
        let width = screen_width * self.width_fraction;
        (width, width * GUIDE_ASPECT)
    }
}

/// Pixel size of a captured still.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// A rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// True if the rectangle lies entirely inside the frame.
    pub fn fits_within(&self, frame: &CameraFrame) -> bool {
        self.origin_x as u64 + self.width as u64 <= frame.pixel_width as u64
            && self.origin_y as u64 + self.height as u64 <= frame.pixel_height as u64
    }
}

/// Computes the frame rectangle that was visible inside the guide at capture time.
///
/// Assumes the live preview spans the full logical screen width, so one
/// logical unit maps to `pixel_width / screen_width` sensor pixels. The crop
/// keeps the guide's 3:4 ratio regardless of the sensor's ratio and is
/// centered in the frame.
///
/// When the sensor is narrower than 4:3 the crop would be taller than the
/// frame; `policy` decides between failing and shrinking the crop.
pub fn compute_crop_region(
    screen_width: f64,
    guide: &GuideRegion,
    frame: CameraFrame,
    policy: OversizePolicy,
) -> Result<CropRegion, GeometryError> {
    if !(screen_width.is_finite() && screen_width > 0.0) {
        return Err(GeometryError::InvalidScreenWidth(screen_width));
    }
    if frame.pixel_width == 0 || frame.pixel_height == 0 {
        return Err(GeometryError::EmptyFrame {
            width: frame.pixel_width,
            height: frame.pixel_height,
        });
    }

    let (guide_width, guide_height) = guide.size_on_screen(screen_width);
    let scale = frame.pixel_width as f64 / screen_width;
    let crop_width = guide_width * scale;
    let crop_height = crop_width * (guide_height / guide_width);

    let mut width = (crop_width.round() as u32).clamp(1, frame.pixel_width);
    let mut height = ((width as f64 * GUIDE_ASPECT).round() as u32).max(1);

    if height > frame.pixel_height {
        match policy {
            OversizePolicy::Reject => {
                return Err(GeometryError::CropTooTall {
                    needed: crop_height.round() as u32,
                    available: frame.pixel_height,
                });
            }
            OversizePolicy::Clamp => {
                height = frame.pixel_height;
                width = ((height as f64 / GUIDE_ASPECT).round() as u32).clamp(1, frame.pixel_width);
            }
        }
    }

    Ok(CropRegion {
        origin_x: (frame.pixel_width - width) / 2,
        origin_y: (frame.pixel_height - height) / 2,
        width,
        height,
    })
}
