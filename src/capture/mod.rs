//! Still capture and cropping.
//!
//! This module provides:
//! - The camera contract the capture flow depends on (`Camera`)
//! - A folder-backed camera that takes the newest photo from an inbox
//! - Reading stills upright, with their EXIF orientation applied
//! - Cropping a captured frame to the guide region as JPEG (`crop_to_jpeg`)

pub mod camera;
pub mod crop;
pub mod still;

pub use camera::{Camera, Facing, FlashMode, FolderCamera, Permission, RawCapture};
pub use crop::{crop_to_jpeg, CapturedImage};

use crate::geometry::GeometryError;

/// Why a capture attempt produced no usable image.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("camera permission was not granted")]
    PermissionDenied,
    #[error("no photo available: {0}")]
    NoFrame(String),
    #[error("photo does not fit the guide: {0}")]
    Geometry(#[from] GeometryError),
    #[error("could not process photo: {0}")]
    Image(#[from] image::ImageError),
    #[error("could not access photo: {0}")]
    Io(#[from] std::io::Error),
}
