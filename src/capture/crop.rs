//! Crops a raw still to the guide region and stores it as JPEG.

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::still::open_still;
use super::{CaptureError, RawCapture};
use crate::geometry::{CameraFrame, CropRegion};

/// The cropped photo of one capture, owned by the current session.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedImage {
    pub path: PathBuf,
    pub source: CameraFrame,
    pub region: CropRegion,
}

impl CapturedImage {
    /// Deletes the cropped file. The raw still is left alone.
    pub fn discard(self) {
        match fs::remove_file(&self.path) {
            Ok(()) => crate::log(&format!("Discarded {}", self.path.display())),
            Err(e) => crate::log(&format!(
                "Warning: failed to delete {}: {}",
                self.path.display(),
                e
            )),
        }
    }
}

/// Crops `raw` to `region` and writes the result to `out_dir` as a
/// timestamped JPEG at the given quality.
///
/// `region` is in the upright frame, after EXIF orientation.
pub fn crop_to_jpeg(
    raw: &RawCapture,
    region: &CropRegion,
    out_dir: &Path,
    quality: u8,
) -> Result<CapturedImage, CaptureError> {
    let img = open_still(&raw.handle)?.to_rgb8();
    let (w, h) = img.dimensions();
    if (w, h) != (raw.frame.pixel_width, raw.frame.pixel_height) {
        return Err(CaptureError::NoFrame(format!(
            "photo changed while capturing ({}x{}, expected {}x{})",
            w, h, raw.frame.pixel_width, raw.frame.pixel_height
        )));
    }

    if !region.fits_within(&raw.frame) {
        return Err(CaptureError::NoFrame(format!(
            "crop {}x{} at ({}, {}) falls outside the {}x{} photo",
            region.width, region.height, region.origin_x, region.origin_y, w, h
        )));
    }

    let cropped =
        image::imageops::crop_imm(&img, region.origin_x, region.origin_y, region.width, region.height)
            .to_image();

    fs::create_dir_all(out_dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = out_dir.join(format!("sheet_{}.jpg", timestamp));

    let writer = BufWriter::new(File::create(&path)?);
    cropped.write_with_encoder(JpegEncoder::new_with_quality(writer, quality))?;

    crate::log(&format!(
        "Cropped {}x{} at ({}, {}) -> {}",
        region.width,
        region.height,
        region.origin_x,
        region.origin_y,
        path.display()
    ));

    Ok(CapturedImage {
        path,
        source: raw.frame,
        region: *region,
    })
}
