//! Reading stills the way they were framed.
//!
//! Phone cameras usually store a portrait photo as landscape pixels plus an
//! EXIF orientation tag. Everything downstream works in the upright frame, so
//! both the reported size and the decoded pixels have the tag applied.

use std::path::Path;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};

use super::CaptureError;

/// Upright (width, height) of the still at `path`, without decoding pixels.
pub fn still_dimensions(path: &Path) -> Result<(u32, u32), CaptureError> {
    let mut decoder = ImageReader::open(path)?.with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation()?;
    let (width, height) = decoder.dimensions();

    if swaps_axes(orientation) {
        Ok((height, width))
    } else {
        Ok((width, height))
    }
}

/// Decodes the still at `path` and rotates it upright.
pub fn open_still(path: &Path) -> Result<DynamicImage, CaptureError> {
    let mut decoder = ImageReader::open(path)?.with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Writes a JPEG whose stored pixels are `width`x`height` with the left half
/// black and the right half white, tagged with EXIF `orientation`.
#[cfg(test)]
pub(crate) fn write_tagged_jpeg(path: &Path, width: u32, height: u32, orientation: u16) {
    use image::codecs::jpeg::JpegEncoder;
    use image::{ImageBuffer, Rgb};

    let pixels = ImageBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 { Rgb([0u8, 0, 0]) } else { Rgb([255u8, 255, 255]) }
    });
    let mut jpeg = Vec::new();
    pixels
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, 95))
        .unwrap();

    // APP1 "Exif" segment: big-endian TIFF header with a single IFD entry
    // (tag 0x0112 Orientation, type SHORT, count 1)
    let mut exif = Vec::new();
    exif.extend_from_slice(b"Exif\0\0");
    exif.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
    exif.extend_from_slice(&1u16.to_be_bytes());
    exif.extend_from_slice(&0x0112u16.to_be_bytes());
    exif.extend_from_slice(&3u16.to_be_bytes());
    exif.extend_from_slice(&1u32.to_be_bytes());
    exif.extend_from_slice(&orientation.to_be_bytes());
    exif.extend_from_slice(&[0, 0]);
    exif.extend_from_slice(&0u32.to_be_bytes());

    let mut tagged = vec![0xFF, 0xD8, 0xFF, 0xE1];
    tagged.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
    tagged.extend_from_slice(&exif);
    tagged.extend_from_slice(&jpeg[2..]);
    std::fs::write(path, tagged).unwrap();
}
