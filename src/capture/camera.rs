//! Camera contract and the folder-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::still::still_dimensions;
use super::CaptureError;
use crate::geometry::CameraFrame;

/// File extensions the folder camera accepts as stills.
const STILL_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Facing {
    #[default]
    Back,
    Front,
}

impl Facing {
    pub fn toggled(self) -> Self {
        match self {
            Facing::Back => Facing::Front,
            Facing::Front => Facing::Back,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlashMode {
    #[default]
    Off,
    On,
}

impl FlashMode {
    pub fn toggled(self) -> Self {
        match self {
            FlashMode::Off => FlashMode::On,
            FlashMode::On => FlashMode::Off,
        }
    }
}

/// A full-resolution still straight from the camera.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCapture {
    pub frame: CameraFrame,
    /// Local file holding the still
    pub handle: PathBuf,
}

/// What the capture flow needs from camera hardware.
pub trait Camera {
    fn request_permission(&mut self) -> Permission;

    /// Blocks until the camera returns a still.
    fn capture_still(&mut self) -> Result<RawCapture, CaptureError>;

    fn set_facing(&mut self, facing: Facing);

    fn set_flash(&mut self, flash: FlashMode);
}

/// Treats a directory as the camera: every capture takes the most recently
/// modified photo in it. Photos are dropped there by a phone sync or a
/// tethered camera.
pub struct FolderCamera {
    inbox: PathBuf,
    facing: Facing,
    flash: FlashMode,
}

impl FolderCamera {
    pub fn new(inbox: PathBuf) -> Self {
        Self {
            inbox,
            facing: Facing::default(),
            flash: FlashMode::default(),
        }
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }
}

impl Camera for FolderCamera {
    fn request_permission(&mut self) -> Permission {
        match fs::create_dir_all(&self.inbox).and_then(|_| fs::read_dir(&self.inbox)) {
            Ok(_) => Permission::Granted,
            Err(e) => {
                crate::log(&format!(
                    "Camera inbox {} is not accessible: {}",
                    self.inbox.display(),
                    e
                ));
                Permission::Denied
            }
        }
    }

    fn capture_still(&mut self) -> Result<RawCapture, CaptureError> {
        let handle = newest_still(&self.inbox)?.ok_or_else(|| {
            CaptureError::NoFrame(format!("no photos in {}", self.inbox.display()))
        })?;

        let (pixel_width, pixel_height) = still_dimensions(&handle)?;
        crate::log(&format!(
            "Captured {} ({}x{}, facing {:?}, flash {:?})",
            handle.display(),
            pixel_width,
            pixel_height,
            self.facing,
            self.flash
        ));

        Ok(RawCapture {
            frame: CameraFrame {
                pixel_width,
                pixel_height,
            },
            handle,
        })
    }

    fn set_facing(&mut self, facing: Facing) {
        self.facing = facing;
    }

    fn set_flash(&mut self, flash: FlashMode) {
        self.flash = flash;
    }
}

/// Returns the most recently modified still in `dir`, if any.
fn newest_still(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let is_still = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_still || !path.is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified >= *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_toggles_flip_back_and_forth() {
        assert_eq!(Facing::Back.toggled(), Facing::Front);
        assert_eq!(Facing::Back.toggled().toggled(), Facing::Back);
        assert_eq!(FlashMode::Off.toggled(), FlashMode::On);
        assert_eq!(FlashMode::On.toggled(), FlashMode::Off);
    }

    #[test]
    fn test_empty_inbox_has_no_frame() {
        let dir = tempdir().unwrap();
        let mut camera = FolderCamera::new(dir.path().to_path_buf());

        assert_eq!(camera.request_permission(), Permission::Granted);
        assert!(matches!(camera.capture_still(), Err(CaptureError::NoFrame(_))));
    }

    #[test]
    fn test_captures_newest_photo() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.png");
        let new = dir.path().join("new.jpg");
        ImageBuffer::from_pixel(30, 40, Rgb([255u8, 255, 255])).save(&old).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a photo").unwrap();
        ImageBuffer::from_pixel(60, 80, Rgb([0u8, 0, 0])).save(&new).unwrap();
        File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();

        let mut camera = FolderCamera::new(dir.path().to_path_buf());
        let raw = camera.capture_still().unwrap();

        assert_eq!(raw.handle, new);
        assert_eq!(
            raw.frame,
            CameraFrame {
                pixel_width: 60,
                pixel_height: 80
            }
        );
    }

    #[test]
    fn test_rotated_phone_photo_is_reported_upright() {
        let dir = tempdir().unwrap();
        crate::capture::still::write_tagged_jpeg(&dir.path().join("IMG_0001.jpg"), 160, 120, 6);

        let mut camera = FolderCamera::new(dir.path().to_path_buf());
        let raw = camera.capture_still().unwrap();

        assert_eq!(
            raw.frame,
            CameraFrame {
                pixel_width: 120,
                pixel_height: 160
            }
        );
    }
}
