//! GUI application state management.
//!
//! Picks the screen from the session's state tag and holds the
//! presentation-only data (textures, pending upload, notices).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::egui::TextureHandle;

use crate::session::{CaptureState, PendingUpload};

/// How long a notice stays on screen.
const NOTICE_DURATION: Duration = Duration::from_secs(4);

/// The screen to draw. Derived from the state tag only, never from which
/// data happens to be loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    RequestingPermission,
    NoAccess,
    Camera,
    /// Preview with confirm/retake; `busy` while the upload runs. A failed
    /// upload shows the same screen with the failure message.
    Preview { busy: bool },
    Result,
}

impl Screen {
    pub fn for_state(state: &CaptureState) -> Self {
        match state {
            CaptureState::PermissionUnknown => Screen::RequestingPermission,
            CaptureState::PermissionDenied => Screen::NoAccess,
            CaptureState::Live => Screen::Camera,
            CaptureState::Previewing { .. } | CaptureState::UploadFailed { .. } => {
                Screen::Preview { busy: false }
            }
            CaptureState::Uploading { .. } => Screen::Preview { busy: true },
            CaptureState::Graded { .. } => Screen::Result,
        }
    }
}

/// A transient message shown at the bottom of the window.
#[derive(Clone, Debug)]
pub struct Notice {
    pub message: String,
    pub shown_at: Instant,
}

impl Notice {
    pub fn new(message: String) -> Self {
        Self {
            message,
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= NOTICE_DURATION
    }
}

/// GUI application state.
#[derive(Default)]
pub struct GuiState {
    /// The upload in flight, if any
    pub pending_upload: Option<PendingUpload>,
    /// Texture of the previewed photo, with the file it was loaded from
    pub preview: Option<(PathBuf, TextureHandle)>,
    /// Annotated image bytes from the last successful upload
    pub marked_bytes: Option<Vec<u8>>,
    pub marked_texture: Option<TextureHandle>,
    pub notice: Option<Notice>,
}

impl GuiState {
    /// Drops everything tied to the finished session.
    pub fn clear_session(&mut self) {
        self.pending_upload = None;
        self.preview = None;
        self.marked_bytes = None;
        self.marked_texture = None;
    }
}
