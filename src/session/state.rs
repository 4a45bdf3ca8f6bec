//! Capture state machine.
//!
//! Sequences one grading session: permission → live view → preview →
//! upload → result → close. The state tag alone decides which screen is
//! shown and which actions are accepted; actions that do not apply to the
//! current state are ignored, never queued.

use std::path::PathBuf;

use crate::capture::{crop_to_jpeg, Camera, CaptureError, CapturedImage, Facing, FlashMode, Permission};
use crate::config::{AppConfig, OversizePolicy};
use crate::geometry::{compute_crop_region, GuideRegion};
use crate::grading::{grade, AnswerKey, GradingResult, SubmittedAnswers};
use crate::upload::{UploadError, UploadOutcome, Uploader};

/// Result of a successful upload, kept until the session is closed.
#[derive(Clone, Debug, PartialEq)]
pub struct GradedSheet {
    pub submitted: SubmittedAnswers,
    pub result: GradingResult,
    /// URL of the backend-annotated image
    pub marked_image: String,
}

/// Capture state machine states. Session entities live inside the state
/// that owns them and are dropped with it.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// Permission not requested yet (initial state)
    PermissionUnknown,
    /// Camera access refused; nothing can be captured
    PermissionDenied,
    /// Live view, ready for the shutter
    Live,
    /// Showing the cropped photo for confirmation
    Previewing { image: CapturedImage },
    /// Upload in flight
    Uploading { image: CapturedImage, attempt: u64 },
    /// Last upload failed; photo kept for retry
    UploadFailed { image: CapturedImage, message: String },
    /// Answers received and graded
    Graded { image: CapturedImage, sheet: GradedSheet },
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::PermissionUnknown => write!(f, "Requesting permission"),
            CaptureState::PermissionDenied => write!(f, "Permission denied"),
            CaptureState::Live => write!(f, "Live"),
            CaptureState::Previewing { .. } => write!(f, "Previewing"),
            CaptureState::Uploading { attempt, .. } => write!(f, "Uploading (attempt {})", attempt),
            CaptureState::UploadFailed { message, .. } => write!(f, "Upload failed: {}", message),
            CaptureState::Graded { sheet, .. } => write!(
                f,
                "Graded {}/{}",
                sheet.result.score, sheet.result.total
            ),
        }
    }
}

impl CaptureState {
    /// The photo held by the current state, if any.
    pub fn image(&self) -> Option<&CapturedImage> {
        match self {
            CaptureState::Previewing { image }
            | CaptureState::Uploading { image, .. }
            | CaptureState::UploadFailed { image, .. }
            | CaptureState::Graded { image, .. } => Some(image),
            _ => None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self, CaptureState::Uploading { .. })
    }
}

/// A handle for one upload started by [`Session::confirm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadTicket {
    pub attempt: u64,
    pub image_path: PathBuf,
}

/// Session parameters fixed at startup.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub screen_width: f64,
    pub guide: GuideRegion,
    pub oversize_policy: OversizePolicy,
    pub jpeg_quality: u8,
    pub captures_dir: PathBuf,
    pub answer_key: AnswerKey,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig, captures_dir: PathBuf) -> anyhow::Result<Self> {
        Ok(Self {
            screen_width: config.screen_width,
            guide: GuideRegion::new(config.guide_width_fraction)?,
            oversize_policy: config.oversize_policy,
            jpeg_quality: config.jpeg_quality,
            captures_dir,
            answer_key: config.answer_key.clone(),
        })
    }
}

/// The capture state machine together with the camera it drives.
pub struct Session<C: Camera> {
    state: CaptureState,
    camera: C,
    settings: SessionSettings,
    flash: FlashMode,
    facing: Facing,
    /// Transient message for the user, cleared when read
    notice: Option<String>,
    attempts: u64,
}

impl<C: Camera> Session<C> {
    pub fn new(camera: C, settings: SessionSettings) -> Self {
        Self {
            state: CaptureState::PermissionUnknown,
            camera,
            settings,
            flash: FlashMode::default(),
            facing: Facing::default(),
            notice: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn flash(&self) -> FlashMode {
        self.flash
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Returns and clears the pending notice.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    fn set_state(&mut self, next: CaptureState) {
        crate::log(&format!("Session: {} -> {}", self.state, next));
        self.state = next;
    }

    fn notify(&mut self, message: String) {
        crate::log(&format!("Session notice: {}", message));
        self.notice = Some(message);
    }

    fn ignored(&self, action: &str) {
        crate::log(&format!("Session: ignoring {} while {}", action, self.state));
    }

    /// Asks the camera for access. Only meaningful before the first grant.
    pub fn request_permission(&mut self) {
        if self.state != CaptureState::PermissionUnknown {
            self.ignored("permission request");
            return;
        }
        match self.camera.request_permission() {
            Permission::Granted => self.set_state(CaptureState::Live),
            Permission::Denied => {
                self.notify(CaptureError::PermissionDenied.to_string());
                self.set_state(CaptureState::PermissionDenied);
            }
        }
    }

    /// Captures a still, crops it to the guide and shows the preview.
    ///
    /// Returns true if a preview is now showing. On failure the state stays
    /// `Live` and a notice is set.
    pub fn shutter(&mut self) -> bool {
        if self.state != CaptureState::Live {
            self.ignored("shutter");
            return false;
        }

        match self.capture_and_crop() {
            Ok(image) => {
                crate::log(&format!(
                    "Session: cropped {}x{} from {}x{} frame",
                    image.region.width,
                    image.region.height,
                    image.source.pixel_width,
                    image.source.pixel_height
                ));
                self.set_state(CaptureState::Previewing { image });
                true
            }
            Err(e) => {
                self.notify(format!("Capture failed: {}", e));
                false
            }
        }
    }

    fn capture_and_crop(&mut self) -> Result<CapturedImage, CaptureError> {
        let raw = self.camera.capture_still()?;
        let region = compute_crop_region(
            self.settings.screen_width,
            &self.settings.guide,
            raw.frame,
            self.settings.oversize_policy,
        )?;
        crop_to_jpeg(
            &raw,
            &region,
            &self.settings.captures_dir,
            self.settings.jpeg_quality,
        )
    }

    /// Throws the photo away and returns to the live view.
    pub fn retake(&mut self) {
        match std::mem::replace(&mut self.state, CaptureState::Live) {
            CaptureState::Previewing { image } | CaptureState::UploadFailed { image, .. } => {
                crate::log("Session: retake");
                image.discard();
                crate::log(&format!("Session: -> {}", self.state));
            }
            other => {
                self.state = other;
                self.ignored("retake");
            }
        }
    }

    /// Starts an upload of the previewed photo.
    ///
    /// Returns the ticket for the new attempt, or `None` if no upload may
    /// start now (including while one is already in flight).
    pub fn confirm(&mut self) -> Option<UploadTicket> {
        match std::mem::replace(&mut self.state, CaptureState::Live) {
            CaptureState::Previewing { image } | CaptureState::UploadFailed { image, .. } => {
                self.attempts += 1;
                let ticket = UploadTicket {
                    attempt: self.attempts,
                    image_path: image.path.clone(),
                };
                self.state = CaptureState::Uploading {
                    image,
                    attempt: ticket.attempt,
                };
                crate::log(&format!("Session: -> {}", self.state));
                Some(ticket)
            }
            other => {
                self.state = other;
                self.ignored("confirm");
                None
            }
        }
    }

    /// Applies the outcome of an upload started with `confirm`.
    ///
    /// Outcomes for an attempt that is no longer in flight are dropped.
    pub fn complete_upload(&mut self, attempt: u64, outcome: Result<UploadOutcome, UploadError>) {
        let in_flight = matches!(
            &self.state,
            CaptureState::Uploading { attempt: current, .. } if *current == attempt
        );
        if !in_flight {
            crate::log(&format!(
                "Session: dropping result of upload attempt {} while {}",
                attempt, self.state
            ));
            return;
        }

        let CaptureState::Uploading { image, .. } =
            std::mem::replace(&mut self.state, CaptureState::Live)
        else {
            return;
        };

        match outcome {
            Ok(outcome) => {
                let result = grade(&self.settings.answer_key, &outcome.answers);
                self.set_state(CaptureState::Graded {
                    image,
                    sheet: GradedSheet {
                        submitted: outcome.answers,
                        result,
                        marked_image: outcome.marked_image,
                    },
                });
            }
            Err(e) => {
                let message = e.to_string();
                self.notify(format!("Upload failed: {}", message));
                self.set_state(CaptureState::UploadFailed { image, message });
            }
        }
    }

    /// Runs a whole upload round trip inline. Returns true if graded.
    pub fn upload_with(&mut self, uploader: &dyn Uploader) -> bool {
        let Some(ticket) = self.confirm() else {
            return false;
        };
        let outcome = uploader.upload(&ticket.image_path);
        self.complete_upload(ticket.attempt, outcome);
        matches!(self.state, CaptureState::Graded { .. })
    }

    /// Leaves the failure screen and goes back to the preview.
    pub fn dismiss_failure(&mut self) {
        match std::mem::replace(&mut self.state, CaptureState::Live) {
            CaptureState::UploadFailed { image, .. } => {
                self.set_state(CaptureState::Previewing { image });
            }
            other => {
                self.state = other;
                self.ignored("dismiss");
            }
        }
    }

    /// Ends the session: drops the photo, answers and grade, back to live.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.state, CaptureState::Live) {
            CaptureState::Graded { image, .. } => {
                image.discard();
                self.notice = None;
                crate::log(&format!("Session: closed -> {}", self.state));
            }
            other => {
                self.state = other;
                self.ignored("close");
            }
        }
    }

    pub fn toggle_flash(&mut self) {
        self.flash = self.flash.toggled();
        self.camera.set_flash(self.flash);
    }

    pub fn toggle_facing(&mut self) {
        self.facing = self.facing.toggled();
        self.camera.set_facing(self.facing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::still::{still_dimensions, write_tagged_jpeg};
    use crate::capture::RawCapture;
    use crate::geometry::CameraFrame;
    use crate::session::PendingUpload;
    use image::{ImageBuffer, Rgb};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// Camera that hands out pre-written stills, or errors when empty.
    struct ScriptedCamera {
        permission: Permission,
        stills: VecDeque<PathBuf>,
        flash: FlashMode,
        facing: Facing,
    }

    impl Camera for ScriptedCamera {
        fn request_permission(&mut self) -> Permission {
            self.permission
        }

        fn capture_still(&mut self) -> Result<RawCapture, CaptureError> {
            let handle = self
                .stills
                .pop_front()
                .ok_or_else(|| CaptureError::NoFrame("camera busy".into()))?;
            let (pixel_width, pixel_height) = still_dimensions(&handle)?;
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

    /// Uploader that returns a fixed answer set and counts calls.
    struct FakeUploader {
        answers: Option<SubmittedAnswers>,
        calls: Cell<u32>,
    }

    impl Uploader for FakeUploader {
        fn upload(&self, image: &Path) -> Result<UploadOutcome, UploadError> {
            self.calls.set(self.calls.get() + 1);
            assert!(image.exists(), "uploaded file must exist");
            match &self.answers {
                Some(answers) => Ok(UploadOutcome {
                    answers: answers.clone(),
                    marked_image: "http://grader/marked".into(),
                }),
                None => Err(UploadError::Transport("connection refused".into())),
            }
        }

        fn fetch_marked_image(&self, _url: &str) -> Result<Vec<u8>, UploadError> {
            Ok(Vec::new())
        }
    }

    fn write_still(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        ImageBuffer::from_pixel(width, height, Rgb([200u8, 200, 200]))
            .save(&path)
            .unwrap();
        path
    }

    fn key() -> AnswerKey {
        [("Q1", "B"), ("Q2", "C")]
            .into_iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect()
    }

    fn session_with(
        permission: Permission,
        still_count: usize,
    ) -> (Session<ScriptedCamera>, TempDir) {
        let dir = tempdir().unwrap();
        let stills = (0..still_count)
            .map(|i| write_still(dir.path(), &format!("raw_{}.png", i), 120, 160))
            .collect();
        let camera = ScriptedCamera {
            permission,
            stills,
            flash: FlashMode::Off,
            facing: Facing::Back,
        };
        let settings = SessionSettings {
            screen_width: 390.0,
            guide: GuideRegion::new(0.9).unwrap(),
            oversize_policy: OversizePolicy::Reject,
            jpeg_quality: 90,
            captures_dir: dir.path().join("captures"),
            answer_key: key(),
        };
        (Session::new(camera, settings), dir)
    }

    fn uploader(pairs: &[(&str, &str)]) -> FakeUploader {
        FakeUploader {
            answers: Some(
                pairs
                    .iter()
                    .map(|(q, a)| (q.to_string(), a.to_string()))
                    .collect(),
            ),
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", CaptureState::Live), "Live");
        assert_eq!(
            format!("{}", CaptureState::PermissionUnknown),
            "Requesting permission"
        );
    }

    #[test]
    fn test_permission_denied_blocks_capture() {
        let (mut session, _dir) = session_with(Permission::Denied, 1);

        session.request_permission();
        assert_eq!(*session.state(), CaptureState::PermissionDenied);
        assert!(session.take_notice().is_some());

        assert!(!session.shutter());
        assert_eq!(*session.state(), CaptureState::PermissionDenied);
    }

    #[test]
    fn test_full_session() {
        let (mut session, _dir) = session_with(Permission::Granted, 1);
        session.request_permission();
        assert_eq!(*session.state(), CaptureState::Live);

        assert!(session.shutter());
        let image = session.state().image().cloned().unwrap();
        assert_eq!(image.region.width, 108);
        assert_eq!(image.region.height, 144);

        let backend = uploader(&[("Q1", "B"), ("Q2", "D")]);
        assert!(session.upload_with(&backend));

        match session.state() {
            CaptureState::Graded { sheet, .. } => {
                assert_eq!(sheet.result.score, 1);
                assert_eq!(sheet.result.total, 2);
                assert_eq!(sheet.result.percentage, 50);
                assert_eq!(sheet.marked_image, "http://grader/marked");
            }
            other => panic!("expected Graded, got {}", other),
        }
    }

    #[test]
    fn test_capture_failure_stays_live() {
        let (mut session, _dir) = session_with(Permission::Granted, 0);
        session.request_permission();

        assert!(!session.shutter());
        assert_eq!(*session.state(), CaptureState::Live);
        assert!(session.take_notice().unwrap().starts_with("Capture failed"));
        assert!(session.take_notice().is_none());
    }

    #[test]
    fn test_landscape_capture_is_rejected() {
        let (mut session, dir) = session_with(Permission::Granted, 0);
        session.camera.stills.push_back(write_still(dir.path(), "wide.png", 160, 120));
        session.request_permission();

        assert!(!session.shutter());
        assert_eq!(*session.state(), CaptureState::Live);
        assert!(session.take_notice().unwrap().contains("does not fit the guide"));
    }

    #[test]
    fn test_rotated_portrait_photo_is_accepted() {
        let (mut session, dir) = session_with(Permission::Granted, 0);
        let still = dir.path().join("IMG_0003.jpg");
        write_tagged_jpeg(&still, 160, 120, 6);
        session.camera.stills.push_back(still);
        session.request_permission();

        assert!(session.shutter());
        let image = session.state().image().unwrap();
        assert_eq!(
            image.source,
            CameraFrame {
                pixel_width: 120,
                pixel_height: 160
            }
        );
        assert_eq!((image.region.width, image.region.height), (108, 144));
    }

    #[test]
    fn test_shutter_ignored_while_previewing() {
        let (mut session, _dir) = session_with(Permission::Granted, 2);
        session.request_permission();
        assert!(session.shutter());
        let first = session.state().image().cloned().unwrap();

        assert!(!session.shutter());
        assert_eq!(session.state().image(), Some(&first));
        assert_eq!(session.camera.stills.len(), 1, "no second capture was taken");
    }

    #[test]
    fn test_second_confirm_while_uploading_is_noop() {
        let (mut session, _dir) = session_with(Permission::Granted, 1);
        session.request_permission();
        session.shutter();

        let ticket = session.confirm().unwrap();
        assert!(session.state().is_uploading());

        assert_eq!(session.confirm(), None);
        assert!(!session.shutter());
        session.retake();
        assert!(session.state().is_uploading());
        assert!(ticket.image_path.exists());

        let backend = uploader(&[("Q1", "B")]);
        assert!(!session.upload_with(&backend));
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn test_retake_discards_image() {
        let (mut session, _dir) = session_with(Permission::Granted, 2);
        session.request_permission();
        session.shutter();
        let first = session.state().image().cloned().unwrap();

        session.retake();
        assert_eq!(*session.state(), CaptureState::Live);
        assert!(session.state().image().is_none());
        assert!(!first.path.exists());

        assert!(session.shutter());
        assert_ne!(session.state().image().unwrap().path, first.path);
    }

    #[test]
    fn test_upload_failure_and_retry() {
        let (mut session, _dir) = session_with(Permission::Granted, 1);
        session.request_permission();
        session.shutter();

        let failing = FakeUploader {
            answers: None,
            calls: Cell::new(0),
        };
        assert!(!session.upload_with(&failing));
        match session.state() {
            CaptureState::UploadFailed { message, .. } => {
                assert!(message.contains("connection refused"))
            }
            other => panic!("expected UploadFailed, got {}", other),
        }
        assert!(session.take_notice().is_some());

        session.dismiss_failure();
        assert!(matches!(session.state(), CaptureState::Previewing { .. }));

        let backend = uploader(&[("Q1", "B")]);
        assert!(session.upload_with(&backend));
        assert_eq!(failing.calls.get(), 1);
        assert_eq!(backend.calls.get(), 1);
    }

    #[test]
    fn test_stale_upload_result_is_dropped() {
        let (mut session, _dir) = session_with(Permission::Granted, 1);
        session.request_permission();
        session.shutter();

        let first = session.confirm().unwrap();
        session.complete_upload(first.attempt, Err(UploadError::Timeout(10)));
        let second = session.confirm().unwrap();
        assert_ne!(first.attempt, second.attempt);

        let late = UploadOutcome {
            answers: SubmittedAnswers::new(),
            marked_image: "http://grader/marked".into(),
        };
        session.complete_upload(first.attempt, Ok(late));
        assert!(session.state().is_uploading());
    }

    #[test]
    fn test_lost_worker_ends_in_upload_failed() {
        let (mut session, _dir) = session_with(Permission::Granted, 1);
        session.request_permission();
        session.shutter();
        let ticket = session.confirm().unwrap();

        let (sender, receiver) = std::sync::mpsc::channel();
        let pending = PendingUpload::new(ticket.attempt, receiver);
        drop(sender);
        let report = pending.try_report().unwrap();
        session.complete_upload(report.attempt, report.outcome);

        assert!(matches!(session.state(), CaptureState::UploadFailed { .. }));
        assert!(session.confirm().is_some(), "retry is possible after the failure");
    }

    #[test]
    fn test_close_resets_session() {
        let (mut session, _dir) = session_with(Permission::Granted, 2);
        session.request_permission();
        session.shutter();
        let image = session.state().image().cloned().unwrap();
        session.upload_with(&uploader(&[("Q1", "B")]));

        session.close();

        assert_eq!(*session.state(), CaptureState::Live);
        assert!(session.state().image().is_none());
        assert!(session.take_notice().is_none());
        assert!(!image.path.exists());

        // A new cycle starts from the same clean state
        assert!(session.shutter());
        assert!(matches!(session.state(), CaptureState::Previewing { .. }));
    }

    #[test]
    fn test_toggles_do_not_change_state() {
        let (mut session, _dir) = session_with(Permission::Granted, 1);
        session.request_permission();
        session.shutter();
        let before = session.state().clone();

        session.toggle_flash();
        session.toggle_facing();

        assert_eq!(*session.state(), before);
        assert_eq!(session.flash(), FlashMode::On);
        assert_eq!(session.facing(), Facing::Front);
        assert_eq!(session.camera.flash, FlashMode::On);

        session.toggle_flash();
        assert_eq!(session.flash(), FlashMode::Off);
    }
}
