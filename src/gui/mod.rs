//! GUI module for the application.
//!
//! Provides a graphical interface using egui/eframe. Each frame polls the
//! upload worker, then draws the screen for the session's current state.

pub mod render;
pub mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, TextureHandle, Vec2};

use crate::capture::FolderCamera;
use crate::report::ResultView;
use crate::session::{spawn_upload, CaptureState, Session};
use crate::upload::UploadClient;

use render::{LiveAction, PreviewAction};
use state::{GuiState, Notice, Screen};

/// Main GUI application struct.
pub struct GraderApp {
    session: Session<FolderCamera>,
    uploader: Arc<UploadClient>,
    state: GuiState,
}

impl GraderApp {
    /// Create a new GUI application instance and ask for camera access.
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        mut session: Session<FolderCamera>,
        uploader: Arc<UploadClient>,
    ) -> Self {
        session.request_permission();

        let mut app = Self {
            session,
            uploader,
            state: GuiState::default(),
        };
        app.collect_notice();
        app
    }

    /// Moves a pending session notice onto the screen.
    fn collect_notice(&mut self) {
        if let Some(message) = self.session.take_notice() {
            self.state.notice = Some(Notice::new(message));
        }
    }

    /// Applies the upload report if the worker has finished.
    fn poll_upload(&mut self) {
        let Some(report) = self
            .state
            .pending_upload
            .as_ref()
            .and_then(|pending| pending.try_report())
        else {
            return;
        };

        self.state.pending_upload = None;
        if report.outcome.is_ok() {
            self.state.marked_bytes = report.marked_image;
            self.state.marked_texture = None;
        }
        self.session.complete_upload(report.attempt, report.outcome);
    }

    /// Loads textures for whatever the current state shows.
    fn sync_textures(&mut self, ctx: &egui::Context) {
        let image_path = self.session.state().image().map(|image| image.path.clone());

        match image_path {
            Some(path) => {
                let stale = self
                    .state
                    .preview
                    .as_ref()
                    .is_none_or(|(loaded, _)| *loaded != path);
                if stale {
                    self.state.preview = load_file_texture(ctx, "preview", &path)
                        .map(|texture| (path, texture));
                }
            }
            None => self.state.preview = None,
        }

        if self.state.marked_texture.is_none() {
            if let Some(bytes) = &self.state.marked_bytes {
                self.state.marked_texture = load_memory_texture(ctx, "marked", bytes);
                if self.state.marked_texture.is_none() {
                    crate::log("GUI: could not decode marked image");
                    self.state.marked_bytes = None;
                }
            }
        }
    }

    fn handle_live(&mut self, action: LiveAction) {
        match action {
            LiveAction::Shutter => {
                self.session.shutter();
            }
            LiveAction::ToggleFlash => self.session.toggle_flash(),
            LiveAction::ToggleFacing => self.session.toggle_facing(),
        }
    }

    fn handle_preview(&mut self, action: PreviewAction) {
        match action {
            PreviewAction::Retake => self.session.retake(),
            PreviewAction::Confirm => {
                if self.state.pending_upload.is_some() {
                    return;
                }
                if let Some(ticket) = self.session.confirm() {
                    let pending = spawn_upload(Arc::clone(&self.uploader), ticket);
                    crate::log(&format!("GUI: started upload attempt {}", pending.attempt()));
                    self.state.pending_upload = Some(pending);
                }
            }
            PreviewAction::Dismiss => self.session.dismiss_failure(),
        }
    }

    fn handle_close(&mut self) {
        self.session.close();
        self.state.clear_session();
    }
}

impl eframe::App for GraderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_upload();
        self.collect_notice();
        self.sync_textures(ctx);

        // Keep polling while the upload runs
        if self.session.state().is_uploading() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        let now = Instant::now();
        if self.state.notice.as_ref().is_some_and(|n| n.is_expired_at(now)) {
            self.state.notice = None;
        }
        if let Some(notice) = &self.state.notice {
            egui::TopBottomPanel::bottom("notice").show(ctx, |ui| {
                render::render_notice(ui, &notice.message);
            });
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        let screen = Screen::for_state(self.session.state());
        let inbox = self.session.camera().inbox().display().to_string();

        egui::CentralPanel::default().show(ctx, |ui| match screen {
            Screen::RequestingPermission => render::render_permission_pending(ui),
            Screen::NoAccess => render::render_no_access(ui, &inbox),
            Screen::Camera => {
                let settings = self.session.settings();
                if let Some(action) = render::render_live(
                    ui,
                    &settings.guide,
                    self.session.flash(),
                    self.session.facing(),
                    &inbox,
                ) {
                    self.handle_live(action);
                }
            }
            Screen::Preview { busy } => {
                let failure = match self.session.state() {
                    CaptureState::UploadFailed { message, .. } => Some(message.clone()),
                    _ => None,
                };
                let texture = self.state.preview.as_ref().map(|(_, texture)| texture);
                if let Some(action) =
                    render::render_preview(ui, texture, busy, failure.as_deref())
                {
                    self.handle_preview(action);
                }
            }
            Screen::Result => {
                let view = match self.session.state() {
                    CaptureState::Graded { sheet, .. } => {
                        Some(ResultView::new(&sheet.result, &sheet.marked_image))
                    }
                    _ => None,
                };
                if let Some(view) = view {
                    if render::render_result(ui, &view, self.state.marked_texture.as_ref()) {
                        self.handle_close();
                    }
                }
            }
        });
    }
}

/// Decodes an image file into a texture.
fn load_file_texture(ctx: &egui::Context, name: &str, path: &Path) -> Option<TextureHandle> {
    match image::open(path) {
        Ok(image) => Some(to_texture(ctx, name, &image)),
        Err(e) => {
            crate::log(&format!("GUI: failed to load {}: {}", path.display(), e));
            None
        }
    }
}

/// Decodes in-memory image bytes into a texture.
fn load_memory_texture(ctx: &egui::Context, name: &str, bytes: &[u8]) -> Option<TextureHandle> {
    image::load_from_memory(bytes)
        .ok()
        .map(|image| to_texture(ctx, name, &image))
}

fn to_texture(ctx: &egui::Context, name: &str, image: &image::DynamicImage) -> TextureHandle {
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.into_raw();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &pixels);
    ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR)
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui(session: Session<FolderCamera>, uploader: Arc<UploadClient>) -> eframe::Result<()> {
    crate::log("GUI: Creating native options...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(480.0, 760.0))
            .with_min_inner_size(Vec2::new(360.0, 560.0))
            .with_title("Answer Sheet Grader"),
        ..Default::default()
    };

    eframe::run_native(
        "Answer Sheet Grader",
        options,
        Box::new(move |cc| {
            crate::log("GUI: Creating GraderApp instance...");
            Ok(Box::new(GraderApp::new(cc, session, uploader)))
        }),
    )
}
