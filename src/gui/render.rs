//! GUI rendering functions.
//!
//! Contains the layout of each screen. Functions report which buttons were
//! clicked; they never change the session themselves.

use eframe::egui::{self, Color32, RichText, Stroke, TextureHandle, Vec2};

use crate::capture::{Facing, FlashMode};
use crate::geometry::{GuideRegion, GUIDE_ASPECT};
use crate::report::ResultView;

const GUIDE_COLOR: Color32 = Color32::from_rgb(0x32, 0xFF, 0x00);
const CORRECT_COLOR: Color32 = Color32::from_rgb(0x4C, 0xAF, 0x50);
const WRONG_COLOR: Color32 = Color32::from_rgb(0xF4, 0x43, 0x36);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveAction {
    Shutter,
    ToggleFlash,
    ToggleFacing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewAction {
    Retake,
    Confirm,
    /// Back from the failure message to the plain preview
    Dismiss,
}

/// Render the waiting text shown before the permission answer arrives.
pub fn render_permission_pending(ui: &mut egui::Ui) {
    ui.centered_and_justified(|ui| {
        ui.label("Requesting camera permission...");
    });
}

/// Render the dead-end screen shown when the camera may not be used.
pub fn render_no_access(ui: &mut egui::Ui, inbox: &str) {
    ui.vertical_centered(|ui| {
        ui.add_space(40.0);
        ui.heading("No access to camera");
        ui.add_space(8.0);
        ui.label(format!("Photos folder is not accessible: {}", inbox));
        ui.label("Fix the folder permissions and restart the application.");
    });
}

/// Render the live view: the guide overlay and the capture controls.
pub fn render_live(
    ui: &mut egui::Ui,
    guide: &GuideRegion,
    flash: FlashMode,
    facing: Facing,
    inbox: &str,
) -> Option<LiveAction> {
    let mut action = None;

    // Camera area fills the width; the guide sits centered in it
    let available_width = ui.available_width();
    let area_height = (ui.available_height() - 80.0).max(200.0);
    let (area, _response) =
        ui.allocate_exact_size(Vec2::new(available_width, area_height), egui::Sense::hover());
    ui.painter().rect_filled(area, 0.0, Color32::from_gray(20));

    let (mut guide_width, mut guide_height) = guide.size_on_screen(available_width as f64);
    if guide_height > area_height as f64 {
        // Shrink the overlay to fit the window; the ratio is what matters
        guide_height = area_height as f64;
        guide_width = guide_height / GUIDE_ASPECT;
    }
    let guide_rect = egui::Rect::from_center_size(
        area.center(),
        Vec2::new(guide_width as f32, guide_height as f32),
    );
    ui.painter().rect_stroke(guide_rect, 0.0, Stroke::new(4.0, GUIDE_COLOR));
    ui.painter().text(
        guide_rect.center_bottom() + Vec2::new(0.0, -20.0),
        egui::Align2::CENTER_CENTER,
        "Align answer sheet within this frame",
        egui::FontId::proportional(16.0),
        Color32::WHITE,
    );

    ui.add_space(8.0);
    ui.label(RichText::new(format!("Photos from: {}", inbox)).small().weak());
    ui.add_space(8.0);

    ui.horizontal(|ui| {
        let flash_label = match flash {
            FlashMode::Off => "Flash: off",
            FlashMode::On => "Flash: on",
        };
        if ui.button(flash_label).clicked() {
            action = Some(LiveAction::ToggleFlash);
        }

        ui.add_space(20.0);

        if ui.button(RichText::new("● Capture").size(18.0)).clicked() {
            action = Some(LiveAction::Shutter);
        }

        ui.add_space(20.0);

        let facing_label = match facing {
            Facing::Back => "Camera: back",
            Facing::Front => "Camera: front",
        };
        if ui.button(facing_label).clicked() {
            action = Some(LiveAction::ToggleFacing);
        }
    });

    action
}

/// Render the cropped photo with retake/confirm buttons.
///
/// While `busy` every button is disabled. `failure` shows the last upload
/// error above the buttons.
pub fn render_preview(
    ui: &mut egui::Ui,
    texture: Option<&TextureHandle>,
    busy: bool,
    failure: Option<&str>,
) -> Option<PreviewAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        let image_height = (ui.available_height() - 120.0).max(160.0);
        let image_width = image_height / GUIDE_ASPECT as f32;

        match texture {
            Some(texture) => {
                ui.image((texture.id(), Vec2::new(image_width, image_height)));
            }
            None => {
                let (rect, _response) = ui.allocate_exact_size(
                    Vec2::new(image_width, image_height),
                    egui::Sense::hover(),
                );
                ui.painter().rect_filled(rect, 4.0, Color32::from_gray(60));
            }
        }

        ui.add_space(8.0);

        if busy {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Uploading...");
            });
        }

        if let Some(message) = failure {
            ui.label(RichText::new(format!("Failed to upload image: {}", message)).color(WRONG_COLOR));
        }

        ui.add_space(8.0);

        ui.add_enabled_ui(!busy, |ui| {
            ui.horizontal(|ui| {
                if ui.button("← Retake").clicked() {
                    action = Some(PreviewAction::Retake);
                }
                ui.add_space(20.0);
                let confirm_label = if failure.is_some() { "Retry ✔" } else { "Use Photo ✔" };
                if ui.button(confirm_label).clicked() {
                    action = Some(PreviewAction::Confirm);
                }
                if failure.is_some() {
                    ui.add_space(20.0);
                    if ui.button("Dismiss").clicked() {
                        action = Some(PreviewAction::Dismiss);
                    }
                }
            });
        });
    });

    action
}

/// Render the grading result. Returns true if close was clicked.
pub fn render_result(
    ui: &mut egui::Ui,
    view: &ResultView,
    marked_image: Option<&TextureHandle>,
) -> bool {
    let mut close_clicked = false;

    ui.horizontal(|ui| {
        if ui.button("← Close").clicked() {
            close_clicked = true;
        }
        ui.heading("Answer Sheet Grader");
    });

    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.label(RichText::new("Grading Results").strong().size(20.0));
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("Score: {}/{}", view.score, view.total)).size(18.0));
            ui.add_space(20.0);
            ui.label(RichText::new(format!("{}%", view.percentage)).size(22.0).strong());
        });

        ui.add(egui::ProgressBar::new(view.fraction()));
        ui.add_space(8.0);

        match marked_image {
            Some(texture) => {
                let size = texture.size_vec2();
                let width = ui.available_width().min(size.x);
                let height = width * size.y / size.x.max(1.0);
                ui.image((texture.id(), Vec2::new(width, height)));
            }
            None => {
                ui.label(RichText::new(format!("Marked sheet: {}", view.marked_image)).weak());
            }
        }

        ui.add_space(8.0);

        if view.rows.is_empty() {
            ui.label("No questions were detected on the sheet.");
        }

        egui::Grid::new("graded_answers").striped(true).show(ui, |ui| {
            for row in &view.rows {
                ui.label(RichText::new(&row.question).strong());
                ui.label(&row.submitted);
                if row.is_match {
                    ui.label(RichText::new("✔").color(CORRECT_COLOR));
                    ui.label("");
                } else {
                    ui.label(RichText::new("✖").color(WRONG_COLOR));
                    let expected = row.correct.as_deref().unwrap_or("-");
                    ui.label(RichText::new(format!("(Correct: {})", expected)).italics());
                }
                ui.end_row();
            }
        });
    });

    close_clicked
}

/// Render the transient notice bar.
pub fn render_notice(ui: &mut egui::Ui, message: &str) {
    ui.horizontal(|ui| {
        ui.label(RichText::new("⚠").color(Color32::from_rgb(200, 150, 0)));
        ui.label(message);
    });
}
