//! Answer Sheet Grader
//!
//! Crops a photo of a multiple-choice answer sheet to the on-screen guide,
//! sends it to the grading backend and shows the score against the answer key.

mod capture;
mod config;
mod geometry;
mod grading;
mod gui;
mod paths;
mod report;
mod session;
mod upload;

use anyhow::{anyhow, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use capture::FolderCamera;
use session::{CaptureState, Session, SessionSettings};
use upload::UploadClient;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("answer_sheet_grader.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    // Ensure output directories exist
    paths::ensure_directories()?;

    // Load configuration
    config::init_config();
    let config = config::get_config();

    let settings = SessionSettings::from_config(config, paths::get_captures_dir())?;
    let camera = FolderCamera::new(config.camera_inbox.clone());
    let session = Session::new(camera, settings);
    let uploader = Arc::new(UploadClient::new(
        &config.backend_base_url,
        config.upload_timeout_ms,
    )?);

    log(&format!(
        "Grading backend: {} ({} questions in answer key)",
        config.backend_base_url,
        config.answer_key.len()
    ));

    if config.headless {
        log("Headless mode enabled - grading the newest photo once");
        run_headless(session, &uploader)
    } else {
        log("Starting GUI application...");
        match gui::run_gui(session, uploader) {
            Ok(()) => {
                log("GUI application exited normally");
                Ok(())
            }
            Err(e) => {
                log(&format!("GUI error: {}", e));
                Err(anyhow!("GUI error: {}", e))
            }
        }
    }
}

/// Runs one session in the terminal: capture the newest photo, upload it,
/// print the graded result and close.
fn run_headless(mut session: Session<FolderCamera>, uploader: &UploadClient) -> Result<()> {
    session.request_permission();
    if *session.state() == CaptureState::PermissionDenied {
        return Err(anyhow!(
            "camera inbox {} is not accessible",
            session.camera().inbox().display()
        ));
    }

    if !session.shutter() {
        let notice = session.take_notice().unwrap_or_default();
        return Err(anyhow!("{}", notice));
    }

    if !session.upload_with(uploader) {
        let notice = session.take_notice().unwrap_or_default();
        session.retake();
        return Err(anyhow!("{}", notice));
    }

    if let CaptureState::Graded { sheet, .. } = session.state() {
        log(&format!("Detected answers: {:?}", sheet.submitted));
        let view = report::ResultView::new(&sheet.result, &sheet.marked_image);
        print!("{}", view.render_text());
    }

    session.close();
    Ok(())
}
