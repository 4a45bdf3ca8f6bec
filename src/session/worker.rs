//! Upload worker thread.
//!
//! The window must keep repainting while an upload is in flight, so the
//! round trip runs on a short-lived thread. The session enters `Uploading`
//! before the thread starts and applies the report when the window polls
//! the channel; the thread never touches the session itself.

use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::session::state::UploadTicket;
use crate::upload::{UploadError, UploadOutcome, Uploader};

/// What the worker sends back for one upload attempt.
#[derive(Debug)]
pub struct UploadReport {
    pub attempt: u64,
    pub outcome: Result<UploadOutcome, UploadError>,
    /// Annotated image bytes, when the upload succeeded and the fetch worked
    pub marked_image: Option<Vec<u8>>,
}

/// Runs one upload and, on success, fetches the annotated image.
pub fn run_upload<U: Uploader + ?Sized>(uploader: &U, ticket: &UploadTicket) -> UploadReport {
    crate::log(&format!(
        "Upload worker: attempt {} ({})",
        ticket.attempt,
        ticket.image_path.display()
    ));

    let outcome = uploader.upload(&ticket.image_path);

    let marked_image = match &outcome {
        Ok(result) => match uploader.fetch_marked_image(&result.marked_image) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                crate::log(&format!(
                    "Upload worker: failed to fetch marked image {}: {}",
                    result.marked_image, e
                ));
                None
            }
        },
        Err(e) => {
            crate::log(&format!("Upload worker: attempt {} failed: {}", ticket.attempt, e));
            None
        }
    };

    UploadReport {
        attempt: ticket.attempt,
        outcome,
        marked_image,
    }
}

/// An upload attempt running on a worker thread.
pub struct PendingUpload {
    attempt: u64,
    receiver: Receiver<UploadReport>,
}

impl PendingUpload {
    pub fn new(attempt: u64, receiver: Receiver<UploadReport>) -> Self {
        Self { attempt, receiver }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Returns the report once the worker is done, without blocking.
    ///
    /// A worker that stops without reporting (it panicked) still yields a
    /// failed report, so the attempt always ends.
    pub fn try_report(&self) -> Option<UploadReport> {
        match self.receiver.try_recv() {
            Ok(report) => Some(report),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                crate::log(&format!(
                    "Upload worker: attempt {} stopped without a report",
                    self.attempt
                ));
                Some(UploadReport {
                    attempt: self.attempt,
                    outcome: Err(UploadError::Transport("upload worker stopped".into())),
                    marked_image: None,
                })
            }
        }
    }
}

/// Starts the upload for `ticket` on its own thread.
pub fn spawn_upload<U>(uploader: Arc<U>, ticket: UploadTicket) -> PendingUpload
where
    U: Uploader + Send + Sync + 'static,
{
    let (sender, receiver) = channel();
    let pending = PendingUpload::new(ticket.attempt, receiver);

    thread::spawn(move || {
        let report = run_upload(uploader.as_ref(), &ticket);
        if sender.send(report).is_err() {
            crate::log("Upload worker: receiver gone, dropping report");
        }
    });

    pending
}
