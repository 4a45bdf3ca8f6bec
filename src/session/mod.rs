//! Grading session: the capture state machine and its upload worker.

pub mod state;
pub mod worker;

pub use state::{CaptureState, Session, SessionSettings};
pub use worker::{spawn_upload, PendingUpload};
