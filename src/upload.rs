//! Grading backend client.
//!
//! One multipart POST per confirmed capture. The response carries the
//! detected answers and a reference to the backend's annotated image.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::grading::SubmittedAnswers;

/// Multipart field the backend reads the photo from.
const UPLOAD_FIELD: &str = "file";
const UPLOAD_MIME: &str = "image/jpeg";

/// Why an upload attempt failed. All variants end the attempt; none is retried.
#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("could not read captured image: {0}")]
    ReadImage(#[source] std::io::Error),
    #[error("grading server did not answer within {0} ms")]
    Timeout(u64),
    #[error("could not reach grading server: {0}")]
    Transport(String),
    #[error("grading server returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Raw response body, kept for diagnostics
        body: String,
    },
    #[error("unexpected response from grading server: {0}")]
    Malformed(String),
}

/// A successful round trip.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadOutcome {
    pub answers: SubmittedAnswers,
    /// Absolute URL of the annotated image
    pub marked_image: String,
}

/// The backend round trip, as seen by the capture flow.
pub trait Uploader {
    fn upload(&self, image: &Path) -> Result<UploadOutcome, UploadError>;

    /// Downloads the annotated image named by an [`UploadOutcome`].
    fn fetch_marked_image(&self, url: &str) -> Result<Vec<u8>, UploadError>;
}

#[derive(Deserialize)]
struct UploadResponseBody {
    answers: SubmittedAnswers,
    marked_image: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the grading backend.
pub struct UploadClient {
    client: reqwest::blocking::Client,
    /// Always ends in `/` so relative references stay under it
    base_url: Url,
    upload_url: Url,
    timeout_ms: u64,
}

impl UploadClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("answer-sheet-grader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("backend URL {} cannot hold paths", base_url);
        }
        let upload_url = base_url.join("upload/")?;

        Ok(Self {
            client,
            base_url,
            upload_url,
            timeout_ms,
        })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    fn transport_error(&self, e: reqwest::Error) -> UploadError {
        if e.is_timeout() {
            UploadError::Timeout(self.timeout_ms)
        } else {
            UploadError::Transport(e.to_string())
        }
    }
}

impl Uploader for UploadClient {
    fn upload(&self, image: &Path) -> Result<UploadOutcome, UploadError> {
        let bytes = fs::read(image).map_err(UploadError::ReadImage)?;
        let filename = upload_filename(image);
        let url = &self.upload_url;

        crate::log(&format!(
            "Uploading {} ({} bytes) to {}",
            filename,
            bytes.len(),
            url
        ));

        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str(UPLOAD_MIME)
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            crate::log(&format!("Server responded with HTTP {}: {}", status, body));
            return Err(UploadError::Status {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
                body,
            });
        }

        let outcome = parse_upload_response(&self.base_url, &body)?;
        crate::log(&format!(
            "Upload complete: {} answers, marked image at {}",
            outcome.answers.len(),
            outcome.marked_image
        ));
        Ok(outcome)
    }

    fn fetch_marked_image(&self, url: &str) -> Result<Vec<u8>, UploadError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| "marked image unavailable".into()),
                body,
            });
        }

        let bytes = response.bytes().map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }
}

/// Uses the captured file's name, or a timestamped one when the path has none.
fn upload_filename(image: &Path) -> String {
    image
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("answer_sheet_{}.jpg", chrono::Local::now().timestamp_millis()))
}

/// Pulls the `error` field out of a backend error body, if present.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error)
}

/// Parses a 2xx upload response. Both the answers mapping and the image
/// reference must be present.
fn parse_upload_response(base_url: &Url, body: &str) -> Result<UploadOutcome, UploadError> {
    let parsed: UploadResponseBody =
        serde_json::from_str(body).map_err(|e| UploadError::Malformed(e.to_string()))?;

    let marked_image = resolve_reference(base_url, &parsed.marked_image)?;

    Ok(UploadOutcome {
        answers: parsed.answers,
        marked_image: marked_image.into(),
    })
}

/// Turns the response's image reference into a fetchable URL.
///
/// Standard URL resolution against the backend base: absolute and
/// scheme-relative references replace it, paths are joined onto it.
fn resolve_reference(base_url: &Url, reference: &str) -> Result<Url, UploadError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(UploadError::Malformed("empty marked_image reference".to_string()));
    }
    base_url.join(reference).map_err(|e| {
        UploadError::Malformed(format!("bad marked_image reference {:?}: {}", reference, e))
    })
}
