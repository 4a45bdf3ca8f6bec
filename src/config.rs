//! Application configuration.
//!
//! Loads settings from config.json at startup. Provides the backend address,
//! guide geometry, upload limits and the answer key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// What to do when the guide maps to a crop taller than the captured frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Fail the capture and stay in the live view.
    #[default]
    Reject,
    /// Shrink the crop to the frame height, keeping the 3:4 ratio and centering.
    Clamp,
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the grading backend, without trailing slash
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,
    /// Guide width as a fraction of the logical screen width
    #[serde(default = "default_guide_width_fraction")]
    pub guide_width_fraction: f64,
    /// Logical width of the live preview (points)
    #[serde(default = "default_screen_width")]
    pub screen_width: f64,
    #[serde(default)]
    pub oversize_policy: OversizePolicy,
    /// Upload round trip limit (milliseconds)
    #[serde(default = "default_upload_timeout_ms")]
    pub upload_timeout_ms: u64,
    /// JPEG quality for the cropped image (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Directory the folder camera reads stills from
    #[serde(default = "default_camera_inbox")]
    pub camera_inbox: PathBuf,
    /// Question id -> correct choice letter
    #[serde(default = "default_answer_key")]
    pub answer_key: BTreeMap<String, String>,
    /// Run one scripted session in the terminal instead of opening a window
    #[serde(default)]
    pub headless: bool,
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_guide_width_fraction() -> f64 {
    0.9
}

fn default_screen_width() -> f64 {
    400.0
}

fn default_upload_timeout_ms() -> u64 {
    30000
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_camera_inbox() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("answer-sheets")
}

fn default_answer_key() -> BTreeMap<String, String> {
    [
        ("Q1", "B"),
        ("Q2", "C"),
        ("Q3", "C"),
        ("Q4", "D"),
        ("Q5", "C"),
        ("Q6", "D"),
        ("Q7", "D"),
        ("Q8", "C"),
        ("Q9", "C"),
        ("Q10", "A"),
    ]
    .into_iter()
    .map(|(q, a)| (q.to_string(), a.to_string()))
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_base_url: default_backend_base_url(),
            guide_width_fraction: default_guide_width_fraction(),
            screen_width: default_screen_width(),
            oversize_policy: OversizePolicy::default(),
            upload_timeout_ms: default_upload_timeout_ms(),
            jpeg_quality: default_jpeg_quality(),
            camera_inbox: default_camera_inbox(),
            answer_key: default_answer_key(),
            headless: false,
        }
    }
}

/// Parses a config file body. Fields that are absent take their defaults.
fn parse_config(contents: &str) -> serde_json::Result<AppConfig> {
    let mut config: AppConfig = serde_json::from_str(contents)?;
    config.backend_base_url = config.backend_base_url.trim_end_matches('/').to_string();
    config.jpeg_quality = config.jpeg_quality.clamp(1, 100);
    Ok(config)
}

/// Loads configuration from config.json or returns defaults.
/// Looks for config.json in the same directory as the executable.
fn load_config() -> AppConfig {
    let config_path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
        .unwrap_or_else(|| Path::new("config.json").to_path_buf());

    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(contents) => match parse_config(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    AppConfig::default()
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
