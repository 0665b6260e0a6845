use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::capture::DEFAULT_JPEG_QUALITY;

pub const DEFAULT_PASTE_DELAY_MS: u64 = 50;
pub const DEFAULT_WAIT_SECS: u64 = 5;
pub const DEFAULT_MAX_LOOP: usize = 100;

/// Knobs for the operators and the drive loop.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// Pause after the paste chord goes down and again after it comes up.
    pub paste_delay: Duration,
    /// Length of the `wait()` action.
    pub wait: Duration,
    pub jpeg_quality: u8,
    /// Type through the clipboard instead of per-character keystrokes.
    pub clipboard_typing: bool,
    pub max_loop: usize,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            paste_delay: Duration::from_millis(DEFAULT_PASTE_DELAY_MS),
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            // Direct Unicode keystroke injection is unreliable on Windows.
            clipboard_typing: cfg!(target_os = "windows"),
            max_loop: DEFAULT_MAX_LOOP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub operator: OperatorConfig,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operator: OperatorConfig::default(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Reads `UI_TARS_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = OperatorConfig::default();
        let operator = OperatorConfig {
            paste_delay: Duration::from_millis(parse_or(
                &lookup,
                "UI_TARS_PASTE_DELAY_MS",
                DEFAULT_PASTE_DELAY_MS,
            )),
            wait: Duration::from_secs(parse_or(&lookup, "UI_TARS_WAIT_SECS", DEFAULT_WAIT_SECS)),
            jpeg_quality: parse_or(&lookup, "UI_TARS_JPEG_QUALITY", defaults.jpeg_quality)
                .clamp(1, 100),
            clipboard_typing: parse_or(
                &lookup,
                "UI_TARS_CLIPBOARD_TYPING",
                defaults.clipboard_typing,
            ),
            max_loop: parse_or(&lookup, "UI_TARS_MAX_LOOP", DEFAULT_MAX_LOOP).max(1),
        };

        let log_dir = lookup("UI_TARS_LOG_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_log_dir);

        Self { operator, log_dir }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("[config] ignoring invalid {}={:?}", key, raw);
                default
            }
        },
        None => default,
    }
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ui-tars")
        .join("logs")
}
