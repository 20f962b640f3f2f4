//! End-to-end browser verification for the webcam disguise undo flow.
//!
//! Drives a managed Chromium instance against the target application:
//! connect, enable the webcam, apply the disguise, capture a screenshot,
//! undo, capture another. See [`scenario::Verifier`] for the entry point.

pub mod browser;
pub mod browser_setup;
pub mod page;
pub mod scenario;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub use browser::{BrowserError, BrowserResult, BrowserSession};
pub use scenario::{RunReport, Scenario, Verifier};

/// Result type for verification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a verification run.
///
/// Every variant is reported uniformly at the top level: there is no retry
/// policy and no failure taxonomy beyond what `?` propagation needs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("step failed: {0}")]
    StepFailed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL of the application under verification.
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Directory screenshots are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Per-phase wait budgets, in milliseconds.
///
/// The defaults mirror the application's observed behavior: connecting can
/// take a while, the disguise is generated remotely and is the slowest
/// phase, and the stream/indicator phases are quick once connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Initial page navigation.
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    /// Connect button appearing after first render.
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,

    /// Streaming indicator after the connect click.
    #[serde(default = "default_indicator_ms")]
    pub indicator_ms: u64,

    /// Video element going live after the webcam click.
    #[serde(default = "default_stream_ms")]
    pub stream_ms: u64,

    /// Disguised image appearing after the key press.
    #[serde(default = "default_disguise_ms")]
    pub disguise_ms: u64,

    /// Everything else: button lookup, clicks, enabled checks.
    #[serde(default = "default_interaction_ms")]
    pub interaction_ms: u64,

    /// Fixed pause for animations and stream warm-up.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
    pub fn indicator(&self) -> Duration {
        Duration::from_millis(self.indicator_ms)
    }
    pub fn stream(&self) -> Duration {
        Duration::from_millis(self.stream_ms)
    }
    pub fn disguise(&self) -> Duration {
        Duration::from_millis(self.disguise_ms)
    }
}

fn default_target_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("verification")
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_navigation_ms() -> u64 {
    60_000
}

fn default_connect_ms() -> u64 {
    30_000
}

fn default_indicator_ms() -> u64 {
    10_000
}

fn default_stream_ms() -> u64 {
    10_000
}

fn default_disguise_ms() -> u64 {
    60_000
}

fn default_interaction_ms() -> u64 {
    5_000
}

fn default_settle_ms() -> u64 {
    2_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            output_dir: default_output_dir(),
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            connect_ms: default_connect_ms(),
            indicator_ms: default_indicator_ms(),
            stream_ms: default_stream_ms(),
            disguise_ms: default_disguise_ms(),
            interaction_ms: default_interaction_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Config {
    /// Parse a config from YAML.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::parse(&contents)
    }

    /// Load `config.yaml` from the working directory if present, otherwise
    /// fall back to defaults.
    pub fn load_default() -> Result<Self> {
        let path = Path::new("config.yaml");
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the target URL.
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.target_url)
            .map_err(|e| Error::Config(format!("invalid target url '{}': {e}", self.target_url)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Config(format!(
                "target url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_reproduces_original_run() {
        let config = Config::default();
        assert_eq!(config.target_url, "http://localhost:3000");
        assert_eq!(config.output_dir, PathBuf::from("verification"));
        assert!(config.browser.headless);
        assert_eq!(config.timeouts.navigation_ms, 60_000);
        assert_eq!(config.timeouts.connect_ms, 30_000);
        assert_eq!(config.timeouts.disguise_ms, 60_000);
        assert_eq!(config.timeouts.settle_ms, 2_000);
    }

    #[test]
    fn parse_empty_yaml_uses_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config.target_url, "http://localhost:3000");
        assert_eq!(config.browser.window.width, 1280);
        assert_eq!(config.browser.window.height, 720);
    }

    #[test]
    fn parse_partial_yaml_overrides_only_named_fields() {
        let yaml = r#"
target_url: "http://app.test:8080"
browser:
  headless: false
timeouts:
  disguise_ms: 90000
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.target_url, "http://app.test:8080");
        assert!(!config.browser.headless);
        assert_eq!(config.timeouts.disguise_ms, 90_000);
        // untouched fields keep defaults
        assert_eq!(config.timeouts.connect_ms, 30_000);
        assert_eq!(config.output_dir, PathBuf::from("verification"));
    }

    #[test]
    fn validate_rejects_non_http_schemes() {
        let mut config = Config::default();
        config.target_url = "file:///etc/passwd".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));

        config.target_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.target_url = "https://localhost:3000".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn timeout_accessors_convert_to_durations() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.navigation(), Duration::from_millis(60_000));
        assert_eq!(timeouts.indicator(), Duration::from_millis(10_000));
    }

    #[test]
    fn timeout_error_display_names_the_wait() {
        let err = Error::Timeout {
            what: "button 'Annuler'".into(),
            timeout_ms: 5_000,
        };
        assert_eq!(
            err.to_string(),
            "timed out after 5000ms waiting for button 'Annuler'"
        );
    }
}
