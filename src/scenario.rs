//! The undo verification sequence.
//!
//! Connect, enable the webcam, apply the disguise, screenshot, undo,
//! screenshot again. Every wait is bounded by a per-phase timeout and any
//! failure ends the run with a best-effort failure screenshot.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chromiumoxide::page::Page;
use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::{page, Config, Result};

/// Accessible name of the connect button (a material symbol glyph).
pub const CONNECT_BUTTON: &str = "play_arrow";
/// Accessible name of the webcam toggle button.
pub const WEBCAM_BUTTON: &str = "videocam";
/// Accessible name of the undo button (the app ships a French label).
pub const UNDO_BUTTON: &str = "Annuler";
/// Indicator text shown once the live session is connected.
pub const STREAMING_INDICATOR: &str = "Streaming";
/// The active webcam video element.
pub const VIDEO_SELECTOR: &str = "video.stream";
/// The disguised frame rendered over the stream.
pub const DISGUISE_IMAGE_SELECTOR: &str = ".magic-effect img";

/// Screenshot taken after the disguise is applied.
pub const BEFORE_SCREENSHOT: &str = "before_undo.png";
/// Screenshot taken after the undo click.
pub const AFTER_SCREENSHOT: &str = "after_undo.png";
/// Best-effort screenshot taken when the run fails.
pub const FAILURE_SCREENSHOT: &str = "error.png";

/// What a completed run produced.
#[derive(Debug)]
pub struct RunReport {
    pub screenshots: Vec<PathBuf>,
    pub duration: Duration,
}

/// The ordered step sequence, parameterized by config timeouts and the
/// output directory.
pub struct Scenario<'a> {
    config: &'a Config,
}

impl<'a> Scenario<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn shot_path(&self, file: &str) -> PathBuf {
        self.config.output_dir.join(file)
    }

    /// Run the full sequence on an already-navigated page.
    pub async fn run(&self, page: &Page) -> Result<RunReport> {
        let t = &self.config.timeouts;
        let settle = Duration::from_millis(t.settle_ms);
        let interaction = Duration::from_millis(t.interaction_ms);
        let started = Instant::now();

        // Connect and start the webcam.
        let connect = page::wait_for_button(page, CONNECT_BUTTON, t.connect()).await?;
        page::click(page, &connect, interaction).await?;
        info!("clicked connect button");

        page::wait_for_text(page, STREAMING_INDICATOR, t.indicator()).await?;
        info!("streaming indicator visible");

        let webcam = page::wait_for_button(page, WEBCAM_BUTTON, interaction).await?;
        page::click(page, &webcam, interaction).await?;
        info!("clicked webcam button");

        page::wait_for_visible(page, VIDEO_SELECTOR, t.stream()).await?;
        // Give the stream time to produce frames before driving it.
        tokio::time::sleep(settle).await;

        // Apply the disguise.
        page::press_key(page, "i").await?;
        info!("disguise requested");

        page::wait_for_visible(page, DISGUISE_IMAGE_SELECTOR, t.disguise()).await?;
        tokio::time::sleep(settle).await;

        let before = self.shot_path(BEFORE_SCREENSHOT);
        page::save_screenshot(page, &before).await?;
        info!("screenshot written: {}", before.display());

        // Undo the disguise.
        let undo = page::wait_for_button(page, UNDO_BUTTON, interaction).await?;
        page::wait_for_enabled(page, &undo, interaction).await?;
        page::click(page, &undo, interaction).await?;
        info!("clicked undo button");

        tokio::time::sleep(settle).await;

        let after = self.shot_path(AFTER_SCREENSHOT);
        page::save_screenshot(page, &after).await?;
        info!("screenshot written: {}", after.display());

        Ok(RunReport {
            screenshots: vec![before, after],
            duration: started.elapsed(),
        })
    }
}

/// Top-level driver: one browser, one page, one linear pass.
///
/// The browser is a scoped resource: launched at the start and shut down
/// unconditionally at the end, whatever the outcome.
pub struct Verifier {
    config: Config,
}

impl Verifier {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let session = BrowserSession::launch(&self.config.browser).await?;

        let outcome = self.run_on(&session).await;

        if let Err(err) = &outcome {
            error!("verification failed: {err}");
            self.capture_failure(&session).await;
        }

        if let Err(e) = session.shutdown().await {
            warn!("browser shutdown failed: {e}");
        }

        outcome
    }

    async fn run_on(&self, session: &BrowserSession) -> Result<RunReport> {
        let page = session.open_blank().await?;
        page::navigate(&page, &self.config.target_url, self.config.timeouts.navigation()).await?;
        info!("navigated to {}", self.config.target_url);

        Scenario::new(&self.config).run(&page).await
    }

    /// Best-effort failure screenshot; a capture error is logged, never
    /// allowed to mask the original failure.
    async fn capture_failure(&self, session: &BrowserSession) {
        let pages = match session.browser().pages().await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("failed to list pages for failure screenshot: {e}");
                return;
            }
        };
        let Some(page) = pages.into_iter().next() else {
            warn!("no page available for failure screenshot");
            return;
        };

        let path = self.config.output_dir.join(FAILURE_SCREENSHOT);
        match page::save_screenshot(&page, &path).await {
            Ok(()) => info!("failure screenshot written: {}", path.display()),
            Err(e) => warn!("failed to capture failure screenshot: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screenshots_land_in_output_dir() {
        let mut config = Config::default();
        config.output_dir = PathBuf::from("shots/run1");
        let scenario = Scenario::new(&config);
        assert_eq!(
            scenario.shot_path(BEFORE_SCREENSHOT),
            PathBuf::from("shots/run1/before_undo.png")
        );
        assert_eq!(
            scenario.shot_path(AFTER_SCREENSHOT),
            PathBuf::from("shots/run1/after_undo.png")
        );
    }

    #[test]
    fn default_output_dir_matches_screenshot_names() {
        let config = Config::default();
        let scenario = Scenario::new(&config);
        assert_eq!(
            scenario.shot_path(FAILURE_SCREENSHOT),
            PathBuf::from("verification/error.png")
        );
    }
}
