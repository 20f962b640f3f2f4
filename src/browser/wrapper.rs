//! Browser lifecycle for a single verification pass.
//!
//! One browser, one linear run: the session is launched at the start,
//! shut down unconditionally at the end, and the handler task MUST be
//! aborted so it does not outlive the browser process.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserError, BrowserResult};
use crate::BrowserConfig;

/// Owns the `Browser`, its CDP event handler task, and the temporary
/// profile directory for one run.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserSession {
    /// Launch Chromium with a unique profile directory for this run.
    pub async fn launch(config: &BrowserConfig) -> BrowserResult<Self> {
        let user_data_dir =
            std::env::temp_dir().join(format!("disguise_verify_{}", std::process::id()));

        let (browser, handler) = crate::browser_setup::launch_browser(config, user_data_dir.clone())
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        Ok(Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Open a blank page; navigation happens separately so the caller
    /// controls its own timeout.
    pub async fn open_blank(&self) -> BrowserResult<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))
    }

    /// Close the browser and release every resource it held.
    ///
    /// Close and wait must both run before the profile directory is
    /// removed: Chrome releases its file handles only on full process
    /// exit, and Windows refuses to remove locked files.
    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("Shutting down browser");

        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }

        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }

        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }

        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop() kills the Chrome process if still running.

        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserSession dropped without shutdown(). \
                Temp directory will be orphaned: {}",
                path.display()
            );
        }
    }
}
