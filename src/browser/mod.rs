//! Browser infrastructure: launching Chromium and owning its lifetime for
//! the duration of a verification run.

mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use wrapper::BrowserSession;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("failed to find browser executable: {0}")]
    NotFound(String),

    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
