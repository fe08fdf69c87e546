//! Diagnostic screenshot capture.

use std::fs;
use std::path::PathBuf;

use tracing::{error, info};

use crate::provider::AccessibilityProvider;

/// Directory that receives failure screenshots.
pub const ERROR_DIR: &str = "errors";

/// Capture a full-screen image named `<prefix>_<timestamp>.png` under
/// [`ERROR_DIR`]. Never fails the run: capture problems are logged and
/// swallowed, and simulate mode only logs the intent.
pub fn capture(
    provider: &dyn AccessibilityProvider,
    prefix: &str,
    simulate: bool,
) -> Option<PathBuf> {
    if simulate {
        info!("[dry-run] would capture screenshot: {prefix}");
        return None;
    }
    if let Err(e) = fs::create_dir_all(ERROR_DIR) {
        error!("cannot create {ERROR_DIR}/: {e}");
        return None;
    }
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = PathBuf::from(ERROR_DIR).join(format!("{prefix}_{timestamp}.png"));
    match provider.capture_screen(&path) {
        Ok(()) => {
            info!("screenshot saved to {}", path.display());
            Some(path)
        }
        Err(e) => {
            error!("failed to capture screenshot: {e}");
            None
        }
    }
}
