//! Focus acquisition with a two-strategy fallback.
//!
//! "Semantic" focus asks the accessibility tree to focus the element;
//! "native" focus asks the OS to focus the window handle backing it. Legacy
//! applications with unreliable accessibility implementations sometimes only
//! respond to the native route, so the order is selectable.

use tracing::{info, warn};

use crate::errors::AutomationError;
use crate::provider::UiElement;

#[derive(Debug, Clone, Copy)]
pub struct FocusCoordinator {
    /// Try native focus before semantic focus.
    legacy_order: bool,
    /// Downgrade a total focus failure to a warning.
    force_continue: bool,
}

impl FocusCoordinator {
    pub fn new(legacy_order: bool, force_continue: bool) -> Self {
        FocusCoordinator {
            legacy_order,
            force_continue,
        }
    }

    /// Move input focus to `element`, trying both strategies in the
    /// configured order. If both fail the error is fatal unless
    /// force-continue is set, in which case it is logged and treated as
    /// success-with-warning so downstream actions still attempt to proceed.
    pub fn acquire(&self, element: &UiElement, desc: &str) -> Result<(), AutomationError> {
        let semantic = || element.focus();
        let native = || element.focus_native();
        let attempts: [(&str, &dyn Fn() -> Result<(), AutomationError>); 2] =
            if self.legacy_order {
                [("native", &native), ("semantic", &semantic)]
            } else {
                [("semantic", &semantic), ("native", &native)]
            };

        for (i, (strategy, attempt)) in attempts.iter().enumerate() {
            match attempt() {
                Ok(()) if i == 0 => {
                    info!("focus set on '{desc}' via {strategy} focus");
                    return Ok(());
                }
                Ok(()) => {
                    info!("focus set on '{desc}' via {strategy} focus (fallback)");
                    return Ok(());
                }
                Err(e) => warn!("{strategy} focus failed for '{desc}': {e}"),
            }
        }

        let message = format!("failed to set focus on '{desc}' (both strategies failed)");
        if self.force_continue {
            warn!("{message}; continuing in force-continue mode");
            Ok(())
        } else {
            Err(AutomationError::FocusFailed(message))
        }
    }
}
