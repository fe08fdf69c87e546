//! The accessibility-provider capability consumed by the engine.
//!
//! The engine never talks to the operating system directly; everything it
//! needs from the live accessibility tree is expressed by the
//! [`AccessibilityProvider`] trait and the [`UiElement`] handle. A backend
//! (UI Automation, AT-SPI, ...) implements these; the test suite supplies an
//! in-memory one.

use std::any::Any;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::AutomationError;
use crate::path::Segment;
use crate::resolver::WindowSelector;

/// Optional behaviors a control may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Invoke,
    Toggle,
    Value,
    SelectionItem,
    ScrollItem,
    ExpandCollapse,
}

/// Backend implementation of a single live control handle.
///
/// A handle is transient: it is owned for the duration of one action and is
/// never cached across script records, because the tree may mutate between
/// actions.
pub trait UiElementImpl: Send + Sync + Debug {
    /// Identity of the underlying control for the lifetime of this handle.
    /// Two handles with equal ids refer to the same control.
    fn runtime_id(&self) -> usize;

    fn control_type(&self) -> String;
    fn name(&self) -> Option<String>;
    fn automation_id(&self) -> Option<String>;
    fn class_name(&self) -> Option<String>;

    fn parent(&self) -> Result<Option<UiElement>, AutomationError>;
    fn children(&self) -> Result<Vec<UiElement>, AutomationError>;
    /// The top-level window owning this control, if any.
    fn containing_window(&self) -> Result<Option<UiElement>, AutomationError>;

    fn supports_pattern(&self, pattern: Pattern) -> bool;
    fn invoke(&self) -> Result<(), AutomationError>;
    fn toggle(&self) -> Result<(), AutomationError>;
    fn set_value(&self, value: &str) -> Result<(), AutomationError>;
    fn select(&self) -> Result<(), AutomationError>;
    fn scroll_into_view(&self) -> Result<(), AutomationError>;
    fn expand(&self) -> Result<(), AutomationError>;

    /// Synthetic pointer click at the control's location.
    fn click(&self) -> Result<(), AutomationError>;

    /// Ask the accessibility tree to focus the control.
    fn focus(&self) -> Result<(), AutomationError>;
    /// Ask the OS to focus the native window handle backing the control.
    fn focus_native(&self) -> Result<(), AutomationError>;

    /// Read a named property ("Value", "Name", "ControlType", ...).
    fn property(&self, name: &str) -> Result<String, AutomationError>;

    fn as_any(&self) -> &dyn Any;
}

/// A transient handle into the live accessibility tree.
#[derive(Clone, Debug)]
pub struct UiElement {
    inner: Arc<dyn UiElementImpl>,
}

impl UiElement {
    pub fn new(inner: Arc<dyn UiElementImpl>) -> Self {
        UiElement { inner }
    }

    pub fn runtime_id(&self) -> usize {
        self.inner.runtime_id()
    }

    pub fn is_same(&self, other: &UiElement) -> bool {
        self.inner.runtime_id() == other.inner.runtime_id()
    }

    pub fn control_type(&self) -> String {
        self.inner.control_type()
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name()
    }

    pub fn automation_id(&self) -> Option<String> {
        self.inner.automation_id()
    }

    pub fn class_name(&self) -> Option<String> {
        self.inner.class_name()
    }

    /// Display name for log messages: name, else control type.
    pub fn display_name(&self) -> String {
        match self.inner.name() {
            Some(name) if !name.is_empty() => name,
            _ => self.inner.control_type(),
        }
    }

    pub fn parent(&self) -> Result<Option<UiElement>, AutomationError> {
        self.inner.parent()
    }

    pub fn children(&self) -> Result<Vec<UiElement>, AutomationError> {
        self.inner.children()
    }

    pub fn containing_window(&self) -> Result<Option<UiElement>, AutomationError> {
        self.inner.containing_window()
    }

    pub fn supports_pattern(&self, pattern: Pattern) -> bool {
        self.inner.supports_pattern(pattern)
    }

    pub fn invoke(&self) -> Result<(), AutomationError> {
        self.inner.invoke()
    }

    pub fn toggle(&self) -> Result<(), AutomationError> {
        self.inner.toggle()
    }

    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value)
    }

    pub fn select(&self) -> Result<(), AutomationError> {
        self.inner.select()
    }

    pub fn scroll_into_view(&self) -> Result<(), AutomationError> {
        self.inner.scroll_into_view()
    }

    pub fn expand(&self) -> Result<(), AutomationError> {
        self.inner.expand()
    }

    pub fn click(&self) -> Result<(), AutomationError> {
        self.inner.click()
    }

    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner.focus()
    }

    pub fn focus_native(&self) -> Result<(), AutomationError> {
        self.inner.focus_native()
    }

    pub fn property(&self, name: &str) -> Result<String, AutomationError> {
        self.inner.property(name)
    }

    pub fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }
}

/// The query/mutation primitives the engine consumes.
///
/// Lookup methods poll for up to `timeout` and return `Ok(None)` when nothing
/// matched in time; "not found" is a recoverable condition decided by the
/// caller, not an error.
pub trait AccessibilityProvider: Send + Sync {
    /// Find a top-level window by exact title or title pattern.
    fn find_top_level_window(
        &self,
        selector: &WindowSelector,
        timeout: Duration,
    ) -> Result<Option<UiElement>, AutomationError>;

    /// Find a descendant of `parent` matching one path segment (predicates,
    /// sibling index, depth bound).
    fn find_child(
        &self,
        parent: &UiElement,
        segment: &Segment,
        timeout: Duration,
    ) -> Result<Option<UiElement>, AutomationError>;

    /// Send literal keystrokes to whatever currently has OS focus.
    fn send_keys(&self, text: &str) -> Result<(), AutomationError>;

    /// Capture the full screen into an image file.
    fn capture_screen(&self, path: &Path) -> Result<(), AutomationError>;
}

/// Create the provider for the current platform.
///
/// No OS backend is compiled into this build; embedders construct an
/// [`crate::Runner`] with their own provider instead.
pub fn create_provider() -> Result<Arc<dyn AccessibilityProvider>, AutomationError> {
    Err(AutomationError::UnsupportedPlatform(
        "no accessibility backend is compiled into this build; \
         pass a provider to Runner::new"
            .to_string(),
    ))
}
