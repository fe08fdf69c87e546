//! Window and element resolution against the live accessibility tree.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AutomationError;
use crate::path::{ElementPath, NameMatch, Segment};
use crate::provider::{AccessibilityProvider, UiElement};

/// Default wait for a window or element to appear.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Marker that switches a `TargetApp` value from exact title match to a
/// regular-expression match.
pub const REGEX_MARKER: &str = "regex:";

/// How a record's `TargetApp` names a top-level window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowSelector {
    /// Exact window title.
    Title(String),
    /// Pattern matched against candidate window titles.
    TitlePattern(String),
}

impl WindowSelector {
    pub fn parse(target_app: &str) -> Self {
        match target_app.strip_prefix(REGEX_MARKER) {
            Some(pattern) => {
                debug!("using regex pattern: {pattern}");
                WindowSelector::TitlePattern(pattern.to_string())
            }
            None => WindowSelector::Title(target_app.to_string()),
        }
    }

    /// Whether a candidate window title satisfies this selector. Providers
    /// call this while enumerating top-level windows.
    pub fn matches(&self, title: &str) -> Result<bool, AutomationError> {
        match self {
            WindowSelector::Title(expected) => Ok(title == expected),
            WindowSelector::TitlePattern(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    AutomationError::InvalidArgument(format!(
                        "bad window pattern '{pattern}': {e}"
                    ))
                })?;
                Ok(regex.is_match(title))
            }
        }
    }
}

impl std::fmt::Display for WindowSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowSelector::Title(title) => write!(f, "{title}"),
            WindowSelector::TitlePattern(pattern) => write!(f, "{REGEX_MARKER}{pattern}"),
        }
    }
}

/// Resolves addresses to live elements. Holds no tree state of its own;
/// every call re-queries the provider because the tree may have changed
/// since the previous record.
#[derive(Clone)]
pub struct ElementResolver {
    provider: Arc<dyn AccessibilityProvider>,
    timeout: Duration,
}

impl ElementResolver {
    pub fn new(provider: Arc<dyn AccessibilityProvider>) -> Self {
        ElementResolver {
            provider,
            timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve a record's `TargetApp` to a top-level window. `Ok(None)` means
    /// no candidate appeared within the timeout.
    pub fn resolve_window(&self, target_app: &str) -> Result<Option<UiElement>, AutomationError> {
        let selector = WindowSelector::parse(target_app);
        self.provider.find_top_level_window(&selector, self.timeout)
    }

    /// Resolve an address relative to a window.
    ///
    /// Chained paths resolve hop by hop against the previously resolved
    /// parent and short-circuit to `Ok(None)` as soon as any hop fails.
    /// Depth bounds are taken from the address as-is; there is no automatic
    /// depth escalation.
    pub fn resolve(
        &self,
        window: &UiElement,
        path: &ElementPath,
    ) -> Result<Option<UiElement>, AutomationError> {
        if path.is_empty() {
            return Ok(Some(window.clone()));
        }
        let mut current = window.clone();
        for (hop, segment) in path.segments.iter().enumerate() {
            debug!("searching descendant: {segment}");
            match self.provider.find_child(&current, segment, self.timeout)? {
                Some(element) => current = element,
                None => {
                    debug!("hop {} failed, giving up on '{path}'", hop + 1);
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }
}

/// Whether an element satisfies a segment's predicates (control type,
/// identity, name, class). Sibling index and depth bound are search
/// parameters, not predicates, and are ignored here.
///
/// Shared by the path generator and by providers so that generation and
/// resolution can never disagree about what a segment means.
pub fn segment_matches(element: &UiElement, segment: &Segment) -> Result<bool, AutomationError> {
    if segment.control_type != "Control" && element.control_type() != segment.control_type {
        return Ok(false);
    }
    if let Some(id) = &segment.automation_id {
        if element.automation_id().as_deref() != Some(id.as_str()) {
            return Ok(false);
        }
    }
    match &segment.name {
        Some(NameMatch::Exact(name)) => {
            if element.name().as_deref() != Some(name.as_str()) {
                return Ok(false);
            }
        }
        Some(NameMatch::Pattern(pattern)) => {
            let regex = Regex::new(pattern).map_err(|e| {
                AutomationError::InvalidPath(format!("bad RegexName '{pattern}': {e}"))
            })?;
            if !regex.is_match(&element.name().unwrap_or_default()) {
                return Ok(false);
            }
        }
        None => {}
    }
    if let Some(class) = &segment.class_name {
        if element.class_name().as_deref() != Some(class.as_str()) {
            return Ok(false);
        }
    }
    Ok(true)
}
