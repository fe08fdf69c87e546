//! Verb dispatch with per-verb fallback chains.
//!
//! Each verb maps to an ordered list of attempts against the resolved
//! element or window; a pattern-based strategy is tried first and a
//! synthetic-input strategy second, because neither works across all target
//! applications. There is exactly one primary-to-fallback transition per
//! verb, never a general retry loop.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::AutomationError;
use crate::expr::{self, Value};
use crate::focus::FocusCoordinator;
use crate::path::{ElementPath, Segment};
use crate::provider::{AccessibilityProvider, Pattern, UiElement};
use crate::resolver::ElementResolver;
use crate::screenshot;
use crate::script::{ActionRecord, AliasTable, Verb};
use crate::RunOptions;

/// `name = expression` as accepted by `SetVariable`.
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*=\s*(.+)$").expect("valid assignment regex"));

/// Wait for a child item during `Select`; short because the container is
/// already resolved and expanded.
const CHILD_ITEM_TIMEOUT: Duration = Duration::from_secs(1);

/// Settle time after expanding a collapsed container.
const EXPAND_SETTLE: Duration = Duration::from_millis(500);

pub struct ActionDispatcher {
    provider: Arc<dyn AccessibilityProvider>,
    resolver: ElementResolver,
    focus: FocusCoordinator,
    aliases: Arc<AliasTable>,
    simulate: bool,
    settle_delay: Option<Duration>,
}

impl ActionDispatcher {
    pub fn new(
        provider: Arc<dyn AccessibilityProvider>,
        aliases: Arc<AliasTable>,
        options: &RunOptions,
    ) -> Self {
        let resolver = ElementResolver::new(provider.clone()).with_timeout(options.resolve_timeout);
        ActionDispatcher {
            provider,
            resolver,
            focus: FocusCoordinator::new(options.legacy_focus, options.force_continue),
            aliases,
            simulate: options.simulate,
            settle_delay: options.settle_delay,
        }
    }

    /// Perform one non-structural action. `value` has already had variable
    /// substitution applied (except for `SetVariable`, which substitutes
    /// into its expression internally).
    pub fn execute(
        &self,
        record: &ActionRecord,
        value: &str,
        variables: &mut BTreeMap<String, Value>,
    ) -> Result<(), AutomationError> {
        // Verbs with no window precondition.
        match &record.verb {
            Verb::Launch => return self.launch(value),
            Verb::Wait => return self.wait(value),
            Verb::SetVariable => return self.set_variable(value, variables),
            Verb::SendKeys => return self.send_keys(value),
            Verb::Screenshot => return self.take_screenshot(value),
            Verb::Unknown(raw) => {
                return Err(AutomationError::UnsupportedOperation(format!(
                    "action '{raw}' is not implemented"
                )))
            }
            _ => {}
        }

        let Some(window) = self.resolver.resolve_window(&record.target_app)? else {
            if self.simulate {
                warn!(
                    "[dry-run] window '{}' not found; subsequent actions might fail",
                    record.target_app
                );
                return Ok(());
            }
            return Err(AutomationError::WindowNotFound(record.target_app.clone()));
        };

        if record.verb == Verb::Focus {
            return self.focus_window(&window, &record.target_app);
        }

        let mut element = window.clone();
        if !record.key.is_empty() {
            let path: ElementPath = record.key.parse()?;
            let key_display = self.aliases.format_key(&record.key);
            match self.resolver.resolve(&window, &path)? {
                Some(found) => {
                    if self.simulate {
                        info!(
                            "[dry-run] element found: {} ({})",
                            found.display_name(),
                            found.control_type()
                        );
                    }
                    element = found;
                }
                None => {
                    if self.simulate {
                        warn!("[dry-run] element not found for key: {key_display}");
                        return Ok(());
                    }
                    return Err(AutomationError::ElementNotFound(key_display));
                }
            }
        }

        match &record.verb {
            Verb::Click => self.click(&element),
            Verb::Input => self.input(&element, value, &record.key),
            Verb::Invoke => self.invoke(&element, &record.key),
            Verb::Select => self.select(&element, value),
            Verb::GetProperty => self.get_property(&element, value, variables),
            Verb::FocusElement => self.focus_element(&element, &record.key),
            other => Err(AutomationError::Internal(format!(
                "structural verb '{other}' reached the dispatcher"
            ))),
        }
    }

    fn settle(&self) {
        if let Some(delay) = self.settle_delay {
            thread::sleep(delay);
        }
    }

    fn launch(&self, command: &str) -> Result<(), AutomationError> {
        if self.simulate {
            info!("[dry-run] would launch: {command}");
            return Ok(());
        }
        info!("launching {command}...");
        #[cfg(target_os = "windows")]
        let mut process = {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        };
        #[cfg(not(target_os = "windows"))]
        let mut process = {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        process
            .spawn()
            .map_err(|e| AutomationError::PlatformError(format!("launch '{command}' failed: {e}")))?;
        Ok(())
    }

    fn wait(&self, value: &str) -> Result<(), AutomationError> {
        let seconds: f64 = value.trim().parse().map_err(|_| {
            AutomationError::InvalidArgument(format!("Wait expects seconds, got '{value}'"))
        })?;
        if self.simulate {
            info!("[dry-run] would wait: {seconds} seconds");
            return Ok(());
        }
        let duration = Duration::try_from_secs_f64(seconds.max(0.0)).map_err(|_| {
            AutomationError::InvalidArgument(format!("Wait duration '{value}' is out of range"))
        })?;
        info!("waiting {seconds} seconds...");
        thread::sleep(duration);
        Ok(())
    }

    fn set_variable(
        &self,
        value: &str,
        variables: &mut BTreeMap<String, Value>,
    ) -> Result<(), AutomationError> {
        if self.simulate {
            info!("[dry-run] would set variable: {value}");
            return Ok(());
        }
        let captures = ASSIGNMENT.captures(value).ok_or_else(|| {
            AutomationError::InvalidArgument(format!("invalid SetVariable format: '{value}'"))
        })?;
        let name = captures[1].to_string();
        let expression = expr::substitute(captures[2].trim(), variables);
        let result = expr::evaluate(&expression)?;
        info!("set variable '{name}' to '{result}'");
        variables.insert(name, result);
        Ok(())
    }

    fn send_keys(&self, value: &str) -> Result<(), AutomationError> {
        if self.simulate {
            info!("[dry-run] would send keys: {value}");
            return Ok(());
        }
        info!("sending keys: {value}");
        self.provider.send_keys(value)
    }

    fn take_screenshot(&self, value: &str) -> Result<(), AutomationError> {
        let prefix = if value.is_empty() { "screenshot" } else { value };
        info!("taking screenshot: {prefix}");
        let _ = screenshot::capture(self.provider.as_ref(), prefix, self.simulate);
        Ok(())
    }

    fn focus_window(&self, window: &UiElement, target_app: &str) -> Result<(), AutomationError> {
        if self.simulate {
            info!("[dry-run] would focus window: {target_app}");
            return Ok(());
        }
        info!("focusing window '{target_app}'...");
        window.focus()
    }

    fn click(&self, element: &UiElement) -> Result<(), AutomationError> {
        if self.simulate {
            info!("[dry-run] would click element: {}", element.display_name());
            return Ok(());
        }
        info!("clicking element '{}'...", element.display_name());
        if element.supports_pattern(Pattern::Invoke) {
            match element.invoke() {
                Ok(()) => {
                    debug!("clicked via invoke pattern");
                    self.settle();
                    return Ok(());
                }
                Err(e) => warn!("invoke failed, falling back to synthetic click: {e}"),
            }
        }
        element.click()?;
        self.settle();
        Ok(())
    }

    fn input(&self, element: &UiElement, value: &str, key: &str) -> Result<(), AutomationError> {
        if self.simulate {
            info!(
                "[dry-run] would input text '{value}' into element: {}",
                element.display_name()
            );
            return Ok(());
        }
        info!("inputting text: {value}");
        if element.supports_pattern(Pattern::Value) {
            match element.set_value(value) {
                Ok(()) => {
                    debug!("input via value pattern");
                    return Ok(());
                }
                Err(e) => debug!("set value failed: {e}"),
            }
        }
        debug!("falling back to keystrokes");
        let desc = if key.is_empty() {
            element.display_name()
        } else {
            self.aliases.format_key(key)
        };
        self.focus.acquire(element, &desc)?;
        self.provider.send_keys(value)
    }

    fn invoke(&self, element: &UiElement, key: &str) -> Result<(), AutomationError> {
        if self.simulate {
            info!("[dry-run] would invoke element: {}", element.display_name());
            return Ok(());
        }
        info!("invoking element '{}'...", element.display_name());
        let desc = if key.is_empty() {
            element.display_name()
        } else {
            self.aliases.format_key(key)
        };
        self.focus.acquire(element, &desc)?;

        if element.supports_pattern(Pattern::Invoke) {
            element.invoke()?;
            self.settle();
            Ok(())
        } else if element.supports_pattern(Pattern::Toggle) {
            info!("invoke pattern not found, using toggle pattern...");
            element.toggle()?;
            self.settle();
            Ok(())
        } else {
            Err(AutomationError::UnsupportedOperation(
                "element supports neither invoke nor toggle".to_string(),
            ))
        }
    }

    fn select(&self, element: &UiElement, value: &str) -> Result<(), AutomationError> {
        if self.simulate {
            info!(
                "[dry-run] would select element: {} (value: {value})",
                element.display_name()
            );
            return Ok(());
        }

        if value.is_empty() {
            // Select the element itself; no click fallback here.
            info!("selecting element '{}'...", element.display_name());
            if !element.supports_pattern(Pattern::SelectionItem) {
                return Err(AutomationError::UnsupportedOperation(
                    "element does not support selection".to_string(),
                ));
            }
            element.select()?;
            self.settle();
            return Ok(());
        }

        // Treat the element as a container and select a child item by name.
        info!("selecting item '{value}' in '{}'...", element.display_name());
        if element.supports_pattern(Pattern::ExpandCollapse) {
            if let Err(e) = element.expand() {
                debug!("expand failed (continuing): {e}");
            }
            thread::sleep(EXPAND_SETTLE);
        }

        let item = self
            .find_child_item(element, value)?
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "item '{value}' not found in '{}'",
                    element.display_name()
                ))
            })?;

        if item.supports_pattern(Pattern::ScrollItem) {
            item.scroll_into_view()?;
        }
        if item.supports_pattern(Pattern::SelectionItem) {
            item.select()?;
            self.settle();
        } else {
            warn!("item does not support selection, trying click...");
            item.click()?;
            self.settle();
        }
        Ok(())
    }

    /// Locate a named child of a container, trying list-item, tree-item and
    /// finally any direct child, in that order.
    fn find_child_item(
        &self,
        container: &UiElement,
        name: &str,
    ) -> Result<Option<UiElement>, AutomationError> {
        for control_type in ["ListItemControl", "TreeItemControl"] {
            let segment = Segment::new(control_type).with_name(name);
            if let Some(item) =
                self.provider
                    .find_child(container, &segment, CHILD_ITEM_TIMEOUT)?
            {
                return Ok(Some(item));
            }
        }
        let segment = Segment::new("Control").with_name(name).with_depth(1);
        self.provider
            .find_child(container, &segment, CHILD_ITEM_TIMEOUT)
    }

    fn get_property(
        &self,
        element: &UiElement,
        value: &str,
        variables: &mut BTreeMap<String, Value>,
    ) -> Result<(), AutomationError> {
        // "name = propertyName", or the whole value as both name and
        // property with the property defaulting to the element's value.
        let (name, property) = match value.split_once('=') {
            Some((name, property)) => (name.trim(), property.trim()),
            None => (value.trim(), "Value"),
        };
        if name.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "GetProperty needs a variable name".to_string(),
            ));
        }
        if self.simulate {
            info!(
                "[dry-run] would get property '{property}' from element: {}",
                element.display_name()
            );
            variables.insert(name.to_string(), Value::Str("[DryRunValue]".to_string()));
            return Ok(());
        }
        let property_value = element.property(property)?;
        info!(
            "got {property} = '{property_value}' from '{}', stored in '{name}'",
            element.display_name()
        );
        variables.insert(name.to_string(), Value::Str(property_value));
        Ok(())
    }

    fn focus_element(&self, element: &UiElement, key: &str) -> Result<(), AutomationError> {
        let desc = match element.name() {
            Some(name) if !name.is_empty() => name,
            _ if !key.is_empty() => self.aliases.format_key(key),
            _ => format!(
                "{} (AutomationId: {})",
                element.control_type(),
                element.automation_id().unwrap_or_else(|| "N/A".to_string())
            ),
        };
        if self.simulate {
            info!("[dry-run] would focus element: {desc}");
            return Ok(());
        }
        info!("focusing element '{desc}'...");
        self.focus.acquire(element, &desc)?;
        info!("focus successfully set on '{desc}'");
        Ok(())
    }
}
