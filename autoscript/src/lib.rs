//! Desktop UI automation driven by tabular action scripts.
//!
//! A script is an ordered table of symbolic actions (launch, click, type,
//! select, branch, loop) replayed against the live accessibility tree of the
//! host operating system. The engine combines a sequential interpreter with
//! nested control flow, a hierarchical element-addressing scheme that
//! re-locates controls in a tree that can change shape between runs, and a
//! fallback-driven dispatcher that picks among pattern-based and
//! synthetic-input automation strategies per target application.

use std::sync::Arc;
use std::time::Duration;

pub mod dispatch;
pub mod errors;
pub mod expr;
pub mod focus;
pub mod generator;
pub mod interpreter;
pub mod path;
pub mod provider;
pub mod resolver;
pub mod screenshot;
pub mod script;
#[cfg(test)]
mod tests;

pub use errors::AutomationError;
pub use expr::Value;
pub use generator::{GenerationMode, PathGenerator};
pub use interpreter::{Interpreter, RunSummary};
pub use path::{ElementPath, NameMatch, Segment};
pub use provider::{create_provider, AccessibilityProvider, Pattern, UiElement};
pub use resolver::{ElementResolver, WindowSelector, DEFAULT_RESOLVE_TIMEOUT};
pub use script::{ActionRecord, AliasTable, Script, Verb};

/// Run-wide behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Dry-run: log intended effects, perform none of them. Control flow and
    /// resolution still execute so the full logging path is exercised.
    pub simulate: bool,
    /// Log action failures and advance instead of halting.
    pub force_continue: bool,
    /// Fixed post-action settle delay, overriding the provider's default.
    pub settle_delay: Option<Duration>,
    /// Try native (OS) focus before semantic (accessibility-tree) focus.
    pub legacy_focus: bool,
    /// How long window and element lookups wait before reporting not-found.
    pub resolve_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            simulate: false,
            force_continue: false,
            settle_delay: None,
            legacy_focus: false,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }
}

/// The main entry point: couples an accessibility provider with run options
/// and executes loaded scripts.
pub struct Runner {
    provider: Arc<dyn AccessibilityProvider>,
    options: RunOptions,
}

impl Runner {
    pub fn new(provider: Arc<dyn AccessibilityProvider>, options: RunOptions) -> Self {
        Runner { provider, options }
    }

    /// Execute one script to completion.
    pub fn run(&self, script: Script, aliases: AliasTable) -> Result<RunSummary, AutomationError> {
        let mut interpreter = Interpreter::new(
            self.provider.clone(),
            script,
            Arc::new(aliases),
            self.options,
        );
        interpreter.run()
    }
}
