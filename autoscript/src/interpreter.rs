//! The script interpreter: the sequential spine of the engine.
//!
//! Owns the program counter, the flat variable store and the loop stack.
//! Structural verbs (`If/Else/EndIf/Loop/EndLoop`) are handled here, before
//! any window or element resolution; everything else is substituted and
//! handed to the dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::dispatch::ActionDispatcher;
use crate::errors::AutomationError;
use crate::expr::{self, Value};
use crate::provider::AccessibilityProvider;
use crate::screenshot;
use crate::script::{ActionRecord, AliasTable, Script, Verb};
use crate::RunOptions;

/// Outcome of a completed run. With force-continue set, `failures` may be
/// non-zero even though the run itself finished.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    /// Non-structural actions dispatched.
    pub actions_executed: u64,
    /// Actions that failed and were skipped (force-continue mode only).
    pub failures: u64,
}

#[derive(Debug, Clone, Copy)]
enum LoopKind {
    /// Completed iterations of a count loop.
    Count(u64),
    Condition,
}

#[derive(Debug, Clone, Copy)]
struct LoopFrame {
    start: usize,
    kind: LoopKind,
}

/// Mutable run state, owned exclusively by the interpreter.
struct InterpreterState {
    pc: usize,
    loop_stack: Vec<LoopFrame>,
    variables: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchTarget {
    /// `If` with a false condition jumps past its `Else` or `EndIf`.
    ElseOrEndIf,
    /// An `Else` reached by fall-through jumps past its `EndIf`.
    EndIf,
    EndLoop,
}

pub struct Interpreter {
    script: Script,
    provider: Arc<dyn AccessibilityProvider>,
    dispatcher: ActionDispatcher,
    options: RunOptions,
    state: InterpreterState,
}

impl Interpreter {
    pub fn new(
        provider: Arc<dyn AccessibilityProvider>,
        script: Script,
        aliases: Arc<AliasTable>,
        options: RunOptions,
    ) -> Self {
        let dispatcher = ActionDispatcher::new(provider.clone(), aliases, &options);
        Interpreter {
            script,
            provider,
            dispatcher,
            options,
            state: InterpreterState {
                pc: 0,
                loop_stack: Vec::new(),
                variables: BTreeMap::new(),
            },
        }
    }

    /// The variable store after (or during) a run.
    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.state.variables
    }

    /// Execute the whole script. Returns the first unrecovered action
    /// failure unless force-continue is set, in which case failures are
    /// logged, counted and skipped.
    pub fn run(&mut self) -> Result<RunSummary, AutomationError> {
        let mut summary = RunSummary::default();
        while self.state.pc < self.script.len() {
            let i = self.state.pc;
            let record = self.script.records()[i].clone();
            info!("--- action {} ---", i + 1);
            info!(
                "target: {}, action: {}, value: {}",
                record.target_app, record.verb, record.value
            );

            if record.verb.is_structural() {
                self.step_structural(i, &record)?;
                continue;
            }

            // Generic variable substitution for the value field. If/Loop
            // substitute internally, and SetVariable substitutes only into
            // its expression after the name has been parsed off.
            let value = if record.verb == Verb::SetVariable {
                record.value.clone()
            } else {
                expr::substitute(&record.value, &self.state.variables)
            };

            summary.actions_executed += 1;
            if let Err(e) = self
                .dispatcher
                .execute(&record, &value, &mut self.state.variables)
            {
                error!("action {} failed: {e}", i + 1);
                let _ = screenshot::capture(
                    self.provider.as_ref(),
                    &format!("error_action_{}", i + 1),
                    self.options.simulate,
                );
                summary.failures += 1;
                if !self.options.force_continue {
                    error!("stopping execution; enable force-continue to continue on errors");
                    return Err(e);
                }
            }
            self.state.pc = i + 1;
        }
        Ok(summary)
    }

    fn step_structural(
        &mut self,
        i: usize,
        record: &ActionRecord,
    ) -> Result<(), AutomationError> {
        match record.verb {
            Verb::If => {
                let condition = expr::substitute(&record.value, &self.state.variables);
                let result = evaluate_condition(&condition);
                info!("condition '{condition}' evaluated to {result}");
                if result {
                    self.state.pc = i + 1;
                } else {
                    // Jump to just after the matching Else or EndIf; a jump
                    // that lands past an Else never re-evaluates it.
                    self.state.pc = self.find_matching_end(i, MatchTarget::ElseOrEndIf)? + 1;
                }
            }
            Verb::Else => {
                // Reached only by falling through the true branch.
                self.state.pc = self.find_matching_end(i, MatchTarget::EndIf)? + 1;
            }
            Verb::EndIf => self.state.pc = i + 1,
            Verb::Loop => self.step_loop(i, &record.value)?,
            Verb::EndLoop => match self.state.loop_stack.last() {
                Some(frame) => self.state.pc = frame.start,
                // Unreachable after load-time validation.
                None => {
                    return Err(AutomationError::Internal(
                        "EndLoop without an active loop".to_string(),
                    ))
                }
            },
            _ => {
                return Err(AutomationError::Internal(format!(
                    "'{}' is not a structural verb",
                    record.verb
                )))
            }
        }
        Ok(())
    }

    fn step_loop(&mut self, i: usize, raw_value: &str) -> Result<(), AutomationError> {
        let expanded = expr::substitute(raw_value, &self.state.variables);
        // A purely numeric literal is a count loop; anything else is a
        // condition loop.
        let is_count = !expanded.is_empty() && expanded.chars().all(|c| c.is_ascii_digit());

        // A top frame anchored at this record means we came back around via
        // EndLoop; any other stack shape makes this a fresh entry.
        let active = match self.state.loop_stack.last() {
            Some(frame) if frame.start == i => self.state.loop_stack.pop(),
            _ => None,
        };

        let should_loop = if is_count {
            let bound: u64 = expanded.parse().map_err(|_| {
                AutomationError::InvalidArgument(format!("loop count '{expanded}' is out of range"))
            })?;
            let completed = match active {
                Some(LoopFrame {
                    kind: LoopKind::Count(completed),
                    ..
                }) => completed + 1,
                _ => 0,
            };
            if completed < bound {
                self.state.loop_stack.push(LoopFrame {
                    start: i,
                    kind: LoopKind::Count(completed),
                });
                true
            } else {
                false
            }
        } else {
            let result = evaluate_condition(&expanded);
            info!("loop condition '{expanded}' evaluated to {result}");
            if result {
                self.state.loop_stack.push(LoopFrame {
                    start: i,
                    kind: LoopKind::Condition,
                });
            }
            result
        };

        if should_loop {
            self.state.pc = i + 1;
        } else {
            self.state.pc = self.find_matching_end(i, MatchTarget::EndLoop)? + 1;
        }
        Ok(())
    }

    /// Forward linear scan for the matching structural end, maintaining a
    /// nesting counter. The script is not pre-indexed; expected script sizes
    /// (tens to low hundreds of records) keep this cheap.
    fn find_matching_end(
        &self,
        start: usize,
        target: MatchTarget,
    ) -> Result<usize, AutomationError> {
        let mut nesting = 0usize;
        for j in start + 1..self.script.len() {
            let verb = &self.script.records()[j].verb;
            match target {
                MatchTarget::ElseOrEndIf | MatchTarget::EndIf => match verb {
                    Verb::If => nesting += 1,
                    Verb::EndIf if nesting == 0 => return Ok(j),
                    Verb::EndIf => nesting -= 1,
                    Verb::Else if nesting == 0 && target == MatchTarget::ElseOrEndIf => {
                        return Ok(j)
                    }
                    _ => {}
                },
                MatchTarget::EndLoop => match verb {
                    Verb::Loop => nesting += 1,
                    Verb::EndLoop if nesting == 0 => return Ok(j),
                    Verb::EndLoop => nesting -= 1,
                    _ => {}
                },
            }
        }
        // Load-time validation makes this unreachable.
        Err(AutomationError::Internal(format!(
            "no matching end for structural verb at record {}",
            start + 1
        )))
    }
}

/// Evaluate a substituted condition; evaluation failures are logged and
/// treated as false rather than aborting the run.
fn evaluate_condition(condition: &str) -> bool {
    match expr::evaluate_bool(condition) {
        Ok(result) => result,
        Err(e) => {
            error!("condition evaluation failed: {e}");
            false
        }
    }
}
