//! Test suite for the automation engine, run entirely against the in-memory
//! provider in [`mock`]. No test touches a real accessibility tree.


mod interpreter_tests;
mod script_tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::AutomationError;
use crate::expr::Value;
use crate::interpreter::{Interpreter, RunSummary};
use crate::provider::AccessibilityProvider;
use crate::script::{ActionRecord, AliasTable, Script};
use crate::RunOptions;

use mock::MockProvider;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn record(target_app: &str, key: &str, verb: &str, value: &str) -> ActionRecord {
    ActionRecord {
        target_app: target_app.to_string(),
        key: key.to_string(),
        verb: verb.parse().unwrap(),
        value: value.to_string(),
    }
}

/// Validate, interpret and return both the run result and the final variable
/// store.
pub fn run_records(
    provider: Arc<MockProvider>,
    records: Vec<ActionRecord>,
    options: RunOptions,
) -> (
    Result<RunSummary, AutomationError>,
    BTreeMap<String, Value>,
) {
    let script = Script::from_records(records).expect("script should validate");
    let mut interpreter = Interpreter::new(
        provider as Arc<dyn AccessibilityProvider>,
        script,
        Arc::new(AliasTable::new()),
        options,
    );
    let result = interpreter.run();
    let variables = interpreter.variables().clone();
    (result, variables)
}
