use super::mock::{window, MockProvider, NodeSpec};
use super::{init_tracing, record, run_records};
use crate::errors::AutomationError;
use crate::expr::Value;
use crate::provider::Pattern;
use crate::RunOptions;

fn calculator(provider: &MockProvider) {
    provider.add_window(
        window("Calculator")
            .child(
                NodeSpec::new("GroupControl")
                    .named("Number pad")
                    .child(
                        NodeSpec::new("ButtonControl")
                            .named("Seven")
                            .id("num7")
                            .patterns(&[Pattern::Invoke]),
                    )
                    .child(NodeSpec::new("ButtonControl").named("Eight").id("num8")),
            )
            .child(
                NodeSpec::new("EditControl")
                    .named("Display")
                    .id("CalculatorResults")
                    .patterns(&[Pattern::Value]),
            ),
    );
}

#[test]
fn count_loop_runs_the_body_exactly_n_times() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "SetVariable", "n = 0"),
        record("", "", "Loop", "3"),
        record("", "", "SetVariable", "n = {n} + 1"),
        record("", "", "EndLoop", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("n"), Some(&Value::Number(3.0)));
}

#[test]
fn zero_count_loop_skips_the_body() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "SetVariable", "n = 0"),
        record("", "", "Loop", "0"),
        record("", "", "SetVariable", "n = {n} + 1"),
        record("", "", "EndLoop", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("n"), Some(&Value::Number(0.0)));
}

#[test]
fn loop_bound_can_come_from_a_variable() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "SetVariable", "count = 2"),
        record("", "", "SetVariable", "n = 0"),
        record("", "", "Loop", "{count}"),
        record("", "", "SetVariable", "n = {n} + 1"),
        record("", "", "EndLoop", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("n"), Some(&Value::Number(2.0)));
}

#[test]
fn condition_loop_stops_when_the_condition_turns_false() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "SetVariable", "n = 0"),
        record("", "", "Loop", "{n} < 5"),
        record("", "", "SetVariable", "n = {n} + 2"),
        record("", "", "EndLoop", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("n"), Some(&Value::Number(6.0)));
}

#[test]
fn nested_count_loops_multiply() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "SetVariable", "n = 0"),
        record("", "", "Loop", "2"),
        record("", "", "Loop", "3"),
        record("", "", "SetVariable", "n = {n} + 1"),
        record("", "", "EndLoop", ""),
        record("", "", "EndLoop", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("n"), Some(&Value::Number(6.0)));
}

#[test]
fn if_takes_the_matching_branch() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "If", "1 + 1 == 2"),
        record("", "", "SetVariable", "branch = 'then'"),
        record("", "", "Else", ""),
        record("", "", "SetVariable", "branch = 'else'"),
        record("", "", "EndIf", ""),
    ];
    let (result, vars) = run_records(provider.clone(), records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("branch"), Some(&Value::Str("then".to_string())));

    let records = vec![
        record("", "", "If", "1 > 2"),
        record("", "", "SetVariable", "branch = 'then'"),
        record("", "", "Else", ""),
        record("", "", "SetVariable", "branch = 'else'"),
        record("", "", "EndIf", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("branch"), Some(&Value::Str("else".to_string())));
}

#[test]
fn branches_nest_inside_loops() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "SetVariable", "n = 0"),
        record("", "", "SetVariable", "low = 0"),
        record("", "", "SetVariable", "high = 0"),
        record("", "", "Loop", "4"),
        record("", "", "If", "{n} < 2"),
        record("", "", "SetVariable", "low = {low} + 1"),
        record("", "", "Else", ""),
        record("", "", "SetVariable", "high = {high} + 1"),
        record("", "", "EndIf", ""),
        record("", "", "SetVariable", "n = {n} + 1"),
        record("", "", "EndLoop", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("low"), Some(&Value::Number(2.0)));
    assert_eq!(vars.get("high"), Some(&Value::Number(2.0)));
}

#[test]
fn unparseable_condition_counts_as_false() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![
        record("", "", "If", "{never_set} >"),
        record("", "", "SetVariable", "branch = 'then'"),
        record("", "", "Else", ""),
        record("", "", "SetVariable", "branch = 'else'"),
        record("", "", "EndIf", ""),
    ];
    let (result, vars) = run_records(provider, records, RunOptions::default());
    result.unwrap();
    assert_eq!(vars.get("branch"), Some(&Value::Str("else".to_string())));
}

#[test]
fn substituted_value_reaches_the_target_element() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![
        record("", "", "SetVariable", "x = 1 + 2"),
        record(
            "Calculator",
            "EditControl(AutomationId='CalculatorResults')",
            "Input",
            "{x}",
        ),
    ];
    let (result, _) = run_records(provider.clone(), records, RunOptions::default());
    result.unwrap();
    assert_eq!(provider.effects(), vec!["setvalue:Display=3".to_string()]);
}

#[test]
fn click_prefers_invoke_and_falls_back_to_synthetic() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![
        record("Calculator", "ButtonControl(AutomationId='num7')", "Click", ""),
        record("Calculator", "ButtonControl(AutomationId='num8')", "Click", ""),
    ];
    let (result, _) = run_records(provider.clone(), records, RunOptions::default());
    result.unwrap();
    assert_eq!(
        provider.effects(),
        vec!["invoke:Seven".to_string(), "click:Eight".to_string()]
    );
}

#[test]
fn failed_invoke_falls_back_to_synthetic_click() {
    init_tracing();
    let provider = MockProvider::new();
    provider.add_window(window("App").child(
        NodeSpec::new("ButtonControl").named("Broken").failing(&[Pattern::Invoke]),
    ));
    let records = vec![record("App", "ButtonControl(Name='Broken')", "Click", "")];
    let (result, _) = run_records(provider.clone(), records, RunOptions::default());
    result.unwrap();
    assert_eq!(provider.effects(), vec!["click:Broken".to_string()]);
}

#[test]
fn dry_run_performs_no_side_effects() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![
        record("", "", "Launch", "calc.exe"),
        record("Calculator", "ButtonControl(AutomationId='num7')", "Click", ""),
        record(
            "Calculator",
            "EditControl(AutomationId='CalculatorResults')",
            "Input",
            "7",
        ),
        record("", "", "SendKeys", "{ENTER}"),
        record("", "", "Screenshot", "final"),
    ];
    let options = RunOptions {
        simulate: true,
        ..RunOptions::default()
    };
    let (result, _) = run_records(provider.clone(), records, options);
    let summary = result.unwrap();
    assert_eq!(summary.actions_executed, 5);
    assert_eq!(summary.failures, 0);
    assert!(provider.effects().is_empty());
}

#[test]
fn dry_run_skips_a_missing_element() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![record("Calculator", "ButtonControl(Name='Nine')", "Click", "")];
    let options = RunOptions {
        simulate: true,
        ..RunOptions::default()
    };
    let (result, _) = run_records(provider.clone(), records, options);
    result.unwrap();
    assert!(provider.effects().is_empty());
}

#[test]
fn dry_run_survives_a_missing_window() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![record("No Such App", "ButtonControl(Name='Go')", "Click", "")];
    let options = RunOptions {
        simulate: true,
        ..RunOptions::default()
    };
    let (result, _) = run_records(provider, records, options);
    result.unwrap();
}

#[test]
fn missing_window_halts_the_run() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![record("No Such App", "", "Click", "")];
    let (result, _) = run_records(provider, records, RunOptions::default());
    match result {
        Err(AutomationError::WindowNotFound(title)) => assert_eq!(title, "No Such App"),
        other => panic!("expected WindowNotFound, got {other:?}"),
    }
}

#[test]
fn missing_element_reports_the_key() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![record("Calculator", "ButtonControl(Name='Nine')", "Click", "")];
    let (result, _) = run_records(provider, records, RunOptions::default());
    match result {
        Err(AutomationError::ElementNotFound(key)) => {
            assert!(key.contains("ButtonControl(Name='Nine')"), "got: {key}")
        }
        other => panic!("expected ElementNotFound, got {other:?}"),
    }
}

#[test]
fn force_continue_counts_failures_and_presses_on() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![
        record("Calculator", "ButtonControl(Name='Nine')", "Click", ""),
        record("Calculator", "ButtonControl(AutomationId='num7')", "Click", ""),
    ];
    let options = RunOptions {
        force_continue: true,
        ..RunOptions::default()
    };
    let (result, _) = run_records(provider.clone(), records, options);
    let summary = result.unwrap();
    assert_eq!(summary.actions_executed, 2);
    assert_eq!(summary.failures, 1);
    let effects = provider.effects();
    assert!(effects
        .iter()
        .any(|e| e.starts_with("screenshot:errors/error_action_1_")));
    assert!(effects.contains(&"invoke:Seven".to_string()));
}

#[test]
fn failure_halts_without_force_continue() {
    init_tracing();
    let provider = MockProvider::new();
    calculator(&provider);
    let records = vec![
        record("Calculator", "ButtonControl(Name='Nine')", "Click", ""),
        record("Calculator", "ButtonControl(AutomationId='num7')", "Click", ""),
    ];
    let (result, _) = run_records(provider.clone(), records, RunOptions::default());
    assert!(result.is_err());
    assert!(!provider.effects().contains(&"invoke:Seven".to_string()));
}

#[test]
fn unknown_verb_fails_at_dispatch() {
    init_tracing();
    let provider = MockProvider::new();
    let records = vec![record("", "", "Exit", "")];
    let (result, _) = run_records(provider, records, RunOptions::default());
    match result {
        Err(AutomationError::UnsupportedOperation(msg)) => {
            assert!(msg.contains("Exit"), "got: {msg}")
        }
        other => panic!("expected UnsupportedOperation, got {other:?}"),
    }
}
