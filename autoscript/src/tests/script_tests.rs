use super::{init_tracing, record};
use crate::errors::AutomationError;
use crate::script::{AliasTable, Script, Verb};

fn load_error(records: Vec<crate::script::ActionRecord>) -> String {
    match Script::from_records(records) {
        Err(AutomationError::ScriptLoad(msg)) => msg,
        other => panic!("expected a load error, got {other:?}"),
    }
}

#[test]
fn loads_a_script_with_bom_and_mixed_case_verbs() {
    init_tracing();
    let text = "\u{feff}TargetApp,Key,Action,Value\n\
                Calculator,,LAUNCH,calc.exe\n\
                Calculator,btnSeven,click,\n";
    let mut aliases = AliasTable::new();
    aliases.insert("btnSeven", "ButtonControl(AutomationId='num7')");

    // The BOM is stripped by the file reader; feed through it here to mimic
    // what an Excel-exported file looks like after read_tabular.
    let script = Script::load_str(text.trim_start_matches('\u{feff}'), &aliases).unwrap();
    assert_eq!(script.len(), 2);
    assert_eq!(script.records()[0].verb, Verb::Launch);
    assert_eq!(script.records()[0].value, "calc.exe");
    assert_eq!(script.records()[1].verb, Verb::Click);
    assert_eq!(script.records()[1].key, "ButtonControl(AutomationId='num7')");
    assert_eq!(script.records()[1].value, "");
}

#[test]
fn a_missing_value_cell_loads_as_empty() {
    init_tracing();
    let text = "TargetApp,Key,Action,Value\nCalculator,,Focus\n";
    let script = Script::load_str(text, &AliasTable::new()).unwrap();
    assert_eq!(script.records()[0].value, "");
}

#[test]
fn a_script_without_an_action_column_is_rejected() {
    init_tracing();
    let text = "App,Path,Verb\nCalculator,,Click\n";
    match Script::load_str(text, &AliasTable::new()) {
        Err(AutomationError::ScriptLoad(msg)) => assert!(msg.contains("Action"), "got: {msg}"),
        other => panic!("expected a load error, got {other:?}"),
    }
}

#[test]
fn aliases_replace_whole_key_cells_only() {
    init_tracing();
    let text = "TargetApp,Key,Action,Value\n\
                Calculator,btnSeven,Click,\n\
                Calculator,btnSevenX,Click,\n";
    let mut aliases = AliasTable::new();
    aliases.insert("btnSeven", "ButtonControl(AutomationId='num7')");
    let script = Script::load_str(text, &aliases).unwrap();
    assert_eq!(script.records()[0].key, "ButtonControl(AutomationId='num7')");
    assert_eq!(script.records()[1].key, "btnSevenX");
}

#[test]
fn format_key_annotates_known_paths_with_their_alias() {
    init_tracing();
    let mut aliases = AliasTable::new();
    aliases.insert("btnSeven", "ButtonControl(AutomationId='num7')");
    assert_eq!(
        aliases.format_key("ButtonControl(AutomationId='num7')"),
        "ButtonControl(AutomationId='num7') (alias 'btnSeven')"
    );
    assert_eq!(aliases.format_key("ButtonControl(Name='Eight')"), "ButtonControl(Name='Eight')");
}

#[test]
fn a_duplicate_alias_overwrites_the_earlier_binding() {
    init_tracing();
    let mut aliases = AliasTable::new();
    aliases.insert("btn", "ButtonControl(Name='Old')");
    aliases.insert("btn", "ButtonControl(Name='New')");
    assert_eq!(aliases.resolve("btn"), Some("ButtonControl(Name='New')"));
    assert_eq!(aliases.len(), 1);
    // The overwritten binding must not keep annotating its old path.
    assert_eq!(
        aliases.format_key("ButtonControl(Name='Old')"),
        "ButtonControl(Name='Old')"
    );
    assert_eq!(
        aliases.format_key("ButtonControl(Name='New')"),
        "ButtonControl(Name='New') (alias 'btn')"
    );
}

#[test]
fn alias_substitution_is_idempotent_across_reloads() {
    init_tracing();
    let text = "TargetApp,Key,Action,Value\nCalculator,btnSeven,Click,\n";
    let mut aliases = AliasTable::new();
    aliases.insert("btnSeven", "ButtonControl(AutomationId='num7')");

    let first = Script::load_str(text, &aliases).unwrap();
    let second = Script::load_str(text, &aliases).unwrap();
    assert_eq!(first.records(), second.records());

    // A key that already holds the expanded path passes through unchanged.
    let expanded = "TargetApp,Key,Action,Value\n\
                    Calculator,ButtonControl(AutomationId='num7'),Click,\n";
    let third = Script::load_str(expanded, &aliases).unwrap();
    assert_eq!(third.records(), first.records());
}

#[test]
fn alias_files_load_and_skip_blank_rows() {
    init_tracing();
    let text = "AliasName,RPA_Path\n\
                btnSeven,ButtonControl(AutomationId='num7')\n\
                ,\n\
                display,EditControl(AutomationId='CalculatorResults')\n";
    let mut aliases = AliasTable::new();
    aliases.load_str(text).unwrap();
    assert_eq!(aliases.len(), 2);
    assert_eq!(
        aliases.resolve("display"),
        Some("EditControl(AutomationId='CalculatorResults')")
    );
}

#[test]
fn unknown_verbs_survive_loading() {
    init_tracing();
    let text = "TargetApp,Key,Action,Value\n,,Exit,\n";
    let script = Script::load_str(text, &AliasTable::new()).unwrap();
    assert_eq!(script.records()[0].verb, Verb::Unknown("Exit".to_string()));
}

#[test]
fn stray_structural_verbs_fail_validation() {
    init_tracing();
    let msg = load_error(vec![record("", "", "Else", "")]);
    assert!(msg.contains("Else without a matching If"), "got: {msg}");

    let msg = load_error(vec![record("", "", "EndIf", "")]);
    assert!(msg.contains("EndIf without a matching If"), "got: {msg}");

    let msg = load_error(vec![record("", "", "EndLoop", "")]);
    assert!(msg.contains("EndLoop without a matching Loop"), "got: {msg}");
}

#[test]
fn unclosed_blocks_fail_validation() {
    init_tracing();
    let msg = load_error(vec![record("", "", "If", "1 == 1")]);
    assert!(msg.contains("row 1: If is never closed"), "got: {msg}");

    let msg = load_error(vec![
        record("", "", "Loop", "3"),
        record("", "", "SetVariable", "n = 1"),
    ]);
    assert!(msg.contains("row 1: Loop is never closed"), "got: {msg}");
}

#[test]
fn mismatched_block_ends_fail_validation() {
    init_tracing();
    let msg = load_error(vec![
        record("", "", "If", "1 == 1"),
        record("", "", "EndLoop", ""),
    ]);
    assert!(msg.contains("EndLoop without a matching Loop"), "got: {msg}");

    // A second Else for the same If is stray.
    let msg = load_error(vec![
        record("", "", "If", "1 == 1"),
        record("", "", "Else", ""),
        record("", "", "Else", ""),
        record("", "", "EndIf", ""),
    ]);
    assert!(msg.contains("Else without a matching If"), "got: {msg}");
}

#[test]
fn properly_nested_blocks_validate() {
    init_tracing();
    let records = vec![
        record("", "", "Loop", "2"),
        record("", "", "If", "1 == 1"),
        record("", "", "SetVariable", "a = 1"),
        record("", "", "Else", ""),
        record("", "", "SetVariable", "a = 2"),
        record("", "", "EndIf", ""),
        record("", "", "EndLoop", ""),
    ];
    Script::from_records(records).unwrap();
}
