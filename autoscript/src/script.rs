//! Script and alias loading.
//!
//! A script is a tabular file with the columns `TargetApp, Key, Action,
//! Value`, one action record per row. Aliases come from a second tabular
//! format (`AliasName, RPA_Path`) and are substituted into `Key` cells once,
//! at load time. Scripts are immutable after load; the record index is the
//! interpreter's program counter.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::AutomationError;

/// The closed set of script verbs.
///
/// `Unknown` survives loading so that dispatch can report it as an
/// unimplemented-verb failure, matching the policy for every other action
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    If,
    Else,
    EndIf,
    Loop,
    EndLoop,
    Launch,
    Wait,
    SetVariable,
    Focus,
    Click,
    Input,
    Invoke,
    SendKeys,
    Select,
    GetProperty,
    Screenshot,
    FocusElement,
    Unknown(String),
}

impl Verb {
    /// Structural verbs drive the interpreter's control flow and are handled
    /// before any window or element resolution.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Verb::If | Verb::Else | Verb::EndIf | Verb::Loop | Verb::EndLoop
        )
    }
}

impl FromStr for Verb {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "if" => Verb::If,
            "else" => Verb::Else,
            "endif" => Verb::EndIf,
            "loop" => Verb::Loop,
            "endloop" => Verb::EndLoop,
            "launch" => Verb::Launch,
            "wait" => Verb::Wait,
            "setvariable" => Verb::SetVariable,
            "focus" => Verb::Focus,
            "click" => Verb::Click,
            "input" => Verb::Input,
            "invoke" => Verb::Invoke,
            "sendkeys" => Verb::SendKeys,
            "select" => Verb::Select,
            "getproperty" => Verb::GetProperty,
            "screenshot" => Verb::Screenshot,
            "focuselement" => Verb::FocusElement,
            _ => Verb::Unknown(s.trim().to_string()),
        })
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Unknown(raw) => write!(f, "{raw}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// One row of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Window selector: literal title or `regex:`-prefixed pattern.
    pub target_app: String,
    /// Element path string; empty means the window itself.
    pub key: String,
    pub verb: Verb,
    /// Free-form value; semantics depend on the verb. Missing cells load as
    /// the empty string.
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct RawScriptRow {
    #[serde(rename = "TargetApp", default)]
    target_app: String,
    #[serde(rename = "Key", default)]
    key: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAliasRow {
    #[serde(rename = "AliasName", default)]
    alias: String,
    #[serde(rename = "RPA_Path", default)]
    path: String,
}

/// Alias name -> raw path string, with a reverse map kept for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct AliasTable {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        AliasTable::default()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn insert(&mut self, alias: &str, path: &str) {
        if let Some(old_path) = self.forward.insert(alias.to_string(), path.to_string()) {
            warn!("duplicate alias '{alias}', overwriting");
            self.reverse.remove(&old_path);
        }
        self.reverse.insert(path.to_string(), alias.to_string());
    }

    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.forward.get(key).map(String::as_str)
    }

    /// Alias bound to this path, if one was loaded. Diagnostic display only.
    pub fn alias_for_path(&self, path: &str) -> Option<&str> {
        self.reverse.get(path).map(String::as_str)
    }

    /// Render a key for log messages, annotating it with its alias when one
    /// is known.
    pub fn format_key(&self, key: &str) -> String {
        match self.alias_for_path(key) {
            Some(alias) => format!("{key} (alias '{alias}')"),
            None => key.to_string(),
        }
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), AutomationError> {
        let path = path.as_ref();
        info!("loading aliases from {}", path.display());
        let text = read_tabular(path)?;
        self.load_str(&text)
    }

    pub fn load_str(&mut self, text: &str) -> Result<(), AutomationError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        for row in reader.deserialize::<RawAliasRow>() {
            let row = row.map_err(|e| AutomationError::ScriptLoad(format!("bad alias row: {e}")))?;
            if !row.alias.is_empty() && !row.path.is_empty() {
                self.insert(&row.alias, &row.path);
            }
        }
        Ok(())
    }
}

/// Ordered, immutable sequence of action records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    records: Vec<ActionRecord>,
}

impl Script {
    /// Load and concatenate one or more script files, substituting aliases
    /// and validating structure. Any failure here is fatal; there is no
    /// partial run.
    pub fn load<P: AsRef<Path>>(
        paths: &[P],
        aliases: &AliasTable,
    ) -> Result<Self, AutomationError> {
        let mut records = Vec::new();
        for path in paths {
            let path = path.as_ref();
            info!("loading actions from {}", path.display());
            let text = read_tabular(path)?;
            parse_records(&text, aliases, &mut records)?;
        }
        info!("loaded {} actions total", records.len());
        Script::from_records(records)
    }

    /// Parse a single script from text. Used by embedders and tests.
    pub fn load_str(text: &str, aliases: &AliasTable) -> Result<Self, AutomationError> {
        let mut records = Vec::new();
        parse_records(text, aliases, &mut records)?;
        Script::from_records(records)
    }

    /// Build a script from in-memory records, applying structural validation.
    pub fn from_records(records: Vec<ActionRecord>) -> Result<Self, AutomationError> {
        let script = Script { records };
        script.validate()?;
        Ok(script)
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Structural validation: every `If` needs a matching `EndIf`, every
    /// `Loop` a matching `EndLoop`, and `Else`/`EndIf`/`EndLoop` must not
    /// appear unmatched. Checked before any action executes so the run loop
    /// never encounters a dangling structural verb.
    fn validate(&self) -> Result<(), AutomationError> {
        enum Open {
            If { has_else: bool, at: usize },
            Loop { at: usize },
        }
        let mut stack: Vec<Open> = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            let row = i + 1;
            match record.verb {
                Verb::If => stack.push(Open::If {
                    has_else: false,
                    at: row,
                }),
                Verb::Loop => stack.push(Open::Loop { at: row }),
                Verb::Else => match stack.last_mut() {
                    Some(Open::If { has_else, .. }) if !*has_else => *has_else = true,
                    _ => {
                        return Err(AutomationError::ScriptLoad(format!(
                            "row {row}: Else without a matching If"
                        )))
                    }
                },
                Verb::EndIf => match stack.pop() {
                    Some(Open::If { .. }) => {}
                    _ => {
                        return Err(AutomationError::ScriptLoad(format!(
                            "row {row}: EndIf without a matching If"
                        )))
                    }
                },
                Verb::EndLoop => match stack.pop() {
                    Some(Open::Loop { .. }) => {}
                    _ => {
                        return Err(AutomationError::ScriptLoad(format!(
                            "row {row}: EndLoop without a matching Loop"
                        )))
                    }
                },
                _ => {}
            }
        }
        if let Some(open) = stack.first() {
            let (verb, at) = match open {
                Open::If { at, .. } => ("If", at),
                Open::Loop { at } => ("Loop", at),
            };
            return Err(AutomationError::ScriptLoad(format!(
                "row {at}: {verb} is never closed"
            )));
        }
        Ok(())
    }
}

fn parse_records(
    text: &str,
    aliases: &AliasTable,
    records: &mut Vec<ActionRecord>,
) -> Result<(), AutomationError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| AutomationError::ScriptLoad(format!("unreadable header row: {e}")))?;
    if !headers.iter().any(|h| h.trim() == "Action") {
        return Err(AutomationError::ScriptLoad(
            "script file has no 'Action' column".to_string(),
        ));
    }
    for row in reader.deserialize::<RawScriptRow>() {
        let row = row.map_err(|e| AutomationError::ScriptLoad(format!("bad script row: {e}")))?;
        let mut key = row.key;
        if let Some(target) = aliases.resolve(&key) {
            debug!("resolved alias '{key}' -> '{target}'");
            key = target.to_string();
        }
        let verb: Verb = row.action.parse().unwrap_or(Verb::Unknown(row.action));
        records.push(ActionRecord {
            target_app: row.target_app,
            key,
            verb,
            value: row.value.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Read a tabular file, tolerating a UTF-8 byte-order mark.
fn read_tabular(path: &Path) -> Result<String, AutomationError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AutomationError::ScriptLoad(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}
