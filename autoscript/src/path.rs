//! The textual addressing scheme for locating a control inside a window.
//!
//! A path is an ordered chain of segments, each one describing a single
//! parent-to-child hop: `EditControl(Name='Amount', searchDepth=1)`. Segments
//! are joined with ` -> `. An empty path addresses the window itself.
//!
//! Recognised segment properties:
//! - `AutomationId='…'` — stable identity, preferred when present
//! - `Name='…'` — exact display name (single quotes escaped as `\'`)
//! - `RegexName='…'` — display name matched as a regular expression
//! - `ClassName='…'` — window class
//! - `foundIndex=N` — 1-based index among siblings matching the same predicates
//! - `searchDepth=N` — search depth bound for this hop

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;

/// How a segment matches the display name of a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameMatch {
    Exact(String),
    Pattern(String),
}

/// One hop of an element path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    /// Control type tag, e.g. `ButtonControl`. The special tag `Control`
    /// matches any control type.
    pub control_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub automation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<NameMatch>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub class_name: Option<String>,
    /// 1-based sibling index among matches; absent means "first match".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub index: Option<usize>,
    /// Maximum search depth below the parent; absent means unrestricted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub depth: Option<usize>,
}

impl Segment {
    pub fn new(control_type: impl Into<String>) -> Self {
        Segment {
            control_type: control_type.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Exact(name.into()));
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut props: Vec<String> = Vec::new();
        if let Some(id) = &self.automation_id {
            props.push(format!("AutomationId='{}'", escape(id)));
        }
        match &self.name {
            Some(NameMatch::Exact(name)) => props.push(format!("Name='{}'", escape(name))),
            Some(NameMatch::Pattern(pat)) => props.push(format!("RegexName='{}'", escape(pat))),
            None => {}
        }
        if let Some(class) = &self.class_name {
            props.push(format!("ClassName='{}'", escape(class)));
        }
        if let Some(index) = self.index {
            props.push(format!("foundIndex={index}"));
        }
        if let Some(depth) = self.depth {
            props.push(format!("searchDepth={depth}"));
        }
        write!(f, "{}({})", self.control_type, props.join(", "))
    }
}

/// A chained address, valid relative to the window named by the record's
/// `TargetApp`. Segments compose left-to-right as parent-to-child searches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementPath {
    pub segments: Vec<Segment>,
}

impl ElementPath {
    /// The empty path, addressing the window root itself.
    pub fn window() -> Self {
        ElementPath::default()
    }

    pub fn single(segment: Segment) -> Self {
        ElementPath {
            segments: vec![segment],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", rendered.join(" -> "))
    }
}

impl FromStr for ElementPath {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(s).parse()
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Hand-rolled scanner; a split on ` -> ` would break on names that contain
/// the separator inside quotes.
struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            input,
            chars: input.chars().peekable(),
        }
    }

    fn error(&self, message: impl Into<String>) -> AutomationError {
        AutomationError::InvalidPath(format!("{}: '{}'", message.into(), self.input))
    }

    fn parse(mut self) -> Result<ElementPath, AutomationError> {
        let mut segments = Vec::new();
        self.skip_whitespace();
        if self.chars.peek().is_none() {
            return Ok(ElementPath::window());
        }
        loop {
            segments.push(self.parse_segment()?);
            self.skip_whitespace();
            if self.chars.peek().is_none() {
                break;
            }
            self.expect_separator()?;
            self.skip_whitespace();
        }
        Ok(ElementPath { segments })
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect_separator(&mut self) -> Result<(), AutomationError> {
        if self.chars.next() == Some('-') && self.chars.next() == Some('>') {
            Ok(())
        } else {
            Err(self.error("expected ' -> ' between segments"))
        }
    }

    fn parse_segment(&mut self) -> Result<Segment, AutomationError> {
        let mut control_type = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '(' {
                break;
            }
            if !c.is_alphanumeric() && c != '_' {
                return Err(self.error(format!("unexpected character '{c}' in control type")));
            }
            control_type.push(c);
            self.chars.next();
        }
        if control_type.is_empty() {
            return Err(self.error("missing control type"));
        }
        if self.chars.next() != Some('(') {
            return Err(self.error("expected '(' after control type"));
        }

        let mut segment = Segment::new(control_type);
        self.skip_whitespace();
        if self.chars.peek() == Some(&')') {
            self.chars.next();
            return Ok(segment);
        }
        loop {
            self.parse_property(&mut segment)?;
            self.skip_whitespace();
            match self.chars.next() {
                Some(',') => self.skip_whitespace(),
                Some(')') => break,
                _ => return Err(self.error("expected ',' or ')' in property list")),
            }
        }
        Ok(segment)
    }

    fn parse_property(&mut self, segment: &mut Segment) -> Result<(), AutomationError> {
        let mut key = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            self.chars.next();
        }
        self.skip_whitespace();
        if self.chars.next() != Some('=') {
            return Err(self.error(format!("expected '=' after property '{key}'")));
        }
        self.skip_whitespace();

        match key.as_str() {
            "AutomationId" => segment.automation_id = Some(self.parse_quoted()?),
            "Name" => segment.name = Some(NameMatch::Exact(self.parse_quoted()?)),
            "RegexName" => segment.name = Some(NameMatch::Pattern(self.parse_quoted()?)),
            "ClassName" => segment.class_name = Some(self.parse_quoted()?),
            "foundIndex" => {
                let index = self.parse_number()?;
                if index == 0 {
                    return Err(self.error("foundIndex must be >= 1"));
                }
                segment.index = Some(index);
            }
            "searchDepth" => segment.depth = Some(self.parse_number()?),
            other => return Err(self.error(format!("unknown property '{other}'"))),
        }
        Ok(())
    }

    fn parse_quoted(&mut self) -> Result<String, AutomationError> {
        if self.chars.next() != Some('\'') {
            return Err(self.error("expected quoted value"));
        }
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("dangling escape in quoted value")),
                },
                Some('\'') => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated quoted value")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<usize, AutomationError> {
        let mut digits = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
            digits.push(self.chars.next().unwrap());
        }
        digits
            .parse()
            .map_err(|_| self.error("expected a numeric property value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_parses_a_chained_path() {
        let path = ElementPath {
            segments: vec![
                Segment {
                    control_type: "PaneControl".into(),
                    class_name: Some("LandmarkTarget".into()),
                    index: Some(1),
                    depth: Some(1),
                    ..Default::default()
                },
                Segment {
                    control_type: "ButtonControl".into(),
                    automation_id: Some("num7".into()),
                    name: Some(NameMatch::Exact("Seven".into())),
                    depth: Some(1),
                    ..Default::default()
                },
            ],
        };
        let text = path.to_string();
        assert_eq!(
            text,
            "PaneControl(ClassName='LandmarkTarget', foundIndex=1, searchDepth=1) -> \
             ButtonControl(AutomationId='num7', Name='Seven', searchDepth=1)"
        );
        assert_eq!(text.parse::<ElementPath>().unwrap(), path);
    }

    #[test]
    fn empty_string_is_the_window_path() {
        let path: ElementPath = "".parse().unwrap();
        assert!(path.is_empty());
        let path: ElementPath = "   ".parse().unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn escaped_quotes_round_trip() {
        let segment = Segment::new("ButtonControl").with_name("O'Brien -> Next");
        let text = ElementPath::single(segment.clone()).to_string();
        assert_eq!(text, "ButtonControl(Name='O\\'Brien -> Next')");
        let parsed: ElementPath = text.parse().unwrap();
        assert_eq!(parsed.segments, vec![segment]);
    }

    #[test]
    fn regex_name_is_kept_as_a_pattern() {
        let parsed: ElementPath = "EditControl(RegexName='.*(Editor|Edit).*')".parse().unwrap();
        assert_eq!(
            parsed.segments[0].name,
            Some(NameMatch::Pattern(".*(Editor|Edit).*".into()))
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in [
            "ButtonControl",
            "ButtonControl(Name='x'",
            "ButtonControl(Name=x)",
            "ButtonControl(foundIndex=0)",
            "ButtonControl(Bogus='x')",
            "ButtonControl() >> ButtonControl()",
        ] {
            assert!(
                bad.parse::<ElementPath>().is_err(),
                "expected parse failure for '{bad}'"
            );
        }
    }
}
