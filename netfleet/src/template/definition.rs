//! Template source grammar and compilation.
//!
//! A template source is a list of `Value` declarations followed by one or more
//! states of anchored line rules:
//!
//! ```text
//! Value Required name (\S+)
//! Value List member (\w+)
//!
//! Start
//!   ^group ${name} -> Continue.Record
//!   ^group ${name}
//!   ^\s+member ${member}
//! ```
//!
//! `${name}` splices the declared pattern in as a named capture group. Rule
//! actions: `Record`, `NoRecord`, `Clear`, `Error`, a `Continue` line action
//! (keep matching further rules against the same line), and an optional state
//! transition. `EOF` and `End` are implicit terminal states.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::TemplateError;

/// Value options controlling accumulation and record emission.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ValueOptions {
    /// Accumulate every capture into a list within one record.
    pub list: bool,

    /// Keep the last capture across record boundaries.
    pub filldown: bool,

    /// Discard records where this value never matched.
    pub required: bool,
}

/// One declared value.
#[derive(Debug, Clone)]
pub(crate) struct ValueDef {
    pub name: String,

    /// Pattern without the outer parentheses.
    pub pattern: String,

    pub options: ValueOptions,
}

/// What to do with the line cursor after a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineAction {
    /// Consume the line and move to the next one.
    Next,

    /// Keep testing the remaining rules against the same line.
    Continue,
}

/// What to do with the pending record after a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordAction {
    /// Leave the pending record as is.
    None,

    /// Emit the pending record and start a new one.
    Record,

    /// Explicit no-op, for readability in sources.
    NoRecord,

    /// Drop all non-filldown values without emitting.
    Clear,

    /// Abort the whole match with an error.
    Error,
}

/// One compiled rule.
#[derive(Debug, Clone)]
pub(crate) struct Rule {
    pub regex: Regex,
    pub line: LineAction,
    pub record: RecordAction,
    pub new_state: Option<String>,
    pub error_message: Option<String>,

    /// Line in the template source, for diagnostics.
    pub source_line: usize,
}

/// A compiled template: value declarations plus a rule state machine.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) values: Vec<ValueDef>,
    pub(crate) states: IndexMap<String, Vec<Rule>>,
}

static VALUE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(\w+)\}").unwrap());

impl Template {
    /// Compile a template source. Fails on malformed structure, unknown value
    /// references, unknown state transitions, or invalid patterns.
    pub fn parse(source: &str) -> Result<Template, TemplateError> {
        let mut values: Vec<ValueDef> = Vec::new();
        let mut states: IndexMap<String, Vec<Rule>> = IndexMap::new();
        let mut current_state: Option<String> = None;

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            if current_state.is_none() && line.starts_with("Value ") {
                values.push(parse_value(line, line_no)?);
                continue;
            }

            if !line.starts_with(' ') && !line.starts_with('\t') {
                // State header: a bare identifier at column zero.
                let name = line.trim();
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(TemplateError::Syntax {
                        line: line_no,
                        message: format!("invalid state name '{name}'"),
                    });
                }
                states.insert(name.to_string(), Vec::new());
                current_state = Some(name.to_string());
                continue;
            }

            let state = current_state.as_ref().ok_or(TemplateError::Syntax {
                line: line_no,
                message: "rule outside of a state".to_string(),
            })?;
            let rule = parse_rule(line.trim_start(), &values, line_no)?;
            states
                .get_mut(state)
                .expect("current state always present")
                .push(rule);
        }

        if !states.contains_key("Start") {
            return Err(TemplateError::Syntax {
                line: source.lines().count(),
                message: "template has no Start state".to_string(),
            });
        }

        // Every transition target must be a declared state or a terminal.
        for rules in states.values() {
            for rule in rules {
                if let Some(target) = &rule.new_state {
                    if target != "EOF" && target != "End" && !states.contains_key(target) {
                        return Err(TemplateError::UnknownState {
                            name: target.clone(),
                        });
                    }
                }
            }
        }

        Ok(Template { values, states })
    }

    /// Declared value names in declaration order.
    pub fn header(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.name.as_str())
    }
}

fn parse_value(line: &str, line_no: usize) -> Result<ValueDef, TemplateError> {
    let rest = line["Value ".len()..].trim();
    let paren = rest.find('(').ok_or(TemplateError::Syntax {
        line: line_no,
        message: "value declaration missing (pattern)".to_string(),
    })?;
    let head = rest[..paren].trim();
    let pattern_src = rest[paren..].trim();

    if !pattern_src.starts_with('(') || !pattern_src.ends_with(')') {
        return Err(TemplateError::Syntax {
            line: line_no,
            message: "value pattern must be parenthesized".to_string(),
        });
    }
    let pattern = &pattern_src[1..pattern_src.len() - 1];
    // Compile early so a bad value pattern fails at template load.
    Regex::new(&format!("({pattern})"))?;

    let tokens: Vec<&str> = head.split_whitespace().collect();
    let (options_token, name) = match tokens.as_slice() {
        [name] => (None, *name),
        [options, name] => (Some(*options), *name),
        _ => {
            return Err(TemplateError::Syntax {
                line: line_no,
                message: format!("malformed value declaration '{head}'"),
            });
        }
    };

    let mut options = ValueOptions::default();
    if let Some(token) = options_token {
        for option in token.split(',') {
            match option {
                "List" => options.list = true,
                "Filldown" => options.filldown = true,
                "Required" => options.required = true,
                other => {
                    return Err(TemplateError::Syntax {
                        line: line_no,
                        message: format!("unknown value option '{other}'"),
                    });
                }
            }
        }
    }

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TemplateError::Syntax {
            line: line_no,
            message: format!("invalid value name '{name}'"),
        });
    }

    Ok(ValueDef {
        name: name.to_string(),
        pattern: pattern.to_string(),
        options,
    })
}

fn parse_rule(line: &str, values: &[ValueDef], line_no: usize) -> Result<Rule, TemplateError> {
    let (pattern_part, action_part) = match line.split_once(" -> ") {
        Some((p, a)) => (p.trim_end(), Some(a.trim())),
        None => (line, None),
    };

    if !pattern_part.starts_with('^') {
        return Err(TemplateError::Syntax {
            line: line_no,
            message: "rule pattern must be anchored with '^'".to_string(),
        });
    }

    // Splice ${name} references as named capture groups.
    let mut pattern = String::with_capacity(pattern_part.len());
    let mut last = 0;
    for caps in VALUE_REF.captures_iter(pattern_part) {
        let whole = caps.get(0).expect("group 0 always present");
        let name = &caps[1];
        let value = values
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| TemplateError::UnknownValue {
                name: name.to_string(),
            })?;
        pattern.push_str(&pattern_part[last..whole.start()]);
        pattern.push_str(&format!("(?P<{}>{})", value.name, value.pattern));
        last = whole.end();
    }
    pattern.push_str(&pattern_part[last..]);
    let regex = Regex::new(&pattern)?;

    let mut rule = Rule {
        regex,
        line: LineAction::Next,
        record: RecordAction::None,
        new_state: None,
        error_message: None,
        source_line: line_no,
    };

    if let Some(action) = action_part {
        let mut tokens = action.split_whitespace();
        let first = tokens.next().ok_or(TemplateError::Syntax {
            line: line_no,
            message: "empty rule action".to_string(),
        })?;

        let mut consumed_first = true;
        if let Some((line_str, record_str)) = first.split_once('.') {
            rule.line = parse_line_action(line_str, line_no)?;
            rule.record = parse_record_action(record_str, line_no)?;
        } else if let Ok(line_action) = try_line_action(first) {
            rule.line = line_action;
        } else if let Ok(record_action) = try_record_action(first) {
            rule.record = record_action;
        } else {
            // Bare state transition.
            rule.new_state = Some(first.to_string());
            consumed_first = false;
        }

        if rule.record == RecordAction::Error {
            let message: Vec<&str> = tokens.collect();
            if !message.is_empty() {
                rule.error_message = Some(message.join(" ").trim_matches('"').to_string());
            }
        } else if consumed_first {
            if let Some(state) = tokens.next() {
                if rule.line == LineAction::Continue {
                    return Err(TemplateError::Syntax {
                        line: line_no,
                        message: "Continue rules cannot change state".to_string(),
                    });
                }
                rule.new_state = Some(state.to_string());
            }
            if tokens.next().is_some() {
                return Err(TemplateError::Syntax {
                    line: line_no,
                    message: "trailing tokens after rule action".to_string(),
                });
            }
        } else if tokens.next().is_some() {
            return Err(TemplateError::Syntax {
                line: line_no,
                message: "trailing tokens after state transition".to_string(),
            });
        }
    }

    Ok(rule)
}

fn try_line_action(token: &str) -> Result<LineAction, ()> {
    match token {
        "Next" => Ok(LineAction::Next),
        "Continue" => Ok(LineAction::Continue),
        _ => Err(()),
    }
}

fn try_record_action(token: &str) -> Result<RecordAction, ()> {
    match token {
        "Record" => Ok(RecordAction::Record),
        "NoRecord" => Ok(RecordAction::NoRecord),
        "Clear" => Ok(RecordAction::Clear),
        "Error" => Ok(RecordAction::Error),
        _ => Err(()),
    }
}

fn parse_line_action(token: &str, line_no: usize) -> Result<LineAction, TemplateError> {
    try_line_action(token).map_err(|_| TemplateError::Syntax {
        line: line_no,
        message: format!("unknown line action '{token}'"),
    })
}

fn parse_record_action(token: &str, line_no: usize) -> Result<RecordAction, TemplateError> {
    try_record_action(token).map_err(|_| TemplateError::Syntax {
        line: line_no,
        message: format!("unknown record action '{token}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values_and_states() {
        let template = Template::parse(
            "Value Required name (\\S+)\nValue List member (\\w+)\n\nStart\n  ^group ${name} -> Record\n  ^\\s+member ${member}\n",
        )
        .unwrap();

        assert_eq!(template.header().collect::<Vec<_>>(), vec!["name", "member"]);
        assert!(template.values[0].options.required);
        assert!(template.values[1].options.list);
        assert_eq!(template.states["Start"].len(), 2);
        assert_eq!(template.states["Start"][0].record, RecordAction::Record);
    }

    #[test]
    fn test_unknown_value_reference_rejected() {
        let err = Template::parse("Value a (\\S+)\n\nStart\n  ^${missing}\n").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownValue { name } if name == "missing"));
    }

    #[test]
    fn test_unknown_state_transition_rejected() {
        let err = Template::parse("Value a (\\S+)\n\nStart\n  ^${a} -> Elsewhere\n").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownState { name } if name == "Elsewhere"));
    }

    #[test]
    fn test_missing_start_state_rejected() {
        let err = Template::parse("Value a (\\S+)\n\nBody\n  ^${a}\n").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn test_continue_with_state_change_rejected() {
        let source = "Value a (\\S+)\n\nStart\n  ^${a} -> Continue Other\nOther\n  ^x\n";
        let err = Template::parse(source).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn test_unanchored_rule_rejected() {
        let err = Template::parse("Value a (\\S+)\n\nStart\n  ${a}\n").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }
}
