//! Line-by-line matching engine.

use std::collections::{HashMap, HashSet};

use regex::Captures;

use super::definition::{LineAction, RecordAction, Rule, Template, ValueDef};
use super::{Record, TemplateValue};
use crate::error::TemplateError;

impl Template {
    /// Match raw text against the template, producing records in match order.
    ///
    /// Unmatched values render as empty strings (or empty lists). Zero records
    /// is not an error at this layer; the caller decides whether the text was
    /// expected to contain data. Matching identical text twice yields
    /// field-identical records.
    pub fn parse_text(&self, text: &str) -> Result<Vec<Record>, TemplateError> {
        let mut out = Vec::new();
        let mut row = Row::new(&self.values);
        let mut state = "Start";

        'lines: for line in text.lines() {
            let rules = self.states.get(state).expect("states validated at parse");
            let mut idx = 0;
            while idx < rules.len() {
                let rule: &Rule = &rules[idx];
                let Some(caps) = rule.regex.captures(line) else {
                    idx += 1;
                    continue;
                };
                row.assign(&caps);

                match rule.record {
                    RecordAction::None | RecordAction::NoRecord => {}
                    RecordAction::Record => row.emit_into(&mut out),
                    RecordAction::Clear => row.clear(),
                    RecordAction::Error => {
                        return Err(TemplateError::Halted {
                            line: rule.source_line,
                            message: rule
                                .error_message
                                .clone()
                                .unwrap_or_else(|| line.to_string()),
                        });
                    }
                }

                if let Some(target) = rule.new_state.as_deref() {
                    match target {
                        // Explicit EOF transition records pending data and stops.
                        "EOF" => {
                            row.emit_into(&mut out);
                            return Ok(out);
                        }
                        // End stops without the implicit EOF record.
                        "End" => return Ok(out),
                        _ => {
                            state = self
                                .states
                                .get_key_value(target)
                                .expect("states validated at parse")
                                .0;
                        }
                    }
                    continue 'lines;
                }

                match rule.line {
                    LineAction::Next => continue 'lines,
                    LineAction::Continue => idx += 1,
                }
            }
            // No rule consumed the line: ignored.
        }

        // Implicit EOF record, unless the template declares its own EOF state.
        if !self.states.contains_key("EOF") {
            row.emit_into(&mut out);
        }
        Ok(out)
    }
}

/// Pending record being accumulated.
struct Row<'t> {
    values: &'t [ValueDef],
    scalars: HashMap<&'t str, String>,
    lists: HashMap<&'t str, Vec<String>>,
    assigned: HashSet<&'t str>,

    /// Whether any value was assigned since the last record boundary.
    dirty: bool,
}

impl<'t> Row<'t> {
    fn new(values: &'t [ValueDef]) -> Self {
        Self {
            values,
            scalars: HashMap::new(),
            lists: HashMap::new(),
            assigned: HashSet::new(),
            dirty: false,
        }
    }

    fn assign(&mut self, caps: &Captures<'_>) {
        for value in self.values {
            let Some(m) = caps.name(&value.name) else {
                continue;
            };
            if value.options.list {
                self.lists
                    .entry(value.name.as_str())
                    .or_default()
                    .push(m.as_str().to_string());
            } else {
                self.scalars
                    .insert(value.name.as_str(), m.as_str().to_string());
            }
            self.assigned.insert(value.name.as_str());
            self.dirty = true;
        }
    }

    fn emit_into(&mut self, out: &mut Vec<Record>) {
        if !self.dirty {
            return;
        }
        let required_ok = self
            .values
            .iter()
            .filter(|v| v.options.required)
            .all(|v| self.assigned.contains(v.name.as_str()));
        if required_ok {
            let mut record = Record::new();
            for value in self.values {
                let field = if value.options.list {
                    TemplateValue::List(self.lists.get(value.name.as_str()).cloned().unwrap_or_default())
                } else {
                    TemplateValue::Scalar(
                        self.scalars.get(value.name.as_str()).cloned().unwrap_or_default(),
                    )
                };
                record.insert(value.name.clone(), field);
            }
            out.push(record);
        }
        self.reset();
    }

    /// Drop all non-filldown values without emitting.
    fn clear(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        for value in self.values {
            if value.options.filldown {
                continue;
            }
            self.scalars.remove(value.name.as_str());
            self.lists.remove(value.name.as_str());
            self.assigned.remove(value.name.as_str());
        }
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOURCE_TEXT: &str = "\
    uptime: 8h42m20s
    version: 6.46.5 (stable)
    build-time: Apr/07/2020 08:28:27
    free-memory: 207.7MiB
    total-memory: 256.0MiB
    cpu-load: 4%
    architecture-name: mmips
    board-name: RBM33G
";

    fn resource_template() -> Template {
        Template::parse(
            "Value uptime (\\S+)\n\
             Value version (\\d+\\.\\d+\\.\\d+)\n\
             Value freememory ([\\d.]+)\n\
             Value totalmemory ([\\d.]+)\n\
             Value arch (\\S+)\n\
             Value boardname (.+)\n\
             \n\
             Start\n\
             \x20 ^\\s*uptime:\\s+${uptime}\n\
             \x20 ^\\s*version:\\s+${version}\n\
             \x20 ^\\s*free-memory:\\s+${freememory}MiB\n\
             \x20 ^\\s*total-memory:\\s+${totalmemory}MiB\n\
             \x20 ^\\s*architecture-name:\\s+${arch}\n\
             \x20 ^\\s*board-name:\\s+${boardname}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_single_record_at_eof() {
        let records = resource_template().parse_text(RESOURCE_TEXT).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["version"].as_str(), "6.46.5");
        assert_eq!(record["freememory"].as_str(), "207.7");
        assert_eq!(record["arch"].as_str(), "mmips");
        assert_eq!(record["boardname"].as_str(), "RBM33G");
    }

    #[test]
    fn test_unmatched_values_are_empty_strings() {
        let records = resource_template()
            .parse_text("    version: 6.47.7 (stable)\n")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["version"].as_str(), "6.47.7");
        assert_eq!(records[0]["uptime"].as_str(), "");
        assert_eq!(records[0]["boardname"].as_str(), "");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let template = resource_template();
        let first = template.parse_text(RESOURCE_TEXT).unwrap();
        let second = template.parse_text(RESOURCE_TEXT).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_records_for_unexpected_text() {
        let records = resource_template().parse_text("no matching lines here\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_record_marker_splits_rows() {
        let template = Template::parse(
            "Value Required name (\\S+)\nValue version (\\S+)\n\nStart\n  ^\\s*\\d+\\s+name=${name} version=${version} -> Record\n",
        )
        .unwrap();
        let records = template
            .parse_text(" 0   name=system version=6.46.5\n 1   name=dhcp version=6.46.5\n")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"].as_str(), "system");
        assert_eq!(records[1]["name"].as_str(), "dhcp");
    }

    #[test]
    fn test_continue_record_boundary_with_required() {
        // Record-on-next-header idiom: the first header must not emit an
        // empty record, and the trailing entry is recorded at EOF.
        let template = Template::parse(
            "Value Required username (\\S+)\nValue class (\\S+)\n\nStart\n  ^user \\S+ \\{ -> Continue.Record\n  ^user ${username} \\{\n  ^\\s+class ${class};\n",
        )
        .unwrap();
        let text = "user alice {\n    class super-user;\nuser bob {\n    class read-only;\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["username"].as_str(), "alice");
        assert_eq!(records[0]["class"].as_str(), "super-user");
        assert_eq!(records[1]["username"].as_str(), "bob");
        assert_eq!(records[1]["class"].as_str(), "read-only");
    }

    #[test]
    fn test_list_values_accumulate() {
        let template = Template::parse(
            "Value Required group (\\S+)\nValue List members (\\S+)\n\nStart\n  ^group ${group} -> Continue.Record\n  ^group ${group}\n  ^\\s+member ${members}\n",
        )
        .unwrap();
        let text = "group ops\n  member alice\n  member bob\ngroup dev\n  member carol\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0]["members"],
            TemplateValue::List(vec!["alice".to_string(), "bob".to_string()])
        );
        assert_eq!(
            records[1]["members"],
            TemplateValue::List(vec!["carol".to_string()])
        );
    }

    #[test]
    fn test_filldown_persists_across_records() {
        let template = Template::parse(
            "Value Filldown chassis (\\S+)\nValue Required port (\\S+)\n\nStart\n  ^chassis ${chassis}\n  ^\\s+port ${port} -> Record\n",
        )
        .unwrap();
        let text = "chassis c1\n  port eth0\n  port eth1\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["chassis"].as_str(), "c1");
        assert_eq!(records[1]["chassis"].as_str(), "c1");
    }

    #[test]
    fn test_state_transition() {
        let template = Template::parse(
            "Value Required item (\\S+)\n\nStart\n  ^BEGIN -> Body\nBody\n  ^item ${item} -> Record\n  ^END -> End\n",
        )
        .unwrap();
        let text = "item skipped\nBEGIN\nitem a\nitem b\nEND\nitem c\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["item"].as_str(), "a");
        assert_eq!(records[1]["item"].as_str(), "b");
    }

    #[test]
    fn test_error_action_halts() {
        let template = Template::parse(
            "Value item (\\S+)\n\nStart\n  ^bad input -> Error \"unparseable\"\n  ^item ${item}\n",
        )
        .unwrap();
        let err = template.parse_text("bad input\n").unwrap_err();
        assert!(matches!(err, TemplateError::Halted { .. }));
    }
}
