// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload redaction rules.
//!
//! Each rule names the action it applies to and the payload-bearing field inside that
//! action's sub-structure. Rules for the two "unrecognised" kinds additionally record
//! the payload length before it is cleared, whether or not redaction is enabled.

use serde_json::Value;

use crate::config::Config;
use crate::errors::DropReason;
use crate::event::{Action, Event};

/// Field written next to the payload of unrecognised streams and datagrams.
pub const PAYLOAD_LENGTH_FIELD: &str = "payload_b64_length";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionRule {
    pub action: Action,
    /// Payload-bearing field inside the action's sub-structure.
    pub field: &'static str,
    /// Record the original payload length into [`PAYLOAD_LENGTH_FIELD`].
    pub records_length: bool,
}

pub static REDACTION_RULES: [RedactionRule; 8] = [
    RedactionRule {
        action: Action::Icmp,
        field: "payload",
        records_length: false,
    },
    RedactionRule {
        action: Action::HttpRequest,
        field: "body",
        records_length: false,
    },
    RedactionRule {
        action: Action::HttpResponse,
        field: "body",
        records_length: false,
    },
    RedactionRule {
        action: Action::SipRequest,
        field: "payload",
        records_length: false,
    },
    RedactionRule {
        action: Action::SipResponse,
        field: "payload",
        records_length: false,
    },
    RedactionRule {
        action: Action::SmtpData,
        field: "data",
        records_length: false,
    },
    RedactionRule {
        action: Action::UnrecognisedStream,
        field: "payload",
        records_length: true,
    },
    RedactionRule {
        action: Action::UnrecognisedDatagram,
        field: "payload",
        records_length: true,
    },
];

#[must_use]
pub fn rule_for(action: &Action) -> Option<&'static RedactionRule> {
    REDACTION_RULES.iter().find(|rule| rule.action == *action)
}

/// Applies the rule for `event`'s action. Returns whether the event was modified.
///
/// Unknown actions are passed through untouched.
pub fn redact(event: &mut Event, config: &Config) -> bool {
    match rule_for(&event.action) {
        Some(rule) => rule.apply(event, config.redaction_enabled),
        None => false,
    }
}

impl RedactionRule {
    /// Checks that the fields this rule touches have a type it can handle.
    pub fn check(&self, event: &Event) -> Result<(), DropReason> {
        let section_key = self.action.as_str();
        let section = match event.fields.get(section_key) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Object(section)) => section,
            Some(_) => {
                return Err(DropReason::Schema {
                    field: section_key.to_string(),
                    reason: "expected an object",
                })
            }
        };
        match section.get(self.field) {
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
            Some(_) => Err(DropReason::Schema {
                field: format!("{section_key}.{}", self.field),
                reason: "expected a string",
            }),
        }
    }

    fn apply(&self, event: &mut Event, strip: bool) -> bool {
        if self.records_length {
            // a non-object section fails `check`, so nothing is written here
            let Some(section) = event.section_or_default() else {
                return false;
            };
            let length = section
                .get(self.field)
                .and_then(Value::as_str)
                .map_or(0, str::len);
            section.insert(PAYLOAD_LENGTH_FIELD.to_string(), Value::from(length));
            if strip {
                if let Some(Value::String(payload)) = section.get_mut(self.field) {
                    payload.clear();
                }
            }
            // the length write alone counts as a change
            return true;
        }

        if !strip {
            return false;
        }
        match event
            .section_mut()
            .and_then(|section| section.get_mut(self.field))
        {
            Some(Value::String(payload)) if !payload.is_empty() => {
                payload.clear();
                true
            }
            _ => false,
        }
    }
}
