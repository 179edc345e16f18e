// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoded event records.
//!
//! Only the `action` discriminant is typed. Everything else is kept as raw JSON so that
//! re-encoding a redacted record loses nothing but the cleared field.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DropReason;
use crate::redact;

/// Kind of an event record, selecting its action-specific sub-structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Icmp,
    HttpRequest,
    HttpResponse,
    SipRequest,
    SipResponse,
    SmtpData,
    UnrecognisedStream,
    UnrecognisedDatagram,
    /// Any action this crate has no rule for, kept verbatim.
    Other(String),
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Action::Icmp => "icmp",
            Action::HttpRequest => "http_request",
            Action::HttpResponse => "http_response",
            Action::SipRequest => "sip_request",
            Action::SipResponse => "sip_response",
            Action::SmtpData => "smtp_data",
            Action::UnrecognisedStream => "unrecognised_stream",
            Action::UnrecognisedDatagram => "unrecognised_datagram",
            Action::Other(name) => name,
        }
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        match value {
            "icmp" => Action::Icmp,
            "http_request" => Action::HttpRequest,
            "http_response" => Action::HttpResponse,
            "sip_request" => Action::SipRequest,
            "sip_response" => Action::SipResponse,
            "smtp_data" => Action::SmtpData,
            "unrecognised_stream" => Action::UnrecognisedStream,
            "unrecognised_datagram" => Action::UnrecognisedDatagram,
            other => Action::Other(other.to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match Action::from(value.as_str()) {
            Action::Other(_) => Action::Other(value),
            known => known,
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event record.
///
/// The action-specific sub-structure lives under the key named after the action, e.g.
/// `{"action":"icmp","icmp":{"payload":"..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub action: Action,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Decodes one record and checks the fields its redaction rule touches.
    pub fn decode(raw: &[u8]) -> Result<Event, DropReason> {
        let event: Event = serde_json::from_slice(raw).map_err(DropReason::Decode)?;
        if let Some(rule) = redact::rule_for(&event.action) {
            rule.check(&event)?;
        }
        Ok(event)
    }

    pub fn encode(&self) -> Result<Vec<u8>, DropReason> {
        serde_json::to_vec(self).map_err(DropReason::Encode)
    }

    /// The action-specific sub-structure, if present and an object.
    #[must_use]
    pub fn section(&self) -> Option<&Map<String, Value>> {
        self.fields.get(self.action.as_str()).and_then(Value::as_object)
    }

    pub fn section_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.fields
            .get_mut(self.action.as_str())
            .and_then(Value::as_object_mut)
    }

    /// Like [`Event::section_mut`], creating an empty sub-structure when it is missing
    /// or null. Returns `None` only when the key holds a non-object value.
    pub fn section_or_default(&mut self) -> Option<&mut Map<String, Value>> {
        let slot = self
            .fields
            .entry(self.action.as_str())
            .or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut()
    }
}
