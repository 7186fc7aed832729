//! Event model
//!
//! An event is an open-ended set of string headers chosen by the peer. The
//! accessors below are computed views over well-known headers; a missing
//! header yields an empty default rather than an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

use crate::error::ProtocolError;

const EVENT_NAME_KEY: &str = "Event-Name";
const EVENT_SUBCLASS_KEY: &str = "Event-Subclass";
const EVENT_SEQUENCE_KEY: &str = "Event-Sequence";
const EVENT_TIMESTAMP_KEY: &str = "Event-Date-Timestamp";
const JOB_UUID_KEY: &str = "Job-UUID";
const VARIABLE_PREFIX: &str = "variable_";

/// Reserved header holding the raw event body
pub const BODY_KEY: &str = "_body";

/// `Event-Name` of events carrying an `Event-Subclass`
pub const CUSTOM_EVENT_NAME: &str = "CUSTOM";

/// Event received from the peer
///
/// Cloning is cheap; the headers are shared between clones so one decoded
/// event can be handed to many subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    headers: Arc<HashMap<String, String>>,
}

impl Event {
    /// Decode a `text/event-plain` body
    ///
    /// The body must be a flat JSON object whose members are all strings.
    pub fn from_json(body: &[u8]) -> Result<Self, ProtocolError> {
        let headers: HashMap<String, String> = serde_json::from_slice(body)?;
        Ok(Self {
            headers: Arc::new(headers),
        })
    }

    /// Header value, or an empty string when absent
    pub fn get(&self, key: &str) -> &str {
        self.headers.get(key).map(String::as_str).unwrap_or_default()
    }

    /// All headers, in no particular order
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers, including the body key when present
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the event has no headers at all
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Resolved event name: the subclass of a custom event, else `Event-Name`
    pub fn name(&self) -> &str {
        match self.get(EVENT_SUBCLASS_KEY) {
            "" => self.get(EVENT_NAME_KEY),
            subclass => subclass,
        }
    }

    /// Raw event body
    pub fn body(&self) -> &str {
        self.get(BODY_KEY)
    }

    /// Length of the raw event body in bytes
    pub fn content_length(&self) -> usize {
        self.body().len()
    }

    /// Sequence number assigned by the peer, 0 when absent
    pub fn sequence(&self) -> i64 {
        self.get(EVENT_SEQUENCE_KEY).parse().unwrap_or_default()
    }

    /// Time the peer generated the event
    pub fn timestamp(&self) -> Option<SystemTime> {
        let micros: u64 = self.get(EVENT_TIMESTAMP_KEY).parse().ok()?;
        UNIX_EPOCH.checked_add(Duration::from_micros(micros))
    }

    /// Channel variable, looked up as `variable_<name>`
    pub fn variable(&self, name: &str) -> &str {
        self.headers
            .get(&format!("{VARIABLE_PREFIX}{name}"))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Whether `Event-Name` is `CUSTOM`
    pub fn is_custom(&self) -> bool {
        self.get(EVENT_NAME_KEY) == CUSTOM_EVENT_NAME
    }

    /// Job correlation id of a background job event
    pub fn job_uuid(&self) -> Option<&str> {
        self.headers.get(JOB_UUID_KEY).map(String::as_str)
    }

    /// Emit a trace record describing this event
    pub fn log_dispatched(&self) {
        tracing::trace!(
            name = self.name(),
            sequence = self.sequence(),
            job_uuid = self.job_uuid(),
            "event"
        );
    }
}

impl<K, V> FromIterator<(K, V)> for Event
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let headers = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            headers: Arc::new(headers),
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.headers.as_ref().serialize(serializer)
    }
}
