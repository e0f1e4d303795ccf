//! Change event envelope
//!
//! Catalog services post a [`ChangeEvent`] whenever they mutate data the
//! recommendation graph is derived from. The recommendation service only
//! validates the envelope; `data` stays opaque and any event type causes a
//! full resync.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum length of an event type tag
pub const EVENT_TYPE_MIN_LEN: usize = 3;
/// Maximum length of an event type tag
pub const EVENT_TYPE_MAX_LEN: usize = 100;
/// Maximum length of the origin tag
pub const EVENT_SOURCE_MAX_LEN: usize = 100;

/// Inbound "something changed" notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Event type tag, e.g. `song.created`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Emitting service, e.g. `content-service`
    #[serde(default)]
    pub source: String,

    /// When the emitting service produced the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Opaque payload, never inspected here
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ChangeEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Some(Utc::now()),
            data: Value::Null,
        }
    }

    /// Validate the envelope (type and source tags only)
    pub fn validate(&self) -> Result<()> {
        let type_len = self.event_type.trim().chars().count();
        if !(EVENT_TYPE_MIN_LEN..=EVENT_TYPE_MAX_LEN).contains(&type_len) {
            return Err(Error::InvalidInput(format!(
                "event type must be {}-{} characters",
                EVENT_TYPE_MIN_LEN, EVENT_TYPE_MAX_LEN
            )));
        }
        if self.source.chars().count() > EVENT_SOURCE_MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "event source must be at most {} characters",
                EVENT_SOURCE_MAX_LEN
            )));
        }
        Ok(())
    }
}
