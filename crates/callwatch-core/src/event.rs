use std::collections::BTreeMap;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One raw event from the switch: a flat map of string fields.
///
/// The AMI wire format and the JSON replay files both deliver events as
/// key/value pairs with string values; numeric fields are converted at
/// the access site. A `BTreeMap` keeps iteration (and thus all derived
/// log output) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmiEvent {
    fields: BTreeMap<String, String>,
}

impl AmiEvent {
    pub fn new() -> Self {
        Self { fields: BTreeMap::new() }
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut event = Self::new();
        for (key, value) in pairs {
            event.set(key, value);
        }
        event
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_string(), value.to_string());
    }

    /// The `Event` field, or empty for malformed input
    pub fn name(&self) -> &str {
        self.get("Event").unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.as_str())
    }

    /// Checked access for fields the handler cannot do without
    pub fn field(&self, key: &'static str) -> Result<&str, EngineError> {
        self.get(key).ok_or_else(|| EngineError::MissingField {
            event: self.name().to_string(),
            field: key,
        })
    }

    pub fn u32_field(&self, key: &'static str) -> Result<u32, EngineError> {
        let raw = self.field(key)?;
        raw.parse().map_err(|_| EngineError::InvalidValue {
            field: key,
            value: raw.to_string(),
        })
    }

    /// Like `u32_field`, but an absent or empty field reads as zero.
    /// The switch leaves `AccountCode` empty for channels without one.
    pub fn u32_field_or_zero(&self, key: &'static str) -> Result<u32, EngineError> {
        match self.get(key) {
            None | Some("") => Ok(0),
            Some(raw) => raw.parse().map_err(|_| EngineError::InvalidValue {
                field: key,
                value: raw.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for AmiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name())?;
        for (key, value) in &self.fields {
            if key != "Event" {
                write!(f, " {}={:?}", key, value)?;
            }
        }
        write!(f, ">")
    }
}
