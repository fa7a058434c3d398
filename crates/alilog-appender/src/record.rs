// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The normalized, shippable form of one log line.

use serde::ser::{Serialize, SerializeMap, Serializer};

pub const TIME_FIELD: &str = "time";
pub const LEVEL_FIELD: &str = "level";
pub const THREAD_FIELD: &str = "thread";
pub const LOCATION_FIELD: &str = "location";
pub const MESSAGE_FIELD: &str = "message";

/// Key the record timestamp is serialized under.
pub(crate) const WIRE_TIME_KEY: &str = "__time__";

/// Size charged for the timestamp when accounting record bytes.
const TIMESTAMP_SIZE_BYTES: usize = 4;

/// One log line ready for shipment.
///
/// Fields keep their insertion order, which is also the order they are
/// written on the wire. Records built by the translator always carry
/// `time, level, thread, location, message` in that order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    timestamp_seconds: i64,
    fields: Vec<(String, String)>,
}

impl LogRecord {
    #[must_use]
    pub fn new(timestamp_seconds: i64, fields: Vec<(String, String)>) -> Self {
        Self {
            timestamp_seconds,
            fields,
        }
    }

    #[must_use]
    pub fn timestamp_seconds(&self) -> i64 {
        self.timestamp_seconds
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Value of the first field with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Bytes this record is charged against batch and memory limits.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.fields
            .iter()
            .fold(TIMESTAMP_SIZE_BYTES, |acc, (key, value)| {
                acc + key.len() + value.len()
            })
    }
}

/// Serializes as a flat object: `{"__time__": secs, "time": ..., "level": ..., ...}`.
impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(WIRE_TIME_KEY, &self.timestamp_seconds)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
