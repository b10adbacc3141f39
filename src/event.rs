//! Events: immutable snapshots submitted to the engine.

use crate::destination::DestinationKey;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// An immutable, submission-time snapshot of a telemetry record.
///
/// Fields are stored in a [`serde_json::Map`], which - without the
/// `preserve_order` feature on `serde_json` - iterates in sorted key order.
/// That gives the wire format's "keys in lexicographic order" rule for free.
#[derive(Clone, Debug)]
pub struct Event<M = ()> {
    pub(crate) fields: Map<String, Value>,
    pub(crate) timestamp: Option<DateTime<Utc>>,
    pub(crate) sample_rate: u32,
    pub(crate) destination: DestinationKey,
    pub(crate) metadata: Option<M>,
}

impl<M> Event<M> {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn destination(&self) -> &DestinationKey {
        &self.destination
    }

    pub fn metadata(&self) -> Option<&M> {
        self.metadata.as_ref()
    }

    pub(crate) fn take_metadata(self) -> Option<M> {
        self.metadata
    }

    /// Stamp the current wall-clock time if the event was built without one.
    pub(crate) fn stamp_if_absent(&mut self) {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
    }
}

/// Builder for an [`Event`].
///
/// Mirrors the teacher's builder pattern (`ProducerBuilder`, `ReadBuilder`):
/// typed setters over a struct, consumed by a terminal `build`/`submit` call.
#[must_use = "builders do nothing unless you call .build()"]
pub struct EventBuilder<M = ()> {
    fields: Map<String, Value>,
    timestamp: Option<DateTime<Utc>>,
    sample_rate: u32,
    api_host: String,
    write_key: String,
    dataset: String,
    metadata: Option<M>,
}

impl<M> EventBuilder<M> {
    pub fn new(api_host: impl Into<String>, write_key: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            fields: Map::new(),
            timestamp: None,
            sample_rate: 1,
            api_host: api_host.into(),
            write_key: write_key.into(),
            dataset: dataset.into(),
            metadata: None,
        }
    }

    /// Add a field. Values that fail to JSON-encode, or that encode to
    /// `null`, are silently skipped - a single bad field must not fail an
    /// entire event or batch.
    pub fn add_field<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::Null) | Err(_) => {}
            Ok(v) => {
                self.fields.insert(key.into(), v);
            }
        }
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate.max(1);
        self
    }

    pub fn metadata(mut self, metadata: M) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validate and build the event.
    pub fn build(self) -> Result<Event<M>, ValidationError> {
        if self.api_host.trim().is_empty() {
            return Err(ValidationError::MissingApiHost);
        }
        if self.write_key.trim().is_empty() {
            return Err(ValidationError::MissingWriteKey);
        }
        if self.dataset.trim().is_empty() {
            return Err(ValidationError::MissingDataset);
        }
        if self.fields.is_empty() {
            return Err(ValidationError::EmptyFields);
        }

        Ok(Event {
            fields: self.fields,
            timestamp: self.timestamp,
            sample_rate: self.sample_rate,
            destination: DestinationKey::new(self.api_host, self.write_key, self.dataset),
            metadata: self.metadata,
        })
    }
}
