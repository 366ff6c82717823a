//! Dropsonde `events.Envelope` messages as understood by the metrics agent.
//!
//! Only the fields this daemon emits are modelled. Tag numbers match the
//! upstream proto2 definitions.

use crate::domain::Metric;
use chrono::Utc;
use std::collections::HashMap;

/// Tag key carrying the source id on every envelope.
pub const SOURCE_ID_TAG: &str = "source_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    ValueMetric = 6,
    CounterEvent = 7,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(string, required, tag = "1")]
    pub origin: String,
    #[prost(enumeration = "EventType", required, tag = "2")]
    pub event_type: i32,
    /// Nanoseconds since the unix epoch.
    #[prost(int64, optional, tag = "6")]
    pub timestamp: Option<i64>,
    #[prost(message, optional, tag = "9")]
    pub value_metric: Option<ValueMetric>,
    #[prost(message, optional, tag = "10")]
    pub counter_event: Option<CounterEvent>,
    #[prost(map = "string, string", tag = "17")]
    pub tags: HashMap<String, String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ValueMetric {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(double, required, tag = "2")]
    pub value: f64,
    #[prost(string, required, tag = "3")]
    pub unit: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CounterEvent {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(uint64, required, tag = "2")]
    pub delta: u64,
    #[prost(uint64, optional, tag = "3")]
    pub total: Option<u64>,
}

impl Envelope {
    pub fn from_metric(metric: &Metric, origin: &str, source_id: &str, timestamp_ns: i64) -> Self {
        let mut envelope = Envelope {
            origin: origin.to_string(),
            timestamp: Some(timestamp_ns),
            tags: HashMap::from([(SOURCE_ID_TAG.to_string(), source_id.to_string())]),
            ..Default::default()
        };

        match metric {
            Metric::Gauge(sample) => {
                envelope.set_event_type(EventType::ValueMetric);
                envelope.value_metric = Some(ValueMetric {
                    name: sample.key.clone(),
                    value: sample.value,
                    unit: sample.unit.clone(),
                });
            }
            Metric::Counter(sample) => {
                envelope.set_event_type(EventType::CounterEvent);
                envelope.counter_event = Some(CounterEvent {
                    name: sample.name.clone(),
                    delta: sample.delta,
                    total: None,
                });
            }
        }

        envelope
    }

    /// Builds an envelope stamped with the current wall-clock time.
    pub fn now(metric: &Metric, origin: &str, source_id: &str) -> Self {
        let timestamp_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::from_metric(metric, origin, source_id, timestamp_ns)
    }

    pub fn source_id(&self) -> Option<&str> {
        self.tags.get(SOURCE_ID_TAG).map(String::as_str)
    }
}
