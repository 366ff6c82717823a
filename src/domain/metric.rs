use serde::{Deserialize, Serialize};

/// A gauge reading emitted by the collector command.
///
/// Produced by the decoder from one collector run and consumed immediately by
/// the forwarder. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub key: String,
    pub value: f64,
    pub unit: String,
}

impl MetricSample {
    pub fn new(key: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// A monotonic counter increment emitted by the collector command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSample {
    pub name: String,
    pub delta: u64,
}

impl CounterSample {
    pub fn new(name: impl Into<String>, delta: u64) -> Self {
        Self {
            name: name.into(),
            delta,
        }
    }
}

/// One validated record from a collector batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Gauge(MetricSample),
    Counter(CounterSample),
}

impl Metric {
    /// Metric name as seen by the agent.
    pub fn name(&self) -> &str {
        match self {
            Metric::Gauge(sample) => &sample.key,
            Metric::Counter(sample) => &sample.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Gauge(_) => "gauge",
            Metric::Counter(_) => "counter",
        }
    }
}

impl From<MetricSample> for Metric {
    fn from(sample: MetricSample) -> Self {
        Metric::Gauge(sample)
    }
}

impl From<CounterSample> for Metric {
    fn from(sample: CounterSample) -> Self {
        Metric::Counter(sample)
    }
}
