// Canonical metric model
// This file defines the normalized metric value handed to downstream handlers
// and the helpers used to stamp dimensions before emission
//
// Numan Thabit 2025 Nov

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of measurement a metric carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricType {
    #[serde(rename = "GAUGE")]
    Gauge,
    #[serde(rename = "COUNTER")]
    Counter,
    #[serde(rename = "CUMCOUNTER")]
    CumulativeCounter,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "GAUGE",
            MetricType::Counter => "COUNTER",
            MetricType::CumulativeCounter => "CUMCOUNTER",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Dimensions = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub dimensions: Dimensions,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            value,
            metric_type,
            dimensions: Dimensions::new(),
        }
    }

    /// Set a dimension, replacing any previous value for the key.
    pub fn add_dimension(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.dimensions.insert(key.into(), value.into());
    }

    pub fn add_dimensions<'a, I>(&mut self, dims: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (k, v) in dims {
            self.dimensions.insert(k.clone(), v.clone());
        }
    }

    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions.get(key).map(String::as_str)
    }
}

/// Stamp the same dimensions onto every metric of a batch.
pub fn add_to_all(metrics: &mut [Metric], dims: &Dimensions) {
    for m in metrics.iter_mut() {
        m.add_dimensions(dims);
    }
}
