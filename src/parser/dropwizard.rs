// Schema-less metric flattener
// This file walks arbitrarily nested Dropwizard-style JSON and emits metrics
// for every node it can interpret, naming each by its dot-joined path
//
// Numan Thabit 2025 Nov

use crate::errors::CollectorError;
use crate::metric::{Metric, MetricType};
use crate::parser::value::{as_metric_value, str_field};
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// A map still waiting to be visited, with the keys leading to it.
struct PendingNode<'a> {
    path: Vec<&'a str>,
    map: &'a Map<String, Value>,
}

impl<'a> PendingNode<'a> {
    fn child(&self, key: &'a str, map: &'a Map<String, Value>) -> Self {
        let mut path = self.path.clone();
        path.push(key);
        Self { path, map }
    }

    fn name(&self) -> String {
        self.path.join(".")
    }
}

/// Parse a raw body and flatten it. The body must be a JSON object.
pub fn parse_dropwizard(raw: &[u8]) -> Result<Vec<Metric>, CollectorError> {
    let parsed: Map<String, Value> = serde_json::from_slice(raw)?;
    Ok(flatten(&parsed))
}

/// Breadth-first walk over nested maps.
///
/// A node whose children are all maps is purely structural. A node with any
/// terminal child is interpreted as a whole: first as a typed Dropwizard
/// metric (`type` field) or a rate (`unit` field); failing that, each terminal
/// child becomes its own gauge and nested children keep being walked.
pub fn flatten(root: &Map<String, Value>) -> Vec<Metric> {
    let mut results = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(PendingNode {
        path: Vec::new(),
        map: root,
    });

    while let Some(node) = queue.pop_front() {
        let has_terminal = node.map.values().any(|v| !v.is_object());
        if has_terminal {
            let extracted = extract_node(node.map, &node.name());
            if !extracted.is_empty() {
                results.extend(extracted);
                continue;
            }
        }

        for (key, value) in node.map {
            match value {
                Value::Object(child) => queue.push_back(node.child(key, child)),
                leaf => {
                    if let Some(m) = leaf_gauge(&node, key, leaf) {
                        results.push(m);
                    }
                }
            }
        }
    }

    results
}

fn extract_node(map: &Map<String, Value>, name: &str) -> Vec<Metric> {
    match str_field(map, "type") {
        Some("gauge") => collect_gauge(map, name),
        Some("counter") => collect_counter(map, name),
        Some("histogram") => collect_histogram(map, name),
        Some("meter") => collect_meter(map, name),
        _ => collect_rate(map, name),
    }
}

/// Emit a metric per numeric key, with the key as the `rollup` dimension.
fn rollup_metrics<F>(map: &Map<String, Value>, name: &str, skip: &[&str], type_of: F) -> Vec<Metric>
where
    F: Fn(&str) -> MetricType,
{
    map.iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let value = as_metric_value(value)?;
            let mut m = Metric::new(name, value, type_of(key));
            m.add_dimension("rollup", key.as_str());
            Some(m)
        })
        .collect()
}

fn count_is_counter(key: &str) -> MetricType {
    if key == "count" {
        MetricType::Counter
    } else {
        MetricType::Gauge
    }
}

//    "percent-idle": { "value": 0.985, "type": "gauge" }
fn collect_gauge(map: &Map<String, Value>, name: &str) -> Vec<Metric> {
    if !map.contains_key("value") {
        return Vec::new();
    }
    rollup_metrics(map, name, &[], |_| MetricType::Gauge)
}

//    "active-suspended-requests": { "count": 0, "type": "counter" }
fn collect_counter(map: &Map<String, Value>, name: &str) -> Vec<Metric> {
    if !map.contains_key("count") {
        return Vec::new();
    }
    rollup_metrics(map, name, &[], |_| MetricType::Counter)
}

//    "prefix-length": { "type": "histogram", "count": 1, "min": 2, "p98": 2, ... }
fn collect_histogram(map: &Map<String, Value>, name: &str) -> Vec<Metric> {
    if !map.contains_key("count") {
        return Vec::new();
    }
    rollup_metrics(map, name, &["type"], count_is_counter)
}

//    "suspends": { "m1": 0, "count": 0, "unit": "seconds", "event_type": "requests", "type": "meter" }
fn collect_meter(map: &Map<String, Value>, name: &str) -> Vec<Metric> {
    let has_unit = matches!(
        str_field(map, "unit"),
        Some("seconds" | "milliseconds" | "minutes")
    );
    if !has_unit || !map.contains_key("event_type") {
        return Vec::new();
    }
    rollup_metrics(map, name, &["unit", "event_type", "type"], count_is_counter)
}

//    "rate": { "m15": 0, "m1": 0, "mean": 0, "count": 0, "unit": "seconds" }
fn collect_rate(map: &Map<String, Value>, name: &str) -> Vec<Metric> {
    if !matches!(str_field(map, "unit"), Some("seconds" | "milliseconds")) {
        return Vec::new();
    }
    rollup_metrics(map, name, &["unit", "event_type", "type"], count_is_counter)
}

fn leaf_gauge(node: &PendingNode<'_>, key: &str, value: &Value) -> Option<Metric> {
    let value = as_metric_value(value)?;
    let mut path = node.path.clone();
    path.push(key);
    let mut m = Metric::new(path.join("."), value, MetricType::Gauge);
    m.add_dimension("rollup", "value");
    Some(m)
}
