// Fixed-schema parsers
// This file converts the five-category metrics documents emitted by uWSGI and
// Dropwizard-typed Java services into canonical metrics
//
// The documents look like:
//
//     {
//         "gauges": {},
//         "counters": { "myname": { "count": 12 } },
//         "meters": {
//             "pyramid_uwsgi_metrics.tweens.4xx-response": {
//                 "count": 366116,
//                 "mean_rate": 0.2333071157843687,
//                 "m15_rate": 0.22693345170298124,
//                 "units": "events/second"
//             }
//         },
//         "histograms": {},
//         "timers": {}
//     }
//
// Numan Thabit 2025 Nov

use crate::errors::CollectorError;
use crate::metric::{add_to_all, Dimensions, Metric, MetricType};
use crate::parser::value::{as_dimension_value, as_metric_value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Rate rollups (`m1_rate`, `m15_rate`, ...) are dropped in cumulative mode.
static RATE_ROLLUP: Lazy<Regex> =
    Lazy::new(|| Regex::new("m[0-9]+_rate").expect("rate rollup pattern compiles"));

type Section = BTreeMap<String, Map<String, Value>>;

#[derive(Debug, Default, Deserialize)]
pub struct UwsgiDocument {
    #[serde(default, deserialize_with = "nullable")]
    pub service_dims: Map<String, Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub gauges: Section,
    #[serde(default, deserialize_with = "nullable")]
    pub counters: Section,
    #[serde(default, deserialize_with = "nullable")]
    pub histograms: Section,
    #[serde(default, deserialize_with = "nullable")]
    pub meters: Section,
    #[serde(default, deserialize_with = "nullable")]
    pub timers: Section,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Gauge,
    Counter,
    Histogram,
    Meter,
    Timer,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Gauge,
        Category::Counter,
        Category::Histogram,
        Category::Meter,
        Category::Timer,
    ];

    /// Value of the `type` dimension for metrics from this category.
    pub fn label(self) -> &'static str {
        match self {
            Category::Gauge => "gauge",
            Category::Counter => "counter",
            Category::Histogram => "histogram",
            Category::Meter => "meter",
            Category::Timer => "timer",
        }
    }

    pub fn metric_type(self) -> MetricType {
        match self {
            Category::Counter => MetricType::Counter,
            Category::Gauge | Category::Histogram | Category::Meter | Category::Timer => {
                MetricType::Gauge
            }
        }
    }
}

impl UwsgiDocument {
    pub fn from_slice(raw: &[u8]) -> Result<Self, CollectorError> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn section(&self, category: Category) -> &Section {
        match category {
            Category::Gauge => &self.gauges,
            Category::Counter => &self.counters,
            Category::Histogram => &self.histograms,
            Category::Meter => &self.meters,
            Category::Timer => &self.timers,
        }
    }

    /// Expand every entry of every category, naming metrics by the entry key.
    pub fn metrics(&self, cumulative: bool) -> Vec<Metric> {
        let mut results = Vec::new();
        for category in Category::ALL {
            for (name, rollups) in self.section(category) {
                results.extend(expand_entry(name, rollups, category, cumulative));
            }
        }
        results
    }

    /// Dimensions the service asks to have applied to all of its metrics.
    pub fn service_dimensions(&self) -> Dimensions {
        self.service_dims
            .iter()
            .filter_map(|(k, v)| as_dimension_value(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

/// Turn one `name -> {rollup: value}` entry into metrics.
///
/// Default mode keeps the entry name and records the rollup and category as
/// `rollup`/`type` dimensions. Cumulative mode drops rate rollups, folds the
/// rollup into the name (except `value`) and reports `count` as a cumulative
/// counter.
pub fn expand_entry(
    name: &str,
    rollups: &Map<String, Value>,
    category: Category,
    cumulative: bool,
) -> Vec<Metric> {
    let mut results = Vec::with_capacity(rollups.len());

    for (rollup, value) in rollups {
        if cumulative && RATE_ROLLUP.is_match(rollup) {
            continue;
        }
        let Some(value) = as_metric_value(value) else {
            continue;
        };

        let mut metric_type = category.metric_type();
        let metric_name = if cumulative && rollup != "value" {
            if rollup == "count" {
                metric_type = MetricType::CumulativeCounter;
            }
            format!("{name}.{rollup}")
        } else {
            name.to_string()
        };

        let mut metric = Metric::new(metric_name, value, metric_type);
        if !cumulative {
            metric.add_dimension("rollup", rollup.as_str());
            metric.add_dimension("type", category.label());
        }
        results.push(metric);
    }

    results
}

/// Split a Java metric key `base,k1=v1,k2=v2` into its base name and dimensions.
pub fn split_java_key(key: &str) -> Result<(&str, Dimensions), CollectorError> {
    let mut segments = key.split(',');
    let base = segments.next().unwrap_or_default();

    let mut dims = Dimensions::new();
    for segment in segments {
        // `k=v=w` keeps only `v`
        let mut parts = segment.split('=');
        let name = parts.next().unwrap_or_default();
        let value = parts.next().ok_or_else(|| CollectorError::MalformedDimension {
            entry: key.to_string(),
            segment: segment.to_string(),
        })?;
        dims.insert(name.to_string(), value.to_string());
    }
    Ok((base, dims))
}

/// `uwsgi.1.0`
pub fn parse_uwsgi_10(raw: &[u8], cumulative: bool) -> Result<Vec<Metric>, CollectorError> {
    let doc = UwsgiDocument::from_slice(raw)?;
    Ok(doc.metrics(cumulative))
}

/// `uwsgi.1.1`: `uwsgi.1.0` plus document-wide `service_dims`.
pub fn parse_uwsgi_11(raw: &[u8], cumulative: bool) -> Result<Vec<Metric>, CollectorError> {
    let doc = UwsgiDocument::from_slice(raw)?;
    let mut results = doc.metrics(cumulative);
    add_to_all(&mut results, &doc.service_dimensions());
    Ok(results)
}

/// `java-1.1`: entry keys carry their own dimensions after the base name.
pub fn parse_java(raw: &[u8], cumulative: bool) -> Result<Vec<Metric>, CollectorError> {
    let doc = UwsgiDocument::from_slice(raw)?;
    let mut results = Vec::new();

    for category in Category::ALL {
        for (key, rollups) in doc.section(category) {
            match split_java_key(key) {
                Ok((base, dims)) => {
                    let mut metrics = expand_entry(base, rollups, category, cumulative);
                    add_to_all(&mut metrics, &dims);
                    results.extend(metrics);
                }
                Err(err) => {
                    warn!(error = %err, category = category.label(), "skipping metric entry");
                }
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn find<'a>(metrics: &'a [Metric], name: &str, rollup: &str) -> &'a Metric {
        metrics
            .iter()
            .find(|m| m.name == name && m.dimension("rollup") == Some(rollup))
            .unwrap_or_else(|| panic!("no metric {name} rollup={rollup} in {metrics:?}"))
    }

    #[test]
    fn default_mode_emits_one_metric_per_numeric_rollup() {
        let raw = json!({
            "gauges": {"queue.depth": {"value": 4}},
            "counters": {"requests": {"count": 17}},
            "histograms": {"size": {"count": 3, "p98": 12.5, "max": 20}},
            "meters": {"hits": {"count": 9, "mean_rate": 0.5, "m1_rate": 0.1, "units": "events/second"}},
            "timers": {"latency": {"count": 2, "p50": 0.01}},
            "version": "1.0"
        })
        .to_string();

        let metrics = parse_uwsgi_10(raw.as_bytes(), false).unwrap();
        assert_eq!(metrics.len(), 1 + 1 + 3 + 3 + 2);
        assert!(metrics
            .iter()
            .all(|m| m.dimension("rollup").is_some() && m.dimension("type").is_some()));

        let counter = find(&metrics, "requests", "count");
        assert_eq!(counter.metric_type, MetricType::Counter);
        assert_eq!(counter.dimension("type"), Some("counter"));
        assert_eq!(counter.value, 17.0);

        let rate = find(&metrics, "hits", "m1_rate");
        assert_eq!(rate.metric_type, MetricType::Gauge);
        assert_eq!(rate.dimension("type"), Some("meter"));

        let p98 = find(&metrics, "size", "p98");
        assert_eq!(p98.value, 12.5);
        assert_eq!(p98.dimension("type"), Some("histogram"));
    }

    #[test]
    fn cumulative_mode_suffixes_names_and_drops_rates() {
        let raw = json!({
            "timers": {"latency": {"count": 5, "p98": 9, "m1_rate": 1.0, "m15_rate": 2.0}},
            "gauges": {"threads": {"value": 12}}
        })
        .to_string();

        let mut metrics = parse_uwsgi_10(raw.as_bytes(), true).unwrap();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["latency.count", "latency.p98", "threads"]);
        assert_eq!(metrics[0].metric_type, MetricType::CumulativeCounter);
        assert_eq!(metrics[1].metric_type, MetricType::Gauge);
        assert_eq!(metrics[2].metric_type, MetricType::Gauge);
        assert!(metrics.iter().all(|m| m.dimensions.is_empty()));
    }

    #[test]
    fn cumulative_counter_category_count_is_cumulative() {
        let raw = json!({"counters": {"errors": {"count": 3}}}).to_string();
        let metrics = parse_uwsgi_10(raw.as_bytes(), true).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "errors.count");
        assert_eq!(metrics[0].metric_type, MetricType::CumulativeCounter);
    }

    #[test]
    fn non_numeric_rollups_are_skipped() {
        let raw = json!({
            "meters": {"hits": {"count": "n/a", "mean_rate": 2.5, "flag": true, "extra": null}}
        })
        .to_string();

        let metrics = parse_uwsgi_10(raw.as_bytes(), false).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].dimension("rollup"), Some("mean_rate"));
    }

    #[test]
    fn null_categories_are_empty() {
        let raw = br#"{"gauges": null, "counters": {"c": {"count": 1}}}"#;
        let metrics = parse_uwsgi_10(raw, false).unwrap();
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = parse_uwsgi_10(b"{not json", false).unwrap_err();
        assert!(matches!(err, CollectorError::Payload(_)));

        let err = parse_uwsgi_10(br#"{"gauges": {"g": 5}}"#, false).unwrap_err();
        assert!(matches!(err, CollectorError::Payload(_)));
    }

    #[test]
    fn uwsgi_11_applies_service_dims() {
        let raw = json!({
            "service_dims": {"cluster": "norcal", "shard": 3},
            "counters": {"requests": {"count": 1}},
            "gauges": {"workers": {"value": 8}}
        })
        .to_string();

        let metrics = parse_uwsgi_11(raw.as_bytes(), false).unwrap();
        assert_eq!(metrics.len(), 2);
        for m in &metrics {
            assert_eq!(m.dimension("cluster"), Some("norcal"));
            assert_eq!(m.dimension("shard"), Some("3"));
        }
    }

    #[test]
    fn java_keys_carry_dimensions() {
        let raw = json!({"counters": {"reqs,shard=1,env=prod": {"count": 3}}}).to_string();

        let metrics = parse_java(raw.as_bytes(), false).unwrap();
        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.name, "reqs");
        assert_eq!(m.value, 3.0);
        assert_eq!(m.dimension("shard"), Some("1"));
        assert_eq!(m.dimension("env"), Some("prod"));
        assert_eq!(m.dimension("rollup"), Some("count"));
        assert_eq!(m.dimension("type"), Some("counter"));
    }

    #[test]
    fn java_cumulative_mode() {
        let raw = json!({"meters": {"hits,env=dev": {"count": 4, "m5_rate": 1.0, "mean_rate": 0.2}}})
            .to_string();

        let mut metrics = parse_java(raw.as_bytes(), true).unwrap();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        let names: Vec<_> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["hits.count", "hits.mean_rate"]);
        assert_eq!(metrics[0].metric_type, MetricType::CumulativeCounter);
        assert!(metrics.iter().all(|m| m.dimension("env") == Some("dev")));
        assert!(metrics.iter().all(|m| m.dimension("rollup").is_none()));
    }

    #[test]
    fn java_malformed_segment_skips_only_that_entry() {
        let raw = json!({
            "counters": {
                "broken,shard": {"count": 1},
                "fine,shard=2": {"count": 2}
            }
        })
        .to_string();

        let metrics = parse_java(raw.as_bytes(), false).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "fine");
    }

    #[test]
    fn java_key_dimension_overrides_type_dimension() {
        let raw = json!({"gauges": {"heap,type=jvm": {"value": 1}}}).to_string();
        let metrics = parse_java(raw.as_bytes(), false).unwrap();
        assert_eq!(metrics[0].dimension("type"), Some("jvm"));
    }

    #[test]
    fn split_java_key_takes_second_equals_piece() {
        let (base, dims) = split_java_key("q,expr=a=b,env=prod").unwrap();
        assert_eq!(base, "q");
        assert_eq!(dims.get("expr").map(String::as_str), Some("a"));
        assert_eq!(dims.get("env").map(String::as_str), Some("prod"));

        let (base, dims) = split_java_key("plain").unwrap();
        assert_eq!(base, "plain");
        assert!(dims.is_empty());

        assert!(matches!(
            split_java_key("x,"),
            Err(CollectorError::MalformedDimension { .. })
        ));
    }
}
