// Parser module - schema dispatch for metrics payloads
// This file maps the `Metrics-Schema` identifier reported by a service to the
// parser for that wire format, and implements the schema-less default
//
// Numan Thabit 2025 Nov

pub mod dropwizard;
pub mod uwsgi;
pub mod value;

use crate::errors::CollectorError;
use crate::metric::Metric;
use std::collections::HashMap;

pub use dropwizard::{flatten, parse_dropwizard};
pub use uwsgi::{parse_java, parse_uwsgi_10, parse_uwsgi_11};

/// Schema used when a response carries no `Metrics-Schema` header.
pub const DEFAULT_SCHEMA: &str = "default";

/// Turns a raw body into metrics; the flag selects cumulative-counter mode.
pub type ParseFn = fn(&[u8], bool) -> Result<Vec<Metric>, CollectorError>;

/// Immutable schema → parser table, built once and shared by every collection.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    parsers: HashMap<&'static str, ParseFn>,
}

impl SchemaRegistry {
    pub fn new(parsers: impl IntoIterator<Item = (&'static str, ParseFn)>) -> Self {
        Self {
            parsers: parsers.into_iter().collect(),
        }
    }

    pub fn parse(
        &self,
        schema: &str,
        raw: &[u8],
        cumulative: bool,
    ) -> Result<Vec<Metric>, CollectorError> {
        let parser = self
            .parsers
            .get(schema)
            .ok_or_else(|| CollectorError::UnknownSchema(schema.to_string()))?;
        parser(raw, cumulative)
    }

    pub fn supports(&self, schema: &str) -> bool {
        self.parsers.contains_key(schema)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new([
            ("uwsgi.1.0", parse_uwsgi_10 as ParseFn),
            ("uwsgi.1.1", parse_uwsgi_11 as ParseFn),
            ("java-1.1", parse_java as ParseFn),
            (DEFAULT_SCHEMA, parse_default as ParseFn),
        ])
    }
}

/// Parser for responses without a declared schema.
///
/// Tries `uwsgi.1.0` first; a document that parses but yields nothing is
/// assumed to be nested Dropwizard output and is flattened instead. The
/// flattener has no cumulative mode, so the flag only affects the first pass.
pub fn parse_default(raw: &[u8], cumulative: bool) -> Result<Vec<Metric>, CollectorError> {
    let results = parse_uwsgi_10(raw, cumulative)?;
    if !results.is_empty() {
        return Ok(results);
    }
    parse_dropwizard(raw)
}
