// Nerve service discovery
// This file reads the Nerve configuration to learn which local ports serve
// which services for the current collection cycle
//
// Numan Thabit 2025 Nov

use crate::errors::CollectorError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

/// A locally running service discovered through Nerve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub name: String,
    pub namespace: Option<String>,
    pub port: u16,
}

pub type ServiceMap = BTreeMap<u16, ServiceEndpoint>;

#[derive(Debug, Deserialize)]
struct NerveConfig {
    #[serde(default)]
    services: Map<String, Value>,
}

/// Read and parse the Nerve file at `path`, keeping services on `local_hosts`.
pub async fn load_services(
    path: &Path,
    local_hosts: &[String],
) -> Result<ServiceMap, CollectorError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|err| CollectorError::Discovery {
            path: path.display().to_string(),
            reason: format!("read failed: {err}"),
        })?;

    parse_services(&raw, local_hosts).map_err(|err| CollectorError::Discovery {
        path: path.display().to_string(),
        reason: format!("parse failed: {err}"),
    })
}

/// Parse Nerve JSON of the form
/// `{"services": {"<name>.<namespace>:<suffix>": {"host": "..", "port": 8080}}}`.
///
/// Entries announced for another machine are skipped: the host must be a
/// loopback address, `localhost`, or one of `local_hosts`.
pub fn parse_services(
    raw: &[u8],
    local_hosts: &[String],
) -> Result<ServiceMap, serde_json::Error> {
    let parsed: NerveConfig = serde_json::from_slice(raw)?;
    let mut results = ServiceMap::new();

    for (raw_name, service) in &parsed.services {
        let host = service.get("host").and_then(Value::as_str).map(str::trim);
        if !host.is_some_and(|h| is_local(h, local_hosts)) {
            debug!(
                service = %raw_name,
                host = ?host,
                "skipping nerve entry for a remote host"
            );
            continue;
        }
        let Some(port) = service.get("port").and_then(port_of) else {
            debug!(service = %raw_name, "skipping nerve entry without a usable port");
            continue;
        };

        let qualified = raw_name.split(':').next().unwrap_or_default();
        let mut parts = qualified.split('.');
        let name = parts.next().unwrap_or_default().to_string();
        let namespace = parts.next().map(str::to_string);

        results.insert(
            port,
            ServiceEndpoint {
                name,
                namespace,
                port,
            },
        );
    }

    Ok(results)
}

fn is_local(host: &str, local_hosts: &[String]) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
        || local_hosts.iter().any(|h| h == host)
}

fn port_of(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
