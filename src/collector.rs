// Nerve uWSGI collector
// This file implements the collection cycle: read the Nerve discovery file,
// query every discovered service concurrently, parse what comes back and
// push the service-stamped metrics onto the shared output channel
//
// Numan Thabit 2025 Nov

use crate::config::CollectorConfig;
use crate::control::WorkerPool;
use crate::discovery::{self, ServiceEndpoint, ServiceMap};
use crate::errors::CollectorError;
use crate::metric::{add_to_all, Dimensions, Metric};
use crate::metrics::{QUERY_ERRORS, QUERY_LATENCY};
use crate::parser::SchemaRegistry;
use crate::querier::EndpointQuerier;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub services: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub metrics: usize,
}

#[derive(Debug)]
pub struct NerveCollector {
    inner: Arc<Inner>,
    config_file_path: PathBuf,
    /// Nerve hosts, besides loopback, whose services run on this machine
    local_hosts: Vec<String>,
    pool: WorkerPool,
}

/// State shared read-only by every per-service task.
#[derive(Debug)]
struct Inner {
    base_url: Url,
    query_path: String,
    whitelist: HashSet<String>,
    querier: EndpointQuerier,
    registry: SchemaRegistry,
}

impl NerveCollector {
    pub fn new(config: &CollectorConfig, registry: SchemaRegistry) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{}/", config.host))
            .with_context(|| format!("invalid collector host {}", config.host))?;
        let querier = EndpointQuerier::new(config.timeout())?;

        Ok(Self {
            inner: Arc::new(Inner {
                base_url,
                query_path: config.query_path.trim_start_matches('/').to_string(),
                whitelist: config.services_whitelist.iter().cloned().collect(),
                querier,
                registry,
            }),
            config_file_path: config.config_file_path.clone(),
            local_hosts: std::iter::once(config.host.clone())
                .chain(config.local_hosts.iter().cloned())
                .collect(),
            pool: WorkerPool::new(config.max_concurrency),
        })
    }

    /// Run one cycle: discover, then query every service and wait for all of
    /// them. A discovery failure aborts the cycle before any query is made;
    /// a failing service only loses its own metrics.
    pub async fn collect(&self, out: &mpsc::Sender<Metric>) -> Result<CycleSummary, CollectorError> {
        let services = discovery::load_services(&self.config_file_path, &self.local_hosts).await?;
        debug!(
            path = %self.config_file_path.display(),
            services = services.len(),
            "parsed nerve config"
        );
        Ok(self.collect_services(services, out).await)
    }

    /// Query an already discovered set of services.
    pub async fn collect_services(
        &self,
        services: ServiceMap,
        out: &mpsc::Sender<Metric>,
    ) -> CycleSummary {
        let mut summary = CycleSummary {
            services: services.len(),
            ..CycleSummary::default()
        };

        let mut tasks = JoinSet::new();
        for service in services.into_values() {
            let inner = self.inner.clone();
            let pool = self.pool.clone();
            let out = out.clone();
            tasks.spawn(async move {
                let _permit = match pool.acquire().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        warn!(service = %service.name, error = %err, "worker pool closed");
                        return None;
                    }
                };
                inner.query_service(&service, &out).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(sent)) => {
                    summary.succeeded += 1;
                    summary.metrics += sent;
                }
                Ok(None) => summary.failed += 1,
                Err(err) => {
                    warn!(error = %err, "service query task aborted");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Whether `service` is collected in cumulative-counter mode.
    pub fn is_whitelisted(&self, service: &str) -> bool {
        self.inner.whitelist.contains(service)
    }

    pub fn endpoint_for(&self, port: u16) -> Result<Url, url::ParseError> {
        self.inner.endpoint_for(port)
    }
}

impl Inner {
    fn endpoint_for(&self, port: u16) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.clone();
        // the base URL is always http://host/, which accepts any port
        let _ = url.set_port(Some(port));
        url.join(&self.query_path)
    }

    /// Query, parse and emit one service. Returns how many metrics were
    /// sent, or `None` if the service contributed nothing this cycle.
    async fn query_service(
        &self,
        service: &ServiceEndpoint,
        out: &mpsc::Sender<Metric>,
    ) -> Option<usize> {
        let endpoint = match self.endpoint_for(service.port) {
            Ok(url) => url,
            Err(err) => {
                warn!(service = %service.name, port = service.port, error = %err, "invalid endpoint");
                return None;
            }
        };
        debug!(service = %service.name, endpoint = %endpoint, "querying service");

        let mut metrics = match self.fetch(service, endpoint.as_str()).await {
            Ok(metrics) => metrics,
            Err(err) => {
                QUERY_ERRORS
                    .with_label_values(&[service.name.as_str(), err.kind()])
                    .inc();
                warn!(
                    service = %service.name,
                    endpoint = %endpoint,
                    kind = err.kind(),
                    error = %err,
                    "failed to collect service metrics"
                );
                return None;
            }
        };

        let mut stamp = Dimensions::new();
        stamp.insert("service".to_string(), service.name.clone());
        stamp.insert("port".to_string(), service.port.to_string());
        add_to_all(&mut metrics, &stamp);

        debug!(service = %service.name, count = metrics.len(), "sending metrics to channel");
        let total = metrics.len();
        for (sent, metric) in metrics.into_iter().enumerate() {
            if out.send(metric).await.is_err() {
                warn!(
                    service = %service.name,
                    sent,
                    total,
                    "metric channel closed; dropping remaining metrics"
                );
                return Some(sent);
            }
        }
        Some(total)
    }

    async fn fetch(&self, service: &ServiceEndpoint, url: &str) -> Result<Vec<Metric>, CollectorError> {
        let payload = {
            let _timer = QUERY_LATENCY
                .with_label_values(&[service.name.as_str()])
                .start_timer();
            self.querier.query(url).await?
        };

        let cumulative = self.whitelist.contains(&service.name);
        debug!(
            service = %service.name,
            schema = %payload.schema,
            cumulative,
            bytes = payload.body.len(),
            "parsing service response"
        );
        self.registry
            .parse(&payload.schema, &payload.body, cumulative)
    }
}

impl CycleSummary {
    pub fn log(&self) {
        info!(
            services = self.services,
            succeeded = self.succeeded,
            failed = self.failed,
            metrics = self.metrics,
            "collection cycle finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(host: &str, query_path: &str) -> NerveCollector {
        let config = CollectorConfig {
            host: host.to_string(),
            query_path: query_path.to_string(),
            services_whitelist: vec!["cumul_svc".to_string()],
            ..CollectorConfig::default()
        };
        NerveCollector::new(&config, SchemaRegistry::default()).unwrap()
    }

    #[test]
    fn builds_endpoint_urls() {
        let c = collector("localhost", "status/metrics");
        assert_eq!(
            c.endpoint_for(8080).unwrap().as_str(),
            "http://localhost:8080/status/metrics"
        );

        let c = collector("127.0.0.1", "/metrics");
        assert_eq!(
            c.endpoint_for(9999).unwrap().as_str(),
            "http://127.0.0.1:9999/metrics"
        );
    }

    #[test]
    fn whitelist_membership_selects_cumulative_mode() {
        let c = collector("localhost", "status/metrics");
        assert!(c.is_whitelisted("cumul_svc"));
        assert!(!c.is_whitelisted("other_svc"));
    }
}
