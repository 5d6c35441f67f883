// Endpoint querier
// This file performs the single bounded-timeout GET against a service's
// metrics endpoint and reports which schema the body is written in
//
// Numan Thabit 2025 Nov

use crate::errors::CollectorError;
use crate::parser::DEFAULT_SCHEMA;
use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Response header naming the payload's wire format.
pub const SCHEMA_HEADER: &str = "Metrics-Schema";

/// Raw metrics body together with its schema identifier.
#[derive(Debug, Clone)]
pub struct Payload {
    pub schema: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EndpointQuerier {
    http: Client,
}

impl EndpointQuerier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .context("build HTTP client for endpoint queries")?;
        Ok(Self { http })
    }

    /// Fetch `url` once. Anything other than a 200 is an error; the body is
    /// always read to the end so the connection goes back to the pool.
    pub async fn query(&self, url: &str) -> Result<Payload, CollectorError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| request_error(url, source))?;

        let status = resp.status();
        if status != StatusCode::OK {
            drain(resp).await;
            return Err(CollectorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let schema = schema_of(&resp);
        let body = resp.bytes().await.map_err(|source| {
            if source.is_timeout() {
                CollectorError::Timeout {
                    url: url.to_string(),
                }
            } else {
                CollectorError::Body {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        Ok(Payload {
            schema,
            body: body.to_vec(),
        })
    }
}

fn request_error(url: &str, source: reqwest::Error) -> CollectorError {
    if source.is_timeout() {
        CollectorError::Timeout {
            url: url.to_string(),
        }
    } else {
        CollectorError::Request {
            url: url.to_string(),
            source,
        }
    }
}

fn schema_of(resp: &Response) -> String {
    resp.headers()
        .get(SCHEMA_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_SCHEMA)
        .to_string()
}

async fn drain(resp: Response) {
    // the error body is discarded; a failed read just drops the connection
    let _ = resp.bytes().await;
}
