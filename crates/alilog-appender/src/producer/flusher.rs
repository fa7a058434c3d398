// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Package delivery over HTTP with compression and retry.
//!
//! ```text
//!   Package ─▶ JSON body ─▶ zstd (optional) ─▶ POST ─▶ 2xx: delivered
//!                                               │
//!                                               ├─▶ 4xx (not 429): dropped
//!                                               └─▶ 429/5xx/network: retry
//! ```

use std::io::Write;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, error, warn};
use zstd::stream::write::Encoder;

use crate::config::{ProducerConfig, ProjectConfig};
use crate::error::TransportError;
use crate::producer::aggregator::{Destination, Package};
use crate::producer::constants::{
    API_VERSION, HEADER_ACCESS_KEY_ID, HEADER_API_VERSION, HEADER_BODY_RAW_SIZE, HEADER_PROJECT,
    HEADER_SECURITY_TOKEN, LOGS_KEY, RETRY_BACKOFF_STEP, SOURCE_KEY, TOPIC_KEY,
};
use crate::record::LogRecord;

/// Final outcome of delivering one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Refused with a status that retrying cannot fix.
    Rejected(StatusCode),
    /// Every attempt failed with a retryable error.
    Exhausted,
    /// The body could not be built.
    Dropped,
}

/// What to do after one attempt.
#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    Success,
    Permanent(StatusCode),
    Retry(String),
}

/// Wire body of a package.
struct PackageBody<'a> {
    topic: &'a str,
    logs: &'a [LogRecord],
}

impl Serialize for PackageBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(TOPIC_KEY, self.topic)?;
        map.serialize_entry(SOURCE_KEY, "")?;
        map.serialize_entry(LOGS_KEY, self.logs)?;
        map.end()
    }
}

#[derive(Debug)]
struct Payload {
    body: Vec<u8>,
    raw_size: usize,
    compressed: bool,
}

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct PackageFlusher {
    client: reqwest::Client,
    endpoint: String,
    access_key_id: String,
    sts_token: Option<String>,
    retry_times: u32,
    use_compression: bool,
    compression_level: i32,
}

impl PackageFlusher {
    pub fn new(project: &ProjectConfig, config: &ProducerConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| TransportError::Runtime(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: normalize_endpoint(&project.endpoint),
            access_key_id: project.access_key_id.clone(),
            sts_token: project.sts_token.clone().filter(|t| !t.trim().is_empty()),
            retry_times: config.retry_times,
            use_compression: config.use_compression,
            compression_level: config.compression_level,
        })
    }

    /// Delivers `package`, retrying transient failures with linear backoff.
    pub async fn send(&self, package: &Package) -> Delivery {
        let destination = package.destination();
        let payload = match self.payload(package) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    "ALILOG | Failed to prepare payload, dropping {} records: {}",
                    package.len(),
                    e
                );
                return Delivery::Dropped;
            }
        };
        let url = self.url(destination);
        let headers = self.headers(destination, &payload);
        let attempts = self.retry_times.saturating_add(1);

        for attempt in 1..=attempts {
            let resp = self
                .client
                .post(&url)
                .headers(headers.clone())
                .body(payload.body.clone())
                .send()
                .await;

            match classify(resp) {
                Attempt::Success => {
                    debug!(
                        "ALILOG | Delivered {} records to {}/{}",
                        package.len(),
                        destination.project,
                        destination.logstore
                    );
                    return Delivery::Delivered;
                }
                Attempt::Permanent(status) => {
                    error!(
                        "ALILOG | {}: Package rejected, dropping {} records",
                        status,
                        package.len()
                    );
                    return Delivery::Rejected(status);
                }
                Attempt::Retry(reason) if attempt < attempts => {
                    debug!(
                        "ALILOG | Attempt {}/{} failed: {}, retrying",
                        attempt, attempts, reason
                    );
                    tokio::time::sleep(RETRY_BACKOFF_STEP * attempt).await;
                }
                Attempt::Retry(reason) => {
                    error!(
                        "ALILOG | Failed to send package after {} attempts, dropping {} records: {}",
                        attempts,
                        package.len(),
                        reason
                    );
                }
            }
        }
        Delivery::Exhausted
    }

    fn url(&self, destination: &Destination) -> String {
        match &destination.shard_hash {
            Some(hash) => format!(
                "{}/logstores/{}/shards/route?key={}",
                self.endpoint, destination.logstore, hash
            ),
            None => format!("{}/logstores/{}/shards/lb", self.endpoint, destination.logstore),
        }
    }

    fn payload(&self, package: &Package) -> Result<Payload, String> {
        let raw = serde_json::to_vec(&PackageBody {
            topic: &package.destination().topic,
            logs: package.records(),
        })
        .map_err(|e| format!("Failed to serialize package: {e}"))?;
        let raw_size = raw.len();

        if !self.use_compression {
            return Ok(Payload {
                body: raw,
                raw_size,
                compressed: false,
            });
        }

        match self.encode(&raw) {
            Ok(body) => Ok(Payload {
                body,
                raw_size,
                compressed: true,
            }),
            Err(e) => {
                debug!("ALILOG | Failed to compress package, sending raw: {}", e);
                Ok(Payload {
                    body: raw,
                    raw_size,
                    compressed: false,
                })
            }
        }
    }

    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = Encoder::new(Vec::new(), self.compression_level)?;
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn headers(&self, destination: &Destination, payload: &Payload) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, HEADER_PROJECT, &destination.project);
        insert_header(&mut headers, HEADER_API_VERSION, API_VERSION);
        insert_header(
            &mut headers,
            HEADER_BODY_RAW_SIZE,
            &payload.raw_size.to_string(),
        );
        insert_header(&mut headers, HEADER_ACCESS_KEY_ID, &self.access_key_id);
        if let Some(token) = &self.sts_token {
            insert_header(&mut headers, HEADER_SECURITY_TOKEN, token);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if payload.compressed {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("zstd"));
        }
        headers
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => warn!("ALILOG | Skipping header {}: value is not valid", name),
    }
}

fn classify(resp: Result<reqwest::Response, reqwest::Error>) -> Attempt {
    match resp {
        Ok(resp) => {
            let status = resp.status();
            if status.is_success() {
                Attempt::Success
            } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                Attempt::Permanent(status)
            } else {
                Attempt::Retry(format!("status {status}"))
            }
        }
        Err(e) => Attempt::Retry(e.to_string()),
    }
}

/// Adds `https://` when no scheme is given and strips trailing slashes.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}
