// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The batching, retrying delivery component the sink hands records to.

use std::sync::Arc;

use crate::config::SinkConfig;
use crate::error::TransportError;
use crate::producer::LogProducer;
use crate::record::LogRecord;

/// Asynchronous, batching delivery of records to one project.
///
/// Implementations must be safe to call from many threads at once.
pub trait Transport: Send + Sync {
    /// Enqueues `records` for delivery and returns immediately.
    ///
    /// Records may be dropped or retried internally; no per-record outcome is
    /// reported back.
    fn send(
        &self,
        project: &str,
        logstore: &str,
        topic: &str,
        shard_hash: Option<&str>,
        records: Vec<LogRecord>,
    );

    /// Blocks until every record handed over before this call has been
    /// attempted at least once.
    fn flush(&self) -> Result<(), TransportError>;

    /// Releases background resources. `send` is not called afterwards.
    fn close(&self) -> Result<(), TransportError>;
}

/// Builds one transport per started period of a sink.
pub type TransportFactory =
    Arc<dyn Fn(&SinkConfig) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync>;

/// Factory building the in-crate [`LogProducer`].
#[must_use]
pub fn producer_factory() -> TransportFactory {
    Arc::new(|config: &SinkConfig| {
        let producer = LogProducer::new(config.project.clone(), config.producer.clone())?;
        Ok(Arc::new(producer) as Arc<dyn Transport>)
    })
}
