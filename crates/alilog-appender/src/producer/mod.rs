// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The default [`Transport`]: batches records per destination and posts them
//! from an owned I/O runtime.
//!
//! ```text
//!   send() ─▶ MemPool ─▶ ProducerHandle ─▶ ProducerService ─▶ PackageFlusher ─▶ HTTP
//!            (reserve)     (unbounded)       (aggregate)         (retry)
//! ```
//!
//! `send` never blocks. `flush` and `close` block the caller on a std channel
//! until the service replies, which is safe from inside another async runtime
//! because the service runs on its own threads.

pub mod aggregator;
pub(crate) mod constants;
pub mod flusher;
pub mod mem_pool;
pub mod service;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::config::{ProducerConfig, ProjectConfig};
use crate::error::TransportError;
use crate::record::LogRecord;
use crate::transport::Transport;

use aggregator::Destination;
use constants::IO_THREAD_NAME;
use flusher::PackageFlusher;
use mem_pool::MemPool;
use service::{ProducerHandle, ProducerService};

pub struct LogProducer {
    handle: ProducerHandle,
    mem_pool: Arc<MemPool>,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
}

impl LogProducer {
    /// Starts the I/O runtime and the producer service.
    pub fn new(project: ProjectConfig, config: ProducerConfig) -> Result<Self, TransportError> {
        if project.endpoint.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "endpoint is empty".to_string(),
            ));
        }
        if project.project_name.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "project name is empty".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads_count.max(1))
            .thread_name(IO_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(|e| TransportError::Runtime(format!("Failed to build I/O runtime: {e}")))?;

        let flusher = {
            let _guard = runtime.enter();
            PackageFlusher::new(&project, &config)?
        };
        let mem_pool = Arc::new(MemPool::new(config.mem_pool_size_in_bytes));
        let (service, handle) =
            ProducerService::new(&config, Arc::new(flusher), Arc::clone(&mem_pool));
        runtime.spawn(service.run());

        debug!(
            "ALILOG | Producer started for project '{}' with {} I/O threads",
            project.project_name,
            config.io_threads_count.max(1)
        );
        Ok(Self {
            handle,
            mem_pool,
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
        })
    }

    /// Bytes accepted and not yet delivered or dropped.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.mem_pool.used()
    }

    fn shutdown_runtime(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

impl Transport for LogProducer {
    fn send(
        &self,
        project: &str,
        logstore: &str,
        topic: &str,
        shard_hash: Option<&str>,
        records: Vec<LogRecord>,
    ) {
        if self.closed.load(Ordering::Acquire) {
            debug!("ALILOG | Producer closed, dropping {} records", records.len());
            return;
        }

        let bytes: usize = records.iter().map(LogRecord::approximate_size).sum();
        if !self.mem_pool.try_reserve(bytes) {
            warn!(
                "ALILOG | Memory pool full ({} of {} bytes used), dropping {} records",
                self.mem_pool.used(),
                self.mem_pool.capacity(),
                records.len()
            );
            return;
        }

        let destination = Destination {
            project: project.to_string(),
            logstore: logstore.to_string(),
            topic: topic.to_string(),
            shard_hash: shard_hash.map(str::to_string),
        };
        if let Err(e) = self.handle.send(destination, records) {
            self.mem_pool.release(bytes);
            debug!("ALILOG | Dropping records: {}", e);
        }
    }

    fn flush(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.handle.flush()
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.handle.shutdown();
        self.shutdown_runtime();
        debug!("ALILOG | Producer closed");
        result
    }
}

impl Drop for LogProducer {
    fn drop(&mut self) {
        // A plain runtime drop panics inside async context.
        self.shutdown_runtime();
    }
}
