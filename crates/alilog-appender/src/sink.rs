// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle controller: translates appended events and hands them to the
//! transport owned by the current started period.
//!
//! ```text
//!   Stopped ──start()──▶ Started ──stop()──▶ Stopped
//!      ▲                                        │
//!      └────────────────────────────────────────┘
//! ```
//!
//! Appends only ever take a shared lock on the transport slot. `stop` takes the
//! exclusive lock to detach the transport, which waits for in-flight `send`
//! calls; everything that reached `send` before the detach is covered by the
//! flush that follows, anything later is dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, warn};

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::event::LogEvent;
use crate::time_format::TimeFormatter;
use crate::transport::{producer_factory, Transport, TransportFactory};
use crate::translator::translate;

/// Transport and destination captured by one `start`.
struct Started {
    transport: Arc<dyn Transport>,
    project: String,
    logstore: String,
    topic: String,
}

pub struct LogSink {
    config: Mutex<SinkConfig>,
    formatter: RwLock<Arc<TimeFormatter>>,
    started: RwLock<Option<Started>>,
    factory: TransportFactory,
}

impl LogSink {
    /// Sink delivering through the in-crate producer.
    #[must_use]
    pub fn new(config: SinkConfig) -> Self {
        Self::with_transport_factory(config, producer_factory())
    }

    #[must_use]
    pub fn with_transport_factory(config: SinkConfig, factory: TransportFactory) -> Self {
        let formatter = TimeFormatter::new(&config.time_format, &config.time_zone);
        Self {
            config: Mutex::new(config),
            formatter: RwLock::new(Arc::new(formatter)),
            started: RwLock::new(None),
            factory,
        }
    }

    /// Builds a transport from a snapshot of the current settings.
    ///
    /// Starting an already started sink logs a warning and does nothing.
    pub fn start(&self) -> Result<(), SinkError> {
        let mut started = write(&self.started);
        if started.is_some() {
            warn!("ALILOG | Sink already started, ignoring start");
            return Ok(());
        }

        let snapshot = {
            let config = lock(&self.config);
            self.swap_formatter(&config);
            config.clone()
        };

        let transport = (self.factory)(&snapshot)?;
        debug!(
            "ALILOG | Sink started for project '{}', logstore '{}'",
            snapshot.project.project_name, snapshot.logstore
        );
        *started = Some(Started {
            transport,
            project: snapshot.project.project_name,
            logstore: snapshot.logstore,
            topic: snapshot.topic,
        });
        Ok(())
    }

    /// Translates `event` and hands it to the transport. Dropped when stopped.
    pub fn append(&self, event: &LogEvent) {
        let started = read(&self.started);
        let Some(current) = started.as_ref() else {
            debug!("ALILOG | Sink not started, dropping event");
            return;
        };

        let formatter = Arc::clone(&read(&self.formatter));
        let record = translate(event, &formatter);
        current.transport.send(
            &current.project,
            &current.logstore,
            &current.topic,
            None,
            vec![record],
        );
    }

    /// Detaches the transport, then flushes and closes it.
    ///
    /// Returns the first failure. A failed flush does not prevent the close.
    /// Stopping a stopped sink is a no-op.
    pub fn stop(&self) -> Result<(), SinkError> {
        let Some(current) = write(&self.started).take() else {
            return Ok(());
        };
        debug!("ALILOG | Stopping sink, flushing transport");

        let flushed = current.transport.flush();
        if let Err(e) = &flushed {
            error!("ALILOG | Failed to flush transport: {}", e);
        }
        let closed = current.transport.close();
        if let Err(e) = &closed {
            error!("ALILOG | Failed to close transport: {}", e);
        }

        flushed?;
        closed?;
        debug!("ALILOG | Sink stopped");
        Ok(())
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        read(&self.started).is_some()
    }

    /// A copy of the current settings.
    #[must_use]
    pub fn config(&self) -> SinkConfig {
        lock(&self.config).clone()
    }

    /// Changes settings. Only `time_format` and `time_zone` apply to a started
    /// sink; everything else is picked up by the next `start`.
    pub fn update_config(&self, update: impl FnOnce(&mut SinkConfig)) {
        let mut config = lock(&self.config);
        let before = (config.time_format.clone(), config.time_zone.clone());
        update(&mut config);
        if before.0 != config.time_format || before.1 != config.time_zone {
            self.swap_formatter(&config);
        }
    }

    #[must_use]
    pub fn time_format(&self) -> String {
        lock(&self.config).time_format.clone()
    }

    pub fn set_time_format(&self, time_format: impl Into<String>) {
        let mut config = lock(&self.config);
        config.time_format = time_format.into();
        self.swap_formatter(&config);
    }

    #[must_use]
    pub fn time_zone(&self) -> String {
        lock(&self.config).time_zone.clone()
    }

    pub fn set_time_zone(&self, time_zone: impl Into<String>) {
        let mut config = lock(&self.config);
        config.time_zone = time_zone.into();
        self.swap_formatter(&config);
    }

    /// Callers hold the config lock so swaps land in the same order as edits.
    fn swap_formatter(&self, config: &SinkConfig) {
        let formatter = Arc::new(TimeFormatter::new(&config.time_format, &config.time_zone));
        *write(&self.formatter) = formatter;
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if self.is_started() {
            if let Err(e) = self.stop() {
                error!("ALILOG | Failed to stop sink on drop: {}", e);
            }
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config();
        f.debug_struct("LogSink")
            .field("project", &config.project.project_name)
            .field("logstore", &config.logstore)
            .field("topic", &config.topic)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
