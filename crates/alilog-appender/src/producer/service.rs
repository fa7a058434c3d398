// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor owning the package aggregator.
//!
//! Callers talk to it through a [`ProducerHandle`]. Commands are processed in
//! order, so a `Flush` covers every `Send` queued before it. Sealed packages
//! are delivered on spawned tasks; `Flush` and `Shutdown` reply only once all
//! of them have finished.

use std::sync::{mpsc as std_mpsc, Arc};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::config::ProducerConfig;
use crate::error::TransportError;
use crate::producer::aggregator::{Destination, Package, PackageAggregator};
use crate::producer::constants::{MAX_TICK_INTERVAL, MIN_TICK_INTERVAL};
use crate::producer::flusher::PackageFlusher;
use crate::producer::mem_pool::MemPool;
use crate::record::LogRecord;

#[derive(Debug)]
pub enum ProducerCommand {
    /// Records whose bytes are already reserved in the memory pool.
    Send(Destination, Vec<LogRecord>),
    Flush(std_mpsc::Sender<()>),
    Shutdown(std_mpsc::Sender<()>),
}

#[derive(Clone, Debug)]
pub struct ProducerHandle {
    tx: mpsc::UnboundedSender<ProducerCommand>,
}

impl ProducerHandle {
    pub fn send(
        &self,
        destination: Destination,
        records: Vec<LogRecord>,
    ) -> Result<(), TransportError> {
        self.tx
            .send(ProducerCommand::Send(destination, records))
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Blocks until everything sent before this call has been attempted.
    pub fn flush(&self) -> Result<(), TransportError> {
        self.request(ProducerCommand::Flush)
    }

    /// Flushes, then stops the service. Blocks until both are done.
    pub fn shutdown(&self) -> Result<(), TransportError> {
        self.request(ProducerCommand::Shutdown)
    }

    fn request(
        &self,
        command: impl FnOnce(std_mpsc::Sender<()>) -> ProducerCommand,
    ) -> Result<(), TransportError> {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        self.tx
            .send(command(reply_tx))
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.recv().map_err(|_| TransportError::ChannelClosed)
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct ProducerService {
    aggregator: PackageAggregator,
    flusher: Arc<PackageFlusher>,
    mem_pool: Arc<MemPool>,
    rx: mpsc::UnboundedReceiver<ProducerCommand>,
    in_flight: JoinSet<()>,
    tick: Duration,
}

impl ProducerService {
    #[must_use]
    pub fn new(
        config: &ProducerConfig,
        flusher: Arc<PackageFlusher>,
        mem_pool: Arc<MemPool>,
    ) -> (Self, ProducerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            aggregator: PackageAggregator::new(config),
            flusher,
            mem_pool,
            rx,
            in_flight: JoinSet::new(),
            tick: tick_interval(config.package_timeout_ms),
        };
        (service, ProducerHandle { tx })
    }

    pub async fn run(mut self) {
        debug!("ALILOG | Producer service started");
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(ProducerCommand::Send(destination, records)) => {
                        let sealed = self.aggregator.add(destination, records, Instant::now());
                        self.dispatch(sealed);
                    }
                    Some(ProducerCommand::Flush(reply)) => {
                        self.flush_all().await;
                        if reply.send(()).is_err() {
                            debug!("ALILOG | Flush requester went away before the reply");
                        }
                    }
                    Some(ProducerCommand::Shutdown(reply)) => {
                        self.flush_all().await;
                        debug!("ALILOG | Producer service shutting down");
                        if reply.send(()).is_err() {
                            debug!("ALILOG | Shutdown requester went away before the reply");
                        }
                        break;
                    }
                    None => {
                        self.flush_all().await;
                        debug!("ALILOG | All producer handles dropped, shutting down");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let sealed = self.aggregator.expired(Instant::now());
                    self.dispatch(sealed);
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("ALILOG | Package delivery task failed: {}", e);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, packages: Vec<Package>) {
        for package in packages {
            let flusher = Arc::clone(&self.flusher);
            let reservation = Reservation::new(Arc::clone(&self.mem_pool), package.bytes());
            self.in_flight.spawn(async move {
                let _reservation = reservation;
                flusher.send(&package).await;
            });
        }
    }

    async fn flush_all(&mut self) {
        let sealed = self.aggregator.drain();
        self.dispatch(sealed);
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                error!("ALILOG | Package delivery task failed: {}", e);
            }
        }
    }
}

/// Pool bytes held by one package, returned when the delivery task ends,
/// including by panic or abort.
struct Reservation {
    mem_pool: Arc<MemPool>,
    bytes: usize,
}

impl Reservation {
    fn new(mem_pool: Arc<MemPool>, bytes: usize) -> Self {
        Self { mem_pool, bytes }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.mem_pool.release(self.bytes);
    }
}

/// `min(package timeout, 100ms)`, never below 10ms.
fn tick_interval(package_timeout_ms: u64) -> Duration {
    Duration::from_millis(package_timeout_ms).clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_bounds() {
        assert_eq!(tick_interval(3_000), Duration::from_millis(100));
        assert_eq!(tick_interval(50), Duration::from_millis(50));
        assert_eq!(tick_interval(0), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_reservation_released_when_delivery_panics() {
        let mem_pool = Arc::new(MemPool::new(100));
        assert!(mem_pool.try_reserve(40));
        let reservation = Reservation::new(Arc::clone(&mem_pool), 40);

        let task = tokio::spawn(async move {
            let _reservation = reservation;
            panic!("delivery blew up");
        });

        assert!(task.await.is_err_and(|e| e.is_panic()));
        assert_eq!(mem_pool.used(), 0);
    }

    #[tokio::test]
    async fn test_reservation_released_when_delivery_is_aborted() {
        let mem_pool = Arc::new(MemPool::new(100));
        assert!(mem_pool.try_reserve(60));
        let reservation = Reservation::new(Arc::clone(&mem_pool), 60);

        let mut in_flight = JoinSet::new();
        in_flight.spawn(async move {
            let _reservation = reservation;
            std::future::pending::<()>().await;
        });
        in_flight.abort_all();

        let joined = in_flight.join_next().await.expect("task");
        assert!(joined.is_err_and(|e| e.is_cancelled()));
        assert_eq!(mem_pool.used(), 0);
    }

    #[test]
    fn test_handle_reports_closed_service() {
        let flusher = Arc::new(
            PackageFlusher::new(
                &crate::config::ProjectConfig {
                    project_name: "shop".to_string(),
                    endpoint: "http://127.0.0.1:1".to_string(),
                    ..Default::default()
                },
                &ProducerConfig::default(),
            )
            .expect("flusher"),
        );
        let (service, handle) = ProducerService::new(
            &ProducerConfig::default(),
            flusher,
            Arc::new(MemPool::new(1_024)),
        );
        drop(service);

        assert!(matches!(handle.flush(), Err(TransportError::ChannelClosed)));
        let destination = Destination {
            project: "shop".to_string(),
            logstore: "app".to_string(),
            topic: String::new(),
            shard_hash: None,
        };
        assert!(matches!(
            handle.send(destination, Vec::new()),
            Err(TransportError::ChannelClosed)
        ));
    }
}
