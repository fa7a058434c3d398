// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logging sink that ships structured log events to a remote log service.
//!
//! Events reach a [`sink::LogSink`] either directly through
//! [`sink::LogSink::append`] or from `tracing` through [`layer::AppenderLayer`].
//! The sink translates each event into a [`record::LogRecord`] and hands it to
//! a [`transport::Transport`], by default the batching
//! [`producer::LogProducer`].

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(clippy::missing_errors_doc)]

/// Sink, producer and file/environment settings
pub mod config;

pub mod error;

/// Inbound log events
pub mod event;

/// `tracing` layer feeding a sink
pub mod layer;

/// Default batching transport
pub mod producer;

pub mod record;

/// Sink lifecycle
pub mod sink;

pub mod time_format;

/// Event to record translation
pub mod translator;

pub mod transport;

pub use config::SinkConfig;
pub use error::{ConfigError, SinkError, TransportError};
pub use event::{CallerFrame, Level, LogEvent, ThrownError};
pub use layer::AppenderLayer;
pub use producer::LogProducer;
pub use record::LogRecord;
pub use sink::LogSink;
pub use transport::{Transport, TransportFactory};
