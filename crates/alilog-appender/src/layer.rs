// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` adapter: turns `tracing` events into [`LogEvent`]s and appends
//! them to a [`LogSink`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracing_subscriber::prelude::*;
//! use alilog_appender::{config::get_config, layer::AppenderLayer, sink::LogSink};
//!
//! let sink = Arc::new(LogSink::new(get_config(None)));
//! sink.start()?;
//! tracing_subscriber::registry()
//!     .with(AppenderLayer::new(Arc::clone(&sink)))
//!     .init();
//! ```
//!
//! # Mapping
//!
//! - **message**: the `message` field, then every other field as ` key=value`
//! - **error**: the first field recorded as an error, with its source chain
//! - **location**: `module.span(file:line)`, where span is the innermost
//!   span name or `?`

use std::error::Error;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing_core::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::event::{current_millis, current_thread_name, CallerFrame, Level, LogEvent, ThrownError};
use crate::sink::LogSink;

const MESSAGE_FIELD: &str = "message";
const UNKNOWN_METHOD: &str = "?";

/// Target roots whose events are never forwarded: this crate and its HTTP stack.
const INTERNAL_TARGETS: &[&str] = &[
    "alilog_appender",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct AppenderLayer {
    sink: Arc<LogSink>,
    with_location: bool,
}

impl AppenderLayer {
    #[must_use]
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self {
            sink,
            with_location: true,
        }
    }

    /// Whether to attach the call site as caller data. On by default.
    #[must_use]
    pub fn with_location(mut self, with_location: bool) -> Self {
        self.with_location = with_location;
        self
    }
}

impl<S> Layer<S> for AppenderLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let (message, error) = visitor.finish();

        let mut log_event = LogEvent::new(
            current_millis(),
            Level::from(metadata.level()),
            current_thread_name(),
            message,
        );

        if self.with_location {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                let method = ctx
                    .event_span(event)
                    .map_or(UNKNOWN_METHOD, |span| span.name());
                log_event = log_event.with_caller(CallerFrame::new(
                    metadata.module_path().unwrap_or(metadata.target()),
                    method,
                    file_name(file),
                    line,
                ));
            }
        }

        if let Some(error) = error {
            log_event = log_event.with_error(error);
        }

        self.sink.append(&log_event);
    }
}

fn is_internal(target: &str) -> bool {
    let root = target.split("::").next().unwrap_or(target);
    INTERNAL_TARGETS.contains(&root)
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: String,
    error: Option<ThrownError>,
}

impl EventVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        // Writing into a String cannot fail.
        let _ = write!(self.fields, " {name}={value}");
    }

    fn finish(self) -> (String, Option<ThrownError>) {
        let mut message = self.message;
        message.push_str(&self.fields);
        (message, self.error)
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.error.is_none() {
            self.error = Some(ThrownError::from_error(value));
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
