// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inbound log events as handed over by the logging framework.
//!
//! A [`LogEvent`] carries everything the translator needs to build one
//! [`LogRecord`](crate::record::LogRecord): the millisecond timestamp, level,
//! originating thread, the already formatted message, optional caller frames
//! and an optional attached error.
//!
//! Only errors whose details were actually captured are represented as a
//! [`ThrownError`]. An error that was merely recorded as text is part of the
//! message and never shows up in [`LogEvent::error`].

use std::error::Error;
use std::fmt::{self, Write as _};
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of a log event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// One frame of call-site information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerFrame {
    pub class_name: String,
    pub method_name: String,
    pub file_name: String,
    pub line_number: u32,
}

impl CallerFrame {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        file_name: impl Into<String>,
        line_number: u32,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_name: file_name.into(),
            line_number,
        }
    }
}

/// `Class.method(File:Line)`
impl fmt::Display for CallerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({}:{})",
            self.class_name, self.method_name, self.file_name, self.line_number
        )
    }
}

/// A materialized error attached to a log event.
///
/// The summary line follows the `type: message` convention. Frames are
/// free-form lines (one per stack frame) and `cause` links the error chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrownError {
    pub type_name: Option<String>,
    pub message: Option<String>,
    pub frames: Vec<String>,
    pub cause: Option<Box<ThrownError>>,
}

impl ThrownError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            type_name: Some(type_name.into()),
            message: (!message.is_empty()).then_some(message),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Captures a concrete error, including its type name and `source()` chain.
    pub fn of<E: Error + 'static>(err: &E) -> Self {
        let mut thrown = Self::from_error(err);
        thrown.type_name = Some(std::any::type_name::<E>().to_string());
        thrown
    }

    /// Captures a type-erased error and its `source()` chain.
    ///
    /// The type of a `dyn Error` is not known, so only the message is kept.
    /// A `Display` implementation that fails leaves the message unset.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        Self {
            type_name: None,
            message: display_to_string(err),
            frames: Vec::new(),
            cause: err.source().map(|source| Box::new(Self::from_error(source))),
        }
    }

    #[must_use]
    pub fn with_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frames.extend(frames.into_iter().map(Into::into));
        self
    }

    /// Appends the frames of a captured backtrace. Nothing is added when the
    /// backtrace was disabled or unsupported.
    #[must_use]
    pub fn with_backtrace(mut self, backtrace: &std::backtrace::Backtrace) -> Self {
        if backtrace.status() != std::backtrace::BacktraceStatus::Captured {
            return self;
        }
        let rendered = backtrace.to_string();
        self.frames.extend(
            rendered
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| line.strip_prefix("at ").unwrap_or(line).to_string()),
        );
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: ThrownError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The one-line `type: message` form.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.type_name, &self.message) {
            (Some(type_name), Some(message)) => format!("{type_name}: {message}"),
            (Some(type_name), None) => type_name.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "error".to_string(),
        }
    }
}

fn display_to_string(value: &dyn fmt::Display) -> Option<String> {
    let mut out = String::new();
    match write!(out, "{value}") {
        Ok(()) if !out.is_empty() => Some(out),
        _ => None,
    }
}

/// One log line emitted by the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_millis: i64,
    pub level: Level,
    pub thread_name: String,
    pub message: String,
    /// Call-site frames, innermost first. Empty when caller data was not captured.
    pub caller: Vec<CallerFrame>,
    pub error: Option<ThrownError>,
}

impl LogEvent {
    pub fn new(
        timestamp_millis: i64,
        level: Level,
        thread_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_millis,
            level,
            thread_name: thread_name.into(),
            message: message.into(),
            caller: Vec::new(),
            error: None,
        }
    }

    /// Builds an event stamped with the current wall clock and thread.
    pub fn now(level: Level, message: impl Into<String>) -> Self {
        Self::new(current_millis(), level, current_thread_name(), message)
    }

    #[must_use]
    pub fn with_caller(mut self, frame: CallerFrame) -> Self {
        self.caller.push(frame);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ThrownError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Milliseconds since the Unix epoch; negative before it.
#[must_use]
pub fn current_millis() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}

/// Name of the calling thread, or its id when the thread is unnamed.
#[must_use]
pub fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk unplugged")
        }
    }

    impl Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("write failed")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    impl Error for Broken {}

    #[test]
    fn level_displays_uppercase() {
        assert_eq!(Level::Info.to_string(), "INFO");
        assert_eq!(Level::from(&tracing::Level::WARN), Level::Warn);
    }

    #[test]
    fn caller_frame_display() {
        let frame = CallerFrame::new("app::server", "handle", "server.rs", 42);
        assert_eq!(frame.to_string(), "app::server.handle(server.rs:42)");
    }

    #[test]
    fn summary_variants() {
        assert_eq!(
            ThrownError::new("IllegalStateException", "bad state").summary(),
            "IllegalStateException: bad state"
        );
        assert_eq!(ThrownError::new("Timeout", "").summary(), "Timeout");
        let untyped = ThrownError {
            type_name: None,
            message: Some("boom".to_string()),
            frames: vec![],
            cause: None,
        };
        assert_eq!(untyped.summary(), "boom");
    }

    #[test]
    fn of_captures_type_and_chain() {
        let thrown = ThrownError::of(&Outer(Inner));
        assert!(thrown
            .type_name
            .as_deref()
            .is_some_and(|name| name.ends_with("Outer")));
        assert_eq!(thrown.message.as_deref(), Some("write failed"));
        let cause = thrown.cause.expect("cause captured");
        assert_eq!(cause.message.as_deref(), Some("disk unplugged"));
        assert!(cause.cause.is_none());
    }

    #[test]
    fn failing_display_leaves_message_unset() {
        let thrown = ThrownError::from_error(&Broken);
        assert_eq!(thrown.message, None);
        assert_eq!(thrown.summary(), "error");
    }

    #[test]
    fn builders_accumulate() {
        let event = LogEvent::new(1, Level::Debug, "main", "hi")
            .with_caller(CallerFrame::new("a", "b", "c.rs", 1))
            .with_error(ThrownError::new("E", "m").with_frames(["f1", "f2"]));
        assert_eq!(event.caller.len(), 1);
        assert_eq!(event.error.map(|e| e.frames.len()), Some(2));
    }

    #[test]
    fn now_uses_current_thread() {
        let handle = std::thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(|| LogEvent::now(Level::Info, "x"))
            .expect("spawn");
        let event = handle.join().expect("join");
        assert_eq!(event.thread_name, "worker-7");
        assert!(event.timestamp_millis > 0);
    }
}
