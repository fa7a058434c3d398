// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Maps a [`LogEvent`] onto a [`LogRecord`].
//!
//! Translation is pure and infallible: every event yields exactly one record
//! with the fields `time, level, thread, location, message` in that order.

use std::fmt;

use crate::event::{LogEvent, ThrownError};
use crate::record::{
    LogRecord, LEVEL_FIELD, LOCATION_FIELD, MESSAGE_FIELD, THREAD_FIELD, TIME_FIELD,
};
use crate::time_format::TimeFormatter;

#[must_use]
pub fn translate(event: &LogEvent, formatter: &TimeFormatter) -> LogRecord {
    // Integer division truncates toward zero.
    let timestamp_seconds = event.timestamp_millis / 1000;

    let fields = vec![
        (
            TIME_FIELD.to_string(),
            formatter.format_millis(event.timestamp_millis),
        ),
        (LEVEL_FIELD.to_string(), event.level.to_string()),
        (THREAD_FIELD.to_string(), event.thread_name.clone()),
        (LOCATION_FIELD.to_string(), location(event)),
        (MESSAGE_FIELD.to_string(), message(event)),
    ];

    LogRecord::new(timestamp_seconds, fields)
}

fn location(event: &LogEvent) -> String {
    event
        .caller
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn message(event: &LogEvent) -> String {
    let Some(error) = &event.error else {
        return event.message.clone();
    };

    let mut message = if event.message.trim().is_empty() {
        error.summary()
    } else {
        event.message.clone()
    };
    message.push_str(&stack_trace(error));
    message
}

/// Renders the error, its frames and its cause chain. Falls back to the
/// summary line when rendering fails part way.
#[must_use]
pub fn stack_trace(error: &ThrownError) -> String {
    let mut out = String::new();
    match write_stack_trace(&mut out, error) {
        Ok(()) => out,
        Err(_) => error.summary(),
    }
}

fn write_stack_trace(out: &mut impl fmt::Write, error: &ThrownError) -> fmt::Result {
    writeln!(out, "{}", error.summary())?;
    write_frames(out, error)?;

    let mut cause = error.cause.as_deref();
    while let Some(current) = cause {
        writeln!(out, "Caused by: {}", current.summary())?;
        write_frames(out, current)?;
        cause = current.cause.as_deref();
    }
    Ok(())
}

fn write_frames(out: &mut impl fmt::Write, error: &ThrownError) -> fmt::Result {
    for frame in &error.frames {
        writeln!(out, "\tat {frame}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CallerFrame, Level};
    use proptest::prelude::*;

    const MILLIS: i64 = 1_676_000_000_500;

    fn bad_state() -> ThrownError {
        ThrownError::new("java.lang.IllegalStateException", "bad state").with_frames([
            "com.example.Service.run(Service.java:10)",
            "java.lang.Thread.run(Thread.java:750)",
        ])
    }

    #[test]
    fn plain_event_scenario() {
        let event = LogEvent::new(MILLIS, Level::Info, "main", "ready");
        let record = translate(&event, &TimeFormatter::default());

        assert_eq!(record.timestamp_seconds(), 1_676_000_000);
        assert_eq!(
            record.fields(),
            &[
                ("time".to_string(), "2023-02-10T03:33+0000".to_string()),
                ("level".to_string(), "INFO".to_string()),
                ("thread".to_string(), "main".to_string()),
                ("location".to_string(), String::new()),
                ("message".to_string(), "ready".to_string()),
            ]
        );
    }

    #[test]
    fn empty_message_with_error_uses_summary_then_trace() {
        let event = LogEvent::new(MILLIS, Level::Error, "main", "").with_error(bad_state());
        let record = translate(&event, &TimeFormatter::default());
        let message = record.get(MESSAGE_FIELD).expect("message field");

        assert!(message.starts_with("java.lang.IllegalStateException: bad state"));
        assert_eq!(
            message,
            "java.lang.IllegalStateException: bad state\
             java.lang.IllegalStateException: bad state\n\
             \tat com.example.Service.run(Service.java:10)\n\
             \tat java.lang.Thread.run(Thread.java:750)\n"
        );
        assert!(message.lines().count() > 1);
    }

    #[test]
    fn blank_message_counts_as_empty() {
        let event = LogEvent::new(MILLIS, Level::Error, "main", "   ")
            .with_error(ThrownError::new("Timeout", ""));
        let record = translate(&event, &TimeFormatter::default());
        assert_eq!(record.get(MESSAGE_FIELD), Some("TimeoutTimeout\n"));
    }

    #[test]
    fn message_with_error_appends_trace_without_summary_prefix() {
        let error = bad_state();
        let event = LogEvent::new(MILLIS, Level::Warn, "main", "request failed").with_error(error.clone());
        let record = translate(&event, &TimeFormatter::default());
        assert_eq!(
            record.get(MESSAGE_FIELD),
            Some(format!("request failed{}", stack_trace(&error)).as_str())
        );
    }

    #[test]
    fn cause_chain_is_rendered() {
        let error = ThrownError::new("WriteError", "write failed")
            .with_frames(["store.rs:10"])
            .with_cause(ThrownError::new("IoError", "disk unplugged").with_frames(["fs.rs:3"]));
        assert_eq!(
            stack_trace(&error),
            "WriteError: write failed\n\tat store.rs:10\nCaused by: IoError: disk unplugged\n\tat fs.rs:3\n"
        );
    }

    #[test]
    fn location_uses_first_caller_frame() {
        let event = LogEvent::new(MILLIS, Level::Info, "main", "hi")
            .with_caller(CallerFrame::new("app::db", "connect", "db.rs", 88))
            .with_caller(CallerFrame::new("app::main", "main", "main.rs", 3));
        let record = translate(&event, &TimeFormatter::default());
        assert_eq!(record.get(LOCATION_FIELD), Some("app::db.connect(db.rs:88)"));
    }

    #[test]
    fn time_field_follows_formatter() {
        let event = LogEvent::new(MILLIS, Level::Info, "main", "hi");
        let formatter = TimeFormatter::new("HH:mm:ss.SSS z", "Asia/Tokyo");
        let record = translate(&event, &formatter);
        assert_eq!(record.get(TIME_FIELD), Some("12:33:20.500 JST"));
    }

    fn any_level() -> impl Strategy<Value = Level> {
        prop_oneof![
            Just(Level::Trace),
            Just(Level::Debug),
            Just(Level::Info),
            Just(Level::Warn),
            Just(Level::Error),
        ]
    }

    proptest! {
        #[test]
        fn timestamp_is_floor_of_millis(millis in 0i64..=4_102_444_800_000) {
            let event = LogEvent::new(millis, Level::Info, "t", "m");
            let record = translate(&event, &TimeFormatter::default());
            prop_assert_eq!(record.timestamp_seconds(), millis.div_euclid(1000));
        }

        #[test]
        fn field_order_is_fixed(
            millis in 0i64..=4_102_444_800_000,
            level in any_level(),
            thread in ".{0,16}",
            message in ".{0,64}",
            with_error in any::<bool>(),
        ) {
            let mut event = LogEvent::new(millis, level, thread.clone(), message.clone());
            if with_error {
                event = event.with_error(ThrownError::new("E", "boom"));
            }
            let record = translate(&event, &TimeFormatter::default());
            prop_assert_eq!(
                record.field_names().collect::<Vec<_>>(),
                vec!["time", "level", "thread", "location", "message"]
            );
            prop_assert_eq!(record.get(THREAD_FIELD), Some(thread.as_str()));
            if !with_error {
                prop_assert_eq!(record.get(MESSAGE_FIELD), Some(message.as_str()));
            }
        }
    }
}
