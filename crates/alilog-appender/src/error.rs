// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised by a transport or while building one
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Producer service is no longer running")]
    ChannelClosed,

    #[error("Transport already closed")]
    Shutdown,
}

/// Errors surfaced by the sink lifecycle
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by a configuration source
#[derive(Debug, PartialEq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Unsupported config field: {0}")]
    UnsupportedField(String),
}
