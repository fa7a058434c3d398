// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed values of the producer and its HTTP requests.

use std::time::Duration;

/// Name given to every I/O worker thread.
pub(crate) const IO_THREAD_NAME: &str = "alilog-io";

/// Upper bound of the aggregator tick.
pub(crate) const MAX_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Lower bound of the aggregator tick.
pub(crate) const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Delay added per failed attempt before retrying a package.
pub(crate) const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(100);

pub(crate) const API_VERSION: &str = "0.6.0";

pub(crate) const HEADER_PROJECT: &str = "x-log-project";
pub(crate) const HEADER_API_VERSION: &str = "x-log-apiversion";
pub(crate) const HEADER_BODY_RAW_SIZE: &str = "x-log-bodyrawsize";
pub(crate) const HEADER_ACCESS_KEY_ID: &str = "x-log-accesskeyid";
pub(crate) const HEADER_SECURITY_TOKEN: &str = "x-acs-security-token";

pub(crate) const TOPIC_KEY: &str = "__topic__";
pub(crate) const SOURCE_KEY: &str = "__source__";
pub(crate) const LOGS_KEY: &str = "__logs__";
