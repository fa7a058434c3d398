// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the sink and its producer.
//!
//! ## Configuration Priority
//!
//! Sources are applied in the following order (later sources override earlier):
//!
//! 1. **Defaults** - Hard-coded defaults in the code
//! 2. **YAML file** - A file handed to [`YamlConfigSource`]
//! 3. **Environment variables** - `ALILOG_*` variables through [`EnvConfigSource`]
//!
//! Whitespace-only strings coming from a file or the environment count as unset.
//! No value is validated here: an empty endpoint or project is only rejected
//! when the producer is built at `start`.

pub mod env;
pub mod yaml;

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, error};

pub use crate::error::ConfigError;
pub use env::EnvConfigSource;
pub use yaml::YamlConfigSource;

use crate::time_format::{DEFAULT_TIME_FORMAT, DEFAULT_TIME_ZONE};

pub const DEFAULT_PACKAGE_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_LOGS_COUNT_PER_PACKAGE: usize = 4_096;
pub const DEFAULT_LOGS_BYTES_PER_PACKAGE: usize = 3 * 1_024 * 1_024;
pub const DEFAULT_MEM_POOL_SIZE_IN_BYTES: usize = 100 * 1_024 * 1_024;
pub const DEFAULT_IO_THREADS_COUNT: usize = 8;
pub const DEFAULT_SHARD_HASH_UPDATE_INTERVAL_MS: u64 = 600_000;
pub const DEFAULT_RETRY_TIMES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Identity and credentials of the destination project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct ProjectConfig {
    pub project_name: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub access_key: String,
    pub sts_token: Option<String>,
}

/// Batching, memory and delivery tuning of the producer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct ProducerConfig {
    /// Age after which a non-empty package is sent.
    pub package_timeout_ms: u64,
    pub logs_count_per_package: usize,
    pub logs_bytes_per_package: usize,
    /// Byte budget for records accepted but not yet sent.
    pub mem_pool_size_in_bytes: usize,
    pub io_threads_count: usize,
    /// Idle time after which an empty destination bucket is forgotten.
    pub shard_hash_update_interval_ms: u64,
    /// Retries after the first attempt.
    pub retry_times: u32,
    pub request_timeout_ms: u64,
    pub use_compression: bool,
    pub compression_level: i32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            package_timeout_ms: DEFAULT_PACKAGE_TIMEOUT_MS,
            logs_count_per_package: DEFAULT_LOGS_COUNT_PER_PACKAGE,
            logs_bytes_per_package: DEFAULT_LOGS_BYTES_PER_PACKAGE,
            mem_pool_size_in_bytes: DEFAULT_MEM_POOL_SIZE_IN_BYTES,
            io_threads_count: DEFAULT_IO_THREADS_COUNT,
            shard_hash_update_interval_ms: DEFAULT_SHARD_HASH_UPDATE_INTERVAL_MS,
            retry_times: DEFAULT_RETRY_TIMES,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            use_compression: true,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Everything a sink needs: destination, tuning and record formatting.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct SinkConfig {
    pub project: ProjectConfig,
    pub logstore: String,
    pub topic: String,
    pub producer: ProducerConfig,
    pub time_format: String,
    pub time_zone: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            logstore: String::new(),
            topic: String::new(),
            producer: ProducerConfig::default(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

#[allow(clippy::module_name_repetitions)]
pub trait ConfigSource {
    fn load(&self, config: &mut SinkConfig) -> Result<(), ConfigError>;
}

#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config: SinkConfig,
}

#[allow(clippy::module_name_repetitions)]
impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(&mut self) -> SinkConfig {
        let mut failed_sources = 0;
        for source in &self.sources {
            if let Err(e) = source.load(&mut self.config) {
                error!("ALILOG | Failed to load config: {}", e);
                failed_sources += 1;
            }
        }

        if !self.sources.is_empty() && failed_sources == self.sources.len() {
            debug!("ALILOG | All sources failed to load config, using default config.");
        }

        self.config.clone()
    }
}

/// Loads defaults, then `path` if given, then the `ALILOG_*` environment.
#[must_use]
pub fn get_config(path: Option<&std::path::Path>) -> SinkConfig {
    let mut builder = ConfigBuilder::default();
    if let Some(path) = path {
        builder = builder.add_source(Box::new(YamlConfigSource {
            path: path.to_path_buf(),
        }));
    }
    builder.add_source(Box::new(EnvConfigSource)).build()
}

/// Tuning overrides read by the file and environment sources.
#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
pub(crate) struct ProducerOverrides {
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) package_timeout_ms: Option<u64>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) logs_count_per_package: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) logs_bytes_per_package: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) mem_pool_size_in_bytes: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) io_threads_count: Option<usize>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) shard_hash_update_interval_ms: Option<u64>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) retry_times: Option<u32>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) request_timeout_ms: Option<u64>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) use_compression: Option<bool>,
    #[serde(deserialize_with = "deserialize_optional_parsed")]
    pub(crate) compression_level: Option<i32>,
}

#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
pub(crate) struct DestinationOverrides {
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) project_name: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) endpoint: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) access_key_id: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) access_key: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) sts_token: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) logstore: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) topic: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) time_format: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub(crate) time_zone: Option<String>,
}

macro_rules! merge_value {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$source.$field {
                $target.$field.clone_from(value);
            }
        )+
    };
}

pub(crate) fn merge_destination(config: &mut SinkConfig, source: &DestinationOverrides) {
    merge_value!(
        config.project,
        source,
        project_name,
        endpoint,
        access_key_id,
        access_key,
    );
    if source.sts_token.is_some() {
        config.project.sts_token.clone_from(&source.sts_token);
    }
    merge_value!(config, source, logstore, topic, time_format, time_zone);
}

pub(crate) fn merge_producer(config: &mut ProducerConfig, source: &ProducerOverrides) {
    merge_value!(
        config,
        source,
        package_timeout_ms,
        logs_count_per_package,
        logs_bytes_per_package,
        mem_pool_size_in_bytes,
        io_threads_count,
        shard_hash_update_interval_ms,
        retry_times,
        request_timeout_ms,
        use_compression,
        compression_level,
    );
}

/// Accepts strings, numbers and booleans as text. Blank strings are unset.
pub fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Null => Ok(None),
        other => {
            error!(
                "ALILOG | Failed to parse value, expected a string, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}

/// Parses numbers and booleans given either natively or as text.
///
/// Blank text is unset. Anything that does not parse is an error.
pub fn deserialize_optional_parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let text = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return Err(de::Error::custom(format!(
                "expected a number or boolean, got: {other}"
            )))
        }
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<T>()
        .map(Some)
        .map_err(|e| de::Error::custom(format!("invalid value '{text}': {e}")))
}
