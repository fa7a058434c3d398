// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `ALILOG_*` environment variables.
//!
//! Every field maps to `ALILOG_<FIELD>` in upper case, tuning fields included
//! (`ALILOG_PACKAGE_TIMEOUT_MS`, `ALILOG_RETRY_TIMES`, ...).

use figment::{providers::Env, Figment};

use crate::config::{
    merge_destination, merge_producer, ConfigError, ConfigSource, DestinationOverrides,
    ProducerOverrides, SinkConfig,
};

pub const ENV_PREFIX: &str = "ALILOG_";

#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut SinkConfig) -> Result<(), ConfigError> {
        let env = Env::prefixed(ENV_PREFIX);

        let destination = destination_overrides(&env);
        let producer = Figment::new()
            .merge(env)
            .extract::<ProducerOverrides>()
            .map_err(|e| {
                ConfigError::ParseError(format!("Failed to parse config from environment: {e}"))
            })?;

        merge_destination(config, &destination);
        merge_producer(&mut config.producer, &producer);
        Ok(())
    }
}

/// Text fields taken from the raw variable values, so `007` stays `007`.
fn destination_overrides(env: &Env) -> DestinationOverrides {
    let mut overrides = DestinationOverrides::default();
    for (key, value) in env.iter() {
        if value.trim().is_empty() {
            continue;
        }
        let slot = match key.as_str().to_ascii_lowercase().as_str() {
            "project_name" => &mut overrides.project_name,
            "endpoint" => &mut overrides.endpoint,
            "access_key_id" => &mut overrides.access_key_id,
            "access_key" => &mut overrides.access_key,
            "sts_token" => &mut overrides.sts_token,
            "logstore" => &mut overrides.logstore,
            "topic" => &mut overrides.topic,
            "time_format" => &mut overrides.time_format,
            "time_zone" => &mut overrides.time_zone,
            _ => continue,
        };
        *slot = Some(value);
    }
    overrides
}
