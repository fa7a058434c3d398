// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! YAML file-based configuration.
//!
//! ```yaml
//! project_name: shop
//! endpoint: cn-hangzhou.log.example.com
//! access_key_id: id
//! access_key: secret
//! logstore: app
//! topic: web
//! time_format: "yyyy-MM-dd HH:mm:ss.SSS"
//! time_zone: Asia/Shanghai
//! producer:
//!   package_timeout_ms: 1000
//!   retry_times: 5
//! ```
//!
//! A missing file contributes nothing.

use std::path::PathBuf;

use figment::{
    providers::{Format, Yaml},
    Figment,
};

use crate::config::{
    merge_destination, merge_producer, ConfigError, ConfigSource, DestinationOverrides,
    ProducerOverrides, SinkConfig,
};

/// Key of the nested tuning section.
const PRODUCER_SECTION: &str = "producer";

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct YamlConfigSource {
    pub path: PathBuf,
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut SinkConfig) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Yaml::file(self.path.clone()));

        let destination = figment.extract::<DestinationOverrides>().map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse config from yaml file: {e}"))
        })?;
        let producer = figment
            .focus(PRODUCER_SECTION)
            .extract::<ProducerOverrides>()
            .map_err(|e| {
                ConfigError::ParseError(format!("Failed to parse config from yaml file: {e}"))
            })?;

        merge_destination(config, &destination);
        merge_producer(&mut config.producer, &producer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{ConfigBuilder, EnvConfigSource};

    fn source() -> YamlConfigSource {
        YamlConfigSource {
            path: Path::new("alilog.yaml").to_path_buf(),
        }
    }

    #[test]
    fn test_merge_config_overrides_with_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "alilog.yaml",
                r#"
project_name: "shop"
endpoint: "cn-hangzhou.log.example.com"
access_key_id: "id"
access_key: "secret"
sts_token: "token"
logstore: "app"
topic: "web"
time_format: "yyyy-MM-dd HH:mm:ss.SSS"
time_zone: "Asia/Shanghai"
producer:
  package_timeout_ms: 1000
  logs_count_per_package: 100
  logs_bytes_per_package: 65536
  mem_pool_size_in_bytes: 1048576
  io_threads_count: 2
  shard_hash_update_interval_ms: 60000
  retry_times: 5
  request_timeout_ms: 2000
  use_compression: false
  compression_level: 6
"#,
            )?;

            let mut config = SinkConfig::default();
            source().load(&mut config).expect("Failed to load config");

            assert_eq!(config.project.project_name, "shop");
            assert_eq!(config.project.endpoint, "cn-hangzhou.log.example.com");
            assert_eq!(config.project.access_key_id, "id");
            assert_eq!(config.project.access_key, "secret");
            assert_eq!(config.project.sts_token.as_deref(), Some("token"));
            assert_eq!(config.logstore, "app");
            assert_eq!(config.topic, "web");
            assert_eq!(config.time_format, "yyyy-MM-dd HH:mm:ss.SSS");
            assert_eq!(config.time_zone, "Asia/Shanghai");

            let producer = &config.producer;
            assert_eq!(producer.package_timeout_ms, 1_000);
            assert_eq!(producer.logs_count_per_package, 100);
            assert_eq!(producer.logs_bytes_per_package, 65_536);
            assert_eq!(producer.mem_pool_size_in_bytes, 1_048_576);
            assert_eq!(producer.io_threads_count, 2);
            assert_eq!(producer.shard_hash_update_interval_ms, 60_000);
            assert_eq!(producer.retry_times, 5);
            assert_eq!(producer.request_timeout_ms, 2_000);
            assert!(!producer.use_compression);
            assert_eq!(producer.compression_level, 6);
            Ok(())
        });
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("alilog.yaml", "logstore: \"app\"\n")?;

            let mut config = SinkConfig::default();
            source().load(&mut config).expect("Failed to load config");

            let expected = SinkConfig {
                logstore: "app".to_string(),
                ..SinkConfig::default()
            };
            assert_eq!(config, expected);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_contributes_nothing() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let mut config = SinkConfig::default();
            source().load(&mut config).expect("Failed to load config");
            assert_eq!(config, SinkConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_bad_tuning_value_is_reported() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "alilog.yaml",
                "producer:\n  retry_times: \"often\"\n",
            )?;

            let mut config = SinkConfig::default();
            let result = source().load(&mut config);
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "alilog.yaml",
                "logstore: \"from-yaml\"\ntopic: \"web\"\nproducer:\n  retry_times: 1\n",
            )?;
            jail.set_env("ALILOG_LOGSTORE", "from-env");
            jail.set_env("ALILOG_RETRY_TIMES", "7");

            let config = ConfigBuilder::default()
                .add_source(Box::new(source()))
                .add_source(Box::new(EnvConfigSource))
                .build();

            assert_eq!(config.logstore, "from-env");
            assert_eq!(config.topic, "web");
            assert_eq!(config.producer.retry_times, 7);
            Ok(())
        });
    }
}
