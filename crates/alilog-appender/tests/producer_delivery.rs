// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

use alilog_appender::config::{ProducerConfig, ProjectConfig};
use alilog_appender::{LogProducer, LogRecord, Transport};
use mockito::{Matcher, Server};

fn project(server: &Server) -> ProjectConfig {
    ProjectConfig {
        project_name: "shop".to_string(),
        endpoint: server.url(),
        access_key_id: "key-id".to_string(),
        access_key: "secret".to_string(),
        sts_token: None,
    }
}

fn config() -> ProducerConfig {
    ProducerConfig {
        package_timeout_ms: 60_000,
        io_threads_count: 2,
        retry_times: 2,
        request_timeout_ms: 2_000,
        use_compression: false,
        ..ProducerConfig::default()
    }
}

fn record(message: &str) -> LogRecord {
    LogRecord::new(
        1_676_000_000,
        vec![
            ("level".to_string(), "INFO".to_string()),
            ("message".to_string(), message.to_string()),
        ],
    )
}

fn wait_until(deadline: Duration, done: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    done()
}

#[test]
fn flush_delivers_everything_buffered_in_one_package() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .match_header("x-log-project", "shop")
        .match_header("x-log-apiversion", "0.6.0")
        .match_header("x-log-accesskeyid", "key-id")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(serde_json::json!({"__topic__": "web", "__source__": ""})),
            Matcher::Regex(r#""message":"one".*"message":"two".*"message":"three""#.to_string()),
        ]))
        .with_status(200)
        .expect(1)
        .create();

    let producer = LogProducer::new(project(&server), config()).expect("producer");
    for message in ["one", "two", "three"] {
        producer.send("shop", "app", "web", None, vec![record(message)]);
    }
    producer.flush().expect("flush");

    mock.assert();
    assert_eq!(producer.pending_bytes(), 0);
    producer.close().expect("close");
}

#[test]
fn package_timeout_sends_without_flush() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .with_status(200)
        .expect(1)
        .create();

    let config = ProducerConfig {
        package_timeout_ms: 50,
        ..config()
    };
    let producer = LogProducer::new(project(&server), config).expect("producer");
    producer.send("shop", "app", "", None, vec![record("tick")]);

    assert!(wait_until(Duration::from_secs(5), || mock.matched()));
    producer.close().expect("close");
    mock.assert();
}

#[test]
fn count_limit_splits_packages() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .with_status(200)
        .expect(3)
        .create();

    let config = ProducerConfig {
        logs_count_per_package: 2,
        ..config()
    };
    let producer = LogProducer::new(project(&server), config).expect("producer");
    let records: Vec<_> = (0..5).map(|i| record(&i.to_string())).collect();
    producer.send("shop", "app", "", None, records);
    producer.flush().expect("flush");

    mock.assert();
    producer.close().expect("close");
}

#[test]
fn server_errors_are_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .with_status(500)
        .expect(3)
        .create();

    let producer = LogProducer::new(project(&server), config()).expect("producer");
    producer.send("shop", "app", "", None, vec![record("retry me")]);
    producer.flush().expect("flush");

    mock.assert();
    assert_eq!(producer.pending_bytes(), 0);
    producer.close().expect("close");
}

#[test]
fn client_errors_are_not_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .with_status(400)
        .expect(1)
        .create();

    let producer = LogProducer::new(project(&server), config()).expect("producer");
    producer.send("shop", "app", "", None, vec![record("bad")]);
    producer.flush().expect("flush");

    mock.assert();
    producer.close().expect("close");
}

#[test]
fn compressed_body_carries_raw_size() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .match_header("content-encoding", "zstd")
        .match_header("x-log-bodyrawsize", Matcher::Regex(r"^\d+$".to_string()))
        .with_status(200)
        .expect(1)
        .create();

    let config = ProducerConfig {
        use_compression: true,
        ..config()
    };
    let producer = LogProducer::new(project(&server), config).expect("producer");
    producer.send("shop", "app", "", None, vec![record("squeeze")]);
    producer.flush().expect("flush");

    mock.assert();
    producer.close().expect("close");
}

#[test]
fn shard_hash_routes_by_key() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/route")
        .match_query(Matcher::UrlEncoded("key".to_string(), "abc".to_string()))
        .with_status(200)
        .expect(1)
        .create();

    let producer = LogProducer::new(project(&server), config()).expect("producer");
    producer.send("shop", "app", "", Some("abc"), vec![record("routed")]);
    producer.flush().expect("flush");

    mock.assert();
    producer.close().expect("close");
}

#[test]
fn close_delivers_pending_records() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/logstores/app/shards/lb")
        .with_status(200)
        .expect(1)
        .create();

    let producer = LogProducer::new(project(&server), config()).expect("producer");
    producer.send("shop", "app", "", None, vec![record("last words")]);
    producer.close().expect("close");

    mock.assert();
}
