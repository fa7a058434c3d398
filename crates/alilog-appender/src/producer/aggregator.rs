// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Groups records into packages, one open package per destination.
//!
//! A package is sealed when the next record would push it past the count or
//! byte limit, when it reaches either limit, or when it has been open longer
//! than the package timeout. Time is passed in by the caller.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::ProducerConfig;
use crate::record::LogRecord;

/// Where a package is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub project: String,
    pub logstore: String,
    pub topic: String,
    pub shard_hash: Option<String>,
}

/// A batch of records for one destination, sent in one request.
#[derive(Debug)]
pub struct Package {
    destination: Destination,
    records: Vec<LogRecord>,
    bytes: usize,
    created_at: Instant,
}

impl Package {
    fn new(destination: Destination, created_at: Instant) -> Self {
        Self {
            destination,
            records: Vec::new(),
            bytes: 0,
            created_at,
        }
    }

    fn push(&mut self, record: LogRecord, size: usize) {
        self.bytes += size;
        self.records.push(record);
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Accounted size of all records, as reserved in the memory pool.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug)]
struct Bucket {
    open: Option<Package>,
    last_used: Instant,
}

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct PackageAggregator {
    buckets: HashMap<Destination, Bucket>,
    max_count: usize,
    max_bytes: usize,
    timeout: Duration,
    idle_expiry: Duration,
}

impl PackageAggregator {
    #[must_use]
    pub fn new(config: &ProducerConfig) -> Self {
        Self {
            buckets: HashMap::new(),
            max_count: config.logs_count_per_package.max(1),
            max_bytes: config.logs_bytes_per_package.max(1),
            timeout: Duration::from_millis(config.package_timeout_ms),
            idle_expiry: Duration::from_millis(config.shard_hash_update_interval_ms),
        }
    }

    /// Adds records for `destination` and returns the packages this sealed.
    ///
    /// A single record larger than the byte limit travels alone.
    pub fn add(
        &mut self,
        destination: Destination,
        records: Vec<LogRecord>,
        now: Instant,
    ) -> Vec<Package> {
        let (max_count, max_bytes) = (self.max_count, self.max_bytes);
        let bucket = self
            .buckets
            .entry(destination.clone())
            .or_insert_with(|| Bucket {
                open: None,
                last_used: now,
            });
        bucket.last_used = now;

        let mut sealed = Vec::new();
        for record in records {
            let size = record.approximate_size();

            let would_overflow = bucket.open.as_ref().is_some_and(|open| {
                !open.is_empty()
                    && (open.len() + 1 > max_count || open.bytes + size > max_bytes)
            });
            if would_overflow {
                sealed.extend(bucket.open.take());
            }

            let open = bucket
                .open
                .get_or_insert_with(|| Package::new(destination.clone(), now));
            open.push(record, size);

            if open.len() >= max_count || open.bytes >= max_bytes {
                sealed.extend(bucket.open.take());
            }
        }
        sealed
    }

    /// Seals packages older than the timeout and forgets long idle buckets.
    pub fn expired(&mut self, now: Instant) -> Vec<Package> {
        let timeout = self.timeout;
        let idle_expiry = self.idle_expiry;

        let mut sealed = Vec::new();
        for bucket in self.buckets.values_mut() {
            let is_due = bucket
                .open
                .as_ref()
                .is_some_and(|open| now.saturating_duration_since(open.created_at) >= timeout);
            if is_due {
                sealed.extend(bucket.open.take());
            }
        }

        self.buckets.retain(|_, bucket| {
            bucket.open.is_some() || now.saturating_duration_since(bucket.last_used) < idle_expiry
        });
        sealed
    }

    /// Seals every open package.
    pub fn drain(&mut self) -> Vec<Package> {
        self.buckets
            .values_mut()
            .filter_map(|bucket| bucket.open.take())
            .collect()
    }

    /// Number of destinations currently tracked.
    #[must_use]
    pub fn destination_count(&self) -> usize {
        self.buckets.len()
    }

    /// Records waiting in open packages.
    #[must_use]
    pub fn pending_records(&self) -> usize {
        self.buckets
            .values()
            .filter_map(|bucket| bucket.open.as_ref())
            .map(Package::len)
            .sum()
    }
}
