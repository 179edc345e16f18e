// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Startup configuration read from the process environment.
//!
//! Every value is resolved once. Malformed values never fail startup: they are logged
//! and replaced by the documented default.

use std::env;
use std::time::Duration;

use tracing::{info, warn};

use crate::constants::{
    DEFAULT_BASE_PATH_PREFIX, DEFAULT_BUCKET, DEFAULT_EVENT_HOST, DEFAULT_EVENT_PORT,
    DEFAULT_MAX_BATCH_AGE_SECS, DEFAULT_MAX_BATCH_BYTES, DEFAULT_UPLOAD_ATTEMPTS,
    DEFAULT_UPLOAD_TIMEOUT_SECS,
};

/// Batching and redaction parameters shared by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// A batch is flushed once its record bytes exceed this value.
    pub max_batch_bytes: u64,
    /// A batch is flushed once it is older than this many seconds.
    pub max_batch_age_secs: f64,
    /// Clear payload fields before storing records.
    pub redaction_enabled: bool,
    /// First component of every batch path.
    pub base_path_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_batch_age_secs: DEFAULT_MAX_BATCH_AGE_SECS,
            redaction_enabled: false,
            base_path_prefix: DEFAULT_BASE_PATH_PREFIX.to_string(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves the configuration through `lookup`, which maps a variable name to its
    /// raw value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_batch_bytes = match lookup("MAX_BATCH") {
            Some(raw) => parse_max_batch(&raw).unwrap_or_else(|| {
                warn!("Couldn't parse MAX_BATCH: {raw} :using default {DEFAULT_MAX_BATCH_BYTES}");
                DEFAULT_MAX_BATCH_BYTES
            }),
            None => DEFAULT_MAX_BATCH_BYTES,
        };
        info!("max batch set to: {max_batch_bytes}");

        let max_batch_age_secs = match lookup("MAX_TIME") {
            Some(raw) => parse_max_time(&raw).unwrap_or_else(|| {
                warn!("Couldn't parse MAX_TIME: {raw} :using default {DEFAULT_MAX_BATCH_AGE_SECS}");
                DEFAULT_MAX_BATCH_AGE_SECS
            }),
            None => DEFAULT_MAX_BATCH_AGE_SECS,
        };
        info!("max time set to: {max_batch_age_secs}");

        // an empty prefix would make every batch path absolute
        let base_path_prefix = match lookup("STORAGE_BASEDIR") {
            Some(raw) if raw.trim_matches('/').is_empty() => {
                warn!("Couldn't use STORAGE_BASEDIR: {raw:?} :using default {DEFAULT_BASE_PATH_PREFIX}");
                DEFAULT_BASE_PATH_PREFIX.to_string()
            }
            Some(raw) => raw,
            None => DEFAULT_BASE_PATH_PREFIX.to_string(),
        };

        Config {
            max_batch_bytes,
            max_batch_age_secs,
            redaction_enabled: lookup("STRIP_PAYLOAD").is_some_and(|val| val == "true"),
            base_path_prefix,
        }
    }
}

/// Parses a byte count with an optional `K` or `M` suffix (case-insensitive).
///
/// Quotes and spaces anywhere in the value are ignored. Returns `None` when the value
/// is not a positive integer or the suffix multiplication overflows.
///
/// ```
/// use event_batcher::config::parse_max_batch;
///
/// assert_eq!(parse_max_batch("64M"), Some(64 * 1024 * 1024));
/// assert_eq!(parse_max_batch("\"10 k\""), Some(10 * 1024));
/// assert_eq!(parse_max_batch("lots"), None);
/// ```
#[must_use]
pub fn parse_max_batch(raw: &str) -> Option<u64> {
    let upper = raw.replace('"', "").to_uppercase();
    let (digits, multiplier) = if upper.contains('M') {
        (upper.replace('M', ""), 1024 * 1024)
    } else if upper.contains('K') {
        (upper.replace('K', ""), 1024)
    } else {
        (upper, 1)
    };
    let digits = digits.replace(' ', "");

    let value: u64 = digits.trim().parse().ok()?;
    if value == 0 {
        return None;
    }
    value.checked_mul(multiplier)
}

/// Parses a positive, finite number of seconds. Quotes and spaces are ignored.
#[must_use]
pub fn parse_max_time(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(['"', ' '], "");
    let value: f64 = cleaned.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Where flushed batches are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Local filesystem rooted at the bucket directory.
    Local,
    /// HTTP object store accepting `PUT {endpoint}/{bucket}/{path}`.
    Http,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub platform: Platform,
    pub endpoint: Option<String>,
    pub bucket: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub attempts: u64,
    pub https_proxy: Option<String>,
}

impl StorageConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let platform = match lookup("PLATFORM").map(|val| val.to_lowercase()).as_deref() {
            None | Some("") | Some("local") => Platform::Local,
            Some("http") => Platform::Http,
            Some(other) => {
                warn!("Unknown PLATFORM: {other} :using local storage");
                Platform::Local
            }
        };

        let timeout_secs = parse_positive(&lookup, "STORAGE_TIMEOUT", DEFAULT_UPLOAD_TIMEOUT_SECS);
        let attempts = parse_positive(&lookup, "STORAGE_RETRIES", DEFAULT_UPLOAD_ATTEMPTS);

        StorageConfig {
            platform,
            endpoint: lookup("STORAGE_ENDPOINT").filter(|val| !val.is_empty()),
            bucket: lookup("STORAGE_BUCKET")
                .filter(|val| !val.is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            token: lookup("STORAGE_TOKEN").filter(|val| !val.is_empty()),
            timeout: Duration::from_secs(timeout_secs),
            attempts,
            https_proxy: lookup("HTTPS_PROXY").filter(|val| !val.is_empty()),
        }
    }
}

fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                warn!("Couldn't parse {key}: {raw} :using default {default}");
                default
            }
        },
        None => default,
    }
}

/// Where inbound messages are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// One JSON record per line on standard input.
    Stdin,
    /// One JSON record per line of each received datagram.
    Udp { host: String, port: u16 },
}

impl SourceConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("EVENT_SOURCE").map(|val| val.to_lowercase()).as_deref() {
            Some("udp") => SourceConfig::Udp {
                host: lookup("EVENT_HOST").unwrap_or_else(|| DEFAULT_EVENT_HOST.to_string()),
                port: lookup("EVENT_PORT")
                    .and_then(|port| port.parse::<u16>().ok())
                    .unwrap_or(DEFAULT_EVENT_PORT),
            },
            None | Some("") | Some("stdin") => SourceConfig::Stdin,
            Some(other) => {
                warn!("Unknown EVENT_SOURCE: {other} :reading from stdin");
                SourceConfig::Stdin
            }
        }
    }
}
