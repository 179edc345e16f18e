// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// 64 MiB, large enough to amortise object-store request overhead.
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 64 * 1024 * 1024;

/// 30 minutes.
pub const DEFAULT_MAX_BATCH_AGE_SECS: f64 = 1800.0;

pub const DEFAULT_BASE_PATH_PREFIX: &str = "cyberprobe";

pub const DEFAULT_BUCKET: &str = "storage";

pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_UPLOAD_ATTEMPTS: u64 = 3;

/// Seconds added to the wait between upload attempts on each retry.
pub const UPLOAD_BACKOFF_STEP_SECS: u64 = 1;

pub const DEFAULT_EVENT_HOST: &str = "0.0.0.0";

pub const DEFAULT_EVENT_PORT: u16 = 9000;

/// Largest UDP payload we accept in a single datagram.
pub const UDP_BUFFER_SIZE: usize = 65_507;

pub const RECORD_SEPARATOR: u8 = b'\n';

pub const CONTENT_TYPE_JSON_LINES: &str = "application/x-ndjson";
