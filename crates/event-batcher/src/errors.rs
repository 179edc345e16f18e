// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for record processing and storage uploads.

use reqwest::StatusCode;

/// Why a single inbound message was dropped. None of these stop the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DropReason {
    #[error("couldn't decode event: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("event field {field} has unexpected type: {reason}")]
    Schema { field: String, reason: &'static str },
    #[error("couldn't encode redacted event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure reported by a storage sink for one upload.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request to storage failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage rejected upload with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("couldn't write batch: {0}")]
    Io(#[from] std::io::Error),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u64,
        #[source]
        last: Box<SinkError>,
    },
}

impl SinkError {
    /// Permanent failures are not worth another attempt.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            SinkError::Status { status, .. } => {
                status.is_client_error()
                    && *status != StatusCode::REQUEST_TIMEOUT
                    && *status != StatusCode::TOO_MANY_REQUESTS
            }
            SinkError::Request(e) => e.is_builder(),
            SinkError::Io(_) => false,
            SinkError::Exhausted { .. } => true,
        }
    }
}

/// Failure to build a sink at startup.
#[derive(Debug, thiserror::Error)]
pub enum Creation {
    #[error("storage endpoint is required for the http platform")]
    MissingEndpoint,
    #[error("invalid storage endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("couldn't build http client: {0}")]
    Client(#[from] reqwest::Error),
}
