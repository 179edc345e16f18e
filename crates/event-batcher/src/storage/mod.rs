// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Concrete storage sinks and their shared retry policy.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::{Platform, StorageConfig};
use crate::constants::UPLOAD_BACKOFF_STEP_SECS;
use crate::errors::{Creation, SinkError};
use crate::sink::Sink;

pub mod file;
pub mod http;

pub use file::FileStorage;
pub use http::HttpStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Up to this many attempts, back to back.
    Immediate(u64),
    /// Up to `attempts` attempts, waiting `step_secs * n` seconds after the n-th failure.
    LinearBackoff(u64, u64),
}

impl RetryStrategy {
    #[must_use]
    pub fn attempts(&self) -> u64 {
        match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                (*attempts).max(1)
            }
        }
    }

    #[must_use]
    pub fn delay_after(&self, failed_attempts: u64) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::LinearBackoff(_, step_secs) => {
                Duration::from_secs(step_secs.saturating_mul(failed_attempts))
            }
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts run out.
    pub async fn run<F, Fut>(&self, path: &str, mut op: F) -> Result<(), SinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), SinkError>>,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) if attempt >= attempts => {
                    return Err(SinkError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "Upload of {path} failed (attempt {attempt}/{attempts}), retrying in {}s: {e}",
                        delay.as_secs()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Builds the sink selected by `config.platform`.
pub fn build_sink(config: &StorageConfig) -> Result<Arc<dyn Sink>, Creation> {
    let retry_strategy = RetryStrategy::LinearBackoff(config.attempts, UPLOAD_BACKOFF_STEP_SECS);
    match config.platform {
        Platform::Local => Ok(Arc::new(FileStorage::new(
            PathBuf::from(&config.bucket),
            retry_strategy,
        ))),
        Platform::Http => {
            let endpoint = config.endpoint.as_deref().ok_or(Creation::MissingEndpoint)?;
            Ok(Arc::new(HttpStorage::new(
                http::HttpStorageConfig {
                    endpoint: endpoint.to_string(),
                    bucket: config.bucket.clone(),
                    token: config.token.clone(),
                    timeout: config.timeout,
                    https_proxy: config.https_proxy.clone(),
                },
                retry_strategy,
            )?))
        }
    }
}
