// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Storage sink contract and the fire-and-forget handoff that feeds it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::errors::SinkError;
use crate::processor::{FlushedBatch, Handoff};

/// Durable destination for flushed batches. Implementations own their retry policy.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn upload(&self, path: &str, payload: Vec<u8>) -> Result<(), SinkError>;
}

/// Spawns one upload task per handed-off batch and keeps track of them so shutdown can
/// wait for in-flight uploads.
///
/// Must be used from within a tokio runtime.
pub struct Uploader {
    sink: Arc<dyn Sink>,
    tasks: JoinSet<()>,
}

impl Uploader {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Uploader {
            sink,
            tasks: JoinSet::new(),
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every spawned upload to finish.
    pub async fn wait(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!("Upload task failed: {e}");
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!("Upload task failed: {e}");
            }
        }
    }
}

impl Handoff for Uploader {
    fn hand_off(&mut self, batch: FlushedBatch) {
        self.reap_finished();
        let sink = Arc::clone(&self.sink);
        self.tasks.spawn(async move {
            let FlushedBatch {
                path,
                payload,
                records,
            } = batch;
            let size = payload.len();
            match sink.upload(&path, payload).await {
                Ok(()) => debug!("Uploaded {path}: {records} records, {size} bytes"),
                Err(e) => error!(
                    "Failed to upload {path}: {records} records, {size} bytes dropped: {e}"
                ),
            }
        });
    }
}
