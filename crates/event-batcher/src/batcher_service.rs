// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::processor::BatchProcessor;
use crate::sink::{Sink, Uploader};

#[derive(Debug)]
pub enum BatcherCommand {
    Ingest(Vec<u8>),
    Flush(oneshot::Sender<Option<String>>),
    Shutdown,
}

#[derive(Clone)]
pub struct BatcherHandle {
    tx: mpsc::UnboundedSender<BatcherCommand>,
}

impl BatcherHandle {
    pub fn ingest(&self, raw: Vec<u8>) -> Result<(), mpsc::error::SendError<BatcherCommand>> {
        self.tx.send(BatcherCommand::Ingest(raw))
    }

    /// Hands off the current batch regardless of thresholds. Resolves to the batch path,
    /// or `None` when the batch was empty.
    pub async fn flush(&self) -> Result<Option<String>, String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(BatcherCommand::Flush(response_tx))
            .map_err(|e| format!("Failed to send flush command: {}", e))?;

        response_rx
            .await
            .map_err(|e| format!("Failed to receive flush response: {}", e))
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<BatcherCommand>> {
        self.tx.send(BatcherCommand::Shutdown)
    }
}

pub struct BatcherService {
    processor: BatchProcessor<Uploader>,
    rx: mpsc::UnboundedReceiver<BatcherCommand>,
}

impl BatcherService {
    pub fn new(config: Arc<Config>, sink: Arc<dyn Sink>) -> (Self, BatcherHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let processor = BatchProcessor::new(config, Uploader::new(sink));

        let service = Self { processor, rx };

        let handle = BatcherHandle { tx };

        (service, handle)
    }

    /// Processes commands in arrival order until shutdown or until every handle is
    /// dropped, then drains the partial batch and waits for in-flight uploads.
    pub async fn run(mut self) {
        debug!("Batcher service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                BatcherCommand::Ingest(raw) => {
                    // drops are logged by the processor
                    let _ = self.processor.process(&raw);
                }

                BatcherCommand::Flush(response_tx) => {
                    let path = self.processor.drain();
                    if response_tx.send(path).is_err() {
                        error!("Failed to send flush response - receiver dropped");
                    }
                }

                BatcherCommand::Shutdown => {
                    debug!("Batcher service shutting down");
                    break;
                }
            }
        }

        if let Some(path) = self.processor.drain() {
            info!("Flushed partial batch to {path} on shutdown");
        }
        let uploader = self.processor.handoff_mut();
        if uploader.in_flight() > 0 {
            info!("Waiting for {} uploads to finish", uploader.in_flight());
        }
        uploader.wait().await;

        debug!("Batcher service stopped");
    }
}
