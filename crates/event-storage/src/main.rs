// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use event_batcher::{
    batcher_service::{BatcherHandle, BatcherService},
    config::{Config, SourceConfig, StorageConfig},
    logger::Formatter,
    reader::EventReader,
    storage::build_sink,
};

use tokio_util::sync::CancellationToken;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .event_format(Formatter)
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = Arc::new(Config::from_env());
    let storage_config = StorageConfig::from_env();
    let source_config = SourceConfig::from_env();

    let sink = match build_sink(&storage_config) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Error creating storage sink: {e}");
            return;
        }
    };
    info!(
        "Storing batches via {:?} storage in {}",
        storage_config.platform, storage_config.bucket
    );

    let (service, handle) = BatcherService::new(config, sink);
    let service_task = tokio::spawn(service.run());

    let cancel_token = CancellationToken::new();
    let reader = match EventReader::new(&source_config, handle.clone(), cancel_token.clone()).await
    {
        Ok(reader) => reader,
        Err(e) => {
            error!("Error starting event source: {e}");
            stop(&handle, service_task).await;
            return;
        }
    };
    let mut reader_task = tokio::spawn(reader.spin());

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            cancel_token.cancel();
            if let Err(e) = (&mut reader_task).await {
                error!("Event reader failed: {e}");
            }
        }
        result = &mut reader_task => {
            if let Err(e) = result {
                error!("Event reader failed: {e}");
            }
        }
    }

    stop(&handle, service_task).await;
    info!("Shut down");
}

async fn stop(handle: &BatcherHandle, service_task: tokio::task::JoinHandle<()>) {
    if let Err(e) = handle.shutdown() {
        error!("Failed to send shutdown to batcher: {e}");
    }
    if let Err(e) = service_task.await {
        error!("Batcher service failed: {e}");
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
