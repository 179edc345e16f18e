// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::errors::SinkError;
use crate::sink::Sink;
use crate::storage::RetryStrategy;

/// Writes each batch to `{root}/{path}` on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    retry_strategy: RetryStrategy,
}

impl FileStorage {
    pub fn new(root: PathBuf, retry_strategy: RetryStrategy) -> Self {
        FileStorage {
            root,
            retry_strategy,
        }
    }

    /// Resolves `path` under the root. Only plain relative components are accepted.
    pub fn object_path(&self, path: &str) -> Result<PathBuf, SinkError> {
        let relative = Path::new(path);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !plain || relative.as_os_str().is_empty() {
            return Err(SinkError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to write outside storage root: {path}"),
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn write(&self, target: &Path, payload: &[u8]) -> Result<(), SinkError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        // readers never observe a partially written batch
        let mut staging = target.as_os_str().to_owned();
        staging.push(".part");
        let staging = PathBuf::from(staging);
        fs::write(&staging, payload).await?;
        fs::rename(&staging, target).await?;
        Ok(())
    }
}

#[async_trait]
impl Sink for FileStorage {
    async fn upload(&self, path: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        let target = self.object_path(path)?;
        debug!("Writing {} bytes to {}", payload.len(), target.display());
        self.retry_strategy
            .run(path, || self.write(&target, &payload))
            .await
    }
}
