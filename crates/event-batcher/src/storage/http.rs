// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP object-store sink: one `PUT {endpoint}/{bucket}/{path}` per batch.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use tracing::debug;

use crate::constants::CONTENT_TYPE_JSON_LINES;
use crate::errors::{Creation, SinkError};
use crate::sink::Sink;
use crate::storage::RetryStrategy;

#[derive(Debug, Clone)]
pub struct HttpStorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub https_proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: reqwest::Client,
    bucket_url: String,
    retry_strategy: RetryStrategy,
}

impl HttpStorage {
    pub fn new(config: HttpStorageConfig, retry_strategy: RetryStrategy) -> Result<Self, Creation> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| Creation::InvalidEndpoint {
            url: config.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(Creation::InvalidEndpoint {
                url: config.endpoint,
                reason: "scheme must be http or https".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(CONTENT_TYPE_JSON_LINES),
        );
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                Creation::InvalidEndpoint {
                    url: config.endpoint.clone(),
                    reason: "storage token is not a valid header value".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers);
        if let Some(proxy) = &config.https_proxy {
            builder = builder.proxy(reqwest::Proxy::https(proxy)?);
        }

        Ok(HttpStorage {
            client: builder.build()?,
            bucket_url: format!(
                "{}/{}",
                config.endpoint.trim_end_matches('/'),
                config.bucket.trim_matches('/')
            ),
            retry_strategy,
        })
    }

    #[must_use]
    pub fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.bucket_url, path.trim_start_matches('/'))
    }

    async fn put(&self, url: &str, payload: Bytes) -> Result<(), SinkError> {
        let resp = self.client.put(url).body(payload).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(SinkError::Status {
            status,
            body: resp.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Sink for HttpStorage {
    async fn upload(&self, path: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        let url = self.object_url(path);
        debug!("PUT {url} ({} bytes)", payload.len());
        // attempts share one buffer
        let payload = Bytes::from(payload);
        self.retry_strategy
            .run(path, || self.put(&url, payload.clone()))
            .await
    }
}
