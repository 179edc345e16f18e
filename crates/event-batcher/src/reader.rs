// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inbound transports. Every line of input is one raw event message.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader, Split, Stdin};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::batcher_service::BatcherHandle;
use crate::config::SourceConfig;
use crate::constants::{RECORD_SEPARATOR, UDP_BUFFER_SIZE};

#[derive(Debug, Clone)]
pub enum MessageSource {
    Stdin,
    Network(SocketAddr),
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Network(addr) => write!(f, "{}", addr),
        }
    }
}

enum MessageReader {
    /// Newline-delimited standard input; ends at EOF.
    Stdin(Split<BufReader<Stdin>>),
    /// One or more newline-delimited messages per datagram; never ends on its own.
    UdpSocket(UdpSocket),
    /// Replays a fixed buffer once, then reports end of input.
    #[cfg(test)]
    MirrorTest(Option<Vec<u8>>),
}

impl MessageReader {
    /// `Ok(None)` means the transport has no more input.
    async fn read(&mut self) -> io::Result<Option<(Vec<u8>, MessageSource)>> {
        match self {
            MessageReader::Stdin(lines) => Ok(lines
                .next_segment()
                .await?
                .map(|line| (line, MessageSource::Stdin))),
            MessageReader::UdpSocket(socket) => {
                let mut buf = vec![0; UDP_BUFFER_SIZE];
                let (amt, src) = socket.recv_from(&mut buf).await?;
                buf.truncate(amt);
                Ok(Some((buf, MessageSource::Network(src))))
            }
            #[cfg(test)]
            MessageReader::MirrorTest(data) => Ok(data
                .take()
                .map(|data| (data, MessageSource::Stdin))),
        }
    }

    fn is_stream(&self) -> bool {
        matches!(self, MessageReader::Stdin(_))
    }
}

/// Reads raw messages from the configured transport and forwards them to the batcher.
pub struct EventReader {
    cancel_token: CancellationToken,
    batcher_handle: BatcherHandle,
    reader: MessageReader,
}

impl EventReader {
    pub async fn new(
        config: &SourceConfig,
        batcher_handle: BatcherHandle,
        cancel_token: CancellationToken,
    ) -> io::Result<EventReader> {
        let reader = match config {
            SourceConfig::Stdin => {
                info!("Reading events from stdin");
                MessageReader::Stdin(BufReader::new(tokio::io::stdin()).split(RECORD_SEPARATOR))
            }
            SourceConfig::Udp { host, port } => {
                let socket = UdpSocket::bind(format!("{host}:{port}")).await?;
                info!("Reading events from udp://{}", socket.local_addr()?);
                MessageReader::UdpSocket(socket)
            }
        };

        Ok(EventReader {
            cancel_token,
            batcher_handle,
            reader,
        })
    }

    /// Bound address of the UDP transport.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.reader {
            MessageReader::UdpSocket(socket) => socket.local_addr().ok(),
            _ => None,
        }
    }

    /// Forwards messages until cancelled or until the transport runs out of input.
    pub async fn spin(mut self) {
        loop {
            let read = tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                read = self.reader.read() => read,
            };
            match read {
                Ok(Some((buf, src))) => self.forward(&buf, &src),
                Ok(None) => {
                    debug!("End of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read events: {e}");
                    if self.reader.is_stream() {
                        break;
                    }
                }
            }
        }
    }

    fn forward(&self, buf: &[u8], src: &MessageSource) {
        for line in buf.split(|b| *b == RECORD_SEPARATOR) {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            trace!("Received {} bytes from {src}", line.len());
            if let Err(e) = self.batcher_handle.ingest(line.to_vec()) {
                error!("Failed to send event to batcher: {e}");
                return;
            }
        }
    }
}
