// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Redaction and size/age batching of event records bound for object storage.
//!
//! Records arrive one at a time as raw JSON, are optionally stripped of large payload
//! fields, appended to a JSON Lines batch and handed to a storage sink once the batch
//! grows past its byte threshold or outlives its age threshold.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod batcher_service;
pub mod clock;
pub mod config;
pub mod constants;
pub mod errors;
pub mod event;
pub mod logger;
pub mod namer;
pub mod processor;
pub mod reader;
pub mod redact;
pub mod sink;
pub mod storage;
