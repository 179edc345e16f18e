// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time sources for batch ageing and naming.

use chrono::{DateTime, Utc};
use std::time::Instant;

pub trait Clock: Send {
    /// Monotonic time, used for batch age.
    fn now(&self) -> Instant;
    /// Wall-clock time, used for batch paths.
    fn wall(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
