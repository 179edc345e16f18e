// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage path for a batch: `{prefix}/{YYYY-MM-DD}/{HH-MM}/{id}`, in UTC.
///
/// The random `id` keeps batches cut within the same minute apart.
#[must_use]
pub fn name_path(base_path_prefix: &str, now: DateTime<Utc>, id: Uuid) -> String {
    format!(
        "{}/{}/{}",
        base_path_prefix.trim_end_matches('/'),
        now.format("%Y-%m-%d/%H-%M"),
        id.hyphenated()
    )
}

/// [`name_path`] with a freshly generated v4 identifier.
#[must_use]
pub fn new_path(base_path_prefix: &str, now: DateTime<Utc>) -> String {
    name_path(base_path_prefix, now, Uuid::new_v4())
}
