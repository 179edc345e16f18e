// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON Lines batch accumulation and the size/age flush decision.

use std::time::Instant;

use crate::config::Config;
use crate::constants::RECORD_SEPARATOR;

/// Append-only JSON Lines buffer for one batch.
///
/// `byte_count` sums record lengths without separators and is what gets compared to
/// the size threshold. It is zero exactly when the buffer is empty.
#[derive(Debug, Clone)]
pub struct Batch {
    bytes: Vec<u8>,
    byte_count: u64,
    records: usize,
    started_at: Instant,
}

impl Batch {
    #[must_use]
    pub fn new(started_at: Instant) -> Self {
        Batch {
            bytes: Vec::new(),
            byte_count: 0,
            records: 0,
            started_at,
        }
    }

    /// Appends one record and its separator. A single large record may push the batch
    /// well past the size threshold. Empty records are ignored.
    pub fn append(&mut self, record: &[u8]) {
        if record.is_empty() {
            return;
        }
        self.bytes.reserve(record.len() + 1);
        self.bytes.extend_from_slice(record);
        self.bytes.push(RECORD_SEPARATOR);
        self.byte_count += record.len() as u64;
        self.records += 1;
    }

    /// Moves the accumulated bytes out, leaving the buffer empty. Callers follow up
    /// with [`Batch::reset`].
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    pub fn reset(&mut self, now: Instant) {
        self.bytes.clear();
        self.byte_count = 0;
        self.records = 0;
        self.started_at = now;
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Whether a batch must be flushed now: strictly over the byte threshold, or strictly
/// older than the age threshold. Equality on either side does not fire.
#[must_use]
pub fn should_flush(byte_count: u64, started_at: Instant, config: &Config, now: Instant) -> bool {
    let age = now.saturating_duration_since(started_at).as_secs_f64();
    byte_count > config.max_batch_bytes || age > config.max_batch_age_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn config(max_batch_bytes: u64, max_batch_age_secs: f64) -> Config {
        Config {
            max_batch_bytes,
            max_batch_age_secs,
            ..Config::default()
        }
    }

    #[test]
    fn test_append_adds_separator_but_counts_record_only() {
        let mut batch = Batch::new(Instant::now());
        batch.append(br#"{"action":"icmp"}"#);
        batch.append(b"{}");
        assert_eq!(batch.bytes(), b"{\"action\":\"icmp\"}\n{}\n");
        assert_eq!(batch.byte_count(), 19);
        assert_eq!(batch.records(), 2);
    }

    #[test]
    fn test_empty_record_is_ignored() {
        let mut batch = Batch::new(Instant::now());
        batch.append(b"");
        assert!(batch.is_empty());
        assert_eq!(batch.byte_count(), 0);
        assert_eq!(batch.records(), 0);

        batch.append(b"{}");
        batch.append(b"");
        assert_eq!(batch.bytes(), b"{}\n");
        assert_eq!(batch.records(), 1);
    }

    #[test]
    fn test_reset_empties_and_restarts() {
        let start = Instant::now();
        let mut batch = Batch::new(start);
        batch.append(b"record");
        let later = start + Duration::from_secs(5);
        batch.reset(later);
        assert!(batch.is_empty());
        assert_eq!(batch.byte_count(), 0);
        assert_eq!(batch.records(), 0);
        assert_eq!(batch.started_at(), later);
    }

    #[test]
    fn test_take_bytes_moves_contents() {
        let mut batch = Batch::new(Instant::now());
        batch.append(b"abc");
        assert_eq!(batch.take_bytes(), b"abc\n");
        assert!(batch.bytes().is_empty());
    }

    #[test]
    fn test_flush_on_size() {
        let start = Instant::now();
        let cfg = config(100, 9999.0);
        assert!(!should_flush(100, start, &cfg, start));
        assert!(should_flush(101, start, &cfg, start));
    }

    #[test]
    fn test_flush_on_age() {
        let start = Instant::now();
        let cfg = config(999_999, 1.0);
        assert!(!should_flush(10, start, &cfg, start + Duration::from_secs(1)));
        assert!(should_flush(10, start, &cfg, start + Duration::from_millis(1100)));
    }

    #[test]
    fn test_clock_going_backwards_is_age_zero() {
        let start = Instant::now() + Duration::from_secs(10);
        let cfg = config(100, 1.0);
        assert!(!should_flush(0, start, &cfg, Instant::now()));
    }

    proptest! {
        #[test]
        fn prop_byte_count_matches_records(records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)) {
            let mut batch = Batch::new(Instant::now());
            for record in &records {
                batch.append(record);
            }
            let expected: u64 = records.iter().map(|r| r.len() as u64).sum();
            let kept = records.iter().filter(|r| !r.is_empty()).count();
            prop_assert_eq!(batch.byte_count(), expected);
            prop_assert_eq!(batch.records(), kept);
            prop_assert_eq!(batch.bytes().len() as u64, expected + kept as u64);
            prop_assert_eq!(batch.byte_count() == 0, batch.is_empty());
        }

        #[test]
        fn prop_flush_iff_a_threshold_is_exceeded(
            count in 0u64..2_000,
            max_bytes in 1u64..2_000,
            age_secs in 0u64..4_000,
            max_age_secs in 1u64..4_000,
        ) {
            let start = Instant::now();
            let now = start + Duration::from_secs(age_secs);
            let cfg = config(max_bytes, max_age_secs as f64);
            let expected = count > max_bytes || age_secs > max_age_secs;
            prop_assert_eq!(should_flush(count, start, &cfg, now), expected);
        }
    }
}
