// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-message pipeline: decode, redact, append, and cut the batch when it is due.
//!
//! The processor owns its batch exclusively and is driven by one caller at a time.
//! Concurrent producers go through [`crate::batcher_service::BatcherService`].

use std::sync::Arc;

use tracing::{debug, error};

use crate::batch::{should_flush, Batch};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::constants::RECORD_SEPARATOR;
use crate::errors::DropReason;
use crate::event::Event;
use crate::namer;
use crate::redact;

/// A named batch ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedBatch {
    pub path: String,
    pub payload: Vec<u8>,
    pub records: usize,
}

/// Receives flushed batches. Implementations must not block: the batch counts as sent
/// once `hand_off` returns.
pub trait Handoff {
    fn hand_off(&mut self, batch: FlushedBatch);
}

impl Handoff for Vec<FlushedBatch> {
    fn hand_off(&mut self, batch: FlushedBatch) {
        self.push(batch);
    }
}

/// Outcome of a message that was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// Appended; the batch is not due yet.
    Buffered,
    /// Appended, and the batch was handed off under this path.
    Flushed(String),
}

pub struct BatchProcessor<H, C = SystemClock> {
    config: Arc<Config>,
    batch: Batch,
    handoff: H,
    clock: C,
}

impl<H: Handoff> BatchProcessor<H, SystemClock> {
    pub fn new(config: Arc<Config>, handoff: H) -> Self {
        Self::with_clock(config, handoff, SystemClock)
    }
}

impl<H: Handoff, C: Clock> BatchProcessor<H, C> {
    pub fn with_clock(config: Arc<Config>, handoff: H, clock: C) -> Self {
        let batch = Batch::new(clock.now());
        BatchProcessor {
            config,
            batch,
            handoff,
            clock,
        }
    }

    /// Runs one raw message through the pipeline.
    ///
    /// A dropped message leaves the batch untouched.
    pub fn process(&mut self, raw: &[u8]) -> Result<Processed, DropReason> {
        let record = match self.prepare(raw) {
            Ok(record) => record,
            Err(e) => {
                error!("Dropping message: {e}");
                return Err(e);
            }
        };

        match record {
            Some(encoded) => self.batch.append(&encoded),
            None => self.batch.append(raw),
        }

        let now = self.clock.now();
        if should_flush(
            self.batch.byte_count(),
            self.batch.started_at(),
            &self.config,
            now,
        ) {
            return Ok(Processed::Flushed(self.cut()));
        }
        Ok(Processed::Buffered)
    }

    /// Hands off whatever is buffered. Returns the batch path, or `None` when there was
    /// nothing to flush.
    pub fn drain(&mut self) -> Option<String> {
        if self.batch.is_empty() {
            return None;
        }
        Some(self.cut())
    }

    #[must_use]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    #[must_use]
    pub fn handoff(&self) -> &H {
        &self.handoff
    }

    pub fn handoff_mut(&mut self) -> &mut H {
        &mut self.handoff
    }

    pub fn into_handoff(self) -> H {
        self.handoff
    }

    /// Decodes and redacts. `Ok(None)` means the raw bytes can be stored as received.
    fn prepare(&self, raw: &[u8]) -> Result<Option<Vec<u8>>, DropReason> {
        let mut event = Event::decode(raw)?;
        let changed = redact::redact(&mut event, &self.config);
        // multi-line input would break the JSON Lines framing
        if changed || raw.contains(&RECORD_SEPARATOR) {
            return event.encode().map(Some);
        }
        Ok(None)
    }

    fn cut(&mut self) -> String {
        let path = namer::new_path(&self.config.base_path_prefix, self.clock.wall());
        let records = self.batch.records();
        let payload = self.batch.take_bytes();
        debug!(
            "Flushing batch of {records} records ({} bytes) to {path}",
            payload.len()
        );
        self.handoff.hand_off(FlushedBatch {
            path: path.clone(),
            payload,
            records,
        });
        self.batch.reset(self.clock.now());
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tracing_test::traced_test;

    #[derive(Clone)]
    struct ManualClock {
        now: Arc<Mutex<Instant>>,
        wall: DateTime<Utc>,
    }

    impl ManualClock {
        fn new() -> Self {
            ManualClock {
                now: Arc::new(Mutex::new(Instant::now())),
                wall: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        fn wall(&self) -> DateTime<Utc> {
            self.wall
        }
    }

    fn processor(
        config: Config,
    ) -> (BatchProcessor<Vec<FlushedBatch>, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let processor = BatchProcessor::with_clock(Arc::new(config), Vec::new(), clock.clone());
        (processor, clock)
    }

    fn config(max_batch_bytes: u64, max_batch_age_secs: f64, redaction_enabled: bool) -> Config {
        Config {
            max_batch_bytes,
            max_batch_age_secs,
            redaction_enabled,
            base_path_prefix: "cyberprobe".to_string(),
        }
    }

    /// A 101-byte record with an unknown action, stored as-is.
    fn record_of_101_bytes() -> Vec<u8> {
        let prefix = br#"{"action":"dns_message","pad":""#;
        let suffix = br#""}"#;
        let pad = 101 - prefix.len() - suffix.len();
        let mut record = prefix.to_vec();
        record.extend(std::iter::repeat(b'x').take(pad));
        record.extend_from_slice(suffix);
        assert_eq!(record.len(), 101);
        record
    }

    #[test]
    fn test_record_over_size_threshold_flushes_and_resets() {
        let (mut p, _) = processor(config(100, 9999.0, false));
        let record = record_of_101_bytes();

        let path = match p.process(&record).expect("record dropped") {
            Processed::Flushed(path) => path,
            Processed::Buffered => panic!("expected a flush"),
        };
        assert!(path.starts_with("cyberprobe/2024-05-01/12-30/"));
        assert!(p.batch().is_empty());
        assert_eq!(p.batch().byte_count(), 0);

        let flushed = p.handoff();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].path, path);
        assert_eq!(flushed[0].records, 1);
        let mut expected = record.clone();
        expected.push(b'\n');
        assert_eq!(flushed[0].payload, expected);
    }

    #[test]
    fn test_record_at_size_threshold_does_not_flush() {
        let (mut p, _) = processor(config(101, 9999.0, false));
        assert_eq!(p.process(&record_of_101_bytes()).unwrap(), Processed::Buffered);
        assert_eq!(p.batch().byte_count(), 101);
        assert!(p.handoff().is_empty());
    }

    #[test]
    fn test_age_threshold_flushes_on_next_message() {
        let (mut p, clock) = processor(config(999_999, 1.0, false));
        let record = br#"{"action":"x"}"#;
        assert_eq!(record.len(), 14);

        assert_eq!(p.process(record).unwrap(), Processed::Buffered);
        clock.advance(Duration::from_millis(1100));
        assert!(should_flush(
            p.batch().byte_count(),
            p.batch().started_at(),
            &config(999_999, 1.0, false),
            clock.now()
        ));

        assert!(matches!(p.process(record).unwrap(), Processed::Flushed(_)));
        assert_eq!(p.handoff()[0].records, 2);
        assert_eq!(p.batch().started_at(), clock.now());
    }

    #[test]
    fn test_redacted_record_is_re_encoded() {
        let (mut p, _) = processor(config(999_999, 9999.0, true));
        p.process(br#"{"action":"icmp","icmp":{"payload":"abcd"}}"#)
            .unwrap();
        assert_eq!(
            p.batch().bytes(),
            b"{\"action\":\"icmp\",\"icmp\":{\"payload\":\"\"}}\n"
        );
    }

    #[test]
    fn test_unchanged_record_is_stored_verbatim() {
        let (mut p, _) = processor(config(999_999, 9999.0, false));
        let raw = br#"{ "icmp": {"payload": "abcd"}, "action": "icmp" }"#;
        p.process(raw).unwrap();
        let mut expected = raw.to_vec();
        expected.push(b'\n');
        assert_eq!(p.batch().bytes(), expected.as_slice());
    }

    #[test]
    fn test_multi_line_record_is_compacted() {
        let (mut p, _) = processor(config(999_999, 9999.0, false));
        p.process(b"{\n  \"action\": \"dns_message\"\n}").unwrap();
        assert_eq!(p.batch().bytes(), b"{\"action\":\"dns_message\"}\n");
    }

    #[test]
    fn test_unrecognised_stream_length_recorded_without_redaction() {
        let (mut p, _) = processor(config(999_999, 9999.0, false));
        p.process(br#"{"action":"unrecognised_stream","unrecognised_stream":{"payload":"abcd"}}"#)
            .unwrap();
        let stored: serde_json::Value =
            serde_json::from_slice(p.batch().bytes().strip_suffix(b"\n").unwrap()).unwrap();
        assert_eq!(
            stored,
            serde_json::json!({
                "action": "unrecognised_stream",
                "unrecognised_stream": {"payload": "abcd", "payload_b64_length": 4}
            })
        );
    }

    #[test]
    #[traced_test]
    fn test_malformed_message_leaves_batch_untouched() {
        let (mut p, clock) = processor(config(999_999, 0.5, false));
        p.process(br#"{"action":"x"}"#).unwrap();
        let before_start = p.batch().started_at();
        clock.advance(Duration::from_secs(10));

        let result = p.process(b"not json");

        // the batch is overdue, but a dropped message never evaluates the trigger
        assert!(matches!(result, Err(DropReason::Decode(_))));
        assert_eq!(p.batch().byte_count(), 14);
        assert_eq!(p.batch().records(), 1);
        assert_eq!(p.batch().started_at(), before_start);
        assert!(p.handoff().is_empty());
        assert!(logs_contain("Dropping message"));
    }

    #[test]
    fn test_schema_violation_is_dropped() {
        let (mut p, _) = processor(config(999_999, 9999.0, true));
        let result = p.process(br#"{"action":"smtp_data","smtp_data":{"data":[1,2]}}"#);
        assert!(matches!(result, Err(DropReason::Schema { .. })));
        assert!(p.batch().is_empty());
    }

    #[test]
    fn test_drain_hands_off_partial_batch_once() {
        let (mut p, _) = processor(config(999_999, 9999.0, false));
        assert_eq!(p.drain(), None);
        p.process(br#"{"action":"x"}"#).unwrap();
        let path = p.drain().expect("partial batch not drained");
        assert_eq!(p.drain(), None);
        let flushed = p.into_handoff();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].path, path);
        assert_eq!(flushed[0].payload, b"{\"action\":\"x\"}\n");
    }
}
