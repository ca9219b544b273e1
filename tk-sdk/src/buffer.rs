//! Bounded FIFO of matched events awaiting transmission.
//!
//! `push` never blocks on its own; the sensor facade in
//! [`crate::sensor`] is responsible for performing the synchronous inline
//! flush `push` asks for when a cap is reached.

use std::collections::{BTreeMap, VecDeque};

use tk_core::identity::{EntityIdType, EventId, Timestamp};

/// Caps governing the buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferCaps {
    pub max_count: usize,
    pub max_event_bytes: usize,
    pub max_total_bytes: usize,
}

impl Default for BufferCaps {
    fn default() -> Self {
        Self {
            max_count: 128,
            max_event_bytes: 1024 * 1024,
            max_total_bytes: 128 * 1024 * 1024,
        }
    }
}

/// A matched event queued for `ReportEvents`.
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub event_id: EventId,
    pub client_timestamp: Timestamp,
    pub payload: serde_json::Value,
    pub metadata: BTreeMap<String, String>,
    bytes: usize,
}

/// Returned by [`EventBuffer::push`]; tells the caller whether a cap was
/// reached and an inline flush is now required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    CapReached,
}

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("event of {size} bytes exceeds the per-event cap of {cap} bytes")]
    EventTooLarge { size: usize, cap: usize },
}

#[derive(Debug)]
pub struct EventBuffer {
    caps: BufferCaps,
    events: VecDeque<BufferedEvent>,
    total_bytes: usize,
}

impl EventBuffer {
    pub fn new(caps: BufferCaps) -> Self {
        Self { caps, events: VecDeque::new(), total_bytes: 0 }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append a matched record as a pending event. An event that alone
    /// exceeds the per-event byte cap is rejected outright; it could never
    /// be flushed and would otherwise wedge the buffer permanently.
    pub fn push(
        &mut self,
        client_timestamp: Timestamp,
        payload: serde_json::Value,
        metadata: BTreeMap<String, String>,
    ) -> Result<PushOutcome, BufferError> {
        let bytes = serde_json::to_vec(&payload).map(|v| v.len()).unwrap_or(0);
        if bytes > self.caps.max_event_bytes {
            return Err(BufferError::EventTooLarge { size: bytes, cap: self.caps.max_event_bytes });
        }

        self.events.push_back(BufferedEvent {
            event_id: EventId::now_v7(),
            client_timestamp,
            payload,
            metadata,
            bytes,
        });
        self.total_bytes += bytes;

        let cap_reached = self.events.len() >= self.caps.max_count
            || self.total_bytes >= self.caps.max_total_bytes;
        Ok(if cap_reached { PushOutcome::CapReached } else { PushOutcome::Buffered })
    }

    /// Drain every buffered event, for transmission by the caller. The
    /// buffer is empty afterward regardless of whether the send succeeds;
    /// the caller is responsible for re-queuing on a retryable failure.
    pub fn drain(&mut self) -> Vec<BufferedEvent> {
        self.total_bytes = 0;
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_reports_buffered_below_caps() {
        let mut buf = EventBuffer::new(BufferCaps::default());
        let outcome = buf.push(chrono::Utc::now(), serde_json::json!({"a": 1}), BTreeMap::new()).unwrap();
        assert_eq!(outcome, PushOutcome::Buffered);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn push_reports_cap_reached_at_count_limit() {
        let mut buf = EventBuffer::new(BufferCaps { max_count: 2, ..BufferCaps::default() });
        assert_eq!(
            buf.push(chrono::Utc::now(), serde_json::json!(1), BTreeMap::new()).unwrap(),
            PushOutcome::Buffered
        );
        assert_eq!(
            buf.push(chrono::Utc::now(), serde_json::json!(2), BTreeMap::new()).unwrap(),
            PushOutcome::CapReached
        );
    }

    #[test]
    fn oversized_event_is_rejected() {
        let mut buf = EventBuffer::new(BufferCaps { max_event_bytes: 4, ..BufferCaps::default() });
        let err = buf
            .push(chrono::Utc::now(), serde_json::json!("way too long a string"), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, BufferError::EventTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_empties_the_buffer_and_resets_byte_total() {
        let mut buf = EventBuffer::new(BufferCaps::default());
        buf.push(chrono::Utc::now(), serde_json::json!(1), BTreeMap::new()).unwrap();
        buf.push(chrono::Utc::now(), serde_json::json!(2), BTreeMap::new()).unwrap();
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert!(buf.is_empty());
    }
}
