//! Lazy, order-preserving view over captured requests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use super::{RequestRecord, SlotPool};

/// Consumer state shared by every iterator over one sequence
#[derive(Default)]
struct SequenceState {
    /// Records observed so far, in slot order
    seen: Vec<RequestRecord>,
    /// Set when a read timed out; the sequence never produces again
    terminated: bool,
}

/// Lazy, order-preserving, timeout-bounded view over all capture slots.
///
/// Reading element *i* blocks up to the per-element timeout waiting for slot
/// *i* to fill. Once observed, elements are cached, so re-traversing an
/// already-read prefix never blocks. The first read that times out
/// terminates the sequence permanently: later-arriving requests will not
/// revive it, and a fresh recording endpoint is required to start over.
pub struct CaptureSequence {
    pool: Arc<SlotPool>,
    default_timeout: Duration,
    state: Mutex<SequenceState>,
}

impl CaptureSequence {
    /// Create a sequence over `pool` with the given default per-element wait
    #[must_use]
    pub fn new(pool: Arc<SlotPool>, default_timeout: Duration) -> Self {
        Self {
            pool,
            default_timeout,
            state: Mutex::new(SequenceState::default()),
        }
    }

    /// Iterate captured requests using the default per-element timeout
    pub fn elements(&self) -> Requests<'_> {
        self.elements_with_timeout(self.default_timeout)
    }

    /// Iterate captured requests with a per-element timeout override
    pub fn elements_with_timeout(&self, timeout: Duration) -> Requests<'_> {
        Requests {
            sequence: self,
            timeout,
            cursor: 0,
        }
    }

    /// Whether a timed-out read has terminated the sequence
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.lock().expect("sequence mutex poisoned").terminated
    }

    /// Pull element `cursor`, consulting the cache before blocking
    fn pull(&self, cursor: usize, timeout: Duration) -> Option<RequestRecord> {
        {
            let state = self.state.lock().expect("sequence mutex poisoned");
            if cursor < state.seen.len() {
                return Some(state.seen[cursor].clone());
            }
            if state.terminated {
                return None;
            }
        }

        // Block outside the state lock so concurrent iterators over the
        // cached prefix are not held up by this wait.
        let slot = self.pool.slot(cursor);
        let outcome = slot.read(timeout);

        let mut state = self.state.lock().expect("sequence mutex poisoned");

        // Another iterator may have advanced the cache (or terminated the
        // sequence) while we were waiting; shared state wins.
        if cursor < state.seen.len() {
            return Some(state.seen[cursor].clone());
        }
        if state.terminated {
            return None;
        }

        match outcome {
            Some(record) => {
                debug_assert_eq!(state.seen.len(), cursor);
                state.seen.push(record.clone());
                Some(record)
            }
            None => {
                debug!("capture sequence terminated at index {}", cursor);
                state.terminated = true;
                None
            }
        }
    }
}

/// Iterator over a [`CaptureSequence`]
pub struct Requests<'a> {
    sequence: &'a CaptureSequence,
    timeout: Duration,
    cursor: usize,
}

impl Iterator for Requests<'_> {
    type Item = RequestRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.sequence.pull(self.cursor, self.timeout)?;
        self.cursor += 1;
        Some(record)
    }
}
