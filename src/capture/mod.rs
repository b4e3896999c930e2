//! Capture core: slots, arrival ordering and the lazy capture sequence
//!
//! Hands request snapshots from server worker tasks to a test-code consumer
//! that reads them lazily, in arrival order, with a bounded wait per item.

mod sequence;
mod slot;

pub use sequence::{CaptureSequence, Requests};
pub use slot::{ArrivalCounter, Slot};

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Fully materialized snapshot of an inbound request.
///
/// Immutable once constructed; the body is drained and decoded as text
/// before the record is built, so no streams are held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRecord {
    /// HTTP method
    pub method: String,
    /// Request path (no query string)
    pub path: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Decoded query parameters
    pub query: HashMap<String, String>,
    /// Request body decoded as UTF-8 text
    pub body: String,
}

/// Lazily materialized pool of slots indexed 0..∞.
///
/// A slot comes into existence the first time either side touches its index:
/// the producer that claimed it from the [`ArrivalCounter`], or a consumer
/// waiting for it to fill.
#[derive(Default)]
pub struct SlotPool {
    slots: DashMap<usize, Arc<Slot>>,
}

impl SlotPool {
    /// Create an empty pool
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or allocate the slot for `index`
    pub fn slot(&self, index: usize) -> Arc<Slot> {
        self.slots
            .entry(index)
            .or_insert_with(|| Arc::new(Slot::new(index)))
            .clone()
    }

    /// Number of slots materialized so far
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }
}
