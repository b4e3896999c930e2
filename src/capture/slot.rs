//! Write-once slots and the shared arrival counter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::{HttptrapError, Result};

use super::RequestRecord;

/// Single-assignment container holding an eventual [`RequestRecord`].
///
/// Written exactly once by the worker that claimed this slot's index; read,
/// with a bounded wait, by any number of consumer threads.
pub struct Slot {
    index: usize,
    cell: Mutex<Option<RequestRecord>>,
    filled: Condvar,
}

impl Slot {
    /// Create an empty slot for `index`
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            cell: Mutex::new(None),
            filled: Condvar::new(),
        }
    }

    /// Index of this slot
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fill the slot with a record, waking all waiting readers.
    ///
    /// # Errors
    ///
    /// Returns [`HttptrapError::SlotAlreadyFilled`] if the slot already
    /// holds a record. Correct [`ArrivalCounter`] usage makes this
    /// unreachable; it is surfaced rather than swallowed because it means
    /// an index was claimed twice.
    pub fn write(&self, record: RequestRecord) -> Result<()> {
        let mut cell = self.cell.lock().expect("slot mutex poisoned");

        if cell.is_some() {
            return Err(HttptrapError::SlotAlreadyFilled { index: self.index });
        }

        *cell = Some(record);
        drop(cell);
        self.filled.notify_all();
        Ok(())
    }

    /// Block the calling thread until the slot fills or `timeout` elapses.
    ///
    /// Returns `None` on timeout. A filled slot never changes value, so
    /// every successful read observes the same record.
    pub fn read(&self, timeout: Duration) -> Option<RequestRecord> {
        let deadline = std::time::Instant::now() + timeout;
        let mut cell = self.cell.lock().expect("slot mutex poisoned");

        loop {
            if let Some(record) = cell.as_ref() {
                return Some(record.clone());
            }

            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            let (guard, result) = self
                .filled
                .wait_timeout(cell, remaining)
                .expect("slot mutex poisoned");
            cell = guard;

            if result.timed_out() && cell.is_none() {
                return None;
            }
        }
    }

    /// Whether the slot currently holds a record (non-blocking)
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.cell.lock().expect("slot mutex poisoned").is_some()
    }
}

/// Shared monotonic counter assigning each request a unique, gapless index.
///
/// The sole means of ordering concurrent requests into slots; a worker must
/// only write to the slot whose index it obtained from [`ArrivalCounter::next`].
#[derive(Default)]
pub struct ArrivalCounter {
    next: AtomicUsize,
}

impl ArrivalCounter {
    /// Create a counter starting at index 0
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next slot index (0-based, pre-increment value)
    pub fn next(&self) -> usize {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of indices claimed so far
    #[must_use]
    pub fn claimed(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}
