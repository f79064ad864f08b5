//! Ingestion Queue
//!
//! Blocking, closable FIFO between request handlers (producers) and cache
//! writers (consumers).
//!
//! # Design
//!
//! - One mutex guards both the items and the closed flag, so the "empty and
//!   open" predicate is always evaluated atomically
//! - Every state change wakes all waiters; waiters re-check the predicate in
//!   a loop, so spurious or stolen wakeups are harmless
//! - Closing stops intake but never drops what is already queued

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::record::Food;

#[derive(Default)]
struct QueueState {
    items: VecDeque<Food>,
    closed: bool,
}

/// Pending records awaiting persistence
#[derive(Default)]
pub struct IngestionQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl IngestionQueue {
    /// Create an open, empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue one record. Returns `false` if the queue is closed.
    pub fn submit(&self, food: Food) -> bool {
        let mut state = self.state.lock();
        let accepted = !state.closed;
        if accepted {
            state.items.push_back(food);
        }
        drop(state);
        self.available.notify_all();
        accepted
    }

    /// Enqueue a batch, preserving its order. Returns the number accepted
    /// (zero if the queue is closed).
    pub fn submit_all<I>(&self, foods: I) -> usize
    where
        I: IntoIterator<Item = Food>,
    {
        let mut state = self.state.lock();
        let accepted = if state.closed {
            0
        } else {
            let before = state.items.len();
            state.items.extend(foods);
            state.items.len() - before
        };
        drop(state);
        self.available.notify_all();
        accepted
    }

    /// Block until a record is available.
    ///
    /// Returns `None` once the queue is closed and fully drained; the caller
    /// should then stop consuming.
    pub fn next_pending(&self) -> Option<Food> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.closed {
            self.available.wait(&mut state);
        }
        state.items.pop_front()
    }

    /// Stop accepting submissions and wake every waiting consumer
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
