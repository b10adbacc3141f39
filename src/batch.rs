//! Sealed batches handed from the batcher to the dispatcher pool.

use crate::destination::DestinationKey;
use crate::event::Event;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// A non-empty, ordered sequence of events sharing one destination key.
///
/// Sealed the moment it enters the dispatcher's ready queue - no further
/// appends happen after construction.
pub struct Batch<M = ()> {
    pub id: u64,
    pub destination: DestinationKey,
    pub events: Vec<Event<M>>,
    pub created_at: Instant,
}

impl<M> Batch<M> {
    /// Seal a batch of events that all share `destination`.
    ///
    /// # Panics
    /// Panics if `events` is empty - a batch is never created without at
    /// least one event (the batcher only seals open batches it has
    /// appended to).
    pub fn seal(destination: DestinationKey, events: Vec<Event<M>>, created_at: Instant) -> Self {
        assert!(!events.is_empty(), "a batch must contain at least one event");
        Self {
            id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
            destination,
            events,
            created_at,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
