//! Bounded replay buffer.
//!
//! A fixed-capacity FIFO used to keep the most recent events of a given
//! kind per browsing context so late subscribers can be replayed into.
//! Evicted elements can be observed through an optional callback.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked for each element evicted past capacity.
type EvictionCallback<T> = Box<dyn Fn(&T) + Send>;

// ============================================================================
// Buffer
// ============================================================================

/// A FIFO buffer with a fixed capacity.
///
/// Pushing past capacity evicts the oldest entries, invoking the eviction
/// callback (if any) for each one.
pub struct Buffer<T> {
    capacity: usize,
    entries: VecDeque<T>,
    on_evict: Option<EvictionCallback<T>>,
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<T> Buffer<T> {
    /// Creates a buffer with the given capacity and no eviction callback.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            on_evict: None,
        }
    }

    /// Creates a buffer that invokes `on_evict` for each evicted element.
    #[must_use]
    pub fn with_eviction(capacity: usize, on_evict: impl Fn(&T) + Send + 'static) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            on_evict: Some(Box::new(on_evict)),
        }
    }

    /// Appends a value, evicting the oldest entries past capacity.
    pub fn push(&mut self, value: T) {
        self.entries.push_back(value);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front()
                && let Some(on_evict) = &self.on_evict
            {
                on_evict(&evicted);
            }
        }
    }

    /// Iterates over the buffered entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Returns the number of buffered entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the buffer holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configured capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// Tests
// ============================================================================
