//! Time-ordered list of pending one-shot events.
//!
//! Events sit in a single list sorted ascending by `fire_at`. Insertion goes
//! after every event with the same timestamp, so events scheduled for the same
//! millisecond fire in the order they were scheduled.

use std::collections::VecDeque;

/// A pending event.
#[derive(Debug)]
pub struct Event<A> {
    /// Earliest scheduler time (ms) the event may fire at.
    pub fire_at: u64,
    /// Earliest audio iteration the event may fire at.
    pub min_iteration: u64,
    /// Payload handed back when the event fires.
    pub action: A,
}

impl<A> Event<A> {
    /// Returns true if both the time and the iteration gate have passed.
    #[inline]
    pub fn is_due(&self, now: u64, iteration: u64) -> bool {
        self.fire_at <= now && self.min_iteration <= iteration
    }
}

/// Ascending event list.
#[derive(Debug)]
pub struct EventQueue<A> {
    events: VecDeque<Event<A>>,
}

impl<A> Default for EventQueue<A> {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }
}

impl<A> EventQueue<A> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event after all events with `fire_at` less than or equal
    /// to its own.
    pub fn schedule(&mut self, fire_at: u64, min_iteration: u64, action: A) {
        let pos = self.events.partition_point(|e| e.fire_at <= fire_at);
        self.events.insert(
            pos,
            Event {
                fire_at,
                min_iteration,
                action,
            },
        );
    }

    /// Removes and returns the head event if it is due.
    ///
    /// Returns `None` as soon as the head fails either gate, even if a later
    /// event would pass.
    pub fn pop_due(&mut self, now: u64, iteration: u64) -> Option<Event<A>> {
        if self.events.front()?.is_due(now, iteration) {
            self.events.pop_front()
        } else {
            None
        }
    }

    /// Timestamp of the earliest pending event.
    pub fn next_fire_at(&self) -> Option<u64> {
        self.events.front().map(|e| e.fire_at)
    }

    /// Keeps only the events for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&A) -> bool) {
        self.events.retain(|e| keep(&e.action));
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pending events in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &Event<A>> {
        self.events.iter()
    }
}
