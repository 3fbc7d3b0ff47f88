//! Port storage and the cross-thread handles into it.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::event_buffer::{EventBuffer, EventBufferFull};
use crate::urid::Urid;

use super::instance::InstanceId;

/// Stable reference to a port: owning instance plus descriptor index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// Owning instance.
    pub instance: InstanceId,
    /// Index in the plugin's descriptor.
    pub index: u32,
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance, self.index)
    }
}

/// Shared handle to a control port's value.
///
/// The value is an `f32` stored as bits in an `AtomicU32`: the control thread
/// writes, the render reads wait-free.
#[derive(Clone, Debug)]
pub struct ControlValue {
    bits: Arc<AtomicU32>,
    min: f32,
    max: f32,
}

impl ControlValue {
    /// Creates a value over `[min, max]`, normalized with [`control_range()`].
    /// A NaN default falls back to 0 clamped into the range.
    pub(crate) fn new(default: f32, min: f32, max: f32) -> Self {
        let (min, max) = control_range(min, max);
        let default = if default.is_nan() { 0.0 } else { default };
        Self {
            bits: Arc::new(AtomicU32::new(default.clamp(min, max).to_bits())),
            min,
            max,
        }
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Stores `value` clamped to the port range and returns what was stored.
    /// NaN is ignored.
    pub fn set(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.get();
        }
        let v = value.clamp(self.min, self.max);
        self.bits.store(v.to_bits(), Ordering::Relaxed);
        v
    }

    /// Port range as `(min, max)`.
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

/// Orders a control range so it can be clamped to: a NaN bound becomes
/// unbounded on its side and reversed bounds are swapped.
pub(crate) fn control_range(min: f32, max: f32) -> (f32, f32) {
    let min = if min.is_nan() { f32::NEG_INFINITY } else { min };
    let max = if max.is_nan() { f32::INFINITY } else { max };
    if min > max { (max, min) } else { (min, max) }
}

/// Shared handle to an event input's pending-message queue.
#[derive(Clone, Debug)]
pub struct EventQueue {
    pending: Arc<Mutex<EventBuffer>>,
}

impl EventQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(EventBuffer::new(capacity))),
        }
    }

    /// Appends a message for the owning instance's next render.
    pub fn push(&self, kind: Urid, body: &[u8]) -> Result<(), EventBufferFull> {
        self.pending.lock().write(0, kind, body)
    }

    /// Number of messages waiting.
    pub fn pending(&self) -> usize {
        self.pending.lock().event_count()
    }

    /// Moves pending messages into `delivered`, emptying the queue.
    pub(crate) fn drain_into(&self, delivered: &mut EventBuffer) {
        let mut pending = self.pending.lock();
        delivered.copy_from(&pending);
        pending.reset();
    }
}

/// Role-specific storage of a port.
pub enum PortRole {
    /// Control value.
    Control(ControlValue),
    /// Reader-mixed audio input.
    AudioInput {
        /// Sum of all producers for the current pass.
        mixed: Vec<f32>,
        /// Connected audio outputs, in connection order.
        producers: Vec<PortRef>,
    },
    /// Audio output written by the processor.
    AudioOutput {
        /// Output samples.
        buffer: Vec<f32>,
    },
    /// Event input fed from the control thread.
    EventInput {
        /// Messages waiting for the next render.
        queue: EventQueue,
        /// Messages handed to the current render.
        delivered: EventBuffer,
    },
    /// Event output written by the processor.
    EventOutput {
        /// Messages produced in the current block.
        buffer: EventBuffer,
    },
}

impl fmt::Debug for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(v) => f.debug_tuple("Control").field(&v.get()).finish(),
            Self::AudioInput { producers, .. } => f
                .debug_struct("AudioInput")
                .field("producers", producers)
                .finish_non_exhaustive(),
            Self::AudioOutput { .. } => f.write_str("AudioOutput"),
            Self::EventInput { .. } => f.write_str("EventInput"),
            Self::EventOutput { .. } => f.write_str("EventOutput"),
        }
    }
}

/// A port owned by an instance.
#[derive(Debug)]
pub struct Port {
    /// Symbolic name.
    pub symbol: String,
    /// Storage.
    pub role: PortRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_value_clamps() {
        let v = ControlValue::new(0.5, 0.0, 1.0);
        assert_eq!(v.get(), 0.5);
        assert_eq!(v.set(3.0), 1.0);
        assert_eq!(v.get(), 1.0);
        assert_eq!(v.set(-1.0), 0.0);
    }

    #[test]
    fn control_value_ignores_nan() {
        let v = ControlValue::new(0.25, 0.0, 1.0);
        v.set(f32::NAN);
        assert_eq!(v.get(), 0.25);
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let v = ControlValue::new(0.5, 1.0, 0.0);
        assert_eq!(v.range(), (0.0, 1.0));
        assert_eq!(v.set(2.0), 1.0);
        assert_eq!(v.set(-2.0), 0.0);
    }

    #[test]
    fn nan_bounds_are_open() {
        let v = ControlValue::new(f32::NAN, f32::NAN, 10.0);
        assert_eq!(v.range(), (f32::NEG_INFINITY, 10.0));
        assert_eq!(v.get(), 0.0);
        assert_eq!(v.set(-1e9), -1e9);
        assert_eq!(v.set(11.0), 10.0);

        let upper = ControlValue::new(5.0, 1.0, f32::NAN);
        assert_eq!(upper.set(1e9), 1e9);
        assert_eq!(upper.set(0.0), 1.0);
    }

    #[test]
    fn control_handle_shares_storage() {
        let v = ControlValue::new(0.0, 0.0, 10.0);
        let other = v.clone();
        other.set(4.0);
        assert_eq!(v.get(), 4.0);
    }

    #[test]
    fn queue_drains_once() {
        let q = EventQueue::new(256);
        let kind = Urid::new(1).unwrap();
        q.push(kind, &[0x90, 60, 100]).unwrap();
        assert_eq!(q.pending(), 1);

        let mut delivered = EventBuffer::new(256);
        q.drain_into(&mut delivered);
        assert_eq!(delivered.event_count(), 1);
        assert_eq!(q.pending(), 0);

        q.drain_into(&mut delivered);
        assert_eq!(delivered.event_count(), 0);
    }
}
