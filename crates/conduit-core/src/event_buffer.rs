//! Fixed-capacity buffer of timestamped binary events.
//!
//! Events are packed back to back as 8-byte aligned records:
//!
//! ```text
//! ┌────────────┬────────────┬────────────┬──────────┬──────────────────────┐
//! │ frames u32 │ type u32   │ size u32   │ pad u32  │ body (size bytes,    │
//! │            │ (Urid)     │            │          │ padded to 8)         │
//! └────────────┴────────────┴────────────┴──────────┴──────────────────────┘
//! ```
//!
//! The backing storage is allocated once at construction and never grows, so
//! writing, resetting and copying are allocation-free and safe on the audio
//! thread.

use crate::urid::Urid;

/// Size in bytes of the per-event header.
pub const EVENT_HEADER_SIZE: usize = 16;

/// Default capacity in bytes of an event port buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[inline]
const fn padded(size: usize) -> usize {
    (size + 7) & !7
}

/// Returned when an event does not fit in the remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event buffer full: need {needed} bytes, {available} available")]
pub struct EventBufferFull {
    /// Bytes the event would occupy, header and padding included.
    pub needed: usize,
    /// Bytes still free in the buffer.
    pub available: usize,
}

/// A single decoded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'a> {
    /// Frame offset within the block. Always 0 for block-quantized delivery.
    pub frames: u32,
    /// Event type id.
    pub kind: Urid,
    /// Raw message bytes.
    pub body: &'a [u8],
}

/// Append-only event sequence with a fixed byte capacity.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    data: Vec<u8>,
    len: usize,
}

impl EventBuffer {
    /// Creates an empty buffer holding up to `capacity` bytes of records.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            len: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently occupied by records.
    pub fn len_bytes(&self) -> usize {
        self.len
    }

    /// Returns true if no events are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an event.
    pub fn write(&mut self, frames: u32, kind: Urid, body: &[u8]) -> Result<(), EventBufferFull> {
        let needed = EVENT_HEADER_SIZE + padded(body.len());
        let available = self.capacity() - self.len;
        if needed > available {
            return Err(EventBufferFull { needed, available });
        }
        let size = u32::try_from(body.len()).map_err(|_| EventBufferFull { needed, available })?;

        let header = &mut self.data[self.len..self.len + EVENT_HEADER_SIZE];
        header[0..4].copy_from_slice(&frames.to_ne_bytes());
        header[4..8].copy_from_slice(&kind.get().to_ne_bytes());
        header[8..12].copy_from_slice(&size.to_ne_bytes());
        header[12..16].fill(0);

        let start = self.len + EVENT_HEADER_SIZE;
        self.data[start..start + body.len()].copy_from_slice(body);
        self.data[start + body.len()..self.len + needed].fill(0);
        self.len += needed;
        Ok(())
    }

    /// Drops all events. Capacity is kept.
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Replaces this buffer's contents with `other`'s.
    ///
    /// Records that do not fit in this buffer's capacity are dropped whole.
    pub fn copy_from(&mut self, other: &EventBuffer) {
        let mut end = 0;
        let mut offset = 0;
        while offset + EVENT_HEADER_SIZE <= other.len {
            let size = read_u32(&other.data, offset + 8) as usize;
            let next = offset + EVENT_HEADER_SIZE + padded(size);
            if next > self.capacity() || next > other.len {
                break;
            }
            end = next;
            offset = next;
        }
        self.data[..end].copy_from_slice(&other.data[..end]);
        self.len = end;
    }

    /// Iterates over the stored events in write order.
    pub fn iter(&self) -> EventIter<'_> {
        EventIter {
            data: &self.data[..self.len],
            offset: 0,
        }
    }

    /// Number of stored events.
    pub fn event_count(&self) -> usize {
        self.iter().count()
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = Event<'a>;
    type IntoIter = EventIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_ne_bytes(bytes)
}

/// Iterator over the records of an [`EventBuffer`].
#[derive(Debug, Clone)]
pub struct EventIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> EventIter<'a> {
    /// An iterator that yields nothing.
    pub fn empty() -> Self {
        Self {
            data: &[],
            offset: 0,
        }
    }
}

impl<'a> Iterator for EventIter<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + EVENT_HEADER_SIZE > self.data.len() {
            return None;
        }
        let frames = read_u32(self.data, self.offset);
        let kind = Urid::new(read_u32(self.data, self.offset + 4))?;
        let size = read_u32(self.data, self.offset + 8) as usize;
        let start = self.offset + EVENT_HEADER_SIZE;
        let body = self.data.get(start..start + size)?;
        self.offset = start + padded(size);
        Some(Event { frames, kind, body })
    }
}
