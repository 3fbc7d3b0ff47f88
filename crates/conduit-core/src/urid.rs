//! Identifier interning for event types and other symbolic names.
//!
//! [`Interner`] maps URI strings to small integer [`Urid`]s and back. Ids are
//! assigned sequentially starting at 1 (`previous count + 1`), are never
//! reused, and stay valid for the lifetime of the table. Growth is
//! append-only, so a resolved name never changes underneath a caller.
//!
//! The table is owned by the control side of the host and passed by reference
//! to whatever needs it; there is no global instance.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;

/// Well-known URIs the host interns up front.
pub mod uris {
    /// MIDI message event type.
    pub const MIDI_EVENT: &str = "http://lv2plug.in/ns/ext/midi#MidiEvent";
    /// 32-bit float value type (used by preset state).
    pub const ATOM_FLOAT: &str = "http://lv2plug.in/ns/ext/atom#Float";
    /// Event sequence container type.
    pub const ATOM_SEQUENCE: &str = "http://lv2plug.in/ns/ext/atom#Sequence";
}

/// Interned identifier. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urid(NonZeroU32);

impl Urid {
    /// Wraps a raw id, returning `None` for zero.
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Returns the raw numeric id.
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Urid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urid:{}", self.0)
    }
}

/// Append-only name ↔ id table.
#[derive(Debug, Default)]
pub struct Interner {
    names: Vec<Box<str>>,
    lookup: HashMap<Box<str>, Urid>,
}

impl Interner {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the [`uris`] constants already interned.
    pub fn with_well_known() -> Self {
        let mut interner = Self::new();
        interner.intern(uris::MIDI_EVENT);
        interner.intern(uris::ATOM_FLOAT);
        interner.intern(uris::ATOM_SEQUENCE);
        interner
    }

    /// Returns the id for `name`, assigning the next one on first sight.
    pub fn intern(&mut self, name: &str) -> Urid {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let next = u32::try_from(self.names.len() + 1).unwrap_or(u32::MAX);
        let id = Urid(NonZeroU32::new(next).unwrap_or(NonZeroU32::MAX));
        self.names.push(name.into());
        self.lookup.insert(name.into(), id);
        id
    }

    /// Looks up an existing id without interning.
    pub fn get(&self, name: &str) -> Option<Urid> {
        self.lookup.get(name).copied()
    }

    /// Returns the name for `id`, or `None` if it was never assigned.
    pub fn resolve(&self, id: Urid) -> Option<&str> {
        self.names.get(id.get() as usize - 1).map(AsRef::as_ref)
    }

    /// Like [`resolve()`](Self::resolve) but accepts a raw id; zero and
    /// out-of-range values resolve to `None`.
    pub fn resolve_raw(&self, raw: u32) -> Option<&str> {
        Urid::new(raw).and_then(|id| self.resolve(id))
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
