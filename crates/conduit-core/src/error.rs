//! Graph errors and the bounded last-error message buffer.

use core::fmt;

use crate::event_buffer::EventBufferFull;
use crate::graph::{InstanceId, PortRef};

/// Role a port was expected to have when an operation rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedRole {
    /// A control value port.
    Control,
    /// An audio input port.
    AudioInput,
    /// An audio output port.
    AudioOutput,
    /// An event input port.
    EventInput,
}

impl fmt::Display for ExpectedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "control",
            Self::AudioInput => "audio input",
            Self::AudioOutput => "audio output",
            Self::EventInput => "event input",
        };
        f.write_str(name)
    }
}

/// Errors returned by graph mutation and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No live instance has this id.
    #[error("instance {0} not found")]
    InstanceNotFound(InstanceId),

    /// The instance's plugin has no port with this symbol.
    #[error("instance {instance} has no port named '{symbol}'")]
    PortNotFound {
        /// Instance that was searched.
        instance: InstanceId,
        /// Symbol that did not resolve.
        symbol: String,
    },

    /// The port exists but has the wrong kind or direction.
    #[error("port '{symbol}' on instance {instance} has the wrong role (expected {expected})")]
    WrongPortRole {
        /// Owning instance.
        instance: InstanceId,
        /// Port symbol.
        symbol: String,
        /// Role the operation required.
        expected: ExpectedRole,
    },

    /// Output channel index outside the sink's channel range.
    #[error("output channel {channel} out of range (sink has {channels} channels)")]
    InvalidChannel {
        /// Requested channel.
        channel: usize,
        /// Number of sink channels.
        channels: usize,
    },

    /// The writer is already in the reader's producer list.
    #[error("{writer} is already connected to {reader}")]
    DuplicateConnection {
        /// Producing port.
        writer: PortRef,
        /// Consuming port.
        reader: PortRef,
    },

    /// Disconnect named a connection that does not exist.
    #[error("{writer} is not connected to {reader}")]
    NotConnected {
        /// Producing port.
        writer: PortRef,
        /// Consuming port.
        reader: PortRef,
    },

    /// The connection would make an instance feed itself.
    #[error("connecting {writer} to {reader} would create a cycle")]
    CycleDetected {
        /// Producing instance.
        writer: InstanceId,
        /// Consuming instance.
        reader: InstanceId,
    },

    /// An event port queue had no room for the message.
    #[error(transparent)]
    EventBufferFull(#[from] EventBufferFull),

    /// The output sink cannot be removed.
    #[error("the output sink cannot be removed")]
    SinkRemoval,
}

/// Convenience result type for graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Two-valued outcome of a fallible host operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The operation failed; details are in the last-error buffer.
    Err,
}

impl Status {
    /// Collapses a result to its status.
    pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
        if result.is_ok() { Self::Ok } else { Self::Err }
    }

    /// Returns true for [`Status::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Capacity in bytes of [`ErrorBuffer`].
pub const ERROR_MESSAGE_CAPACITY: usize = 1024;

/// Fixed-size UTF-8 message buffer. Writes past capacity are truncated on a
/// character boundary; nothing here allocates.
#[derive(Clone)]
pub struct ErrorBuffer {
    bytes: [u8; ERROR_MESSAGE_CAPACITY],
    len: usize,
}

impl ErrorBuffer {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self {
            bytes: [0; ERROR_MESSAGE_CAPACITY],
            len: 0,
        }
    }

    /// Current message.
    pub fn as_str(&self) -> &str {
        // Only whole chars are ever appended.
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// Empties the buffer.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replaces the message with `msg`'s display output.
    pub fn set(&mut self, msg: &dyn fmt::Display) {
        self.clear();
        // `write_str` never fails; overflow truncates.
        let _ = fmt::write(self, format_args!("{msg}"));
    }

    /// Returns true if no message is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ErrorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for ErrorBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = ERROR_MESSAGE_CAPACITY - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

impl fmt::Debug for ErrorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorBuffer").field(&self.as_str()).finish()
    }
}
