//! Audio output layer for the conduit plugin host.
//!
//! This crate provides:
//!
//! - **Backend abstraction**: [`AudioBackend`] for device enumeration and
//!   output stream construction, with [`CpalBackend`] for real hardware and
//!   [`MockBackend`] for deterministic tests
//! - **Write-region contract**: [`OutputDevice`], the begin/end write protocol
//!   a backend period is filled through
//! - **Driver adapter**: [`AudioDriver`], which splits each backend request
//!   into graph-sized blocks and copies the sink's channels out
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conduit_io::{AudioBackend, AudioDriver, BackendStreamConfig, CpalBackend};
//!
//! let driver = AudioDriver::new(graph, shared);
//! let backend = CpalBackend::new();
//! let config = BackendStreamConfig::default();
//! let stream = backend.build_output_stream(
//!     &config,
//!     driver.into_callback(config.channels as usize),
//!     Box::new(|err| tracing::warn!("audio error: {err}")),
//! )?;
//! // Audio plays until `stream` is dropped.
//! ```

pub mod backend;
pub mod cpal_backend;
pub mod device;
pub mod driver;
pub mod mock;

pub use backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
pub use cpal_backend::CpalBackend;
pub use device::{OutputDevice, SliceDevice, WriteRegion};
pub use driver::AudioDriver;
pub use mock::{MockBackend, MockDevice};

/// Error types for audio output.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// A write region could not be opened or committed.
    #[error("Device write error: {0}")]
    Write(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

/// Convenience result type for audio output operations.
pub type Result<T> = std::result::Result<T, Error>;
