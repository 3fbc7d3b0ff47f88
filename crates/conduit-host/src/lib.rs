//! Conduit Host - control-side API for the conduit plugin graph
//!
//! Ties the pieces together: a [`PluginRegistry`] supplies plugins, the
//! [`Host`] instantiates and wires them into the shared graph, sends them
//! parameter changes and MIDI, schedules timed callbacks and starts the audio
//! stream through a [`conduit_io::AudioBackend`].
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_host::{Host, HostConfig};
//! use conduit_io::CpalBackend;
//! use conduit_sched::SystemClock;
//!
//! let mut host = Host::with_registry(HostConfig::load("conduit.toml")?, registry)?;
//! let synth = host.instantiate("urn:example:synth")?;
//! host.connect_to_output(synth, "left", 0)?;
//! host.connect_to_output(synth, "right", 1)?;
//!
//! // Play a C major triad every beat.
//! let beat = host.add_node(move |host, _, _| {
//!     let _ = host.play(synth, "midi", &[60, 64, 67], 100, 250);
//! });
//! host.node_mut(beat)?.set_interval(500);
//!
//! let _stream = host.start_stream(&CpalBackend::new())?;
//! host.run(SystemClock::new());
//! ```

pub mod config;
pub mod error;
mod handles;
pub mod host;
pub mod registry;

pub use config::{ConfigError, HostConfig};
pub use error::{HostError, Result};
pub use host::Host;
pub use registry::{PluginFactory, PluginRegistry};
