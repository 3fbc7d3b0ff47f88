//! Conduit Core - port graph and render engine for a real-time plugin host
//!
//! This crate holds everything the audio thread touches: plugin instances,
//! their ports, the graph that wires them and the state shared with the
//! control thread. Nothing on the render path allocates or blocks.
//!
//! # Core Abstractions
//!
//! ## Plugins
//!
//! - [`PluginDescriptor`] / [`PortDescriptor`] - Static plugin and port shape
//! - [`Processor`] - Per-instance block processing, driven through [`Ports`]
//! - [`PluginProvider`] - Where descriptors, processors and presets come from
//!
//! ## Graph
//!
//! - [`Graph`](graph::Graph) - Instance arena, connections and pull rendering
//! - [`ControlValue`](graph::ControlValue) - Lock-free control port handle
//! - [`EventQueue`](graph::EventQueue) - Event input queue handle
//!
//! ## Supporting Services
//!
//! - [`Interner`] - URI ↔ [`Urid`] table
//! - [`EventBuffer`] - Fixed-capacity sequence of typed messages
//! - [`SharedState`] - Audio iteration counter, shutdown flag, last error
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_core::graph::Graph;
//!
//! let mut graph = Graph::new(48000.0, 128, 2, 1024);
//! let osc = graph.add_instance(&osc_desc, Box::new(Osc::default()));
//! graph.connect_to_output(osc, "out", 0)?;
//! graph.run(128);
//! ```

pub mod error;
pub mod event_buffer;
pub mod graph;
pub mod plugin;
pub mod shared;
pub mod urid;

pub use error::{ERROR_MESSAGE_CAPACITY, Error, ErrorBuffer, ExpectedRole, Result, Status};
pub use event_buffer::{
    DEFAULT_EVENT_CAPACITY, EVENT_HEADER_SIZE, Event, EventBuffer, EventBufferFull, EventIter,
};
pub use graph::{ControlValue, EventQueue, Graph, InstanceId, PortRef, SINK_URI};
pub use plugin::{
    PluginDescriptor, PluginProvider, PortDescriptor, PortDirection, PortKind, Ports, Preset,
    PresetValue, Processor,
};
pub use shared::SharedState;
pub use urid::{Interner, Urid, uris};
