//! Plugin graph for the conduit host.
//!
//! The graph is an arena of plugin instances wired port to port. It is edited
//! on the control thread and rendered once per audio block on the audio
//! thread, pulling from the output sink.
//!
//! # Rendering
//!
//! [`Graph::run()`] assigns a fresh pass id and renders the sink:
//!
//! 1. Every audio input first renders each producer not yet visited in this
//!    pass (depth first, postorder).
//! 2. The input is then mixed: the first producer is copied, later ones are
//!    summed in connection order, and an input with no producers is zeroed.
//! 3. The instance's event inputs receive the messages queued since its last
//!    render, its event outputs are cleared, and its processor runs.
//!
//! Each reachable instance runs at most once per pass. The sink is never run.
//! The render path does not allocate and takes only the per-queue event lock.
//!
//! # Cross-thread handles
//!
//! [`ControlValue`] and [`EventQueue`] are cheap clones that stay valid while
//! the graph itself is locked by the audio thread. Control writes are atomic
//! stores; event writes take the queue's own lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_core::graph::Graph;
//!
//! let mut graph = Graph::new(48000.0, 256, 2, 1024);
//! let synth = graph.add_instance(&synth_desc, synth_processor);
//! let reverb = graph.add_instance(&reverb_desc, reverb_processor);
//!
//! graph.connect(synth, "out", reverb, "in")?;
//! graph.connect_to_output(reverb, "out_l", 0)?;
//! graph.connect_to_output(reverb, "out_r", 1)?;
//!
//! graph.run(256);
//! let left = graph.output(0);
//! ```

mod instance;
pub(crate) mod port;
mod processing;

pub use instance::InstanceId;
pub use port::{ControlValue, EventQueue, PortRef};
pub use processing::{Graph, SINK_URI};
