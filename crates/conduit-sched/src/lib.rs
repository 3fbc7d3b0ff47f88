//! Hierarchical event scheduling for the conduit plugin host.
//!
//! Everything here runs on the control thread. Timed work is expressed as
//! events in a single time-ordered list; recurring work as scheduling nodes
//! whose firings resubmit themselves. Nodes form a forest: a child derives
//! each next firing from its parent's current period, so tempo changes on a
//! root propagate to everything that follows it.
//!
//! Events can also be gated on the audio thread's pass counter, which lets a
//! note-off wait until its note-on has actually been rendered.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_sched::{Context, Scheduler, SystemClock, TickLoop};
//!
//! let beat = ctx.scheduler().add_node(Box::new(|ctx, _, n| ctx.trigger(n)));
//! let eighth = ctx.scheduler().add_node(Box::new(|ctx, _, n| ctx.hat(n)));
//! ctx.scheduler().follow(eighth, beat)?;
//! ctx.scheduler().node_mut(eighth)?.set_divisor(2);
//!
//! TickLoop::new(SystemClock::new(), 1, shared).run(&mut ctx);
//! ```

pub mod clock;
mod error;
pub mod node;
pub mod queue;
pub mod scheduler;
pub mod tick;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SchedError};
pub use node::{DEFAULT_INTERVAL_MS, Forest, Node, NodeCallback, NodeId};
pub use queue::{Event, EventQueue};
pub use scheduler::{Action, Context, EventCallback, Scheduler};
pub use tick::TickLoop;
