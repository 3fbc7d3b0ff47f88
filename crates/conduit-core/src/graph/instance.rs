//! Plugin instances held in the graph arena.

use core::fmt;

use crate::event_buffer::EventBuffer;
use crate::plugin::{PluginDescriptor, PortDirection, PortKind, Processor};

use super::port::{ControlValue, EventQueue, Port, PortRole};

/// Unique identifier for an instance in the graph.
///
/// Ids are assigned sequentially and never reused within a graph. Id 0 is
/// always the output sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u32);

impl InstanceId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A processor plus the ports it reads and writes.
pub(crate) struct Instance {
    pub plugin_uri: String,
    /// `None` for the output sink, which is never run.
    pub processor: Option<Box<dyn Processor>>,
    pub ports: Vec<Port>,
    /// Pass id of the last render that visited this instance.
    pub last_pass: u64,
}

impl Instance {
    /// Allocates port storage for `descriptor`.
    pub fn new(
        descriptor: &PluginDescriptor,
        processor: Option<Box<dyn Processor>>,
        block_size: usize,
        event_capacity: usize,
    ) -> Self {
        let ports = descriptor
            .ports
            .iter()
            .map(|d| {
                let role = match (d.kind, d.direction) {
                    // Control outputs get a value slot too; nothing reads them back yet.
                    (PortKind::Control, _) => {
                        PortRole::Control(ControlValue::new(d.default, d.min, d.max))
                    }
                    (PortKind::Audio, PortDirection::Input) => PortRole::AudioInput {
                        mixed: vec![0.0; block_size],
                        producers: Vec::new(),
                    },
                    (PortKind::Audio, PortDirection::Output) => PortRole::AudioOutput {
                        buffer: vec![0.0; block_size],
                    },
                    (PortKind::Event, PortDirection::Input) => PortRole::EventInput {
                        queue: EventQueue::new(event_capacity),
                        delivered: EventBuffer::new(event_capacity),
                    },
                    (PortKind::Event, PortDirection::Output) => PortRole::EventOutput {
                        buffer: EventBuffer::new(event_capacity),
                    },
                };
                Port {
                    symbol: d.symbol.clone(),
                    role,
                }
            })
            .collect();
        Self {
            plugin_uri: descriptor.uri.clone(),
            processor,
            ports,
            last_pass: 0,
        }
    }

    pub fn port_index(&self, symbol: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.symbol == symbol)
    }
}
