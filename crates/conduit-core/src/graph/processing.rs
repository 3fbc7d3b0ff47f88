//! Plugin graph: mutation API, cycle detection and pull-based rendering.
//!
//! [`Graph`] owns every instance in an arena of `Option<Instance>` slots
//! addressed by [`InstanceId`]. Slot 0 is the output sink, an instance with one
//! audio input per device channel that is never run.
//!
//! Rendering pulls from the sink: each audio input first renders every
//! producer not yet visited in the current pass, then mixes them. Instances
//! are tagged with the pass id, so a fan-out source feeding several readers is
//! still run once per block.

use crate::error::{Error, ExpectedRole, Result};
use crate::plugin::{PluginDescriptor, PortDescriptor, Ports, Processor};

use super::instance::{Instance, InstanceId};
use super::port::{ControlValue, EventQueue, PortRef, PortRole};

/// URI of the built-in output sink.
pub const SINK_URI: &str = "urn:conduit:sink";

/// Directed graph of plugin instances rendered once per audio block.
///
/// Mutation happens on the control thread; [`run()`](Self::run) happens on
/// the audio thread. The host shares one `Graph` behind a lock that the audio
/// side only ever `try_lock`s.
pub struct Graph {
    instances: Vec<Option<Instance>>,
    sample_rate: f64,
    block_size: usize,
    output_channels: usize,
    event_capacity: usize,
    pass: u64,
    last_frames: usize,
}

impl Graph {
    /// Creates a graph holding only the output sink.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Sample rate in Hz, passed to processors on activation
    /// * `block_size` - Largest block a single pass renders
    /// * `output_channels` - Number of sink inputs (`channel_0`, `channel_1`, ...)
    /// * `event_capacity` - Byte capacity of every event port buffer
    pub fn new(
        sample_rate: f64,
        block_size: usize,
        output_channels: usize,
        event_capacity: usize,
    ) -> Self {
        let sink = PluginDescriptor::new(
            SINK_URI,
            "Output",
            (0..output_channels)
                .map(|c| PortDescriptor::audio_input(&format!("channel_{c}")))
                .collect(),
        );
        Self {
            instances: vec![Some(Instance::new(&sink, None, block_size, event_capacity))],
            sample_rate,
            block_size,
            output_channels,
            event_capacity,
            pass: 0,
            last_frames: 0,
        }
    }

    /// Id of the output sink.
    #[inline]
    pub fn sink(&self) -> InstanceId {
        InstanceId(0)
    }

    /// Sample rate the graph was built for.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Largest number of frames one pass renders.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of sink channels.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Number of live instances, sink included.
    pub fn instance_count(&self) -> usize {
        self.instances.iter().filter(|s| s.is_some()).count()
    }

    /// Returns true if `id` names a live instance.
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instance(id).is_ok()
    }

    // --- Instance mutations ---

    /// Adds an instance of `descriptor` driven by `processor`, activating it.
    pub fn add_instance(
        &mut self,
        descriptor: &PluginDescriptor,
        mut processor: Box<dyn Processor>,
    ) -> InstanceId {
        processor.activate(self.sample_rate);
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(Some(Instance::new(
            descriptor,
            Some(processor),
            self.block_size,
            self.event_capacity,
        )));
        tracing::debug!("graph_add: {} as instance {id}", descriptor.uri);
        id
    }

    /// Removes an instance, deactivating it and dropping every connection
    /// from its outputs.
    pub fn remove_instance(&mut self, id: InstanceId) -> Result<()> {
        if id == self.sink() {
            return Err(Error::SinkRemoval);
        }
        let Some(mut removed) = self.instances.get_mut(id.0 as usize).and_then(Option::take) else {
            return Err(Error::InstanceNotFound(id));
        };
        if let Some(processor) = removed.processor.as_mut() {
            processor.deactivate();
        }
        for inst in self.instances.iter_mut().flatten() {
            for port in &mut inst.ports {
                if let PortRole::AudioInput { producers, .. } = &mut port.role {
                    producers.retain(|p| p.instance != id);
                }
            }
        }
        tracing::debug!("graph_remove: instance {id} ({})", removed.plugin_uri);
        Ok(())
    }

    /// Ids of live instances of `uri`, ascending.
    pub fn instances_of(&self, uri: &str) -> Vec<InstanceId> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref()
                    .filter(|inst| inst.plugin_uri == uri)
                    .map(|_| InstanceId(i as u32))
            })
            .collect()
    }

    /// Plugin URI of an instance.
    pub fn plugin_uri(&self, id: InstanceId) -> Result<&str> {
        Ok(&self.instance(id)?.plugin_uri)
    }

    // --- Port lookup ---

    /// Resolves `symbol` on instance `id`.
    pub fn port_ref(&self, id: InstanceId, symbol: &str) -> Result<PortRef> {
        let index = self
            .instance(id)?
            .port_index(symbol)
            .ok_or_else(|| Error::PortNotFound {
                instance: id,
                symbol: symbol.to_owned(),
            })?;
        Ok(PortRef {
            instance: id,
            index: index as u32,
        })
    }

    /// Shared handle to a control port.
    pub fn control(&self, id: InstanceId, symbol: &str) -> Result<ControlValue> {
        match self.role(id, symbol)? {
            PortRole::Control(value) => Ok(value.clone()),
            _ => Err(wrong_role(id, symbol, ExpectedRole::Control)),
        }
    }

    /// Shared handle to an event input's queue.
    pub fn event_queue(&self, id: InstanceId, symbol: &str) -> Result<EventQueue> {
        match self.role(id, symbol)? {
            PortRole::EventInput { queue, .. } => Ok(queue.clone()),
            _ => Err(wrong_role(id, symbol, ExpectedRole::EventInput)),
        }
    }

    /// Producers currently feeding an audio input, in mixing order.
    pub fn producers(&self, id: InstanceId, symbol: &str) -> Result<&[PortRef]> {
        match self.role(id, symbol)? {
            PortRole::AudioInput { producers, .. } => Ok(producers),
            _ => Err(wrong_role(id, symbol, ExpectedRole::AudioInput)),
        }
    }

    // --- Connections ---

    /// Connects audio output `out_port` of `writer` to audio input `in_port`
    /// of `reader`.
    ///
    /// Fails if either port is missing or has the wrong role, if the
    /// connection already exists, or if it would let `reader` feed itself.
    pub fn connect(
        &mut self,
        writer: InstanceId,
        out_port: &str,
        reader: InstanceId,
        in_port: &str,
    ) -> Result<()> {
        let (from, to) = self.resolve_pair(writer, out_port, reader, in_port)?;
        if writer == reader || self.depends_on(writer, reader) {
            return Err(Error::CycleDetected { writer, reader });
        }
        let producers = self.producers_mut(to)?;
        if producers.contains(&from) {
            return Err(Error::DuplicateConnection {
                writer: from,
                reader: to,
            });
        }
        producers.push(from);
        tracing::debug!("graph_connect: {from} → {to}");
        Ok(())
    }

    /// Removes a connection made by [`connect()`](Self::connect).
    pub fn disconnect(
        &mut self,
        writer: InstanceId,
        out_port: &str,
        reader: InstanceId,
        in_port: &str,
    ) -> Result<()> {
        let (from, to) = self.resolve_pair(writer, out_port, reader, in_port)?;
        let producers = self.producers_mut(to)?;
        let Some(pos) = producers.iter().position(|p| *p == from) else {
            return Err(Error::NotConnected {
                writer: from,
                reader: to,
            });
        };
        producers.remove(pos);
        tracing::debug!("graph_disconnect: {from} → {to}");
        Ok(())
    }

    /// Connects audio output `out_port` of `writer` to sink channel `channel`.
    pub fn connect_to_output(
        &mut self,
        writer: InstanceId,
        out_port: &str,
        channel: usize,
    ) -> Result<()> {
        let sink_port = self.sink_port(channel)?;
        self.connect(writer, out_port, self.sink(), &sink_port)
    }

    /// Removes a connection made by [`connect_to_output()`](Self::connect_to_output).
    pub fn disconnect_from_output(
        &mut self,
        writer: InstanceId,
        out_port: &str,
        channel: usize,
    ) -> Result<()> {
        let sink_port = self.sink_port(channel)?;
        self.disconnect(writer, out_port, self.sink(), &sink_port)
    }

    // --- Rendering ---

    /// Renders one pass of `frames` samples (clamped to the block size) and
    /// returns its pass id.
    pub fn run(&mut self, frames: usize) -> u64 {
        let frames = frames.min(self.block_size);
        self.pass += 1;
        self.last_frames = frames;
        self.render(0, frames, self.pass, 0);
        self.pass
    }

    /// Id of the most recent pass; 0 before the first.
    pub fn pass_id(&self) -> u64 {
        self.pass
    }

    /// Pass id an instance was last rendered in.
    pub fn last_pass(&self, id: InstanceId) -> Result<u64> {
        Ok(self.instance(id)?.last_pass)
    }

    /// Mixed samples of sink channel `channel` from the last pass.
    ///
    /// Empty for channels the sink does not have.
    pub fn output(&self, channel: usize) -> &[f32] {
        let Some(sink) = self.instances[0].as_ref() else {
            return &[];
        };
        match sink.ports.get(channel).map(|p| &p.role) {
            Some(PortRole::AudioInput { mixed, .. }) => &mixed[..self.last_frames],
            _ => &[],
        }
    }

    fn render(&mut self, idx: usize, frames: usize, pass: u64, depth: usize) {
        if depth > self.instances.len() {
            return;
        }
        let mut ports = match self.instances.get_mut(idx).and_then(Option::as_mut) {
            Some(inst) => {
                inst.last_pass = pass;
                std::mem::take(&mut inst.ports)
            }
            None => return,
        };

        for port in &ports {
            if let PortRole::AudioInput { producers, .. } = &port.role {
                for p in producers {
                    let upstream = p.instance.0 as usize;
                    if self.needs_render(upstream, pass) {
                        self.render(upstream, frames, pass, depth + 1);
                    }
                }
            }
        }

        for port in &mut ports {
            match &mut port.role {
                PortRole::AudioInput { mixed, producers } => {
                    self.mix(producers, &mut mixed[..frames]);
                }
                PortRole::EventInput { queue, delivered } => queue.drain_into(delivered),
                PortRole::EventOutput { buffer } => buffer.reset(),
                _ => {}
            }
        }

        if let Some(inst) = self.instances[idx].as_mut() {
            if let Some(processor) = inst.processor.as_mut() {
                processor.run(&mut Ports::new(frames, &mut ports));
            }
            for port in &mut ports {
                if let PortRole::EventInput { delivered, .. } = &mut port.role {
                    delivered.reset();
                }
            }
            inst.ports = ports;
        }
    }

    fn needs_render(&self, idx: usize, pass: u64) -> bool {
        matches!(self.instances.get(idx), Some(Some(inst)) if inst.last_pass != pass)
    }

    /// First producer copies, the rest accumulate; none leaves silence.
    fn mix(&self, producers: &[PortRef], out: &mut [f32]) {
        let mut first = true;
        for p in producers {
            let Some(src) = self.output_buffer(*p) else {
                continue;
            };
            let src = &src[..out.len()];
            if first {
                out.copy_from_slice(src);
                first = false;
            } else {
                for (o, s) in out.iter_mut().zip(src) {
                    *o += s;
                }
            }
        }
        if first {
            out.fill(0.0);
        }
    }

    fn output_buffer(&self, p: PortRef) -> Option<&[f32]> {
        let inst = self.instances.get(p.instance.0 as usize)?.as_ref()?;
        match &inst.ports.get(p.index as usize)?.role {
            PortRole::AudioOutput { buffer } => Some(buffer),
            _ => None,
        }
    }

    // --- Helpers ---

    fn instance(&self, id: InstanceId) -> Result<&Instance> {
        self.instances
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InstanceNotFound(id))
    }

    fn role(&self, id: InstanceId, symbol: &str) -> Result<&PortRole> {
        let port = self.port_ref(id, symbol)?;
        Ok(&self.instance(id)?.ports[port.index as usize].role)
    }

    fn sink_port(&self, channel: usize) -> Result<String> {
        if channel >= self.output_channels {
            return Err(Error::InvalidChannel {
                channel,
                channels: self.output_channels,
            });
        }
        Ok(format!("channel_{channel}"))
    }

    fn resolve_pair(
        &self,
        writer: InstanceId,
        out_port: &str,
        reader: InstanceId,
        in_port: &str,
    ) -> Result<(PortRef, PortRef)> {
        if !matches!(self.role(writer, out_port)?, PortRole::AudioOutput { .. }) {
            return Err(wrong_role(writer, out_port, ExpectedRole::AudioOutput));
        }
        if !matches!(self.role(reader, in_port)?, PortRole::AudioInput { .. }) {
            return Err(wrong_role(reader, in_port, ExpectedRole::AudioInput));
        }
        Ok((
            self.port_ref(writer, out_port)?,
            self.port_ref(reader, in_port)?,
        ))
    }

    fn producers_mut(&mut self, port: PortRef) -> Result<&mut Vec<PortRef>> {
        let producers = self
            .instances
            .get_mut(port.instance.0 as usize)
            .and_then(Option::as_mut)
            .and_then(|inst| inst.ports.get_mut(port.index as usize))
            .and_then(|p| match &mut p.role {
                PortRole::AudioInput { producers, .. } => Some(producers),
                _ => None,
            });
        producers.ok_or(Error::InstanceNotFound(port.instance))
    }

    /// True if `target` is upstream of `from` (feeds it, directly or not).
    fn depends_on(&self, from: InstanceId, target: InstanceId) -> bool {
        let mut visited = vec![false; self.instances.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            let idx = current.0 as usize;
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            if let Some(Some(inst)) = self.instances.get(idx) {
                for port in &inst.ports {
                    if let PortRole::AudioInput { producers, .. } = &port.role {
                        stack.extend(producers.iter().map(|p| p.instance));
                    }
                }
            }
        }
        false
    }
}

fn wrong_role(instance: InstanceId, symbol: &str, expected: ExpectedRole) -> Error {
    Error::WrongPortRole {
        instance,
        symbol: symbol.to_owned(),
        expected,
    }
}
