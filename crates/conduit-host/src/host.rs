//! The control-thread host.
//!
//! [`Host`] owns everything the control thread touches: the plugin registry,
//! the URI interner, the scheduler and a handle to the graph shared with the
//! audio thread. It is also the scheduler's callback context, so node and
//! event callbacks receive `&mut Host` and can issue any command below.
//!
//! Parameter, MIDI and preset commands go through port handles captured when
//! an instance is created, so they never wait on a render. Structural edits
//! (instances and connections) take the graph lock briefly.
//!
//! Every command returns a `Result`. Failures are additionally logged and
//! written to the shared last-error buffer, which is what a caller that only
//! checks [`Status`](conduit_core::Status) reads back via
//! [`last_error()`](Host::last_error).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use conduit_core::{Graph, InstanceId, Interner, PluginProvider, Preset, SharedState, uris};
use conduit_io::{AudioBackend, AudioDriver, BackendStreamConfig, StreamHandle};
use conduit_sched::{Clock, Context, Node, NodeId, Scheduler, TickLoop};
use parking_lot::Mutex;

use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::handles::InstanceHandles;
use crate::registry::PluginRegistry;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Rendered blocks a note-off waits for. The driver advances the iteration
/// before a pass drains its queues, so a note-on can miss the pass that was
/// current when it was sent and arrive with the next one.
const NOTE_OFF_BLOCKS: u64 = 2;

/// Plugin host: graph commands, scheduling and stream startup.
pub struct Host {
    config: HostConfig,
    graph: Arc<Mutex<Graph>>,
    shared: Arc<SharedState>,
    interner: Interner,
    scheduler: Scheduler<Host>,
    registry: PluginRegistry,
    instances: HashMap<InstanceId, InstanceHandles>,
}

impl Context for Host {
    fn scheduler(&mut self) -> &mut Scheduler<Self> {
        &mut self.scheduler
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("plugins", &self.registry.len())
            .field("instances", &self.instances.len())
            .field("nodes", &self.scheduler.forest().len())
            .field("pending_events", &self.scheduler.pending_events())
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Creates a host with an empty registry.
    pub fn new(config: HostConfig) -> Result<Self> {
        Self::with_registry(config, PluginRegistry::new())
    }

    /// Creates a host serving plugins from `registry`.
    pub fn with_registry(config: HostConfig, registry: PluginRegistry) -> Result<Self> {
        config.validate()?;
        let graph = Graph::new(
            f64::from(config.sample_rate),
            config.block_size,
            config.output_channels,
            config.event_capacity,
        );
        let shared = Arc::new(SharedState::new());
        tracing::debug!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            channels = config.output_channels,
            "host created"
        );
        Ok(Self {
            scheduler: Scheduler::new(Arc::clone(&shared)),
            graph: Arc::new(Mutex::new(graph)),
            interner: Interner::with_well_known(),
            config,
            shared,
            registry,
            instances: HashMap::new(),
        })
    }

    // --- Accessors ---

    /// Active configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Graph handle shared with the audio thread.
    pub fn graph(&self) -> &Arc<Mutex<Graph>> {
        &self.graph
    }

    /// State shared with the audio thread.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Plugin registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Mutable plugin registry, for registering plugins and presets.
    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// URI interner.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Mutable URI interner, for mapping extra URIs.
    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }

    /// Time of the current or most recent tick.
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// Number of queued scheduler events.
    pub fn pending_events(&self) -> usize {
        self.scheduler.pending_events()
    }

    /// Last recorded error message, empty if none.
    pub fn last_error(&self) -> String {
        self.shared.last_error()
    }

    fn handles(&self, id: InstanceId) -> Result<&InstanceHandles> {
        self.instances
            .get(&id)
            .ok_or(HostError::Graph(conduit_core::Error::InstanceNotFound(id)))
    }

    fn record<T>(&self, op: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!("{op}: {e}");
            self.shared.report_error(&format_args!("{op}: {e}"));
        }
        result
    }

    // --- Instances ---

    /// Creates an instance of plugin `uri` and adds it to the graph.
    pub fn instantiate(&mut self, uri: &str) -> Result<InstanceId> {
        let result = self.try_instantiate(uri);
        self.record("instantiate", result)
    }

    fn try_instantiate(&mut self, uri: &str) -> Result<InstanceId> {
        let descriptor = self
            .registry
            .descriptor(uri)
            .ok_or_else(|| HostError::PluginNotFound(uri.to_owned()))?;
        let processor = self
            .registry
            .instantiate(uri, f64::from(self.config.sample_rate))
            .ok_or_else(|| HostError::InstantiateFailed(uri.to_owned()))?;
        let mut graph = self.graph.lock();
        let id = graph.add_instance(descriptor, processor);
        match InstanceHandles::capture(&graph, id, descriptor) {
            Ok(handles) => {
                self.instances.insert(id, handles);
                Ok(id)
            }
            Err(e) => {
                let _ = graph.remove_instance(id);
                Err(e.into())
            }
        }
    }

    /// Deactivates and removes an instance along with its connections.
    pub fn free_instance(&mut self, id: InstanceId) -> Result<()> {
        let result = self.graph.lock().remove_instance(id).map_err(HostError::from);
        if result.is_ok() {
            self.instances.remove(&id);
        }
        self.record("free_instance", result)
    }

    /// Unregisters plugin `uri` and frees all of its instances. Returns the
    /// number of instances freed.
    pub fn unload_plugin(&mut self, uri: &str) -> Result<usize> {
        if self.registry.unregister(uri).is_none() {
            return self.record("unload_plugin", Err(HostError::PluginNotFound(uri.to_owned())));
        }
        let mut graph = self.graph.lock();
        let instances = graph.instances_of(uri);
        let result = instances
            .iter()
            .try_for_each(|&id| graph.remove_instance(id))
            .map(|()| instances.len())
            .map_err(HostError::from);
        self.instances.retain(|id, _| graph.contains(*id));
        drop(graph);

        if let Ok(freed) = &result {
            tracing::debug!("unloaded {uri}, freed {freed} instances");
        }
        self.record("unload_plugin", result)
    }

    // --- Connections ---

    /// Connects an audio output of `writer` to an audio input of `reader`.
    pub fn connect(
        &self,
        writer: InstanceId,
        out_port: &str,
        reader: InstanceId,
        in_port: &str,
    ) -> Result<()> {
        let result = self
            .graph
            .lock()
            .connect(writer, out_port, reader, in_port)
            .map_err(HostError::from);
        self.record("connect", result)
    }

    /// Removes a connection made by [`connect()`](Self::connect).
    pub fn disconnect(
        &self,
        writer: InstanceId,
        out_port: &str,
        reader: InstanceId,
        in_port: &str,
    ) -> Result<()> {
        let result = self
            .graph
            .lock()
            .disconnect(writer, out_port, reader, in_port)
            .map_err(HostError::from);
        self.record("disconnect", result)
    }

    /// Feeds an audio output of `writer` into output `channel`.
    pub fn connect_to_output(&self, writer: InstanceId, out_port: &str, channel: usize) -> Result<()> {
        let result = self
            .graph
            .lock()
            .connect_to_output(writer, out_port, channel)
            .map_err(HostError::from);
        self.record("connect_to_output", result)
    }

    /// Removes a connection made by
    /// [`connect_to_output()`](Self::connect_to_output).
    pub fn disconnect_from_output(
        &self,
        writer: InstanceId,
        out_port: &str,
        channel: usize,
    ) -> Result<()> {
        let result = self
            .graph
            .lock()
            .disconnect_from_output(writer, out_port, channel)
            .map_err(HostError::from);
        self.record("disconnect_from_output", result)
    }

    // --- Commands ---

    /// Writes a control port, clamped to its range. Returns the stored value.
    pub fn set_param(&self, id: InstanceId, port: &str, value: f32) -> Result<f32> {
        let result = self
            .handles(id)
            .and_then(|h| Ok(h.control(port)?.set(value)));
        self.record("set_param", result)
    }

    /// Queues a raw MIDI message on an event input. It is delivered with the
    /// next block that renders the instance.
    pub fn send_midi(&mut self, id: InstanceId, port: &str, bytes: &[u8]) -> Result<()> {
        let kind = self.interner.intern(uris::MIDI_EVENT);
        let result = self.handles(id).and_then(|h| {
            h.event_queue(port)?
                .push(kind, bytes)
                .map_err(conduit_core::Error::from)?;
            Ok(())
        });
        self.record("send_midi", result)
    }

    /// Sends note-ons for `notes` now and schedules the matching note-offs
    /// `len_ms` later.
    ///
    /// Note-offs also wait for two more rendered blocks, so a note-on and its
    /// note-off never reach the plugin in the same block, even if the control
    /// thread is ahead of the audio thread.
    ///
    /// If a note-on fails (typically a full queue), the notes already sent
    /// still get their note-offs and the error is returned.
    pub fn play(
        &mut self,
        id: InstanceId,
        port: &str,
        notes: &[u8],
        velocity: u8,
        len_ms: u64,
    ) -> Result<()> {
        let mut sent = Vec::with_capacity(notes.len());
        let mut result = Ok(());
        for &note in notes {
            match self.send_midi(id, port, &[NOTE_ON, note & 0x7f, velocity & 0x7f]) {
                Ok(()) => sent.push(note),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        if sent.is_empty() {
            return result;
        }

        let port = port.to_owned();
        self.scheduler
            .schedule(len_ms, NOTE_OFF_BLOCKS, move |host: &mut Host| {
                for note in sent {
                    // Failures are recorded by send_midi.
                    let _ = host.send_midi(id, &port, &[NOTE_OFF, note & 0x7f, 0]);
                }
            });
        result
    }

    /// Applies the registered preset `name` of the instance's plugin.
    /// Returns the number of port values applied.
    pub fn load_preset(&self, id: InstanceId, name: &str) -> Result<usize> {
        let result = self.try_load_preset(id, name);
        self.record("load_preset", result)
    }

    fn try_load_preset(&self, id: InstanceId, name: &str) -> Result<usize> {
        let handles = self.handles(id)?;
        let preset = self
            .registry
            .preset(handles.uri(), name)
            .ok_or_else(|| HostError::PresetNotFound {
                instance: id,
                preset: name.to_owned(),
            })?;
        Ok(handles.apply(preset))
    }

    /// Applies `preset` to an instance. Float values are written to the
    /// control ports of the same symbol; other values and unknown symbols are
    /// skipped. Returns the number of port values applied.
    pub fn apply_preset(&self, id: InstanceId, preset: &Preset) -> Result<usize> {
        let result = self.handles(id).map(|h| h.apply(preset));
        self.record("apply_preset", result)
    }

    // --- Scheduling ---

    /// Adds a root scheduling node firing every
    /// [`default_interval_ms`](HostConfig::default_interval_ms), starting
    /// with the next tick.
    pub fn add_node(
        &mut self,
        callback: impl FnMut(&mut Host, NodeId, u64) + Send + 'static,
    ) -> NodeId {
        let id = self.scheduler.add_node(Box::new(callback));
        if let Ok(node) = self.scheduler.node_mut(id) {
            node.set_interval(self.config.default_interval_ms);
        }
        id
    }

    /// Removes a node. Its children become roots.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let result = self.scheduler.remove_node(id).map_err(HostError::from);
        self.record("remove_node", result)
    }

    /// Borrows a node for its setters.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<Host>> {
        Ok(self.scheduler.node_mut(id)?)
    }

    /// Makes `child` take its timing from `parent`.
    pub fn follow(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        let result = self.scheduler.follow(child, parent).map_err(HostError::from);
        self.record("follow", result)
    }

    /// Returns `child` to its own interval.
    pub fn unfollow(&mut self, child: NodeId) -> Result<()> {
        let result = self.scheduler.unfollow(child).map_err(HostError::from);
        self.record("unfollow", result)
    }

    /// Re-arms a node that stopped at its count limit.
    pub fn restart(&mut self, id: NodeId) -> Result<()> {
        let result = self.scheduler.restart(id).map_err(HostError::from);
        self.record("restart", result)
    }

    /// Runs `callback` once, `delay_ms` from now and after at least
    /// `after_blocks` more rendered blocks.
    pub fn schedule(
        &mut self,
        delay_ms: u64,
        after_blocks: u64,
        callback: impl FnOnce(&mut Host) + Send + 'static,
    ) {
        self.scheduler.schedule(delay_ms, after_blocks, callback);
    }

    /// Runs one scheduler tick at `now_ms`. Returns the events fired.
    pub fn tick(&mut self, now_ms: u64) -> usize {
        Scheduler::tick(self, now_ms)
    }

    /// Ticks on `clock` every [`tick_ms`](HostConfig::tick_ms) until
    /// [`request_shutdown()`](Self::request_shutdown).
    pub fn run<K: Clock>(&mut self, clock: K) {
        let tick_loop = TickLoop::new(clock, self.config.tick_ms, Arc::clone(&self.shared));
        tick_loop.run(self);
    }

    /// Asks the tick loop and the stream owner to stop.
    pub fn request_shutdown(&self) {
        self.shared.request_shutdown();
    }

    // --- Audio ---

    /// Driver rendering this host's graph.
    pub fn driver(&self) -> AudioDriver {
        AudioDriver::new(Arc::clone(&self.graph), Arc::clone(&self.shared))
    }

    /// Stream settings derived from the configuration.
    pub fn stream_config(&self) -> BackendStreamConfig {
        BackendStreamConfig {
            sample_rate: self.config.sample_rate,
            buffer_size: self.config.block_size as u32,
            channels: self.config.output_channels as u16,
            device_name: self.config.device.clone(),
        }
    }

    /// Starts audio output on `backend`. Playback stops when the returned
    /// handle is dropped.
    pub fn start_stream(&self, backend: &dyn AudioBackend) -> Result<StreamHandle> {
        let config = self.stream_config();
        let actual = backend.actual_sample_rate(&config);
        if actual != config.sample_rate {
            tracing::warn!(
                "{} backend runs at {actual} Hz, graph configured for {} Hz",
                backend.name(),
                config.sample_rate
            );
        }

        let shared = Arc::clone(&self.shared);
        let callback = self.driver().into_callback(usize::from(config.channels));
        let result = backend
            .build_output_stream(
                &config,
                callback,
                Box::new(move |msg: &str| {
                    tracing::warn!("stream error: {msg}");
                    shared.report_error(&format_args!("stream error: {msg}"));
                }),
            )
            .map_err(HostError::from);
        if result.is_ok() {
            tracing::info!(backend = backend.name(), "output stream started");
        }
        self.record("start_stream", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{PluginDescriptor, PortDescriptor, Ports, Processor};

    struct Null;

    impl Processor for Null {
        fn run(&mut self, _ports: &mut Ports<'_>) {}
    }

    fn host() -> Host {
        let mut registry = PluginRegistry::new();
        registry.register(
            PluginDescriptor::new(
                "urn:test:null",
                "Null",
                vec![
                    PortDescriptor::control_input("gain", 0.0, 2.0, 1.0),
                    PortDescriptor::event_input("midi"),
                    PortDescriptor::audio_output("out"),
                ],
            ),
            |_| Box::new(Null),
        );
        Host::with_registry(HostConfig::default(), registry).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = HostConfig {
            block_size: 0,
            ..HostConfig::default()
        };
        assert!(matches!(Host::new(config), Err(HostError::Config(_))));
    }

    #[test]
    fn unknown_plugin_is_recorded() {
        let mut host = host();
        let err = host.instantiate("urn:test:missing").unwrap_err();
        assert!(matches!(err, HostError::PluginNotFound(_)));
        assert!(host.last_error().contains("urn:test:missing"));
        assert_eq!(host.shared().error_count(), 1);
    }

    #[test]
    fn set_param_clamps() {
        let mut host = host();
        let id = host.instantiate("urn:test:null").unwrap();
        assert_eq!(host.set_param(id, "gain", 5.0).unwrap(), 2.0);
        assert_eq!(host.set_param(id, "gain", 0.5).unwrap(), 0.5);
        assert!(host.set_param(id, "out", 0.5).is_err());
        assert!(host.last_error().starts_with("set_param"));
    }

    #[test]
    fn send_midi_queues_on_event_port() {
        let mut host = host();
        let id = host.instantiate("urn:test:null").unwrap();
        host.send_midi(id, "midi", &[0x90, 60, 100]).unwrap();
        let queue = host.graph().lock().event_queue(id, "midi").unwrap();
        assert_eq!(queue.pending(), 1);
        assert!(host.send_midi(id, "gain", &[0x90, 60, 100]).is_err());
    }

    #[test]
    fn freed_instance_rejects_commands() {
        let mut host = host();
        let id = host.instantiate("urn:test:null").unwrap();
        host.free_instance(id).unwrap();
        assert!(matches!(
            host.set_param(id, "gain", 1.0),
            Err(HostError::Graph(conduit_core::Error::InstanceNotFound(_)))
        ));
        assert!(host.send_midi(id, "midi", &[0x90, 60, 100]).is_err());
        assert!(host.free_instance(id).is_err());
    }

    #[test]
    fn add_node_uses_configured_interval() {
        let mut host = host();
        let id = host.add_node(|_, _, _| {});
        assert_eq!(
            host.node_mut(id).unwrap().interval_ms(),
            HostConfig::default().default_interval_ms
        );
    }
}
