//! In-memory plugin provider.
//!
//! [`PluginRegistry`] maps plugin URIs to a descriptor, a factory closure and
//! any number of named presets. It is the reference [`PluginProvider`]: hosts
//! that discover plugins elsewhere implement the trait themselves.
//!
//! ```rust
//! use conduit_core::{PluginDescriptor, PortDescriptor, PluginProvider, Ports, Processor};
//! use conduit_host::PluginRegistry;
//!
//! struct Silence;
//!
//! impl Processor for Silence {
//!     fn run(&mut self, ports: &mut Ports<'_>) {
//!         ports.audio_out(0).fill(0.0);
//!     }
//! }
//!
//! let mut registry = PluginRegistry::new();
//! registry.register(
//!     PluginDescriptor::new("urn:example:silence", "Silence", vec![PortDescriptor::audio_output("out")]),
//!     |_sample_rate| Box::new(Silence),
//! );
//! assert!(registry.instantiate("urn:example:silence", 48000.0).is_some());
//! ```

use conduit_core::{PluginDescriptor, PluginProvider, Preset, Processor};

/// Factory closure creating a processor for a sample rate.
pub type PluginFactory = Box<dyn Fn(f64) -> Box<dyn Processor> + Send>;

struct RegistryEntry {
    descriptor: PluginDescriptor,
    factory: PluginFactory,
    presets: Vec<Preset>,
}

/// Registry of plugins available to a host.
#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<RegistryEntry>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin, replacing any previous entry with the same URI.
    pub fn register(
        &mut self,
        descriptor: PluginDescriptor,
        factory: impl Fn(f64) -> Box<dyn Processor> + Send + 'static,
    ) {
        let entry = RegistryEntry {
            descriptor,
            factory: Box::new(factory),
            presets: Vec::new(),
        };
        match self.position(&entry.descriptor.uri) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Adds or replaces a preset for `uri`. Returns false if the plugin is
    /// not registered.
    pub fn add_preset(&mut self, uri: &str, preset: Preset) -> bool {
        let Some(i) = self.position(uri) else {
            return false;
        };
        let presets = &mut self.entries[i].presets;
        match presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => presets.push(preset),
        }
        true
    }

    /// Removes a plugin and returns its descriptor.
    ///
    /// Live instances are not touched here; use
    /// [`Host::unload_plugin()`](crate::Host::unload_plugin) to tear them
    /// down as well.
    pub fn unregister(&mut self, uri: &str) -> Option<PluginDescriptor> {
        let i = self.position(uri)?;
        Some(self.entries.remove(i).descriptor)
    }

    /// Presets registered for `uri`.
    pub fn presets(&self, uri: &str) -> &[Preset] {
        self.position(uri)
            .map(|i| self.entries[i].presets.as_slice())
            .unwrap_or_default()
    }

    /// Returns the number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, uri: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.descriptor.uri == uri)
    }
}

impl PluginProvider for PluginRegistry {
    fn descriptor(&self, uri: &str) -> Option<&PluginDescriptor> {
        self.position(uri).map(|i| &self.entries[i].descriptor)
    }

    fn instantiate(&self, uri: &str, sample_rate: f64) -> Option<Box<dyn Processor>> {
        self.position(uri)
            .map(|i| (self.entries[i].factory)(sample_rate))
    }

    fn uris(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.uri.as_str())
            .collect()
    }

    fn preset(&self, uri: &str, name: &str) -> Option<&Preset> {
        self.presets(uri).iter().find(|p| p.name == name)
    }
}
