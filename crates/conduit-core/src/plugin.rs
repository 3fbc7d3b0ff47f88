//! Plugin-facing traits and port descriptors.
//!
//! A plugin is described by a [`PluginDescriptor`] (URI plus ordered ports) and
//! processed through a boxed [`Processor`]. Where plugins come from is up to a
//! [`PluginProvider`]; the host only needs descriptors, instances and presets.
//!
//! # Processing contract
//!
//! [`Processor::run()`] is called on the audio thread at most once per graph
//! pass, with a [`Ports`] view indexed in descriptor order. Audio inputs are
//! already mixed, audio outputs must be fully written for `frames` samples,
//! event inputs hold the messages delivered for this block and event outputs
//! start empty.

use crate::event_buffer::{EventBuffer, EventIter};
use crate::graph::port::{Port, PortRole, control_range};

/// What a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Single float value.
    Control,
    /// Block of audio samples.
    Audio,
    /// Sequence of timestamped messages.
    Event,
}

/// Direction of data flow relative to the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    /// Read by the plugin.
    Input,
    /// Written by the plugin.
    Output,
}

/// Static description of one plugin port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortDescriptor {
    /// Symbolic name used for connections and presets.
    pub symbol: String,
    /// Port kind.
    pub kind: PortKind,
    /// Port direction.
    pub direction: PortDirection,
    /// Lower bound for control values.
    pub min: f32,
    /// Upper bound for control values.
    pub max: f32,
    /// Initial control value.
    pub default: f32,
}

impl PortDescriptor {
    fn new(symbol: &str, kind: PortKind, direction: PortDirection) -> Self {
        Self {
            symbol: symbol.to_owned(),
            kind,
            direction,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            default: 0.0,
        }
    }

    /// Control input ranged `[min, max]` starting at `default`.
    ///
    /// Reversed bounds are swapped and a NaN bound leaves that side open. A
    /// NaN default becomes 0 clamped into the range.
    pub fn control_input(symbol: &str, min: f32, max: f32, default: f32) -> Self {
        let (min, max) = control_range(min, max);
        let default = if default.is_nan() { 0.0 } else { default };
        Self {
            min,
            max,
            default: default.clamp(min, max),
            ..Self::new(symbol, PortKind::Control, PortDirection::Input)
        }
    }

    /// Audio input.
    pub fn audio_input(symbol: &str) -> Self {
        Self::new(symbol, PortKind::Audio, PortDirection::Input)
    }

    /// Audio output.
    pub fn audio_output(symbol: &str) -> Self {
        Self::new(symbol, PortKind::Audio, PortDirection::Output)
    }

    /// Event input.
    pub fn event_input(symbol: &str) -> Self {
        Self::new(symbol, PortKind::Event, PortDirection::Input)
    }

    /// Event output.
    pub fn event_output(symbol: &str) -> Self {
        Self::new(symbol, PortKind::Event, PortDirection::Output)
    }
}

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    /// Unique plugin URI.
    pub uri: String,
    /// Human-readable name.
    pub name: String,
    /// Ports in index order.
    pub ports: Vec<PortDescriptor>,
}

impl PluginDescriptor {
    /// Creates a descriptor.
    pub fn new(uri: &str, name: &str, ports: Vec<PortDescriptor>) -> Self {
        Self {
            uri: uri.to_owned(),
            name: name.to_owned(),
            ports,
        }
    }

    /// Index of the port named `symbol`.
    pub fn port_index(&self, symbol: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.symbol == symbol)
    }
}

/// A value stored in a preset.
#[derive(Debug, Clone, PartialEq)]
pub enum PresetValue {
    /// Float value, applied to the control port of the same symbol.
    Float(f32),
    /// Any other typed value (type URI and raw bytes). Not applied to ports.
    Other {
        /// Type URI of the value.
        type_uri: String,
        /// Raw encoded value.
        bytes: Vec<u8>,
    },
}

/// Named set of port values.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    /// Preset name, unique per plugin.
    pub name: String,
    /// `(port symbol, value)` pairs.
    pub values: Vec<(String, PresetValue)>,
}

impl Preset {
    /// Creates a preset from float control values.
    pub fn from_floats(name: &str, values: &[(&str, f32)]) -> Self {
        Self {
            name: name.to_owned(),
            values: values
                .iter()
                .map(|&(s, v)| (s.to_owned(), PresetValue::Float(v)))
                .collect(),
        }
    }
}

/// Per-instance signal processing.
pub trait Processor: Send {
    /// Called once before the first block.
    fn activate(&mut self, sample_rate: f64) {
        let _ = sample_rate;
    }

    /// Processes one block of `ports.frames()` samples.
    fn run(&mut self, ports: &mut Ports<'_>);

    /// Called once when the instance is removed.
    fn deactivate(&mut self) {}
}

/// Source of plugin descriptors, instances and presets.
pub trait PluginProvider {
    /// Descriptor for `uri`, if known.
    fn descriptor(&self, uri: &str) -> Option<&PluginDescriptor>;

    /// Creates a processor for `uri`.
    fn instantiate(&self, uri: &str, sample_rate: f64) -> Option<Box<dyn Processor>>;

    /// URIs of all known plugins.
    fn uris(&self) -> Vec<&str>;

    /// Named preset for `uri`.
    fn preset(&self, uri: &str, name: &str) -> Option<&Preset> {
        let _ = (uri, name);
        None
    }
}

/// Processor view over an instance's ports for one block.
///
/// Accessors index ports in descriptor order. Asking for a port with the wrong
/// role yields a neutral value (0.0, an empty slice or an empty iterator), so
/// a processor never panics on a miswired descriptor.
pub struct Ports<'a> {
    frames: usize,
    ports: &'a mut [Port],
}

impl<'a> Ports<'a> {
    pub(crate) fn new(frames: usize, ports: &'a mut [Port]) -> Self {
        Self { frames, ports }
    }

    /// Samples in this block.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Returns true if the plugin has no ports.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Current value of control port `index`.
    #[inline]
    pub fn control(&self, index: usize) -> f32 {
        match self.ports.get(index).map(|p| &p.role) {
            Some(PortRole::Control(value)) => value.get(),
            _ => 0.0,
        }
    }

    /// Mixed input samples of audio input `index`.
    #[inline]
    pub fn audio_in(&self, index: usize) -> &[f32] {
        match self.ports.get(index).map(|p| &p.role) {
            Some(PortRole::AudioInput { mixed, .. }) => &mixed[..self.frames],
            _ => &[],
        }
    }

    /// Output samples of audio output `index`.
    #[inline]
    pub fn audio_out(&mut self, index: usize) -> &mut [f32] {
        let frames = self.frames;
        match self.ports.get_mut(index).map(|p| &mut p.role) {
            Some(PortRole::AudioOutput { buffer }) => &mut buffer[..frames],
            _ => &mut [],
        }
    }

    /// Borrows an audio input and an audio output at once.
    pub fn audio_in_out(&mut self, input: usize, output: usize) -> (&[f32], &mut [f32]) {
        let frames = self.frames;
        if input == output || input >= self.ports.len() || output >= self.ports.len() {
            return (&[], &mut []);
        }
        let (inp, out) = if input < output {
            let (lo, hi) = self.ports.split_at_mut(output);
            (&lo[input], &mut hi[0])
        } else {
            let (lo, hi) = self.ports.split_at_mut(input);
            (&hi[0], &mut lo[output])
        };
        let inp: &[f32] = match &inp.role {
            PortRole::AudioInput { mixed, .. } => &mixed[..frames],
            _ => &[],
        };
        let out: &mut [f32] = match &mut out.role {
            PortRole::AudioOutput { buffer } => &mut buffer[..frames],
            _ => &mut [],
        };
        (inp, out)
    }

    /// Events delivered to event input `index` for this block.
    pub fn events_in(&self, index: usize) -> EventIter<'_> {
        match self.ports.get(index).map(|p| &p.role) {
            Some(PortRole::EventInput { delivered, .. }) => delivered.iter(),
            _ => EventIter::empty(),
        }
    }

    /// Event output `index`, cleared before this block.
    pub fn events_out(&mut self, index: usize) -> Option<&mut EventBuffer> {
        match self.ports.get_mut(index).map(|p| &mut p.role) {
            Some(PortRole::EventOutput { buffer }) => Some(buffer),
            _ => None,
        }
    }
}
