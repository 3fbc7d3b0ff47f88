//! Control-thread handles into an instance's ports.
//!
//! Parameter writes, MIDI and presets go through [`ControlValue`] and
//! [`EventQueue`] handles captured once when the instance is created. They
//! share storage with the graph, so these commands never take the graph lock
//! and cannot collide with a render.

use conduit_core::{
    ControlValue, Error, EventQueue, ExpectedRole, Graph, InstanceId, PluginDescriptor, PortDirection,
    PortKind, Preset, PresetValue,
};

enum Handle {
    Control(ControlValue),
    Events(EventQueue),
    /// Audio ports and event outputs; nothing to command.
    None,
}

/// Handles for one live instance.
pub(crate) struct InstanceHandles {
    id: InstanceId,
    uri: String,
    ports: Vec<(String, Handle)>,
}

impl InstanceHandles {
    /// Captures the handles of instance `id`, created from `descriptor`.
    pub fn capture(
        graph: &Graph,
        id: InstanceId,
        descriptor: &PluginDescriptor,
    ) -> conduit_core::Result<Self> {
        let ports = descriptor
            .ports
            .iter()
            .map(|port| -> conduit_core::Result<(String, Handle)> {
                let handle = match (port.kind, port.direction) {
                    (PortKind::Control, _) => Handle::Control(graph.control(id, &port.symbol)?),
                    (PortKind::Event, PortDirection::Input) => {
                        Handle::Events(graph.event_queue(id, &port.symbol)?)
                    }
                    _ => Handle::None,
                };
                Ok((port.symbol.clone(), handle))
            })
            .collect::<conduit_core::Result<Vec<_>>>()?;
        Ok(Self {
            id,
            uri: descriptor.uri.clone(),
            ports,
        })
    }

    /// URI of the instance's plugin.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn control(&self, symbol: &str) -> conduit_core::Result<&ControlValue> {
        match self.find(symbol)? {
            Handle::Control(value) => Ok(value),
            _ => Err(self.wrong_role(symbol, ExpectedRole::Control)),
        }
    }

    pub fn event_queue(&self, symbol: &str) -> conduit_core::Result<&EventQueue> {
        match self.find(symbol)? {
            Handle::Events(queue) => Ok(queue),
            _ => Err(self.wrong_role(symbol, ExpectedRole::EventInput)),
        }
    }

    /// Writes the float values of `preset` to the control ports of the same
    /// symbol. Returns the number applied.
    pub fn apply(&self, preset: &Preset) -> usize {
        let mut applied = 0;
        for (symbol, value) in &preset.values {
            match value {
                PresetValue::Float(v) => match self.control(symbol) {
                    Ok(control) => {
                        control.set(*v);
                        applied += 1;
                    }
                    Err(e) => tracing::debug!("preset {}: skipping '{symbol}': {e}", preset.name),
                },
                PresetValue::Other { type_uri, .. } => {
                    tracing::debug!("preset {}: skipping '{symbol}' of type {type_uri}", preset.name);
                }
            }
        }
        applied
    }

    fn find(&self, symbol: &str) -> conduit_core::Result<&Handle> {
        self.ports
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, handle)| handle)
            .ok_or_else(|| Error::PortNotFound {
                instance: self.id,
                symbol: symbol.to_owned(),
            })
    }

    fn wrong_role(&self, symbol: &str, expected: ExpectedRole) -> Error {
        Error::WrongPortRole {
            instance: self.id,
            symbol: symbol.to_owned(),
            expected,
        }
    }
}
