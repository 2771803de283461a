use crate::core::error::{Result, SimulationError};
use crate::core::signals::signal::{Signal, SignalType};
use crate::core::types::{DeviceId, Direction, PortRef};

/// Immutable port declaration, shared by every instance of a device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub label: &'static str,
    pub direction: Direction,
    pub signal_type: SignalType,
    /// Dispatch fails unless this port has a computed signal
    pub required: bool,
    /// Port may hold several signals at once
    pub allow_multiple: bool,
}

impl PortSpec {
    /// Create a new required input port
    pub const fn input(label: &'static str, signal_type: SignalType) -> Self {
        Self {
            label,
            direction: Direction::Input,
            signal_type,
            required: true,
            allow_multiple: false,
        }
    }

    /// Create a new optional input port
    pub const fn input_optional(label: &'static str, signal_type: SignalType) -> Self {
        Self {
            required: false,
            ..Self::input(label, signal_type)
        }
    }

    /// Create a new output port
    pub const fn output(label: &'static str, signal_type: SignalType) -> Self {
        Self {
            label,
            direction: Direction::Output,
            signal_type,
            required: false,
            allow_multiple: false,
        }
    }

    /// Allow this port to hold several signals
    pub const fn multiple(self) -> Self {
        Self {
            allow_multiple: true,
            ..self
        }
    }
}

/// A device-owned port built from a [`PortSpec`]
#[derive(Debug, Clone)]
pub struct Port {
    spec: PortSpec,
    device: DeviceId,
    signals: Vec<Signal>,
}

impl Port {
    pub fn new(spec: PortSpec, device: DeviceId) -> Self {
        Self {
            spec,
            device,
            signals: Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.spec.label
    }

    pub fn direction(&self) -> Direction {
        self.spec.direction
    }

    pub fn signal_type(&self) -> SignalType {
        self.spec.signal_type
    }

    pub fn required(&self) -> bool {
        self.spec.required
    }

    pub fn allow_multiple(&self) -> bool {
        self.spec.allow_multiple
    }

    /// Owning device
    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn port_ref(&self) -> PortRef {
        PortRef::new(self.device, self.spec.label, self.spec.direction)
    }

    /// First attached signal
    pub fn signal(&self) -> Option<&Signal> {
        self.signals.first()
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn is_connected(&self) -> bool {
        !self.signals.is_empty()
    }

    /// Check that `signal` could be attached, without side effects
    pub(crate) fn check_attach(
        &self,
        signal: &Signal,
        override_existing: bool,
        device: &str,
    ) -> Result<()> {
        if !self.spec.allow_multiple && self.is_connected() && !override_existing {
            return Err(SimulationError::PortAlreadyConnected {
                device: device.to_string(),
                port: self.spec.label.to_string(),
            });
        }

        if !signal.signal_type().is_subtype_of(self.spec.signal_type) {
            return Err(SimulationError::PortTypeMismatch {
                device: device.to_string(),
                port: self.spec.label.to_string(),
                expected: self.spec.signal_type,
                actual: signal.signal_type(),
            });
        }

        Ok(())
    }

    /// Attach `signal`, returning any signals displaced by an override
    pub(crate) fn attach(
        &mut self,
        signal: &Signal,
        override_existing: bool,
        device: &str,
    ) -> Result<Vec<Signal>> {
        self.check_attach(signal, override_existing, device)?;

        let port_ref = self.port_ref();
        let mut displaced = Vec::new();

        if self.spec.allow_multiple {
            if self.signals.iter().any(|s| s.same_as(signal)) {
                return Ok(displaced);
            }
        } else {
            displaced = std::mem::take(&mut self.signals);
            for old in &displaced {
                old.remove_port(&port_ref);
            }
        }

        signal.add_port(port_ref);
        self.signals.push(signal.clone());
        Ok(displaced)
    }

    /// Drop every attached signal
    pub(crate) fn detach_all(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    /// Drop one specific signal; true if it was attached
    pub(crate) fn detach(&mut self, signal: &Signal) -> bool {
        let before = self.signals.len();
        self.signals.retain(|s| !s.same_as(signal));
        before != self.signals.len()
    }
}

/// Per-instance port table, in declaration order
#[derive(Debug, Clone)]
pub struct PortTable {
    ports: Vec<Port>,
}

impl PortTable {
    /// Build an owned table from a device kind's template
    pub fn from_template(device: DeviceId, template: &[PortSpec]) -> Self {
        Self {
            ports: template.iter().map(|spec| Port::new(*spec, device)).collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.label() == label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.label() == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction() == Direction::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction() == Direction::Output)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
