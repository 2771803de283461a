use super::context::{DeviceContext, Emission, Inputs};
use crate::core::error::{Result, SimulationError};
use crate::core::signals::{Port, PortSpec, PortTable, Signal};
use crate::core::types::{AsAny, DeviceId, Direction, PortRef};
use std::rc::Rc;

/// Identity of a device instance
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: Option<String>,
    /// Device kind, e.g. `IdealBeamSplitter`
    pub kind: &'static str,
}

impl DeviceInfo {
    /// Human-readable description used in errors and logs
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} '{}' ({})", self.kind, name, self.id),
            None => write!(f, "{} ({})", self.kind, self.id),
        }
    }
}

/// Progress callbacks around a device computation
pub trait ProgressCoordinator {
    fn start_processing(&self, device: &DeviceInfo);
    fn processing_finished(&self, device: &DeviceInfo);
}

/// State shared by every device kind: identity, owned ports, coordinator
pub struct DeviceCore {
    info: DeviceInfo,
    ports: PortTable,
    coordinator: Option<Rc<dyn ProgressCoordinator>>,
}

impl DeviceCore {
    /// Build a core with a fresh id and a private copy of `template`
    pub fn new(kind: &'static str, name: Option<&str>, template: &[PortSpec]) -> Self {
        Self::with_id(DeviceId::new(), kind, name, template)
    }

    /// Build a core under a caller-chosen id
    pub fn with_id(id: DeviceId, kind: &'static str, name: Option<&str>, template: &[PortSpec]) -> Self {
        Self {
            info: DeviceInfo {
                id,
                name: name.map(str::to_string),
                kind,
            },
            ports: PortTable::from_template(id, template),
            coordinator: None,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    pub(crate) fn ports_mut(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    pub fn coordinator(&self) -> Option<Rc<dyn ProgressCoordinator>> {
        self.coordinator.clone()
    }

    pub fn set_coordinator(&mut self, coordinator: Option<Rc<dyn ProgressCoordinator>>) {
        self.coordinator = coordinator;
    }

    /// Port by label, `NoSuchPort` if undeclared
    pub fn port(&self, label: &str) -> Result<&Port> {
        self.ports.get(label).ok_or_else(|| SimulationError::NoSuchPort {
            device: self.info.describe(),
            port: label.to_string(),
        })
    }

    pub(crate) fn port_mut(&mut self, label: &str) -> Result<&mut Port> {
        let device = &self.info;
        self.ports
            .get_mut(label)
            .ok_or_else(|| SimulationError::NoSuchPort {
                device: device.describe(),
                port: label.to_string(),
            })
    }

    /// Port matching both label and direction of `port`
    pub(crate) fn port_for(&self, port: &PortRef) -> Result<&Port> {
        match self.ports.get(port.label()) {
            Some(p) if p.direction() == port.direction() => Ok(p),
            _ => Err(SimulationError::NoSuchPort {
                device: self.info.describe(),
                port: port.label().to_string(),
            }),
        }
    }

    /// Attach `signal` to the port labelled `label`
    pub fn register_signal(&mut self, signal: &Signal, label: &str, override_existing: bool) -> Result<()> {
        let device = self.info.describe();
        let port = self.port_mut(label)?;
        port.attach(signal, override_existing, &device)?;
        Ok(())
    }

    /// Input ports reached through the signals currently on output `label`
    ///
    /// Follows the live connection on each signal, so rebinding a signal
    /// after wiring changes where outputs go.
    pub fn downstream(&self, label: &str) -> Result<Vec<PortRef>> {
        let port = self.port(label)?;
        let own = port.port_ref();

        let mut targets: Vec<PortRef> = Vec::new();
        for signal in port.signals() {
            for target in signal.ports() {
                if target.direction() == Direction::Input && target != own && !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        Ok(targets)
    }
}

/// A simulated device
///
/// Implementations hold a [`DeviceCore`] and override `des_action`; the
/// engine runs it inside the execution pipeline once all required inputs
/// are computed.
pub trait Device: AsAny {
    fn core(&self) -> &DeviceCore;

    fn core_mut(&mut self) -> &mut DeviceCore;

    /// Compute the outputs for one dispatch
    fn des_action(&mut self, _ctx: &mut DeviceContext<'_>, _inputs: &Inputs) -> Result<Vec<Emission>> {
        Err(SimulationError::ActionNotDefined {
            device: self.core().info().describe(),
        })
    }

    fn id(&self) -> DeviceId {
        self.core().info().id
    }

    fn name(&self) -> Option<&str> {
        self.core().info().name.as_deref()
    }

    fn register_signal(&mut self, signal: &Signal, label: &str, override_existing: bool) -> Result<()> {
        self.core_mut().register_signal(signal, label, override_existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signals::SignalType;

    const PORTS: &[PortSpec] = &[
        PortSpec::input("input", SignalType::Quantum),
        PortSpec::output("output", SignalType::Quantum),
    ];

    struct Inert {
        core: DeviceCore,
    }

    impl Device for Inert {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut DeviceCore {
            &mut self.core
        }
    }

    #[test]
    fn test_describe_includes_kind_and_name() {
        let core = DeviceCore::new("Inert", Some("lamp"), PORTS);
        let id = core.info().id;
        assert_eq!(core.info().describe(), format!("Inert 'lamp' ({})", id));

        let unnamed = DeviceCore::new("Inert", None, PORTS);
        assert!(unnamed.info().describe().starts_with("Inert ("));
    }

    #[test]
    fn test_register_signal_on_unknown_port() {
        let mut device = Inert {
            core: DeviceCore::new("Inert", None, PORTS),
        };
        let signal = Signal::new(SignalType::Quantum);
        let result = device.register_signal(&signal, "missing", false);
        assert!(matches!(result, Err(SimulationError::NoSuchPort { port, .. }) if port == "missing"));
        assert!(signal.ports().is_empty());
    }

    #[test]
    fn test_downstream_follows_live_signal() {
        let mut producer = DeviceCore::new("Inert", None, PORTS);
        let mut consumer = DeviceCore::new("Inert", None, PORTS);
        assert!(producer.downstream("output").unwrap().is_empty());

        let wire = Signal::new(SignalType::Quantum);
        producer.register_signal(&wire, "output", false).unwrap();
        consumer.register_signal(&wire, "input", false).unwrap();

        assert_eq!(
            producer.downstream("output").unwrap(),
            vec![consumer.info().id.input("input")]
        );
    }
}
