use crate::core::backend::BackendError;
use crate::core::physics::PhysicsError;
use crate::core::signals::SignalType;
use crate::core::types::{DeviceId, SignalId, SimTime};

/// Error types for simulation setup and dispatch
///
/// `device` fields hold a human-readable description of the device
/// (kind, name and id) so that a failed run identifies the culprit.
#[derive(Debug, Clone)]
pub enum SimulationError {
    /// Port label not declared by the device
    NoSuchPort { device: String, port: String },
    /// Device id not present in the registry
    NoSuchDevice(DeviceId),
    /// Port already holds a signal and override was not requested
    PortAlreadyConnected { device: String, port: String },
    /// Signal type is neither the port's type nor one of its subtypes
    PortTypeMismatch {
        device: String,
        port: String,
        expected: SignalType,
        actual: SignalType,
    },
    /// Payload does not fit the signal's declared type
    PayloadTypeMismatch {
        signal: SignalId,
        expected: SignalType,
        actual: SignalType,
    },
    /// Signal was already marked computed
    AlreadyComputed(SignalId),
    /// Bounded wait on a signal elapsed before it was computed
    SignalPending(SignalId),
    /// Device kind defines no simulation action
    ActionNotDefined { device: String },
    /// A device with this id is already registered
    DuplicateDeviceId(DeviceId),
    /// Event scheduled before the event currently being processed
    CausalityViolation { scheduled: SimTime, current: SimTime },
    /// Time is NaN or infinite
    InvalidTime(SimTime),
    /// Required input port has neither an attached nor a supplied signal
    MissingInput { device: String, port: String },
    /// Input is still pending: a required attachment, or any signal delivered with the event
    InputNotComputed { device: String, port: String },
    /// Device emitted a signal that was never marked computed
    OutputNotComputed { device: String, port: String },
    /// Device emitted on a label that is not one of its output ports
    UnknownOutputPort { device: String, port: String },
    /// Output produced on a port with no live downstream connection
    UnroutedOutput { device: String, port: String },
    /// Arrival carries no timing uncertainty, so no flush delay can be computed
    MissingTimingUncertainty { device: String, port: String },
    /// Device was triggered before one of its parameters was provided
    MissingParameter { device: String, parameter: String },
    /// Same device dispatched too often at one instant
    NoForwardProgress {
        device: String,
        time: SimTime,
        dispatches: u32,
    },
    /// Failure reported by the state-physics collaborator
    Physics(PhysicsError),
    /// Failure reported by the computational backend
    Backend(BackendError),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::NoSuchPort { device, port } => {
                write!(f, "Port with label '{}' does not exist on {}", port, device)
            }
            SimulationError::NoSuchDevice(id) => write!(f, "Device '{}' is not registered", id),
            SimulationError::PortAlreadyConnected { device, port } => write!(
                f,
                "Signal was already registered for port '{}' on {}; set override to replace it",
                port, device
            ),
            SimulationError::PortTypeMismatch {
                device,
                port,
                expected,
                actual,
            } => write!(
                f,
                "Port '{}' on {} expects {} signals, got {}",
                port, device, expected, actual
            ),
            SimulationError::PayloadTypeMismatch {
                signal,
                expected,
                actual,
            } => write!(
                f,
                "Payload of type {} does not fit {} of type {}",
                actual, signal, expected
            ),
            SimulationError::AlreadyComputed(signal) => {
                write!(f, "{} was already computed", signal)
            }
            SimulationError::SignalPending(signal) => {
                write!(f, "{} was not computed within the wait bound", signal)
            }
            SimulationError::ActionNotDefined { device } => {
                write!(f, "{} defines no simulation action", device)
            }
            SimulationError::DuplicateDeviceId(id) => {
                write!(f, "Device with ID '{}' is already registered", id)
            }
            SimulationError::CausalityViolation { scheduled, current } => write!(
                f,
                "Event scheduled at {:.3e}s precedes current time {:.3e}s",
                scheduled, current
            ),
            SimulationError::InvalidTime(time) => write!(f, "Invalid simulation time {}", time),
            SimulationError::MissingInput { device, port } => {
                write!(f, "Required input '{}' of {} has no signal", port, device)
            }
            SimulationError::InputNotComputed { device, port } => write!(
                f,
                "Input '{}' of {} is still pending",
                port, device
            ),
            SimulationError::OutputNotComputed { device, port } => write!(
                f,
                "Output '{}' of {} was emitted before being computed",
                port, device
            ),
            SimulationError::UnknownOutputPort { device, port } => {
                write!(f, "{} has no output port '{}'", device, port)
            }
            SimulationError::UnroutedOutput { device, port } => {
                write!(f, "Output '{}' of {} is not connected", port, device)
            }
            SimulationError::MissingTimingUncertainty { device, port } => write!(
                f,
                "Arrival on port '{}' of {} has no timing uncertainty",
                port, device
            ),
            SimulationError::MissingParameter { device, parameter } => {
                write!(f, "{} was triggered without parameter '{}'", device, parameter)
            }
            SimulationError::NoForwardProgress {
                device,
                time,
                dispatches,
            } => write!(
                f,
                "{} was dispatched {} times at {:.3e}s without time advancing",
                device, dispatches, time
            ),
            SimulationError::Physics(err) => write!(f, "Physics error: {}", err),
            SimulationError::Backend(err) => write!(f, "Backend error: {}", err),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Physics(err) => Some(err),
            SimulationError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PhysicsError> for SimulationError {
    fn from(err: PhysicsError) -> Self {
        SimulationError::Physics(err)
    }
}

impl From<BackendError> for SimulationError {
    fn from(err: BackendError) -> Self {
        SimulationError::Backend(err)
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
