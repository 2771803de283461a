pub mod core;
pub mod devices;

// Re-export commonly used types
pub use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
pub use crate::core::error::{Result, SimulationError};
pub use crate::core::execution::{EventFlags, Simulation, SimulationConfig, SimulationObserver};
pub use crate::core::signals::{Payload, PortSpec, Signal, SignalType};
pub use crate::core::types::{DeviceId, PortRef, SimTime, StateId};
