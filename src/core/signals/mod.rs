pub mod port;
pub mod signal;

pub use port::{Port, PortSpec, PortTable};
pub use signal::{Payload, Signal, SignalType};
