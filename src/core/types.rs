use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Simulated time in seconds
pub type SimTime = f64;

/// Unique device identifier, generated at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Create a fresh random device ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn uuid(&self) -> &Uuid {
        &self.0
    }

    /// Create an output port handle
    pub fn output(&self, label: &str) -> PortRef {
        PortRef::new(*self, label, Direction::Output)
    }

    /// Create an input port handle
    pub fn input(&self, label: &str) -> PortRef {
        PortRef::new(*self, label, Direction::Input)
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Handle naming one port of one device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub(crate) device: DeviceId,
    pub(crate) label: String,
    pub(crate) direction: Direction,
}

impl PortRef {
    pub fn new(device: DeviceId, label: &str, direction: Direction) -> Self {
        Self {
            device,
            label: label.to_string(),
            direction,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.device, self.label)
    }
}

static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static STATE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-local signal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    pub(crate) fn next() -> Self {
        Self(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

/// Opaque handle to a quantum state owned by the state-physics collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u64);

impl StateId {
    /// Allocate a fresh handle. Physics implementations call this for every new state.
    pub fn next() -> Self {
        Self(STATE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

/// Sequence number of a scheduled event; also the FIFO tie-breaker
pub type EventId = u64;

/// Upcast helper so trait objects can be downcast to their concrete type
pub trait AsAny: std::any::Any {
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

impl<T: std::any::Any> AsAny for T {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
