use crate::core::signals::Signal;
use crate::core::types::{DeviceId, EventId, SimTime};
use serde::{Deserialize, Serialize};

/// Processing flags carried by an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFlags {
    /// Self-scheduled wake-up asking the device to flush buffered work
    pub process_now: bool,
}

impl EventFlags {
    pub fn process_now() -> Self {
        Self { process_now: true }
    }
}

/// Scheduled dispatch of input signals to one device
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub time: SimTime,
    pub target: DeviceId,
    /// Payload signals keyed by input port label
    pub signals: Vec<(String, Signal)>,
    pub flags: EventFlags,
}

impl Event {
    pub fn new(
        id: EventId,
        time: SimTime,
        target: DeviceId,
        signals: Vec<(String, Signal)>,
        flags: EventFlags,
    ) -> Self {
        Self {
            id,
            time,
            target,
            signals,
            flags,
        }
    }
}
