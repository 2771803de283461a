use crate::core::devices::Device;
use crate::core::error::{Result, SimulationError};
use crate::core::types::DeviceId;
use std::collections::HashMap;

/// Manages registration and storage of all devices in a simulation
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, Box<dyn Device>>,
    /// Registration order, for deterministic iteration
    order: Vec<DeviceId>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device instance
    pub fn register(&mut self, device: Box<dyn Device>) -> Result<DeviceId> {
        let id = device.id();
        if self.devices.contains_key(&id) {
            return Err(SimulationError::DuplicateDeviceId(id));
        }
        self.devices.insert(id, device);
        self.order.push(id);
        Ok(id)
    }

    /// Get a device by ID
    pub fn get(&self, id: &DeviceId) -> Option<&dyn Device> {
        self.devices.get(id).map(|d| d.as_ref())
    }

    /// Get a mutable device by ID
    pub fn get_mut(&mut self, id: &DeviceId) -> Option<&mut Box<dyn Device>> {
        self.devices.get_mut(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    /// Device description for messages, falling back to the bare id
    pub fn describe(&self, id: &DeviceId) -> String {
        self.devices
            .get(id)
            .map(|d| d.core().info().describe())
            .unwrap_or_else(|| id.to_string())
    }

    /// Device ids in registration order
    pub fn ids(&self) -> &[DeviceId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
