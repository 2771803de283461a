pub mod context;
pub mod device;

pub use context::{DeviceContext, Emission, FollowUp, Inputs};
pub use device::{Device, DeviceCore, DeviceInfo, ProgressCoordinator};
