use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::{Result, SimulationError};
use crate::core::signals::{Payload, PortSpec, Signal, SignalType};
use crate::core::types::SimTime;
use log::info;

/// Photon-number resolving detector
///
/// Measures the incoming state and emits the count on `output` at the
/// arrival time.
pub struct IdealDetector {
    core: DeviceCore,
    detections: Vec<(SimTime, u32)>,
}

impl IdealDetector {
    pub const KIND: &'static str = "IdealDetector";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input("input", SignalType::Quantum),
        PortSpec::output("output", SignalType::Int),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            detections: Vec::new(),
        }
    }

    /// Measurement outcomes in dispatch order
    pub fn detections(&self) -> &[(SimTime, u32)] {
        &self.detections
    }

    pub fn total_photons(&self) -> u64 {
        self.detections.iter().map(|(_, n)| u64::from(*n)).sum()
    }
}

impl Device for IdealDetector {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        let state = inputs
            .state("input")
            .ok_or_else(|| SimulationError::MissingInput {
                device: self.core.info().describe(),
                port: "input".to_string(),
            })?;

        let photons = ctx.physics().measure(state)?;
        info!("{} measured {} photon(s)", self.core.info(), photons);
        self.detections.push((ctx.time(), photons));

        Ok(vec![Emission::new(
            "output",
            Signal::computed(Payload::Int(i64::from(photons))),
            ctx.time(),
        )])
    }
}
