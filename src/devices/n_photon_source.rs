use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::{Result, SimulationError};
use crate::core::physics::PhysicsError;
use crate::core::signals::{PortSpec, Signal, SignalType};
use log::debug;

/// Emits an n-photon Fock state on every true trigger
pub struct IdealNPhotonSource {
    core: DeviceCore,
    photon_num: Option<u32>,
}

impl IdealNPhotonSource {
    pub const KIND: &'static str = "IdealNPhotonSource";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("trigger", SignalType::Bool),
        PortSpec::input_optional("photon_num", SignalType::Int),
        PortSpec::output("output", SignalType::Quantum),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            photon_num: None,
        }
    }

    /// Number of photons emitted per pulse
    pub fn set_photon_num(&mut self, photon_num: u32) {
        self.photon_num = Some(photon_num);
    }

    pub fn photon_num(&self) -> Option<u32> {
        self.photon_num
    }
}

impl Device for IdealNPhotonSource {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        if let Some(count) = inputs.int("photon_num") {
            let count = u32::try_from(count)
                .map_err(|_| PhysicsError::Model(format!("Invalid photon number {}", count)))?;
            self.photon_num = Some(count);
        }

        if !inputs.bool("trigger").unwrap_or(false) {
            return Ok(Vec::new());
        }

        let photons = self.photon_num.ok_or_else(|| SimulationError::MissingParameter {
            device: self.core.info().describe(),
            parameter: "photon_num".to_string(),
        })?;

        let state = ctx.physics().number_state(photons)?;
        let (mode, index) = ctx.create_mode();
        ctx.backend().initialize_number_state(photons, &[index])?;
        debug!(
            "Source - {} - assigning mode {} to signal on port output",
            self.core.info(),
            index
        );

        Ok(vec![Emission::new("output", Signal::quantum(state, Some(mode)), ctx.time())])
    }
}
