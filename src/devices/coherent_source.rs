use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::{Result, SimulationError};
use crate::core::signals::{PortSpec, Signal, SignalType};
use num_complex::Complex64;

/// Emits a coherent state `|alpha e^{i phi}>` on every true trigger
pub struct IdealCoherentSource {
    core: DeviceCore,
    alpha: Option<f64>,
    phi: f64,
}

impl IdealCoherentSource {
    pub const KIND: &'static str = "IdealCoherentSource";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("trigger", SignalType::Bool),
        PortSpec::input_optional("alpha", SignalType::Float),
        PortSpec::input_optional("phi", SignalType::Float),
        PortSpec::output("output", SignalType::Quantum),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            alpha: None,
            phi: 0.0,
        }
    }

    pub fn set_displacement(&mut self, alpha: f64, phi: f64) {
        self.alpha = Some(alpha);
        self.phi = phi;
    }

    /// Complex displacement, once `alpha` is known
    pub fn displacement(&self) -> Option<Complex64> {
        self.alpha.map(|alpha| Complex64::from_polar(alpha, self.phi))
    }
}

impl Device for IdealCoherentSource {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        if let Some(alpha) = inputs.float("alpha") {
            self.alpha = Some(alpha);
        }
        if let Some(phi) = inputs.float("phi") {
            self.phi = phi;
        }

        if !inputs.bool("trigger").unwrap_or(false) {
            return Ok(Vec::new());
        }

        let alpha = self.alpha.ok_or_else(|| SimulationError::MissingParameter {
            device: self.core.info().describe(),
            parameter: "alpha".to_string(),
        })?;

        let state = ctx
            .physics()
            .coherent_state(Complex64::from_polar(alpha, self.phi))?;
        let (mode, index) = ctx.create_mode();
        let displace = ctx.backend().displace(alpha, self.phi);
        ctx.backend().apply_operator(&displace, &[index])?;

        Ok(vec![Emission::new("output", Signal::quantum(state, Some(mode)), ctx.time())])
    }
}
