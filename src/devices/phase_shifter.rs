use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::Result;
use crate::core::physics::OperatorDescriptor;
use crate::core::signals::{PortSpec, Signal, SignalType};

/// Applies a phase `theta` to the incoming state
///
/// `theta` is kept between dispatches. A signal on the `theta` port, from
/// an event or from [`Simulation::set_parameter`](crate::core::execution::Simulation::set_parameter),
/// replaces the stored value before the input is processed.
pub struct IdealPhaseShifter {
    core: DeviceCore,
    theta: f64,
}

impl IdealPhaseShifter {
    pub const KIND: &'static str = "IdealPhaseShifter";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("theta", SignalType::Float),
        PortSpec::input_optional("input", SignalType::Quantum),
        PortSpec::output("output", SignalType::Quantum),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            theta: 0.0,
        }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
    }
}

impl Device for IdealPhaseShifter {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        if let Some(theta) = inputs.float("theta") {
            self.theta = theta;
        }
        let Some(state) = inputs.state("input") else {
            return Ok(Vec::new());
        };

        ctx.physics()
            .apply(state, &OperatorDescriptor::PhaseShift { phi: self.theta }, &[state])?;

        let mode = inputs.mode("input");
        if let Some(mode) = mode {
            let shift = ctx.backend().phase_shift(self.theta);
            ctx.apply_on_modes(&shift, &[mode])?;
        }

        Ok(vec![Emission::new("output", Signal::quantum(state, mode), ctx.time())])
    }
}
