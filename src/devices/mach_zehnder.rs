use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::Result;
use crate::core::modes::ModeId;
use crate::core::physics::OperatorDescriptor;
use crate::core::signals::{PortSpec, Signal, SignalType};
use crate::core::types::StateId;
use std::f64::consts::FRAC_PI_4;

/// Two beam splitters with a phase shift on the upper arm between them
///
/// Only the inputs delivered together in one event interfere; a missing
/// input is replaced by vacuum.
pub struct MachZehnderInterferometer {
    core: DeviceCore,
    phase_shift: f64,
}

impl MachZehnderInterferometer {
    pub const KIND: &'static str = "MachZehnderInterferometer";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("qin0", SignalType::Quantum),
        PortSpec::input_optional("qin1", SignalType::Quantum),
        PortSpec::input_optional("phase_shift", SignalType::Float),
        PortSpec::output("qout0", SignalType::Quantum),
        PortSpec::output("qout1", SignalType::Quantum),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            phase_shift: 0.0,
        }
    }

    pub fn phase_shift(&self) -> f64 {
        self.phase_shift
    }

    pub fn set_phase_shift(&mut self, phase_shift: f64) {
        self.phase_shift = phase_shift;
    }

    /// State and mode on one arm, vacuum if nothing arrived there
    fn arm(
        ctx: &mut DeviceContext<'_>,
        inputs: &Inputs,
        label: &str,
        needs_mode: bool,
    ) -> Result<(StateId, Option<ModeId>)> {
        match inputs.state(label) {
            Some(state) => Ok((state, inputs.mode(label))),
            None => {
                let vacuum = ctx.physics().new_state()?;
                let mode = if needs_mode { Some(ctx.create_mode().0) } else { None };
                Ok((vacuum, mode))
            }
        }
    }
}

impl Device for MachZehnderInterferometer {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        if let Some(phase) = inputs.float("phase_shift") {
            self.phase_shift = phase;
        }
        if !inputs.contains("qin0") && !inputs.contains("qin1") {
            return Ok(Vec::new());
        }

        let tagged = inputs.mode("qin0").is_some() || inputs.mode("qin1").is_some();
        let (upper, upper_mode) = Self::arm(ctx, inputs, "qin0", tagged)?;
        let (lower, lower_mode) = Self::arm(ctx, inputs, "qin1", tagged)?;

        let overlap = if inputs.contains("qin0") && inputs.contains("qin1") {
            Some(ctx.physics().temporal_overlap(upper, lower, 0.0)?)
        } else {
            None
        };
        let split = OperatorDescriptor::NonPolarizingBeamSplit { overlap };
        let shift = OperatorDescriptor::PhaseShift {
            phi: self.phase_shift,
        };

        let joint = ctx.physics().compose(upper, lower)?;
        ctx.physics().apply(joint, &split, &[upper, lower])?;
        ctx.physics().apply(joint, &shift, &[upper])?;
        ctx.physics().apply(joint, &split, &[upper, lower])?;

        if let (Some(u), Some(l)) = (upper_mode, lower_mode) {
            let first = ctx.backend().beamsplitter(FRAC_PI_4, 0.0);
            let phase = ctx.backend().phase_shift(self.phase_shift);
            ctx.apply_on_modes(&first, &[u, l])?;
            ctx.apply_on_modes(&phase, &[u])?;
            ctx.apply_on_modes(&first, &[u, l])?;
        }

        let time = ctx.time();
        Ok(vec![
            Emission::new("qout0", Signal::quantum(upper, upper_mode), time),
            Emission::new("qout1", Signal::quantum(lower, lower_mode), time),
        ])
    }
}
