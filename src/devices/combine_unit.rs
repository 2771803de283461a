use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::Result;
use crate::core::signals::{PortSpec, Signal, SignalType};
use crate::devices::MachZehnderInterferometer;
use log::debug;

/// Four-mode processor built from five Mach-Zehnder cells
///
/// Cell 0 mixes `input0`/`input1` and cell 1 mixes `input2`/`input3`.
/// Cell 2 takes the first output of each. Cell 3 takes the second output
/// of cell 0 with the first of cell 2 and drives `output0`/`output1`;
/// cell 4 takes the second output of cell 1 with the second of cell 2 and
/// drives `output2`/`output3`. Arms left empty are vacuum, so any input
/// reaches all four outputs.
///
/// A `phase_shift` signal is handed to every cell.
pub struct CombineUnit {
    core: DeviceCore,
    cells: [MachZehnderInterferometer; 5],
}

impl CombineUnit {
    pub const KIND: &'static str = "CombineUnit";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("input0", SignalType::Quantum),
        PortSpec::input_optional("input1", SignalType::Quantum),
        PortSpec::input_optional("input2", SignalType::Quantum),
        PortSpec::input_optional("input3", SignalType::Quantum),
        PortSpec::input_optional("phase_shift", SignalType::Float),
        PortSpec::output("output0", SignalType::Quantum),
        PortSpec::output("output1", SignalType::Quantum),
        PortSpec::output("output2", SignalType::Quantum),
        PortSpec::output("output3", SignalType::Quantum),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            cells: std::array::from_fn(|_| MachZehnderInterferometer::new(None)),
        }
    }

    pub fn cell(&self, index: usize) -> Option<&MachZehnderInterferometer> {
        self.cells.get(index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut MachZehnderInterferometer> {
        self.cells.get_mut(index)
    }

    /// Run one cell on whichever of its two arms carry a signal
    fn drive(
        &mut self,
        index: usize,
        ctx: &mut DeviceContext<'_>,
        upper: Option<Signal>,
        lower: Option<Signal>,
        phase: Option<&Signal>,
    ) -> Result<(Option<Signal>, Option<Signal>)> {
        let mut inputs = Inputs::new();
        if let Some(signal) = upper {
            inputs.insert("qin0", signal);
        }
        if let Some(signal) = lower {
            inputs.insert("qin1", signal);
        }
        if let Some(signal) = phase {
            inputs.insert("phase_shift", signal.clone());
        }

        let emissions = self.cells[index].des_action(ctx, &inputs)?;
        Ok((output(&emissions, "qout0"), output(&emissions, "qout1")))
    }
}

fn output(emissions: &[Emission], port: &str) -> Option<Signal> {
    emissions
        .iter()
        .find(|e| e.port == port)
        .map(|e| e.signal.clone())
}

impl Device for CombineUnit {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        let phase = inputs.get("phase_shift");
        let arm = |label: &str| inputs.get(label).cloned();

        let (c0_up, c0_down) = self.drive(0, ctx, arm("input0"), arm("input1"), phase)?;
        let (c1_up, c1_down) = self.drive(1, ctx, arm("input2"), arm("input3"), phase)?;
        let (c2_up, c2_down) = self.drive(2, ctx, c0_up, c1_up, phase)?;
        let (out0, out1) = self.drive(3, ctx, c0_down, c2_up, phase)?;
        let (out2, out3) = self.drive(4, ctx, c1_down, c2_down, phase)?;

        let time = ctx.time();
        let emissions: Vec<Emission> = [out0, out1, out2, out3]
            .into_iter()
            .enumerate()
            .filter_map(|(i, signal)| signal.map(|s| Emission::new(format!("output{}", i), s, time)))
            .collect();
        if !emissions.is_empty() {
            debug!("{} mixed {} mode(s)", self.core.info(), emissions.len());
        }
        Ok(emissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_and_cells() {
        let mut unit = CombineUnit::new(Some("unit"));
        assert_eq!(unit.core().info().kind, CombineUnit::KIND);
        let inputs: Vec<&str> = unit.core().ports().inputs().map(|p| p.label()).collect();
        assert_eq!(inputs, vec!["input0", "input1", "input2", "input3", "phase_shift"]);
        let outputs: Vec<&str> = unit.core().ports().outputs().map(|p| p.label()).collect();
        assert_eq!(outputs, vec!["output0", "output1", "output2", "output3"]);
        assert!(unit.core().ports().inputs().all(|p| !p.required()));

        assert!(unit.cell(4).is_some());
        assert!(unit.cell(5).is_none());
        unit.cell_mut(2).unwrap().set_phase_shift(0.5);
        assert_eq!(unit.cell(2).unwrap().phase_shift(), 0.5);
    }
}
