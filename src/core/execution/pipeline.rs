//! Cross-cutting dispatch behavior as a chain of stages.
//!
//! Each stage gets a `before` hook ahead of the device computation and an
//! `after` hook behind it; `after` hooks run in reverse order so stages
//! nest like middleware.

use super::event::EventFlags;
use crate::core::devices::{DeviceInfo, Emission, FollowUp, Inputs, ProgressCoordinator};
use crate::core::error::{Result, SimulationError};
use crate::core::signals::{Signal, SignalType};
use crate::core::types::{Direction, SimTime};
use log::{debug, info};
use std::rc::Rc;
use std::time::Duration;

/// Snapshot of one port and the signals attached to it at dispatch time
#[derive(Debug, Clone)]
pub struct PortBinding {
    pub label: &'static str,
    pub direction: Direction,
    pub signal_type: SignalType,
    pub required: bool,
    pub signals: Vec<Signal>,
}

impl PortBinding {
    /// `PortTypeMismatch` unless `signal` fits this port's type
    fn check_type(&self, signal: &Signal, device: &DeviceInfo) -> Result<()> {
        if signal.signal_type().is_subtype_of(self.signal_type) {
            return Ok(());
        }
        Err(SimulationError::PortTypeMismatch {
            device: device.describe(),
            port: self.label.to_string(),
            expected: self.signal_type,
            actual: signal.signal_type(),
        })
    }
}

/// Value threaded through every stage of one dispatch
pub struct ExecutionContext {
    pub time: SimTime,
    pub device: DeviceInfo,
    pub flags: EventFlags,
    pub bindings: Vec<PortBinding>,
    /// Signals delivered by the event, keyed by input label
    pub supplied: Vec<(String, Signal)>,
    /// Computed inputs handed to the device
    pub inputs: Inputs,
    pub emissions: Vec<Emission>,
    pub follow_ups: Vec<FollowUp>,
    pub coordinator: Option<Rc<dyn ProgressCoordinator>>,
    pub input_wait: Duration,
}

impl ExecutionContext {
    pub fn new(time: SimTime, device: DeviceInfo, flags: EventFlags) -> Self {
        Self {
            time,
            device,
            flags,
            bindings: Vec::new(),
            supplied: Vec::new(),
            inputs: Inputs::new(),
            emissions: Vec::new(),
            follow_ups: Vec::new(),
            coordinator: None,
            input_wait: Duration::ZERO,
        }
    }

    fn binding(&self, label: &str) -> Option<&PortBinding> {
        self.bindings.iter().find(|b| b.label == label)
    }
}

/// One layer of the dispatch pipeline
pub trait Stage {
    fn name(&self) -> &'static str;

    fn before(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Runs for every stage whose `before` succeeded, also when a later
    /// stage or the action failed
    fn after(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }
}

/// Ordered stages around a device computation
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Pipeline with no stages
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Logging, progress coordination, input waiting and output checks
    pub fn standard() -> Self {
        Self::new()
            .with_stage(LogAction)
            .with_stage(CoordinateProgress)
            .with_stage(WaitInputs)
            .with_stage(EnsureOutputs)
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every `before` hook, then `action`, then every `after` hook in reverse
    ///
    /// On failure the `after` hooks of the stages already entered still run;
    /// the first error is returned.
    pub fn run<F>(&self, ctx: &mut ExecutionContext, action: F) -> Result<()>
    where
        F: FnOnce(&mut ExecutionContext) -> Result<()>,
    {
        let mut entered = 0;
        let mut result = Ok(());
        for stage in &self.stages {
            if let Err(err) = stage.before(ctx) {
                result = Err(err);
                break;
            }
            entered += 1;
        }

        if result.is_ok() {
            result = action(ctx);
        }

        for stage in self.stages[..entered].iter().rev() {
            let after = stage.after(ctx);
            if result.is_ok() {
                result = after;
            }
        }
        result
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Announces every computation
pub struct LogAction;

impl Stage for LogAction {
    fn name(&self) -> &'static str {
        "log_action"
    }

    fn before(&self, ctx: &mut ExecutionContext) -> Result<()> {
        match &ctx.device.name {
            Some(name) => info!(
                "[{:.3e}s] *{}* ({}) is computing",
                ctx.time, name, ctx.device.kind
            ),
            None => info!("[{:.3e}s] {} is computing", ctx.time, ctx.device.kind),
        }
        Ok(())
    }
}

/// Forwards start and finish to the device's progress coordinator
pub struct CoordinateProgress;

impl Stage for CoordinateProgress {
    fn name(&self) -> &'static str {
        "coordinate_progress"
    }

    fn before(&self, ctx: &mut ExecutionContext) -> Result<()> {
        if let Some(coordinator) = &ctx.coordinator {
            coordinator.start_processing(&ctx.device);
        }
        Ok(())
    }

    fn after(&self, ctx: &mut ExecutionContext) -> Result<()> {
        if let Some(coordinator) = &ctx.coordinator {
            coordinator.processing_finished(&ctx.device);
        }
        Ok(())
    }
}

/// Gathers computed inputs; the device never sees a pending signal
pub struct WaitInputs;

impl Stage for WaitInputs {
    fn name(&self) -> &'static str {
        "wait_inputs"
    }

    fn before(&self, ctx: &mut ExecutionContext) -> Result<()> {
        for (label, signal) in &ctx.supplied {
            match ctx.binding(label) {
                Some(binding) if binding.direction == Direction::Input => {
                    binding.check_type(signal, &ctx.device)?;
                }
                _ => {
                    return Err(SimulationError::NoSuchPort {
                        device: ctx.device.describe(),
                        port: label.clone(),
                    })
                }
            }
        }

        let mut inputs = Inputs::new();
        for binding in ctx.bindings.iter().filter(|b| b.direction == Direction::Input) {
            let supplied: Vec<&Signal> = ctx
                .supplied
                .iter()
                .filter(|(label, _)| label == binding.label)
                .map(|(_, signal)| signal)
                .collect();

            // Delivered signals must be computed even on optional ports
            let delivered = !supplied.is_empty();
            let candidates: Vec<&Signal> = if delivered {
                supplied
            } else {
                binding.signals.iter().collect()
            };

            if candidates.is_empty() {
                if binding.required {
                    return Err(SimulationError::MissingInput {
                        device: ctx.device.describe(),
                        port: binding.label.to_string(),
                    });
                }
                continue;
            }

            for signal in candidates {
                match signal.wait_timeout(ctx.input_wait) {
                    Ok(_) => inputs.insert(binding.label, signal.clone()),
                    Err(_) if binding.required || delivered => {
                        return Err(SimulationError::InputNotComputed {
                            device: ctx.device.describe(),
                            port: binding.label.to_string(),
                        })
                    }
                    Err(_) => debug!(
                        "{}: skipping pending optional input '{}'",
                        ctx.device, binding.label
                    ),
                }
            }
        }

        ctx.inputs = inputs;
        Ok(())
    }
}

/// Validates what the device emitted before it is routed
pub struct EnsureOutputs;

impl Stage for EnsureOutputs {
    fn name(&self) -> &'static str {
        "ensure_outputs"
    }

    fn after(&self, ctx: &mut ExecutionContext) -> Result<()> {
        for emission in &ctx.emissions {
            match ctx.binding(&emission.port) {
                Some(binding) if binding.direction == Direction::Output => {
                    binding.check_type(&emission.signal, &ctx.device)?;
                }
                _ => {
                    return Err(SimulationError::UnknownOutputPort {
                        device: ctx.device.describe(),
                        port: emission.port.clone(),
                    })
                }
            }
            if !emission.signal.is_computed() {
                return Err(SimulationError::OutputNotComputed {
                    device: ctx.device.describe(),
                    port: emission.port.clone(),
                });
            }
            if !emission.time.is_finite() {
                return Err(SimulationError::InvalidTime(emission.time));
            }
            if emission.time < ctx.time {
                return Err(SimulationError::CausalityViolation {
                    scheduled: emission.time,
                    current: ctx.time,
                });
            }
        }
        Ok(())
    }
}
