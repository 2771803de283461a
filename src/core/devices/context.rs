use crate::core::backend::{Backend, BackendError, Operator};
use crate::core::error::{Result, SimulationError};
use crate::core::execution::event::EventFlags;
use crate::core::modes::{ModeId, ModeManager};
use crate::core::physics::StatePhysics;
use crate::core::signals::{Payload, Signal};
use crate::core::types::{SimTime, StateId};
use log::debug;
use num_complex::Complex64;

/// Computed input signals gathered for one dispatch, keyed by port label
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    entries: Vec<(String, Signal)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, signal: Signal) {
        self.entries.push((label.into(), signal));
    }

    /// First signal on `label`
    pub fn get(&self, label: &str) -> Option<&Signal> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, s)| s)
    }

    /// Every signal on `label`, for ports accepting several
    pub fn all<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Signal> + 'a {
        self.entries.iter().filter(move |(l, _)| l == label).map(|(_, s)| s)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn payload(&self, label: &str) -> Option<Payload> {
        self.get(label).and_then(Signal::payload)
    }

    pub fn bool(&self, label: &str) -> Option<bool> {
        self.payload(label).and_then(|p| p.as_bool())
    }

    pub fn int(&self, label: &str) -> Option<i64> {
        self.payload(label).and_then(|p| p.as_int())
    }

    pub fn float(&self, label: &str) -> Option<f64> {
        self.payload(label).and_then(|p| p.as_float())
    }

    pub fn complex(&self, label: &str) -> Option<Complex64> {
        self.payload(label).and_then(|p| p.as_complex())
    }

    pub fn state(&self, label: &str) -> Option<StateId> {
        self.payload(label).and_then(|p| p.as_state())
    }

    pub fn mode(&self, label: &str) -> Option<ModeId> {
        self.get(label).and_then(Signal::mode)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Signal)> for Inputs {
    fn from_iter<I: IntoIterator<Item = (S, Signal)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(l, s)| (l.into(), s)).collect(),
        }
    }
}

/// One produced output: a computed signal on an output port at a time
#[derive(Debug, Clone)]
pub struct Emission {
    pub port: String,
    pub signal: Signal,
    pub time: SimTime,
}

impl Emission {
    pub fn new(port: impl Into<String>, signal: Signal, time: SimTime) -> Self {
        Self {
            port: port.into(),
            signal,
            time,
        }
    }
}

/// Self-scheduled wake-up requested during a dispatch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowUp {
    pub time: SimTime,
    pub flags: EventFlags,
}

/// Everything a device may touch while computing one dispatch
pub struct DeviceContext<'a> {
    time: SimTime,
    flags: EventFlags,
    physics: &'a mut dyn StatePhysics,
    backend: &'a mut dyn Backend,
    modes: &'a mut ModeManager,
    follow_ups: Vec<FollowUp>,
}

impl<'a> DeviceContext<'a> {
    pub fn new(
        time: SimTime,
        flags: EventFlags,
        physics: &'a mut dyn StatePhysics,
        backend: &'a mut dyn Backend,
        modes: &'a mut ModeManager,
    ) -> Self {
        Self {
            time,
            flags,
            physics,
            backend,
            modes,
            follow_ups: Vec::new(),
        }
    }

    /// Dispatch time
    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    pub fn physics(&mut self) -> &mut dyn StatePhysics {
        &mut *self.physics
    }

    pub fn backend(&mut self) -> &mut dyn Backend {
        &mut *self.backend
    }

    pub fn modes(&self) -> &ModeManager {
        self.modes
    }

    /// Allocate a mode and grow the backend's mode count to cover it
    pub fn create_mode(&mut self) -> (ModeId, usize) {
        let (mode, index) = self.modes.create_mode();
        self.backend.set_mode_count(self.modes.mode_count());
        debug!("Allocated {} at index {}", mode, index);
        (mode, index)
    }

    /// Apply a backend operator to tagged modes
    pub fn apply_on_modes(&mut self, operator: &Operator, modes: &[ModeId]) -> Result<()> {
        let indices = modes
            .iter()
            .map(|m| self.modes.mode_index(m).ok_or(BackendError::UnknownMode(*m)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.backend.apply_operator(operator, &indices)?;
        Ok(())
    }

    /// Ask the engine to dispatch this device again at `time`
    pub fn schedule_self(&mut self, time: SimTime, flags: EventFlags) -> Result<()> {
        if !time.is_finite() {
            return Err(SimulationError::InvalidTime(time));
        }
        if time < self.time {
            return Err(SimulationError::CausalityViolation {
                scheduled: time,
                current: self.time,
            });
        }
        self.follow_ups.push(FollowUp { time, flags });
        Ok(())
    }

    pub(crate) fn into_follow_ups(self) -> Vec<FollowUp> {
        self.follow_ups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::FockBackend;
    use crate::core::physics::EnvelopePhysics;

    #[test]
    fn test_create_mode_grows_backend() {
        let mut physics = EnvelopePhysics::with_seed(0);
        let mut backend = FockBackend::new();
        let mut modes = ModeManager::new();
        let mut ctx = DeviceContext::new(0.0, EventFlags::default(), &mut physics, &mut backend, &mut modes);

        let (first, _) = ctx.create_mode();
        let (second, index) = ctx.create_mode();
        assert_eq!(index, 1);
        assert_eq!(ctx.backend().mode_count(), 2);

        let split = ctx.backend().beamsplitter(0.5, 0.0);
        ctx.apply_on_modes(&split, &[first, second]).unwrap();
        drop(ctx);
        assert_eq!(backend.program().len(), 1);
    }

    #[test]
    fn test_schedule_self_rejects_the_past() {
        let mut physics = EnvelopePhysics::with_seed(0);
        let mut backend = FockBackend::new();
        let mut modes = ModeManager::new();
        let mut ctx = DeviceContext::new(1.0, EventFlags::default(), &mut physics, &mut backend, &mut modes);

        assert!(matches!(
            ctx.schedule_self(0.5, EventFlags::process_now()),
            Err(SimulationError::CausalityViolation { .. })
        ));
        assert!(matches!(
            ctx.schedule_self(f64::NAN, EventFlags::process_now()),
            Err(SimulationError::InvalidTime(_))
        ));
        ctx.schedule_self(1.0, EventFlags::process_now()).unwrap();
        assert_eq!(ctx.into_follow_ups().len(), 1);
    }

    #[test]
    fn test_inputs_typed_accessors() {
        let inputs: Inputs = vec![
            ("theta", Signal::computed(Payload::Float(0.25))),
            ("count", Signal::computed(Payload::Int(2))),
        ]
        .into_iter()
        .collect();

        assert_eq!(inputs.float("theta"), Some(0.25));
        assert_eq!(inputs.float("count"), Some(2.0));
        assert_eq!(inputs.int("theta"), None);
        assert_eq!(inputs.state("missing"), None);
        assert_eq!(inputs.labels().collect::<Vec<_>>(), vec!["theta", "count"]);
    }
}
