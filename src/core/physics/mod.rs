//! Interface to the state-physics collaborator.
//!
//! The simulation core never looks inside a quantum state: it passes
//! [`StateId`] handles through signals and asks a [`StatePhysics`]
//! implementation to create, combine, transform and measure them.

pub mod envelope;

pub use envelope::EnvelopePhysics;

use crate::core::types::{AsAny, StateId};
use num_complex::Complex64;

/// Physical operation requested from the collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorDescriptor {
    /// Apply the creation operator `count` times
    Creation { count: u32 },
    Displace { alpha: Complex64 },
    PhaseShift { phi: f64 },
    /// 50/50 beam splitter on two targets; `overlap` is the temporal
    /// indistinguishability of the two wave packets, `None` if unknown
    NonPolarizingBeamSplit { overlap: Option<f64> },
}

impl OperatorDescriptor {
    pub fn arity(&self) -> usize {
        match self {
            OperatorDescriptor::NonPolarizingBeamSplit { .. } => 2,
            _ => 1,
        }
    }
}

/// Errors reported by the state-physics collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    UnknownState(StateId),
    /// Target is not part of the joint state the operation was applied to
    NotInJointState { joint: StateId, target: StateId },
    ArityMismatch { expected: usize, actual: usize },
    /// Model cannot evaluate the request
    Model(String),
}

impl std::fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicsError::UnknownState(state) => write!(f, "Unknown {}", state),
            PhysicsError::NotInJointState { joint, target } => {
                write!(f, "{} is not part of joint {}", target, joint)
            }
            PhysicsError::ArityMismatch { expected, actual } => {
                write!(f, "Operation acts on {} states, {} given", expected, actual)
            }
            PhysicsError::Model(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Narrow interface consumed by devices
pub trait StatePhysics: AsAny {
    /// Fresh vacuum state
    fn new_state(&mut self) -> Result<StateId, PhysicsError>;

    /// Combine two states into one joint state; returns a handle to it
    fn compose(&mut self, a: StateId, b: StateId) -> Result<StateId, PhysicsError>;

    /// Apply `operator` to `targets`, which must all belong to `joint`
    fn apply(
        &mut self,
        joint: StateId,
        operator: &OperatorDescriptor,
        targets: &[StateId],
    ) -> Result<(), PhysicsError>;

    /// Photon-number measurement; collapses the joint state
    fn measure(&mut self, state: StateId) -> Result<u32, PhysicsError>;

    /// Indistinguishability of two wave packets separated by `dt`, in [0, 1]
    fn temporal_overlap(&self, a: StateId, b: StateId, dt: f64) -> Result<f64, PhysicsError>;

    /// Standard deviation of the state's temporal profile, if it has one
    fn timing_uncertainty(&self, state: StateId) -> Option<f64>;

    /// Fresh state holding `photons` photons
    fn number_state(&mut self, photons: u32) -> Result<StateId, PhysicsError> {
        let state = self.new_state()?;
        if photons > 0 {
            self.apply(state, &OperatorDescriptor::Creation { count: photons }, &[state])?;
        }
        Ok(state)
    }

    /// Fresh coherent state with amplitude `alpha`
    fn coherent_state(&mut self, alpha: Complex64) -> Result<StateId, PhysicsError> {
        let state = self.new_state()?;
        self.apply(state, &OperatorDescriptor::Displace { alpha }, &[state])?;
        Ok(state)
    }
}
