pub mod fock;

pub use fock::{AppliedOperation, FockBackend};

use crate::core::modes::ModeId;
use crate::core::types::AsAny;
use log::debug;
use num_complex::Complex64;
use std::any::TypeId;
use std::collections::HashMap;

/// Operator requested from a backend
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorKind {
    Creation,
    Annihilation,
    Number,
    Squeeze { z: Complex64 },
    Displace { alpha: f64, phi: f64 },
    PhaseShift { theta: f64 },
    BeamSplitter { theta: f64, phi: f64 },
}

impl OperatorKind {
    /// Number of modes the operator acts on
    pub fn arity(&self) -> usize {
        match self {
            OperatorKind::BeamSplitter { .. } => 2,
            _ => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Creation => "creation",
            OperatorKind::Annihilation => "annihilation",
            OperatorKind::Number => "number",
            OperatorKind::Squeeze { .. } => "squeeze",
            OperatorKind::Displace { .. } => "displace",
            OperatorKind::PhaseShift { .. } => "phase_shift",
            OperatorKind::BeamSplitter { .. } => "beamsplitter",
        }
    }
}

/// Backend operator, stamped with the truncation it was built for
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub kind: OperatorKind,
    pub cutoff: usize,
}

/// Errors reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    ModeOutOfRange { mode: usize, mode_count: usize },
    ArityMismatch {
        operator: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidCutoff(usize),
    NotRegistered(&'static str),
    /// Mode was not allocated by the simulation's mode manager
    UnknownMode(ModeId),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::ModeOutOfRange { mode, mode_count } => {
                write!(f, "Mode index {} out of range ({} modes)", mode, mode_count)
            }
            BackendError::ArityMismatch {
                operator,
                expected,
                actual,
            } => write!(
                f,
                "Operator {} acts on {} modes, {} given",
                operator, expected, actual
            ),
            BackendError::InvalidCutoff(cutoff) => write!(f, "Invalid cutoff dimension {}", cutoff),
            BackendError::NotRegistered(name) => write!(f, "Backend {} is not registered", name),
            BackendError::UnknownMode(mode) => write!(f, "Unknown {}", mode),
        }
    }
}

impl std::error::Error for BackendError {}

/// Computational engine realising physical effects on modes
///
/// Operator constructors have default implementations that stamp the
/// current cutoff; implementations provide the mutators and the
/// application primitive.
pub trait Backend: AsAny {
    fn name(&self) -> &'static str;

    fn set_mode_count(&mut self, mode_count: usize);

    fn mode_count(&self) -> usize;

    fn set_cutoff(&mut self, cutoff: usize) -> Result<(), BackendError>;

    fn cutoff(&self) -> usize;

    fn apply_operator(&mut self, operator: &Operator, modes: &[usize]) -> Result<(), BackendError>;

    fn initialize_number_state(&mut self, photons: u32, modes: &[usize]) -> Result<(), BackendError>;

    fn operator(&self, kind: OperatorKind) -> Operator {
        Operator {
            kind,
            cutoff: self.cutoff(),
        }
    }

    fn creation(&self) -> Operator {
        self.operator(OperatorKind::Creation)
    }

    fn annihilation(&self) -> Operator {
        self.operator(OperatorKind::Annihilation)
    }

    fn number(&self) -> Operator {
        self.operator(OperatorKind::Number)
    }

    fn squeeze(&self, z: Complex64) -> Operator {
        self.operator(OperatorKind::Squeeze { z })
    }

    fn displace(&self, alpha: f64, phi: f64) -> Operator {
        self.operator(OperatorKind::Displace { alpha, phi })
    }

    fn phase_shift(&self, theta: f64) -> Operator {
        self.operator(OperatorKind::PhaseShift { theta })
    }

    fn beamsplitter(&self, theta: f64, phi: f64) -> Operator {
        self.operator(OperatorKind::BeamSplitter { theta, phi })
    }
}

/// One backend instance per backend type, with one of them active
pub struct BackendRegistry {
    active_type: TypeId,
    active: Box<dyn Backend>,
    parked: HashMap<TypeId, Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Create a registry whose active backend is `backend`
    pub fn new<B: Backend>(backend: B) -> Self {
        Self {
            active_type: TypeId::of::<B>(),
            active: Box::new(backend),
            parked: HashMap::new(),
        }
    }

    /// Register `backend` unless an instance of its type already exists
    pub fn register<B: Backend>(&mut self, backend: B) -> bool {
        let type_id = TypeId::of::<B>();
        if type_id == self.active_type || self.parked.contains_key(&type_id) {
            return false;
        }
        self.parked.insert(type_id, Box::new(backend));
        true
    }

    /// Make the registered instance of `B` the active backend
    pub fn activate<B: Backend>(&mut self) -> Result<(), BackendError> {
        let type_id = TypeId::of::<B>();
        if type_id == self.active_type {
            return Ok(());
        }
        let next = self
            .parked
            .remove(&type_id)
            .ok_or(BackendError::NotRegistered(std::any::type_name::<B>()))?;

        let previous = std::mem::replace(&mut self.active, next);
        self.parked.insert(self.active_type, previous);
        self.active_type = type_id;
        debug!("Activated backend {}", self.active.name());
        Ok(())
    }

    pub fn active(&self) -> &dyn Backend {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> &mut dyn Backend {
        self.active.as_mut()
    }

    /// The single instance of `B`, active or not
    pub fn get<B: Backend>(&self) -> Option<&B> {
        let type_id = TypeId::of::<B>();
        let backend: &dyn Backend = if type_id == self.active_type {
            &*self.active
        } else {
            &**self.parked.get(&type_id)?
        };
        backend.as_any().downcast_ref::<B>()
    }

    pub fn get_mut<B: Backend>(&mut self) -> Option<&mut B> {
        let type_id = TypeId::of::<B>();
        let backend: &mut dyn Backend = if type_id == self.active_type {
            &mut *self.active
        } else {
            &mut **self.parked.get_mut(&type_id)?
        };
        backend.as_any_mut().downcast_mut::<B>()
    }
}
