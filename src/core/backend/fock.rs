use super::{Backend, BackendError, Operator};
use log::debug;

/// Operator application recorded by [`FockBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOperation {
    pub operator: Operator,
    pub modes: Vec<usize>,
}

/// Fock-space backend that records the program applied to its modes
///
/// Matrix construction is left to whoever consumes the program; the
/// backend validates mode indices and arities and keeps the order of
/// application.
#[derive(Debug, Clone)]
pub struct FockBackend {
    mode_count: usize,
    cutoff: usize,
    initial_states: Vec<(u32, Vec<usize>)>,
    program: Vec<AppliedOperation>,
}

impl FockBackend {
    pub const DEFAULT_CUTOFF: usize = 10;

    pub fn new() -> Self {
        Self {
            mode_count: 0,
            cutoff: Self::DEFAULT_CUTOFF,
            initial_states: Vec::new(),
            program: Vec::new(),
        }
    }

    /// Number states requested per mode group, in request order
    pub fn initial_states(&self) -> &[(u32, Vec<usize>)] {
        &self.initial_states
    }

    /// Applied operators, in application order
    pub fn program(&self) -> &[AppliedOperation] {
        &self.program
    }

    fn check_modes(&self, modes: &[usize]) -> Result<(), BackendError> {
        match modes.iter().find(|&&m| m >= self.mode_count) {
            Some(&mode) => Err(BackendError::ModeOutOfRange {
                mode,
                mode_count: self.mode_count,
            }),
            None => Ok(()),
        }
    }
}

impl Default for FockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for FockBackend {
    fn name(&self) -> &'static str {
        "fock"
    }

    fn set_mode_count(&mut self, mode_count: usize) {
        debug!("Fock backend: number of modes {}", mode_count);
        self.mode_count = mode_count;
    }

    fn mode_count(&self) -> usize {
        self.mode_count
    }

    fn set_cutoff(&mut self, cutoff: usize) -> Result<(), BackendError> {
        if cutoff == 0 {
            return Err(BackendError::InvalidCutoff(cutoff));
        }
        debug!("Fock backend: cutoff dimension {}", cutoff);
        self.cutoff = cutoff;
        Ok(())
    }

    fn cutoff(&self) -> usize {
        self.cutoff
    }

    fn apply_operator(&mut self, operator: &Operator, modes: &[usize]) -> Result<(), BackendError> {
        let expected = operator.kind.arity();
        if modes.len() != expected {
            return Err(BackendError::ArityMismatch {
                operator: operator.kind.name(),
                expected,
                actual: modes.len(),
            });
        }
        self.check_modes(modes)?;

        debug!("Fock backend: apply {} on {:?}", operator.kind.name(), modes);
        self.program.push(AppliedOperation {
            operator: operator.clone(),
            modes: modes.to_vec(),
        });
        Ok(())
    }

    fn initialize_number_state(&mut self, photons: u32, modes: &[usize]) -> Result<(), BackendError> {
        self.check_modes(modes)?;
        self.initial_states.push((photons, modes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::OperatorKind;

    #[test]
    fn test_apply_records_program_in_order() {
        let mut backend = FockBackend::new();
        backend.set_mode_count(2);

        let shift = backend.phase_shift(0.25);
        let split = backend.beamsplitter(std::f64::consts::FRAC_PI_4, 0.0);
        backend.apply_operator(&shift, &[1]).unwrap();
        backend.apply_operator(&split, &[0, 1]).unwrap();

        let program = backend.program();
        assert_eq!(program.len(), 2);
        assert_eq!(program[0].operator.kind, OperatorKind::PhaseShift { theta: 0.25 });
        assert_eq!(program[1].modes, vec![0, 1]);
    }

    #[test]
    fn test_rejects_unknown_modes_and_wrong_arity() {
        let mut backend = FockBackend::new();
        backend.set_mode_count(1);

        let split = backend.beamsplitter(0.0, 0.0);
        assert_eq!(
            backend.apply_operator(&split, &[0]),
            Err(BackendError::ArityMismatch {
                operator: "beamsplitter",
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            backend.initialize_number_state(1, &[3]),
            Err(BackendError::ModeOutOfRange { mode: 3, mode_count: 1 })
        );
        assert!(backend.program().is_empty());
        assert!(backend.initial_states().is_empty());
    }

    #[test]
    fn test_cutoff_must_be_positive() {
        let mut backend = FockBackend::new();
        assert_eq!(backend.cutoff(), FockBackend::DEFAULT_CUTOFF);
        assert_eq!(backend.set_cutoff(0), Err(BackendError::InvalidCutoff(0)));
        backend.set_cutoff(5).unwrap();
        assert_eq!(backend.creation().cutoff, 5);
    }
}
