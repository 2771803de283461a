use super::{OperatorDescriptor, PhysicsError, StatePhysics};
use crate::core::types::StateId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct Envelope {
    sigma: f64,
    phase: f64,
    group: u64,
}

/// Joint photon-number distribution over the member envelopes
#[derive(Debug, Clone)]
struct Group {
    members: Vec<StateId>,
    outcomes: Vec<(Vec<u32>, f64)>,
}

/// Reference state-physics model
///
/// Each envelope is a single optical mode with a Gaussian temporal profile
/// and a photon-number distribution. Composed envelopes share one joint
/// distribution, so measuring one of them collapses its partners. The beam
/// splitter follows Hong-Ou-Mandel statistics for one photon on each input
/// and splits distinguishable photons binomially otherwise.
pub struct EnvelopePhysics {
    envelopes: HashMap<StateId, Envelope>,
    joints: HashMap<StateId, u64>,
    groups: HashMap<u64, Group>,
    next_group: u64,
    default_sigma: f64,
    cutoff: u32,
    rng: StdRng,
}

impl EnvelopePhysics {
    pub const DEFAULT_SIGMA: f64 = 1e-9;
    pub const DEFAULT_CUTOFF: u32 = 10;

    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible measurement outcomes
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            envelopes: HashMap::new(),
            joints: HashMap::new(),
            groups: HashMap::new(),
            next_group: 0,
            default_sigma: Self::DEFAULT_SIGMA,
            cutoff: Self::DEFAULT_CUTOFF,
            rng,
        }
    }

    /// Temporal width given to new states
    pub fn with_default_sigma(mut self, sigma: f64) -> Self {
        self.default_sigma = sigma;
        self
    }

    /// Highest photon number tracked per envelope
    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn set_sigma(&mut self, state: StateId, sigma: f64) -> Result<(), PhysicsError> {
        let envelope = self
            .envelopes
            .get_mut(&state)
            .ok_or(PhysicsError::UnknownState(state))?;
        envelope.sigma = sigma;
        Ok(())
    }

    /// Accumulated phase of an envelope
    pub fn phase(&self, state: StateId) -> Result<f64, PhysicsError> {
        self.envelopes
            .get(&state)
            .map(|e| e.phase)
            .ok_or(PhysicsError::UnknownState(state))
    }

    /// Marginal photon-number distribution of an envelope, sorted by count
    pub fn photon_distribution(&self, state: StateId) -> Result<Vec<(u32, f64)>, PhysicsError> {
        let (group, slot) = self.locate(state)?;
        let mut marginal: BTreeMap<u32, f64> = BTreeMap::new();
        for (photons, weight) in &group.outcomes {
            *marginal.entry(photons[slot]).or_insert(0.0) += weight;
        }
        Ok(marginal.into_iter().filter(|(_, w)| *w > 0.0).collect())
    }

    /// Probability that every listed envelope holds the given photon number
    pub fn joint_probability(&self, counts: &[(StateId, u32)]) -> Result<f64, PhysicsError> {
        let Some((first, _)) = counts.first() else {
            return Ok(1.0);
        };
        let group_id = self.group_of(*first)?;
        let group = self.group(group_id, *first)?;

        let mut slots = Vec::with_capacity(counts.len());
        for (state, n) in counts {
            let slot = group
                .members
                .iter()
                .position(|m| m == state)
                .ok_or(PhysicsError::NotInJointState {
                    joint: *first,
                    target: *state,
                })?;
            slots.push((slot, *n));
        }

        Ok(group
            .outcomes
            .iter()
            .filter(|(photons, _)| slots.iter().all(|(slot, n)| photons[*slot] == *n))
            .map(|(_, w)| w)
            .sum())
    }

    fn group_of(&self, state: StateId) -> Result<u64, PhysicsError> {
        self.envelopes
            .get(&state)
            .map(|e| e.group)
            .or_else(|| self.joints.get(&state).copied())
            .ok_or(PhysicsError::UnknownState(state))
    }

    fn group(&self, group: u64, state: StateId) -> Result<&Group, PhysicsError> {
        self.groups.get(&group).ok_or(PhysicsError::UnknownState(state))
    }

    fn locate(&self, state: StateId) -> Result<(&Group, usize), PhysicsError> {
        let envelope = self
            .envelopes
            .get(&state)
            .ok_or(PhysicsError::UnknownState(state))?;
        let group = self.group(envelope.group, state)?;
        let slot = group
            .members
            .iter()
            .position(|m| *m == state)
            .ok_or(PhysicsError::UnknownState(state))?;
        Ok((group, slot))
    }

    fn split(&self, n: u32, m: u32, overlap: f64) -> Vec<(u32, u32, f64)> {
        if n == 1 && m == 1 {
            let visibility = overlap * overlap;
            return vec![
                (1, 1, (1.0 - visibility) / 2.0),
                (2, 0, (1.0 + visibility) / 4.0),
                (0, 2, (1.0 + visibility) / 4.0),
            ];
        }

        let total = n + m;
        let norm = 0.5f64.powi(total as i32);
        (0..=total)
            .map(|k| (k, total - k, binomial(total, k) * norm))
            .collect()
    }
}

impl Default for EnvelopePhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePhysics for EnvelopePhysics {
    fn new_state(&mut self) -> Result<StateId, PhysicsError> {
        let state = StateId::next();
        let group = self.next_group;
        self.next_group += 1;

        self.groups.insert(
            group,
            Group {
                members: vec![state],
                outcomes: vec![(vec![0], 1.0)],
            },
        );
        self.envelopes.insert(
            state,
            Envelope {
                sigma: self.default_sigma,
                phase: 0.0,
                group,
            },
        );
        Ok(state)
    }

    fn compose(&mut self, a: StateId, b: StateId) -> Result<StateId, PhysicsError> {
        let group_a = self.group_of(a)?;
        let group_b = self.group_of(b)?;

        if group_a != group_b {
            let absorbed = self
                .groups
                .remove(&group_b)
                .ok_or(PhysicsError::UnknownState(b))?;
            let target = self
                .groups
                .get_mut(&group_a)
                .ok_or(PhysicsError::UnknownState(a))?;

            let mut outcomes = Vec::with_capacity(target.outcomes.len() * absorbed.outcomes.len());
            for (left, wl) in &target.outcomes {
                for (right, wr) in &absorbed.outcomes {
                    let mut photons = left.clone();
                    photons.extend_from_slice(right);
                    outcomes.push((photons, wl * wr));
                }
            }
            target.outcomes = outcomes;
            target.members.extend_from_slice(&absorbed.members);

            for envelope in self.envelopes.values_mut() {
                if envelope.group == group_b {
                    envelope.group = group_a;
                }
            }
            for group in self.joints.values_mut() {
                if *group == group_b {
                    *group = group_a;
                }
            }
        }

        let joint = StateId::next();
        self.joints.insert(joint, group_a);
        Ok(joint)
    }

    fn apply(
        &mut self,
        joint: StateId,
        operator: &OperatorDescriptor,
        targets: &[StateId],
    ) -> Result<(), PhysicsError> {
        if targets.len() != operator.arity() {
            return Err(PhysicsError::ArityMismatch {
                expected: operator.arity(),
                actual: targets.len(),
            });
        }

        let group_id = self.group_of(joint)?;
        let mut slots = Vec::with_capacity(targets.len());
        for target in targets {
            if self.group_of(*target)? != group_id || !self.envelopes.contains_key(target) {
                return Err(PhysicsError::NotInJointState {
                    joint,
                    target: *target,
                });
            }
            let (_, slot) = self.locate(*target)?;
            slots.push(slot);
        }

        if let OperatorDescriptor::PhaseShift { phi } = operator {
            if let Some(envelope) = self.envelopes.get_mut(&targets[0]) {
                envelope.phase += phi;
            }
            return Ok(());
        }

        let cutoff = self.cutoff;
        let current = self
            .groups
            .get(&group_id)
            .map(|g| g.outcomes.clone())
            .ok_or(PhysicsError::UnknownState(joint))?;

        let mut next: BTreeMap<Vec<u32>, f64> = BTreeMap::new();
        match operator {
            OperatorDescriptor::Creation { count } => {
                let slot = slots[0];
                for (mut photons, weight) in current {
                    photons[slot] = (photons[slot] + count).min(cutoff);
                    *next.entry(photons).or_insert(0.0) += weight;
                }
            }
            OperatorDescriptor::Displace { alpha } => {
                let slot = slots[0];
                let table = poisson(alpha.norm_sqr(), cutoff);
                for (photons, weight) in current {
                    for (k, p) in table.iter().enumerate() {
                        let mut shifted = photons.clone();
                        shifted[slot] = (shifted[slot] + k as u32).min(cutoff);
                        *next.entry(shifted).or_insert(0.0) += weight * p;
                    }
                }
            }
            OperatorDescriptor::NonPolarizingBeamSplit { overlap } => {
                let overlap = overlap.unwrap_or(1.0);
                if !(0.0..=1.0).contains(&overlap) {
                    return Err(PhysicsError::Model(format!(
                        "Overlap {} outside [0, 1]",
                        overlap
                    )));
                }
                let (slot_a, slot_b) = (slots[0], slots[1]);
                for (photons, weight) in current {
                    for (out_a, out_b, p) in self.split(photons[slot_a], photons[slot_b], overlap) {
                        let mut split = photons.clone();
                        split[slot_a] = out_a;
                        split[slot_b] = out_b;
                        *next.entry(split).or_insert(0.0) += weight * p;
                    }
                }
            }
            OperatorDescriptor::PhaseShift { .. } => {}
        }

        if let Some(group) = self.groups.get_mut(&group_id) {
            group.outcomes = next.into_iter().filter(|(_, w)| *w > 0.0).collect();
        }
        Ok(())
    }

    fn measure(&mut self, state: StateId) -> Result<u32, PhysicsError> {
        let group_id = self
            .envelopes
            .get(&state)
            .map(|e| e.group)
            .ok_or(PhysicsError::UnknownState(state))?;
        let roll: f64 = self.rng.gen();
        let (group, slot) = self.locate(state)?;

        let total: f64 = group.outcomes.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(PhysicsError::Model(format!("{} has no probability mass", state)));
        }

        let mut draw = roll * total;
        let mut outcome = group.outcomes.last().map(|(p, _)| p[slot]).unwrap_or(0);
        for (photons, weight) in &group.outcomes {
            if draw < *weight {
                outcome = photons[slot];
                break;
            }
            draw -= weight;
        }

        if let Some(group) = self.groups.get_mut(&group_id) {
            group.outcomes.retain(|(photons, _)| photons[slot] == outcome);
            let kept: f64 = group.outcomes.iter().map(|(_, w)| w).sum();
            for (_, weight) in group.outcomes.iter_mut() {
                *weight /= kept;
            }
        }
        Ok(outcome)
    }

    fn temporal_overlap(&self, a: StateId, b: StateId, dt: f64) -> Result<f64, PhysicsError> {
        let sigma_a = self.timing_uncertainty(a).ok_or(PhysicsError::UnknownState(a))?;
        let sigma_b = self.timing_uncertainty(b).ok_or(PhysicsError::UnknownState(b))?;
        if !dt.is_finite() {
            return Err(PhysicsError::Model(format!("Non-finite time difference {}", dt)));
        }

        let spread = sigma_a * sigma_a + sigma_b * sigma_b;
        if spread <= 0.0 {
            return Ok(if dt == 0.0 { 1.0 } else { 0.0 });
        }
        let amplitude = (2.0 * sigma_a * sigma_b / spread).sqrt();
        Ok(amplitude * (-(dt * dt) / (4.0 * spread)).exp())
    }

    fn timing_uncertainty(&self, state: StateId) -> Option<f64> {
        self.envelopes.get(&state).map(|e| e.sigma)
    }
}

fn binomial(n: u32, k: u32) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}

/// Poisson weights for 0..=cutoff, renormalised over the truncation
fn poisson(mean: f64, cutoff: u32) -> Vec<f64> {
    let mut weights = Vec::with_capacity(cutoff as usize + 1);
    let mut term = (-mean).exp();
    for k in 0..=cutoff {
        if k > 0 {
            term *= mean / f64::from(k);
        }
        weights.push(term);
    }
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn single_photon(physics: &mut EnvelopePhysics) -> StateId {
        let state = physics.new_state().unwrap();
        physics
            .apply(state, &OperatorDescriptor::Creation { count: 1 }, &[state])
            .unwrap();
        state
    }

    #[test]
    fn test_identical_photons_bunch() {
        let mut physics = EnvelopePhysics::with_seed(7);
        let a = single_photon(&mut physics);
        let b = single_photon(&mut physics);
        let overlap = physics.temporal_overlap(a, b, 0.0).unwrap();
        assert!((overlap - 1.0).abs() < 1e-12);

        let joint = physics.compose(a, b).unwrap();
        physics
            .apply(
                joint,
                &OperatorDescriptor::NonPolarizingBeamSplit { overlap: Some(overlap) },
                &[a, b],
            )
            .unwrap();

        assert!(physics.joint_probability(&[(a, 1), (b, 1)]).unwrap() < 1e-12);
        let n = physics.measure(a).unwrap();
        assert!(n == 0 || n == 2);
        assert_eq!(physics.measure(b).unwrap(), 2 - n);
    }

    #[test]
    fn test_distinguishable_photons_coincide_half_the_time() {
        let mut physics = EnvelopePhysics::with_seed(1);
        let a = single_photon(&mut physics);
        let b = single_photon(&mut physics);
        let joint = physics.compose(a, b).unwrap();
        physics
            .apply(
                joint,
                &OperatorDescriptor::NonPolarizingBeamSplit { overlap: Some(0.0) },
                &[a, b],
            )
            .unwrap();
        let p = physics.joint_probability(&[(a, 1), (b, 1)]).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_decays_with_separation() {
        let mut physics = EnvelopePhysics::with_seed(0);
        let a = physics.new_state().unwrap();
        let b = physics.new_state().unwrap();
        let overlap = physics.temporal_overlap(a, b, 2e-9).unwrap();
        assert!((overlap - (-0.5f64).exp()).abs() < 1e-12);
        assert!(physics.temporal_overlap(a, b, f64::NAN).is_err());
    }

    #[test]
    fn test_displacement_gives_poisson_statistics() {
        let mut physics = EnvelopePhysics::with_seed(0).with_cutoff(30);
        let state = physics.new_state().unwrap();
        physics
            .apply(
                state,
                &OperatorDescriptor::Displace { alpha: Complex64::new(1.0, 0.0) },
                &[state],
            )
            .unwrap();
        let dist = physics.photon_distribution(state).unwrap();
        let vacuum = dist.iter().find(|(n, _)| *n == 0).unwrap().1;
        assert!((vacuum - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_apply_rejects_targets_outside_joint() {
        let mut physics = EnvelopePhysics::with_seed(0);
        let a = physics.new_state().unwrap();
        let b = physics.new_state().unwrap();
        let c = physics.new_state().unwrap();
        let joint = physics.compose(a, b).unwrap();
        let result = physics.apply(
            joint,
            &OperatorDescriptor::NonPolarizingBeamSplit { overlap: None },
            &[a, c],
        );
        assert_eq!(result, Err(PhysicsError::NotInJointState { joint, target: c }));
        assert_eq!(physics.timing_uncertainty(joint), None);
    }
}
