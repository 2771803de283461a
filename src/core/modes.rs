use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque identifier of one physical mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModeId(Uuid);

impl ModeId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mode-{}", self.0)
    }
}

/// Allocates modes and maps them to backend indices
///
/// Indices are dense and assigned in allocation order, so the mode count
/// is always one past the highest index.
#[derive(Debug, Default)]
pub struct ModeManager {
    modes: Vec<ModeId>,
    indices: HashMap<ModeId, usize>,
}

impl ModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new mode, returning its id and backend index
    pub fn create_mode(&mut self) -> (ModeId, usize) {
        let mode = ModeId::new();
        let index = self.modes.len();
        self.modes.push(mode);
        self.indices.insert(mode, index);
        (mode, index)
    }

    pub fn mode_index(&self, mode: &ModeId) -> Option<usize> {
        self.indices.get(mode).copied()
    }

    pub fn contains(&self, mode: &ModeId) -> bool {
        self.indices.contains_key(mode)
    }

    pub fn mode_count(&self) -> usize {
        self.modes.len()
    }

    /// All modes in index order
    pub fn modes(&self) -> &[ModeId] {
        &self.modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_get_dense_indices() {
        let mut manager = ModeManager::new();
        let (first, i0) = manager.create_mode();
        let (second, i1) = manager.create_mode();

        assert_eq!((i0, i1), (0, 1));
        assert_ne!(first, second);
        assert_eq!(manager.mode_index(&second), Some(1));
        assert_eq!(manager.mode_count(), 2);
        assert_eq!(manager.modes(), &[first, second]);
    }

    #[test]
    fn test_foreign_mode_has_no_index() {
        let mut other = ModeManager::new();
        let (foreign, _) = other.create_mode();
        let manager = ModeManager::new();
        assert_eq!(manager.mode_index(&foreign), None);
        assert!(!manager.contains(&foreign));
    }
}
