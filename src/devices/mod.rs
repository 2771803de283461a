//! Device library: sources, linear optics and detectors.

pub mod beam_splitter;
pub mod coherent_source;
pub mod coincidence;
pub mod combine_unit;
pub mod detector;
pub mod mach_zehnder;
pub mod n_photon_source;
pub mod phase_shifter;

pub use beam_splitter::{BeamSplitterSettings, IdealBeamSplitter, QuantumArrival};
pub use coherent_source::IdealCoherentSource;
pub use coincidence::{CoincidenceResolver, Flush, PhotonArrival};
pub use combine_unit::CombineUnit;
pub use detector::IdealDetector;
pub use mach_zehnder::MachZehnderInterferometer;
pub use n_photon_source::IdealNPhotonSource;
pub use phase_shifter::IdealPhaseShifter;
