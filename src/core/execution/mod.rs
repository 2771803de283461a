pub mod config;
pub mod event;
pub mod event_scheduler;
pub mod pipeline;
pub mod registry;
pub mod simulation_engine;

// Re-export commonly used types
pub use config::{SimulationConfig, UnroutedOutputPolicy};
pub use event::{Event, EventFlags};
pub use event_scheduler::EventScheduler;
pub use pipeline::{ExecutionContext, Pipeline, PortBinding, Stage};
pub use registry::DeviceRegistry;
pub use simulation_engine::{EventOutcome, EventRecord, RunSummary, Simulation, SimulationObserver};
