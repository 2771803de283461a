/// Configuration for photon_des simulation execution
///
/// This module provides configuration types for controlling how a run
/// treats unrouted outputs, when it stops, and how long a dispatch may
/// wait on its input signals.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the engine does with an output whose port has no live downstream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnroutedOutputPolicy {
    /// Discard the output and log a warning
    #[default]
    Drop,
    /// Abort the run with `UnroutedOutput`
    Error,
}

/// Configuration for simulation execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub unrouted_outputs: UnroutedOutputPolicy,
    /// Events scheduled after this time stay queued
    pub end_time: Option<f64>,
    /// Upper bound on events dispatched by one call to `run`
    pub max_events: Option<u64>,
    /// Consecutive dispatches to one device at one instant before the run
    /// is declared stuck
    pub stall_limit: u32,
    /// Bound on the condition wait for a pending input signal
    pub input_wait: Duration,
}

impl SimulationConfig {
    pub const DEFAULT_STALL_LIMIT: u32 = 1000;

    /// Create a new simulation configuration with default values
    ///
    /// Default configuration drops unrouted outputs, runs until the queue
    /// drains and never waits on pending inputs.
    pub fn new() -> Self {
        Self {
            unrouted_outputs: UnroutedOutputPolicy::default(),
            end_time: None,
            max_events: None,
            stall_limit: Self::DEFAULT_STALL_LIMIT,
            input_wait: Duration::ZERO,
        }
    }

    pub fn with_unrouted_outputs(mut self, policy: UnroutedOutputPolicy) -> Self {
        self.unrouted_outputs = policy;
        self
    }

    /// Stop before dispatching any event scheduled after `end_time`
    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    pub fn with_stall_limit(mut self, stall_limit: u32) -> Self {
        self.stall_limit = stall_limit;
        self
    }

    /// Allow a dispatch to wait up to `wait` for a pending input
    ///
    /// # Note
    /// Dispatch is single-threaded, so only producers running outside the
    /// simulation (other threads) can complete a signal during the wait.
    pub fn with_input_wait(mut self, wait: Duration) -> Self {
        self.input_wait = wait;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.unrouted_outputs, UnroutedOutputPolicy::Drop);
        assert_eq!(config.end_time, None);
        assert_eq!(config.max_events, None);
        assert_eq!(config.stall_limit, SimulationConfig::DEFAULT_STALL_LIMIT);
        assert_eq!(config.input_wait, Duration::ZERO);
    }

    #[test]
    fn test_config_builder() {
        let config = SimulationConfig::new()
            .with_unrouted_outputs(UnroutedOutputPolicy::Error)
            .with_end_time(1e-6)
            .with_max_events(50)
            .with_stall_limit(3)
            .with_input_wait(Duration::from_millis(5));

        assert_eq!(config.unrouted_outputs, UnroutedOutputPolicy::Error);
        assert_eq!(config.end_time, Some(1e-6));
        assert_eq!(config.max_events, Some(50));
        assert_eq!(config.stall_limit, 3);
        assert_eq!(config.input_wait, Duration::from_millis(5));
    }

    #[test]
    fn test_unrouted_policy_default() {
        assert_eq!(UnroutedOutputPolicy::default(), UnroutedOutputPolicy::Drop);
        assert_ne!(UnroutedOutputPolicy::Drop, UnroutedOutputPolicy::Error);
    }
}
