use super::coincidence::{CoincidenceResolver, Flush, PhotonArrival};
use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::{Result, SimulationError};
use crate::core::execution::EventFlags;
use crate::core::modes::ModeId;
use crate::core::physics::OperatorDescriptor;
use crate::core::signals::{PortSpec, Signal, SignalType};
use crate::core::types::{SimTime, StateId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// Tunables of [`IdealBeamSplitter`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSplitterSettings {
    /// Latency between arrival and emission
    pub processing_time: f64,
    /// Multiplier `k` of the flush delay `k * sigma^2`
    pub flush_factor: f64,
}

impl Default for BeamSplitterSettings {
    fn default() -> Self {
        Self {
            processing_time: 1e-9,
            flush_factor: CoincidenceResolver::<QuantumArrival>::DEFAULT_FLUSH_FACTOR,
        }
    }
}

/// Quantum payload of one arrival
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantumArrival {
    pub state: StateId,
    pub mode: Option<ModeId>,
}

/// 50/50 non-polarizing beam splitter with inputs `A`, `B` and outputs `C`, `D`
///
/// Arrivals are buffered in a [`CoincidenceResolver`]; the device wakes
/// itself with a `process_now` event and then interferes every cross-port
/// pair, weighting the interference by the temporal overlap of the two
/// wave packets. Unpartnered photons are split against vacuum.
pub struct IdealBeamSplitter {
    core: DeviceCore,
    settings: BeamSplitterSettings,
    resolver: CoincidenceResolver<QuantumArrival>,
}

impl IdealBeamSplitter {
    pub const KIND: &'static str = "IdealBeamSplitter";

    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("A", SignalType::Quantum),
        PortSpec::input_optional("B", SignalType::Quantum),
        PortSpec::output("C", SignalType::Quantum),
        PortSpec::output("D", SignalType::Quantum),
    ];

    pub fn new(name: Option<&str>) -> Self {
        Self::with_settings(name, BeamSplitterSettings::default())
    }

    pub fn with_settings(name: Option<&str>, settings: BeamSplitterSettings) -> Self {
        Self {
            core: DeviceCore::new(Self::KIND, name, Self::PORTS),
            settings,
            resolver: CoincidenceResolver::new(settings.flush_factor),
        }
    }

    pub fn settings(&self) -> &BeamSplitterSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &CoincidenceResolver<QuantumArrival> {
        &self.resolver
    }

    fn emission_time(&self, arrival: SimTime, now: SimTime) -> SimTime {
        (arrival + self.settings.processing_time).max(now)
    }

    fn apply_backend_split(ctx: &mut DeviceContext<'_>, modes: (Option<ModeId>, Option<ModeId>)) -> Result<()> {
        if let (Some(c), Some(d)) = modes {
            let split = ctx.backend().beamsplitter(FRAC_PI_4, 0.0);
            ctx.apply_on_modes(&split, &[c, d])?;
        }
        Ok(())
    }

    /// Split a lone photon against vacuum
    fn split_single(
        &self,
        ctx: &mut DeviceContext<'_>,
        arrival: &PhotonArrival<QuantumArrival>,
    ) -> Result<Vec<Emission>> {
        let photon = arrival.payload;
        let vacuum = ctx.physics().new_state()?;
        let joint = ctx.physics().compose(photon.state, vacuum)?;
        let vacuum_mode = match photon.mode {
            Some(_) => Some(ctx.create_mode().0),
            None => None,
        };

        let ((c, c_mode), (d, d_mode)) = if arrival.port == "A" {
            ((photon.state, photon.mode), (vacuum, vacuum_mode))
        } else {
            ((vacuum, vacuum_mode), (photon.state, photon.mode))
        };
        ctx.physics().apply(
            joint,
            &OperatorDescriptor::NonPolarizingBeamSplit { overlap: None },
            &[c, d],
        )?;
        Self::apply_backend_split(ctx, (c_mode, d_mode))?;

        let time = self.emission_time(arrival.time, ctx.time());
        Ok(vec![
            Emission::new("C", Signal::quantum(c, c_mode), time),
            Emission::new("D", Signal::quantum(d, d_mode), time),
        ])
    }

    /// Interfere a cross-port pair, keeping the port of the first arrival
    fn interfere(
        &self,
        ctx: &mut DeviceContext<'_>,
        p1: &PhotonArrival<QuantumArrival>,
        p2: &PhotonArrival<QuantumArrival>,
    ) -> Result<Vec<Emission>> {
        let dt = (p1.time - p2.time).abs();
        let overlap = ctx
            .physics()
            .temporal_overlap(p1.payload.state, p2.payload.state, dt)?;
        debug!("Time difference {:.3e}s, overlap {:.4}", dt, overlap);

        let (c, d) = if p1.port == "A" {
            (p1.payload, p2.payload)
        } else {
            (p2.payload, p1.payload)
        };
        let joint = ctx.physics().compose(c.state, d.state)?;
        ctx.physics().apply(
            joint,
            &OperatorDescriptor::NonPolarizingBeamSplit {
                overlap: Some(overlap),
            },
            &[c.state, d.state],
        )?;
        Self::apply_backend_split(ctx, (c.mode, d.mode))?;

        let now = ctx.time();
        Ok(vec![
            Emission::new("C", Signal::quantum(c.state, c.mode), self.emission_time(p1.time, now)),
            Emission::new("D", Signal::quantum(d.state, d.mode), self.emission_time(p2.time, now)),
        ])
    }
}

impl Device for IdealBeamSplitter {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        let mut arrivals = Vec::new();
        for port in ["A", "B"] {
            let Some(state) = inputs.state(port) else {
                continue;
            };
            let sigma = ctx.physics().timing_uncertainty(state).ok_or_else(|| {
                SimulationError::MissingTimingUncertainty {
                    device: self.core.info().describe(),
                    port: port.to_string(),
                }
            })?;
            arrivals.push(PhotonArrival {
                time: ctx.time(),
                sigma,
                port,
                payload: QuantumArrival {
                    state,
                    mode: inputs.mode(port),
                },
            });
        }

        if let Some(flush_at) = self.resolver.receive(ctx.time(), arrivals) {
            debug!("{} will flush at {:.3e}s", self.core.info(), flush_at);
            ctx.schedule_self(flush_at, EventFlags::process_now())?;
        }

        if !ctx.flags().process_now {
            return Ok(Vec::new());
        }

        match self.resolver.flush(ctx.time()) {
            Flush::Idle => Ok(Vec::new()),
            Flush::Stale { scheduled } => {
                debug!(
                    "{} ignoring stale flush, next one at {:.3e}s",
                    self.core.info(),
                    scheduled
                );
                Ok(Vec::new())
            }
            Flush::Single(arrival) => self.split_single(ctx, &arrival),
            Flush::Coincidences { pairs, unpaired } => {
                let mut emissions = Vec::new();
                for (p1, p2) in &pairs {
                    emissions.extend(self.interfere(ctx, p1, p2)?);
                }
                for arrival in &unpaired {
                    emissions.extend(self.split_single(ctx, arrival)?);
                }
                Ok(emissions)
            }
        }
    }
}
