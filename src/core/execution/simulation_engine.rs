use super::config::{SimulationConfig, UnroutedOutputPolicy};
use super::event::{Event, EventFlags};
use super::event_scheduler::EventScheduler;
use super::pipeline::{ExecutionContext, Pipeline, PortBinding};
use super::registry::DeviceRegistry;
use crate::core::backend::{BackendRegistry, FockBackend};
use crate::core::devices::{Device, DeviceContext, Emission, FollowUp};
use crate::core::error::{Result, SimulationError};
use crate::core::modes::ModeManager;
use crate::core::physics::{EnvelopePhysics, StatePhysics};
use crate::core::signals::{Payload, Signal, SignalType};
use crate::core::types::{DeviceId, EventId, PortRef, SimTime};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Observer trait for simulation events
pub trait SimulationObserver {
    /// Called when simulated time advances
    fn on_time_advance(&mut self, old_time: SimTime, new_time: SimTime);

    /// Called after an event was dispatched and its outputs routed
    fn on_event_retired(&mut self, record: &EventRecord);
}

/// How a dispatched event ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Device emitted this many outputs
    Produced(usize),
    /// Device kept the input and emitted nothing
    Buffered,
}

/// Retired event as reported to observers
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: EventId,
    pub time: SimTime,
    pub target: DeviceId,
    pub flags: EventFlags,
    pub outcome: EventOutcome,
}

/// Result of a call to [`Simulation::run`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub events_dispatched: u64,
    pub final_time: SimTime,
    /// Events left queued by the horizon or the event cap
    pub pending_events: usize,
}

/// Dispatch counts per device at one simulated instant
struct Stall {
    time: SimTime,
    dispatches: HashMap<DeviceId, u32>,
}

thread_local! {
    static INSTANCE: Rc<RefCell<Simulation>> =
        Rc::new(RefCell::new(Simulation::new(SimulationConfig::default())));
}

/// Discrete-event simulation context
///
/// Owns the event queue, the device registry, the backends, the mode
/// manager and the state-physics collaborator. Events dispatch strictly
/// in time order, FIFO among equal times; each dispatch runs the device
/// inside the execution pipeline and routes what it emits through the
/// live connections on its output ports.
pub struct Simulation {
    config: SimulationConfig,
    scheduler: EventScheduler,
    devices: DeviceRegistry,
    backends: BackendRegistry,
    modes: ModeManager,
    physics: Box<dyn StatePhysics>,
    pipeline: Pipeline,
    observers: Vec<Box<dyn SimulationObserver>>,
    current_time: SimTime,
    stall: Stall,
}

impl Simulation {
    /// Create a simulation with a Fock backend and the envelope physics model
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            scheduler: EventScheduler::new(),
            devices: DeviceRegistry::new(),
            backends: BackendRegistry::new(FockBackend::new()),
            modes: ModeManager::new(),
            physics: Box::new(EnvelopePhysics::new()),
            pipeline: Pipeline::standard(),
            observers: Vec::new(),
            current_time: 0.0,
            stall: Stall {
                time: 0.0,
                dispatches: HashMap::new(),
            },
        }
    }

    /// Shared per-thread simulation, created on first access
    pub fn get_instance() -> Rc<RefCell<Simulation>> {
        INSTANCE.with(Rc::clone)
    }

    pub fn with_physics(mut self, physics: impl StatePhysics + 'static) -> Self {
        self.physics = Box::new(physics);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Get current simulation time
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Add an observer to the simulation
    pub fn add_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    pub fn physics(&self) -> &dyn StatePhysics {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> &mut dyn StatePhysics {
        self.physics.as_mut()
    }

    /// Concrete physics model, if it is a `P`
    pub fn physics_as<P: StatePhysics>(&self) -> Option<&P> {
        self.physics().as_any().downcast_ref::<P>()
    }

    pub fn physics_as_mut<P: StatePhysics>(&mut self) -> Option<&mut P> {
        self.physics_mut().as_any_mut().downcast_mut::<P>()
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut BackendRegistry {
        &mut self.backends
    }

    pub fn modes(&self) -> &ModeManager {
        &self.modes
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Register a device and return its id
    pub fn add_device<D: Device>(&mut self, device: D) -> Result<DeviceId> {
        self.register_device(Box::new(device))
    }

    pub fn register_device(&mut self, device: Box<dyn Device>) -> Result<DeviceId> {
        let description = device.core().info().describe();
        let id = self.devices.register(device)?;
        debug!("Registered {}", description);
        Ok(id)
    }

    pub fn device(&self, id: &DeviceId) -> Option<&dyn Device> {
        self.devices.get(id)
    }

    pub fn device_mut(&mut self, id: &DeviceId) -> Option<&mut dyn Device> {
        match self.devices.get_mut(id) {
            Some(device) => Some(device.as_mut()),
            None => None,
        }
    }

    /// Registered device downcast to its concrete kind
    pub fn device_as<T: Device>(&self, id: &DeviceId) -> Option<&T> {
        self.device(id)?.as_any().downcast_ref::<T>()
    }

    pub fn device_as_mut<T: Device>(&mut self, id: &DeviceId) -> Option<&mut T> {
        self.device_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    fn device_or_err(&self, id: &DeviceId) -> Result<&dyn Device> {
        self.devices.get(id).ok_or(SimulationError::NoSuchDevice(*id))
    }

    /// Attach `signal` to a port of a registered device
    pub fn register_signal(
        &mut self,
        device: &DeviceId,
        signal: &Signal,
        label: &str,
        override_existing: bool,
    ) -> Result<()> {
        self.devices
            .get_mut(device)
            .ok_or(SimulationError::NoSuchDevice(*device))?
            .register_signal(signal, label, override_existing)
    }

    /// Wire an output port to an input port through a new pending signal
    ///
    /// Both ends are checked before either is touched, so a failure leaves
    /// the two ports as they were.
    pub fn connect(&mut self, from: &PortRef, to: &PortRef, signal_type: SignalType) -> Result<Signal> {
        let signal = Signal::new(signal_type);
        for end in [from, to] {
            let device = self.device_or_err(&end.device())?;
            let description = device.core().info().describe();
            device
                .core()
                .port_for(end)?
                .check_attach(&signal, false, &description)?;
        }

        self.register_signal(&from.device(), &signal, from.label(), false)?;
        self.register_signal(&to.device(), &signal, to.label(), false)?;
        debug!(
            "Connected {} -> {}",
            self.devices.describe(&from.device()),
            self.devices.describe(&to.device())
        );
        Ok(signal)
    }

    /// Attach an already computed parameter signal, replacing any previous one
    pub fn set_parameter(&mut self, device: &DeviceId, label: &str, payload: Payload) -> Result<Signal> {
        let signal_type = self.device_or_err(device)?.core().port(label)?.signal_type();
        let signal = Signal::new(signal_type);
        signal.mark_computed(payload)?;
        self.register_signal(device, &signal, label, true)?;
        Ok(signal)
    }

    /// Detach the port's signals and remove them from every other port too
    ///
    /// Disconnecting a free port does nothing.
    pub fn disconnect(&mut self, port: &PortRef) -> Result<()> {
        let device = self
            .devices
            .get_mut(&port.device())
            .ok_or(SimulationError::NoSuchDevice(port.device()))?;
        let own = device.core_mut().port_mut(port.label())?;
        let own_ref = own.port_ref();
        let detached = own.detach_all();

        for signal in detached {
            for other in signal.ports() {
                if other != own_ref {
                    if let Some(peer) = self.devices.get_mut(&other.device()) {
                        if let Some(peer_port) = peer.core_mut().ports_mut().get_mut(other.label()) {
                            peer_port.detach(&signal);
                        }
                    }
                }
                signal.remove_port(&other);
            }
            debug!("Disconnected {} from {}", signal.id(), own_ref);
        }
        Ok(())
    }

    fn validate_time(&self, time: SimTime) -> Result<()> {
        if !time.is_finite() {
            return Err(SimulationError::InvalidTime(time));
        }
        if time < self.current_time {
            return Err(SimulationError::CausalityViolation {
                scheduled: time,
                current: self.current_time,
            });
        }
        Ok(())
    }

    /// Schedule delivery of `signals` to `target` at `time`
    pub fn schedule_event<I, S>(&mut self, time: SimTime, target: DeviceId, signals: I) -> Result<EventId>
    where
        I: IntoIterator<Item = (S, Signal)>,
        S: Into<String>,
    {
        self.schedule_event_with_flags(time, target, signals, EventFlags::default())
    }

    pub fn schedule_event_with_flags<I, S>(
        &mut self,
        time: SimTime,
        target: DeviceId,
        signals: I,
        flags: EventFlags,
    ) -> Result<EventId>
    where
        I: IntoIterator<Item = (S, Signal)>,
        S: Into<String>,
    {
        self.validate_time(time)?;
        if !self.devices.contains(&target) {
            return Err(SimulationError::NoSuchDevice(target));
        }
        let signals = signals.into_iter().map(|(label, s)| (label.into(), s)).collect();
        Ok(self.scheduler.schedule_event(time, target, signals, flags))
    }

    /// Run one device directly at `time`, returning what it emits
    ///
    /// Outputs are not routed; follow-ups the device requests are queued.
    /// Simulated time does not advance.
    pub fn run_device<I, S>(&mut self, device: &DeviceId, time: SimTime, inputs: I) -> Result<Vec<Emission>>
    where
        I: IntoIterator<Item = (S, Signal)>,
        S: Into<String>,
    {
        self.validate_time(time)?;
        let supplied = inputs.into_iter().map(|(label, s)| (label.into(), s)).collect();
        let (emissions, follow_ups) = self.execute(*device, time, EventFlags::default(), supplied)?;
        self.schedule_follow_ups(*device, follow_ups)?;
        Ok(emissions)
    }

    /// Run until the queue drains, the horizon is reached or the event cap is hit
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut dispatched = 0u64;
        while self.has_pending_events() {
            if let Some(max) = self.config.max_events {
                if dispatched >= max {
                    break;
                }
            }
            if self.step()?.is_none() {
                break;
            }
            dispatched += 1;
        }

        info!(
            "Simulation stopped at {:.3e}s after {} events",
            self.current_time, dispatched
        );
        Ok(RunSummary {
            events_dispatched: dispatched,
            final_time: self.current_time,
            pending_events: self.scheduler.len(),
        })
    }

    /// Dispatch the earliest event; `None` if nothing was dispatched
    pub fn step(&mut self) -> Result<Option<EventRecord>> {
        let Some(next_time) = self.scheduler.peek_next_time() else {
            return Ok(None);
        };
        if self.config.end_time.map_or(false, |end| next_time > end) {
            return Ok(None);
        }
        let Some(event) = self.scheduler.pop_next() else {
            return Ok(None);
        };

        if event.time > self.current_time {
            let old_time = self.current_time;
            self.current_time = event.time;
            self.notify_time_advance(old_time, event.time);
        }

        let Event {
            id,
            time,
            target,
            signals,
            flags,
        } = event;
        debug!("Dispatching event {} at {:.3e}s", id, time);
        self.check_progress(target, time)?;

        let (emissions, follow_ups) = self.execute(target, time, flags, signals)?;
        self.schedule_follow_ups(target, follow_ups)?;

        let outcome = if emissions.is_empty() {
            debug!("{} buffered without output", self.devices.describe(&target));
            EventOutcome::Buffered
        } else {
            EventOutcome::Produced(emissions.len())
        };
        self.route(target, emissions)?;

        let record = EventRecord {
            id,
            time,
            target,
            flags,
            outcome,
        };
        self.notify_event_retired(&record);
        Ok(Some(record))
    }

    /// Check if there are pending events in the scheduler
    pub fn has_pending_events(&self) -> bool {
        self.scheduler.has_events()
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    fn execute(
        &mut self,
        target: DeviceId,
        time: SimTime,
        flags: EventFlags,
        supplied: Vec<(String, Signal)>,
    ) -> Result<(Vec<Emission>, Vec<FollowUp>)> {
        let device = self
            .devices
            .get_mut(&target)
            .ok_or(SimulationError::NoSuchDevice(target))?;

        let core = device.core();
        let mut ctx = ExecutionContext::new(time, core.info().clone(), flags);
        ctx.bindings = core
            .ports()
            .iter()
            .map(|port| PortBinding {
                label: port.label(),
                direction: port.direction(),
                signal_type: port.signal_type(),
                required: port.required(),
                signals: port.signals().to_vec(),
            })
            .collect();
        ctx.supplied = supplied;
        ctx.coordinator = core.coordinator();
        ctx.input_wait = self.config.input_wait;

        let physics = self.physics.as_mut();
        let backend = self.backends.active_mut();
        let modes = &mut self.modes;
        self.pipeline.run(&mut ctx, |exec| {
            let mut device_ctx = DeviceContext::new(exec.time, exec.flags, physics, backend, modes);
            let emissions = device.des_action(&mut device_ctx, &exec.inputs)?;
            exec.follow_ups = device_ctx.into_follow_ups();
            exec.emissions = emissions;
            Ok(())
        })?;

        Ok((ctx.emissions, ctx.follow_ups))
    }

    fn schedule_follow_ups(&mut self, target: DeviceId, follow_ups: Vec<FollowUp>) -> Result<()> {
        for follow_up in follow_ups {
            self.validate_time(follow_up.time)?;
            debug!(
                "{} scheduled itself at {:.3e}s",
                self.devices.describe(&target),
                follow_up.time
            );
            self.scheduler
                .schedule_event(follow_up.time, target, Vec::new(), follow_up.flags);
        }
        Ok(())
    }

    /// Deliver each emission to every input port on its live signal
    fn route(&mut self, source: DeviceId, emissions: Vec<Emission>) -> Result<usize> {
        let source_description = self.devices.describe(&source);
        let mut scheduled = 0;

        for emission in emissions {
            let targets = self.device_or_err(&source)?.core().downstream(&emission.port)?;
            if targets.is_empty() {
                match self.config.unrouted_outputs {
                    UnroutedOutputPolicy::Drop => {
                        warn!(
                            "{:.3e}s {} emitted on unconnected port '{}'; output dropped",
                            emission.time, source_description, emission.port
                        );
                        continue;
                    }
                    UnroutedOutputPolicy::Error => {
                        return Err(SimulationError::UnroutedOutput {
                            device: source_description,
                            port: emission.port,
                        })
                    }
                }
            }

            for target in targets {
                info!(
                    "{:.3e}s {} is scheduling new event for {}",
                    emission.time,
                    source_description,
                    self.devices.describe(&target.device())
                );
                self.schedule_event(
                    emission.time,
                    target.device(),
                    [(target.label().to_string(), emission.signal.clone())],
                )?;
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }

    /// Fail once one device is dispatched too often at one instant
    ///
    /// Counts every dispatch since time last advanced, so devices feeding
    /// each other in a zero-delay cycle are caught as well.
    fn check_progress(&mut self, target: DeviceId, time: SimTime) -> Result<()> {
        if self.stall.time != time {
            self.stall.time = time;
            self.stall.dispatches.clear();
        }

        let dispatches = self.stall.dispatches.entry(target).or_insert(0);
        *dispatches += 1;
        if *dispatches > self.config.stall_limit {
            return Err(SimulationError::NoForwardProgress {
                device: self.devices.describe(&target),
                time,
                dispatches: *dispatches,
            });
        }
        Ok(())
    }

    /// Notify all observers of a time advance
    fn notify_time_advance(&mut self, old_time: SimTime, new_time: SimTime) {
        for observer in &mut self.observers {
            observer.on_time_advance(old_time, new_time);
        }
    }

    /// Notify all observers of a retired event
    fn notify_event_retired(&mut self, record: &EventRecord) {
        for observer in &mut self.observers {
            observer.on_event_retired(record);
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}
