// Small devices shared by the engine and wiring tests
use crate::core::devices::{Device, DeviceContext, DeviceCore, Emission, Inputs};
use crate::core::error::Result;
use crate::core::execution::EventFlags;
use crate::core::signals::{Payload, PortSpec, Signal, SignalType};
use crate::core::types::{DeviceId, SimTime};
use std::cell::RefCell;
use std::rc::Rc;

pub type Log = Rc<RefCell<Vec<(SimTime, i64)>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Records every tag it receives; optionally forwards it after a delay
pub struct Tagger {
    core: DeviceCore,
    log: Log,
    delay: Option<f64>,
}

impl Tagger {
    pub const PORTS: &'static [PortSpec] = &[
        PortSpec::input_optional("tag", SignalType::Int),
        PortSpec::output("out", SignalType::Int),
    ];

    pub fn new(log: &Log) -> Self {
        Self::with_id(DeviceId::new(), log)
    }

    pub fn with_id(id: DeviceId, log: &Log) -> Self {
        Self {
            core: DeviceCore::with_id(id, "Tagger", None, Self::PORTS),
            log: log.clone(),
            delay: None,
        }
    }

    pub fn forwarding(log: &Log, delay: f64) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(log)
        }
    }
}

impl Device for Tagger {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        let Some(tag) = inputs.int("tag") else {
            return Ok(Vec::new());
        };
        self.log.borrow_mut().push((ctx.time(), tag));

        match self.delay {
            Some(delay) => Ok(vec![Emission::new(
                "out",
                Signal::computed(Payload::Int(tag)),
                ctx.time() + delay,
            )]),
            None => Ok(Vec::new()),
        }
    }
}

/// Consumer with one required input
pub struct Sink {
    core: DeviceCore,
    log: Log,
}

impl Sink {
    pub const PORTS: &'static [PortSpec] = &[PortSpec::input("input", SignalType::Int)];

    pub fn new(log: &Log) -> Self {
        Self {
            core: DeviceCore::new("Sink", Some("sink"), Self::PORTS),
            log: log.clone(),
        }
    }
}

impl Device for Sink {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, inputs: &Inputs) -> Result<Vec<Emission>> {
        if let Some(value) = inputs.int("input") {
            self.log.borrow_mut().push((ctx.time(), value));
        }
        Ok(Vec::new())
    }
}

/// Device kind that never defined an action
pub struct Inert {
    core: DeviceCore,
}

impl Inert {
    pub fn new() -> Self {
        Self {
            core: DeviceCore::new("Inert", None, &[]),
        }
    }
}

impl Device for Inert {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }
}

/// Wakes itself again at the same instant, forever
pub struct Looper {
    core: DeviceCore,
}

impl Looper {
    pub fn new() -> Self {
        Self {
            core: DeviceCore::new("Looper", Some("looper"), &[]),
        }
    }
}

impl Device for Looper {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn des_action(&mut self, ctx: &mut DeviceContext<'_>, _inputs: &Inputs) -> Result<Vec<Emission>> {
        ctx.schedule_self(ctx.time(), EventFlags::process_now())?;
        Ok(Vec::new())
    }
}
