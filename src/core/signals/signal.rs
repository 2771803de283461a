use crate::core::error::{Result, SimulationError};
use crate::core::modes::ModeId;
use crate::core::types::{PortRef, SignalId, StateId};
use num_complex::Complex64;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Signal type tag
///
/// Types form a small lattice rooted at `Generic`: classical scalars sit
/// under `Classical`, quantum payloads under `Quantum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    Generic,
    Classical,
    Bool,
    Int,
    Float,
    Complex,
    Quantum,
}

impl SignalType {
    /// Immediate supertype, `None` for the root
    pub fn parent(&self) -> Option<SignalType> {
        match self {
            SignalType::Generic => None,
            SignalType::Classical | SignalType::Quantum => Some(SignalType::Generic),
            SignalType::Bool | SignalType::Int | SignalType::Float | SignalType::Complex => {
                Some(SignalType::Classical)
            }
        }
    }

    /// True if `self` equals `other` or lies below it in the lattice
    pub fn is_subtype_of(&self, other: SignalType) -> bool {
        let mut current = Some(*self);
        while let Some(ty) = current {
            if ty == other {
                return true;
            }
            current = ty.parent();
        }
        false
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Value carried by a computed signal
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    /// Opaque handle into the state-physics collaborator
    Quantum(StateId),
}

impl Payload {
    /// Most specific signal type this payload satisfies
    pub fn signal_type(&self) -> SignalType {
        match self {
            Payload::Bool(_) => SignalType::Bool,
            Payload::Int(_) => SignalType::Int,
            Payload::Float(_) => SignalType::Float,
            Payload::Complex(_) => SignalType::Complex,
            Payload::Quantum(_) => SignalType::Quantum,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Float view; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(value) => Some(*value),
            Payload::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Payload::Complex(value) => Some(*value),
            Payload::Float(value) => Some(Complex64::new(*value, 0.0)),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<StateId> {
        match self {
            Payload::Quantum(state) => Some(*state),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct SignalState {
    payload: Option<Payload>,
    mode: Option<ModeId>,
    ports: Vec<PortRef>,
}

#[derive(Debug)]
struct SignalInner {
    id: SignalId,
    signal_type: SignalType,
    state: Mutex<SignalState>,
    computed: Condvar,
}

/// Typed single-assignment value container shared between ports
///
/// Cloning a `Signal` yields another handle to the same container. The
/// computed flag flips from pending to computed exactly once; consumers
/// wait on it with [`Signal::wait_until_computed`] or the bounded
/// [`Signal::wait_timeout`].
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    /// Create a pending signal of the given type
    pub fn new(signal_type: SignalType) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::next(),
                signal_type,
                state: Mutex::new(SignalState::default()),
                computed: Condvar::new(),
            }),
        }
    }

    /// Create a signal typed after `payload` and already computed
    pub fn computed(payload: Payload) -> Self {
        let signal = Self::new(payload.signal_type());
        signal.inner.state.lock().payload = Some(payload);
        signal
    }

    /// Computed quantum signal tagged with the mode it refers to
    pub fn quantum(state: StateId, mode: Option<ModeId>) -> Self {
        let signal = Self::computed(Payload::Quantum(state));
        signal.set_mode(mode);
        signal
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    pub fn signal_type(&self) -> SignalType {
        self.inner.signal_type
    }

    pub fn is_computed(&self) -> bool {
        self.inner.state.lock().payload.is_some()
    }

    /// Payload if computed
    pub fn payload(&self) -> Option<Payload> {
        self.inner.state.lock().payload.clone()
    }

    pub fn mode(&self) -> Option<ModeId> {
        self.inner.state.lock().mode
    }

    pub fn set_mode(&self, mode: Option<ModeId>) {
        self.inner.state.lock().mode = mode;
    }

    /// Set the payload and flip the computed flag, waking all waiters
    pub fn mark_computed(&self, payload: Payload) -> Result<()> {
        let actual = payload.signal_type();
        if !actual.is_subtype_of(self.inner.signal_type) {
            return Err(SimulationError::PayloadTypeMismatch {
                signal: self.inner.id,
                expected: self.inner.signal_type,
                actual,
            });
        }

        let mut state = self.inner.state.lock();
        if state.payload.is_some() {
            return Err(SimulationError::AlreadyComputed(self.inner.id));
        }
        state.payload = Some(payload);
        drop(state);

        self.inner.computed.notify_all();
        Ok(())
    }

    /// Block until the producer marks this signal computed
    pub fn wait_until_computed(&self) -> Payload {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(payload) = &state.payload {
                return payload.clone();
            }
            self.inner.computed.wait(&mut state);
        }
    }

    /// Wait at most `bound` for the signal to be computed
    pub fn wait_timeout(&self, bound: Duration) -> Result<Payload> {
        let deadline = Instant::now() + bound;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(payload) = &state.payload {
                return Ok(payload.clone());
            }
            if Instant::now() >= deadline {
                return Err(SimulationError::SignalPending(self.inner.id));
            }
            self.inner.computed.wait_until(&mut state, deadline);
        }
    }

    /// Ports this signal is attached to
    pub fn ports(&self) -> Vec<PortRef> {
        self.inner.state.lock().ports.clone()
    }

    /// True if both handles point at the same container
    pub fn same_as(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn add_port(&self, port: PortRef) {
        let mut state = self.inner.state.lock();
        if !state.ports.contains(&port) {
            state.ports.push(port);
        }
    }

    pub(crate) fn remove_port(&self, port: &PortRef) {
        self.inner.state.lock().ports.retain(|p| p != port);
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("signal_type", &self.inner.signal_type)
            .field("payload", &state.payload)
            .field("mode", &state.mode)
            .field("ports", &state.ports.len())
            .finish()
    }
}
