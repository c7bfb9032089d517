//! Process runtime state shared between the lifecycle and request handlers.
//!
//! [`RuntimeInfo`] is created once by the server and handed to every
//! component that needs it as an `Arc`. Both pieces of state it holds are
//! written only during startup or shutdown; request handlers just read them.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{CoreError, CoreResult};

/// Serving state of the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingState {
    /// Not yet accepting; the initial state.
    Starting,
    /// Accepting new requests.
    Accepting,
    /// Shutting down; new requests are rejected.
    Closed,
}

impl ServingState {
    /// Status string reported by `/Status`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Accepting => "ready",
            Self::Closed => "closed",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Accepting,
            2 => Self::Closed,
            _ => Self::Starting,
        }
    }
}

impl fmt::Display for ServingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept/reject gate for incoming requests.
///
/// Moves forward only: `Starting -> Accepting -> Closed`.
#[derive(Debug, Default)]
pub struct ServingGate {
    state: AtomicU8,
}

impl ServingGate {
    /// Create a gate in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting requests. Returns `false` if the gate was not in
    /// `Starting` (already open, or already closed).
    pub fn open(&self) -> bool {
        self.state
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stop accepting requests. In-flight requests are not affected.
    pub fn close(&self) {
        self.state.store(2, Ordering::Release);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ServingState {
        ServingState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether new requests are currently accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.state() == ServingState::Accepting
    }
}

/// The port this process listens on, recorded at most once.
#[derive(Debug, Default)]
pub struct ListenPort {
    port: OnceLock<u16>,
}

impl ListenPort {
    /// Create an unset listen port.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the chosen port. Fails if a port was already recorded.
    pub fn set(&self, port: u16) -> CoreResult<()> {
        self.port
            .set(port)
            .map_err(|requested| CoreError::ListenPortAlreadySet {
                existing: self.port.get().copied().unwrap_or(requested),
                requested,
            })
    }

    /// The recorded port, or `None` if startup has not chosen one.
    #[must_use]
    pub fn get(&self) -> Option<u16> {
        self.port.get().copied()
    }
}

/// Runtime state owned by the server and read by the handlers.
#[derive(Debug, Default)]
pub struct RuntimeInfo {
    /// The serving-state gate.
    pub gate: ServingGate,
    /// The chosen listen port.
    pub listen_port: ListenPort,
}

impl RuntimeInfo {
    /// Create runtime state with a closed gate and no listen port.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
