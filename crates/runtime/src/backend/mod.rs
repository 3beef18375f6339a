//! Execution backends.
//!
//! A backend runs evaluation units on behalf of a plan and provides the
//! barrier the plan places between dependency depths. The plan only relies on
//! one guarantee: once `barrier` returns, every unit the calling thread
//! submitted since its previous barrier has run and published its output.
//!
//! # Backends
//!
//! - [`TrivialBackend`] - Runs each unit synchronously inside `process`
//! - [`QueuedBackend`] - Queues units per thread and runs them at the barrier
//!
//! Which kind a scheduler uses is decided by a [`BackendSelection`].

mod queued;
mod selection;


use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layer::Registrar;
use crate::types::Device;
use crate::unit::EvalUnit;

pub use queued::QueuedBackend;
pub use selection::{BackendSelection, BACKEND_ENV_VAR};

/// Backend kinds a device may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Run units synchronously as they are submitted.
    #[default]
    Trivial,
    /// Defer units to the next barrier.
    Queued,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Trivial => "trivial",
            BackendKind::Queued => "queued",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trivial" => Ok(BackendKind::Trivial),
            "queued" => Ok(BackendKind::Queued),
            _ => Err(Error::InvalidBackend(s.to_string())),
        }
    }
}

/// Executor contract shared by all backends.
///
/// Executors are process-wide singletons driven by many schedulers on many
/// threads at once.
pub trait ExecutionBackend<D: Device>: Send + Sync {
    /// Which kind this executor implements.
    fn kind(&self) -> BackendKind;

    /// Run `unit` now or enqueue it. Work the unit discovers goes to `registrar`.
    fn process(&self, unit: Box<dyn EvalUnit<D>>, registrar: &Registrar<D>) -> Result<()>;

    /// Block until every unit submitted by the calling thread has run.
    fn barrier(&self) -> Result<()>;
}

/// Synchronous backend. `barrier` has nothing to wait for.
pub struct TrivialBackend<D> {
    _device: PhantomData<fn() -> D>,
}

impl<D: Device> TrivialBackend<D> {
    pub fn new() -> Self {
        Self {
            _device: PhantomData,
        }
    }
}

impl<D: Device> Default for TrivialBackend<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> ExecutionBackend<D> for TrivialBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Trivial
    }

    fn process(&self, unit: Box<dyn EvalUnit<D>>, registrar: &Registrar<D>) -> Result<()> {
        unit.run(registrar)
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}

impl<D: Device> fmt::Debug for TrivialBackend<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrivialBackend")
            .field("device", &D::NAME)
            .finish()
    }
}
