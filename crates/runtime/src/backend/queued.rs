//! Barrier-deferred backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::trace;

use crate::error::Result;
use crate::layer::Registrar;
use crate::types::Device;
use crate::unit::EvalUnit;

use super::{BackendKind, ExecutionBackend};

type Queue<D> = Vec<(Box<dyn EvalUnit<D>>, Registrar<D>)>;

/// Backend that defers every unit to the submitting thread's next barrier.
///
/// Queues are keyed by thread, so schedulers on different threads sharing
/// this singleton never run each other's work. A barrier takes its queue out
/// before running it; units that evaluate another plan on the same thread
/// therefore see a fresh queue.
pub struct QueuedBackend<D: Device> {
    queues: Mutex<HashMap<ThreadId, Queue<D>>>,
}

impl<D: Device> QueuedBackend<D> {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Units the calling thread has submitted and not yet run.
    pub fn pending(&self) -> usize {
        self.lock()
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Queue<D>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Device> Default for QueuedBackend<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> ExecutionBackend<D> for QueuedBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Queued
    }

    fn process(&self, unit: Box<dyn EvalUnit<D>>, registrar: &Registrar<D>) -> Result<()> {
        self.lock()
            .entry(thread::current().id())
            .or_default()
            .push((unit, registrar.clone()));
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        let queue = self.lock().remove(&thread::current().id());
        let Some(queue) = queue else {
            return Ok(());
        };

        trace!(units = queue.len(), device = D::NAME, "running queued units");
        // on failure the rest of the queue is dropped with it
        for (unit, registrar) in queue {
            unit.run(&registrar)?;
        }
        Ok(())
    }
}

impl<D: Device> fmt::Debug for QueuedBackend<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedBackend")
            .field("device", &D::NAME)
            .field("threads", &self.lock().len())
            .finish()
    }
}
