//! Shared stack of evaluation layers.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::types::{Device, SlotId};
use crate::unit::{EvalUnit, FifoGroup, UnitGroup};

use super::eval_layer::{Cluster, EvalLayer, LayerSummary};

/// Stack of layers. Index 0 is the root; the last entry is innermost.
struct LayerStack<D: Device> {
    layers: Vec<EvalLayer<D>>,
}

impl<D: Device> LayerStack<D> {
    fn new() -> Self {
        Self {
            layers: vec![EvalLayer::new()],
        }
    }

    fn innermost_mut(&mut self) -> &mut EvalLayer<D> {
        if self.layers.is_empty() {
            self.layers.push(EvalLayer::new());
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }
}

/// Handle through which units are registered.
///
/// Every registration lands in the innermost layer of the stack. While a plan
/// is draining, that is the layer opened for the depth currently running, so
/// work a unit discovers is scheduled (and finished) before the plan moves on.
/// Outside of a drain the stack holds only the root layer.
///
/// Clones share the same stack.
pub struct Registrar<D: Device> {
    stack: Arc<Mutex<LayerStack<D>>>,
}

impl<D: Device> Registrar<D> {
    /// Create a registrar over a fresh stack holding one empty root layer.
    pub fn new() -> Self {
        Self {
            stack: Arc::new(Mutex::new(LayerStack::new())),
        }
    }

    /// Register `unit` under group kind `G`.
    ///
    /// `output` is the slot the unit publishes, `operands` the slots it reads.
    /// Returns `Ok(false)` when the registration was dropped because `output`
    /// is `None` or already registered in the innermost layer.
    pub fn register<G: UnitGroup<D>>(
        &self,
        unit: G::Unit,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        self.lock().innermost_mut().register::<G>(unit, output, operands)
    }

    /// Register `unit` in the default FIFO group for its type.
    pub fn register_unit<U: EvalUnit<D>>(
        &self,
        unit: U,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        self.register::<FifoGroup<U>>(unit, output, operands)
    }

    /// Depth of `output` in the innermost layer.
    pub fn depth_of(&self, output: SlotId) -> Option<usize> {
        self.lock().innermost_mut().depth_of(output)
    }

    /// Units waiting in the innermost layer.
    pub fn pending_units(&self) -> usize {
        self.lock().innermost_mut().unit_count()
    }

    /// Number of layers opened on top of the root.
    pub fn nesting(&self) -> usize {
        self.lock().layers.len().saturating_sub(1)
    }

    /// Snapshot of the innermost layer. The stack is unlocked again by the
    /// time the summary is returned.
    pub fn innermost(&self) -> LayerSummary {
        self.lock().innermost_mut().summary()
    }

    pub(crate) fn layer_count(&self) -> usize {
        self.lock().layers.len()
    }

    pub(crate) fn take_cluster(&self, layer: usize, depth: usize) -> Option<Cluster<D>> {
        self.lock()
            .layers
            .get_mut(layer)
            .and_then(|layer| layer.take_cluster(depth))
    }

    pub(crate) fn layer_is_empty(&self, layer: usize) -> bool {
        self.lock()
            .layers
            .get(layer)
            .is_none_or(EvalLayer::is_empty)
    }

    /// Open a new innermost layer.
    pub(crate) fn push_layer(&self) {
        self.lock().layers.push(EvalLayer::new());
    }

    /// Remove the innermost layer and clear the one below it, which becomes
    /// the innermost. The root layer is cleared, never removed.
    pub(crate) fn close_layer(&self) {
        let mut stack = self.lock();
        if stack.layers.len() > 1 {
            stack.layers.pop();
        }
        stack.innermost_mut().clear();
    }

    /// Drop all layers and pending work, leaving one empty root layer.
    pub(crate) fn reset(&self) {
        *self.lock() = LayerStack::new();
    }

    fn lock(&self) -> MutexGuard<'_, LayerStack<D>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Device> Default for Registrar<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> Clone for Registrar<D> {
    fn clone(&self) -> Self {
        Self {
            stack: Arc::clone(&self.stack),
        }
    }
}

impl<D: Device> fmt::Debug for Registrar<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = self.lock();
        f.debug_struct("Registrar")
            .field("device", &D::NAME)
            .field("layers", &stack.layers)
            .finish()
    }
}
