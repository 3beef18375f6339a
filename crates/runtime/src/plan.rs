//! Evaluation plan: depth-by-depth draining of layers.
//!
//! # Protocol
//!
//! ```text
//! drain(layer):
//!     open a nested layer for work discovered while this layer runs
//!     for depth in 0..:
//!         process every unit of every group at depth
//!         barrier
//!         if the nested layer gained units: drain(nested) before depth + 1
//!     close the nested layer, clear this one
//! ```
//!
//! The recursion is run on an explicit frame stack, one frame per layer
//! currently being drained.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::backend::{BackendKind, ExecutionBackend};
use crate::error::{Error, Result};
use crate::layer::Registrar;
use crate::types::{Device, SlotId};
use crate::unit::{EvalUnit, UnitGroup};

/// Summary of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvalStats {
    /// Backend the units were submitted to.
    pub backend: BackendKind,
    /// Units submitted across all layers.
    pub units_run: usize,
    /// Non-empty depths drained across all layers.
    pub depths_drained: usize,
    /// Layers drained, the root included.
    pub layers_drained: usize,
    /// Deepest nesting reached (0 when no unit registered further work).
    pub max_nesting: usize,
}

/// Layer currently being drained and the next depth to take from it.
#[derive(Debug, Clone, Copy)]
struct Frame {
    layer: usize,
    depth: usize,
}

/// Stack of evaluation layers plus the drain loop.
///
/// Between evaluations the plan holds exactly one layer, the root, which is
/// where registrations made outside of a drain land.
#[derive(Debug)]
pub struct EvalPlan<D: Device> {
    registrar: Registrar<D>,
    max_nesting: usize,
}

impl<D: Device> EvalPlan<D> {
    /// Create an empty plan allowing at most `max_nesting` nested layers.
    pub fn new(max_nesting: usize) -> Self {
        Self {
            registrar: Registrar::new(),
            max_nesting,
        }
    }

    /// Registration handle for this plan's layers.
    pub fn registrar(&self) -> &Registrar<D> {
        &self.registrar
    }

    /// Register `unit` under group kind `G` in the innermost layer.
    pub fn register<G: UnitGroup<D>>(
        &self,
        unit: G::Unit,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        self.registrar.register::<G>(unit, output, operands)
    }

    /// Register `unit` in its default FIFO group.
    pub fn register_unit<U: EvalUnit<D>>(
        &self,
        unit: U,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        self.registrar.register_unit(unit, output, operands)
    }

    /// Units waiting in the innermost layer. Between drains that is the root;
    /// inside a running unit it is the layer collecting discovered work.
    pub fn pending_units(&self) -> usize {
        self.registrar.pending_units()
    }

    pub fn max_nesting(&self) -> usize {
        self.max_nesting
    }

    /// Run everything registered so far against `backend`.
    ///
    /// On success every registered output has been published. On failure the
    /// plan is reset to a single empty layer and the pending work is dropped.
    #[instrument(skip_all, fields(device = D::NAME, backend = %backend.kind()))]
    pub fn drain(&mut self, backend: &dyn ExecutionBackend<D>) -> Result<EvalStats> {
        let result = self.drain_layers(backend);
        if let Err(err) = &result {
            debug!(%err, "evaluation failed, resetting plan");
            self.registrar.reset();
        }
        result
    }

    fn drain_layers(&self, backend: &dyn ExecutionBackend<D>) -> Result<EvalStats> {
        let mut stats = EvalStats {
            backend: backend.kind(),
            ..EvalStats::default()
        };
        if self.registrar.layer_is_empty(0) {
            trace!("nothing registered");
            return Ok(stats);
        }

        let mut frames = vec![Frame { layer: 0, depth: 0 }];
        self.registrar.push_layer();

        while let Some(frame) = frames.last_mut() {
            let layer = frame.layer;
            let Some(cluster) = self.registrar.take_cluster(layer, frame.depth) else {
                // layer exhausted: drop its scratch layer, recycle it as the parent's
                trace!(layer, depths = frame.depth, "layer drained");
                frames.pop();
                self.registrar.close_layer();
                stats.layers_drained += 1;
                continue;
            };
            let depth = frame.depth;
            frame.depth += 1;

            trace!(layer, depth, groups = cluster.len(), "draining depth");
            for (_kind, mut group) in cluster {
                while let Some(unit) = group.pop_unit() {
                    backend.process(unit, &self.registrar)?;
                    stats.units_run += 1;
                }
            }
            backend.barrier()?;
            stats.depths_drained += 1;

            if !self.registrar.layer_is_empty(layer + 1) {
                if frames.len() > self.max_nesting {
                    return Err(Error::NestingTooDeep {
                        limit: self.max_nesting,
                    });
                }
                frames.push(Frame {
                    layer: layer + 1,
                    depth: 0,
                });
                self.registrar.push_layer();
                stats.max_nesting = stats.max_nesting.max(frames.len() - 1);
            }
        }

        debug!(
            units = stats.units_run,
            depths = stats.depths_drained,
            nesting = stats.max_nesting,
            "plan drained"
        );
        Ok(stats)
    }
}

impl<D: Device> Default for EvalPlan<D> {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_NESTING)
    }
}
