//! The evaluation layer: depth-indexed clusters of same-kind groups.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{Device, SlotId};
use crate::unit::{EvalGroup, GroupKind, UnitGroup};

use super::depth::unit_depth;

/// Groups registered at one depth, in first-registration order.
pub type Cluster<D> = IndexMap<GroupKind, Box<dyn EvalGroup<D>>>;

/// Point-in-time view of a layer's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayerSummary {
    /// Units queued at each depth.
    pub units_per_depth: Vec<usize>,
    /// Outputs registered in the layer.
    pub outputs: usize,
    /// Distinct operands seen by the layer.
    pub operands: usize,
}

impl LayerSummary {
    /// Units queued across all depths.
    pub fn unit_count(&self) -> usize {
        self.units_per_depth.iter().sum()
    }
}

/// One nesting level of the graph under construction.
pub struct EvalLayer<D: Device> {
    /// Clusters indexed by dependency depth.
    clusters: Vec<Cluster<D>>,
    /// Depth assigned to every output registered in this layer.
    outputs: HashMap<SlotId, usize>,
    /// Every operand identity seen by this layer.
    operands: HashSet<SlotId>,
}

impl<D: Device> EvalLayer<D> {
    /// Create an empty layer.
    pub fn new() -> Self {
        Self {
            clusters: Vec::new(),
            outputs: HashMap::new(),
            operands: HashSet::new(),
        }
    }

    /// Number of depth slots.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether nothing has been registered since the last clear.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Drop all clusters and bookkeeping.
    pub fn clear(&mut self) {
        self.clusters.clear();
        self.outputs.clear();
        self.operands.clear();
    }

    /// Register a unit under group kind `G`.
    ///
    /// Returns `Ok(false)` without touching the layer when `output` is `None` or
    /// already registered here; that is how the same node reached from two call
    /// sites ends up scheduled once.
    pub fn register<G: UnitGroup<D>>(
        &mut self,
        unit: G::Unit,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        let Some(output) = output else {
            trace!("registration without output slot ignored");
            return Ok(false);
        };
        if self.outputs.contains_key(&output) {
            trace!(%output, "output already registered");
            return Ok(false);
        }

        let depth = unit_depth(&self.outputs, operands);
        if self.clusters.len() <= depth {
            self.clusters.resize_with(depth + 1, IndexMap::new);
        }

        let kind = GroupKind::of::<G>();
        let group = self.clusters[depth]
            .entry(kind)
            .or_insert_with(|| Box::new(G::default()) as Box<dyn EvalGroup<D>>);
        let group = group
            .as_any_mut()
            .downcast_mut::<G>()
            .ok_or(Error::GroupKindMismatch { kind: kind.name() })?;
        group.merge(unit);

        self.outputs.insert(output, depth);
        self.operands.extend(operands.iter().copied());
        trace!(%output, depth, kind = kind.name(), "unit registered");
        Ok(true)
    }

    /// Depth assigned to a registered output.
    pub fn depth_of(&self, output: SlotId) -> Option<usize> {
        self.outputs.get(&output).copied()
    }

    /// Whether some registered unit reads `slot`.
    pub fn is_operand(&self, slot: SlotId) -> bool {
        self.operands.contains(&slot)
    }

    /// Groups at `depth`.
    pub fn cluster(&self, depth: usize) -> Option<&Cluster<D>> {
        self.clusters.get(depth)
    }

    /// Units queued at `depth`.
    pub fn units_at(&self, depth: usize) -> usize {
        self.clusters
            .get(depth)
            .map_or(0, |cluster| cluster.values().map(|group| group.len()).sum())
    }

    /// Units queued across all depths.
    pub fn unit_count(&self) -> usize {
        (0..self.clusters.len()).map(|depth| self.units_at(depth)).sum()
    }

    /// Copy out the layer's counters.
    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            units_per_depth: (0..self.clusters.len()).map(|depth| self.units_at(depth)).collect(),
            outputs: self.outputs.len(),
            operands: self.operands.len(),
        }
    }

    /// Move the cluster at `depth` out, leaving an empty one behind.
    pub(crate) fn take_cluster(&mut self, depth: usize) -> Option<Cluster<D>> {
        self.clusters.get_mut(depth).map(std::mem::take)
    }
}

impl<D: Device> Default for EvalLayer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> fmt::Debug for EvalLayer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalLayer")
            .field("depths", &self.clusters.len())
            .field("units", &self.unit_count())
            .field("outputs", &self.outputs.len())
            .field("operands", &self.operands.len())
            .finish()
    }
}
