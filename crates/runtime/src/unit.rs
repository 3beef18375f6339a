//! Evaluation units and groups.
//!
//! An [`EvalUnit`] is one operator's deferred computation. Units of the same
//! kind are batched into an [`EvalGroup`]; the plan dispatches whole groups so
//! a backend could fuse or batch them.
//!
//! Groups are stored type-erased inside a layer. Registration goes through the
//! typed [`UnitGroup`] trait, whose concrete type doubles as the kind key.

use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

use crate::error::Result;
use crate::layer::Registrar;
use crate::types::Device;

/// One unit of deferred work producing exactly one deferred value.
///
/// `run` consumes the unit. By the time it is called every operand produced
/// in the same layer has been published. A unit that discovers further work
/// registers it through `registrar`; that work runs before the plan moves on
/// to the next dependency depth.
pub trait EvalUnit<D: Device>: Send + 'static {
    /// Compute, allocate and publish the output.
    fn run(self: Box<Self>, registrar: &Registrar<D>) -> Result<()>;
}

/// Type-erased queue of same-kind units.
pub trait EvalGroup<D: Device>: Any + Send {
    /// Take the next unit, or `None` once drained. Safe to call repeatedly.
    fn pop_unit(&mut self) -> Option<Box<dyn EvalUnit<D>>>;

    /// Number of queued units.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Downcast hook used when merging through the typed interface.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed side of a group: knows its unit type and how to merge units in.
pub trait UnitGroup<D: Device>: EvalGroup<D> + Default {
    type Unit: EvalUnit<D>;

    /// Merge a unit the caller owns.
    fn merge(&mut self, unit: Self::Unit);

    /// Merge a copy of a unit the caller keeps.
    fn merge_cloned(&mut self, unit: &Self::Unit)
    where
        Self::Unit: Clone,
    {
        self.merge(unit.clone());
    }
}

/// Identity of a group type, used as the cluster key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKind {
    id: TypeId,
    name: &'static str,
}

impl GroupKind {
    /// Kind key of the group type `G`.
    pub fn of<G: 'static>() -> Self {
        Self {
            id: TypeId::of::<G>(),
            name: std::any::type_name::<G>(),
        }
    }

    /// Type name of the group, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Default group: first in, first out.
pub struct FifoGroup<U> {
    units: VecDeque<U>,
}

impl<U> Default for FifoGroup<U> {
    fn default() -> Self {
        Self {
            units: VecDeque::new(),
        }
    }
}

impl<D: Device, U: EvalUnit<D>> EvalGroup<D> for FifoGroup<U> {
    fn pop_unit(&mut self) -> Option<Box<dyn EvalUnit<D>>> {
        self.units
            .pop_front()
            .map(|unit| Box::new(unit) as Box<dyn EvalUnit<D>>)
    }

    fn len(&self) -> usize {
        self.units.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<D: Device, U: EvalUnit<D>> UnitGroup<D> for FifoGroup<U> {
    type Unit = U;

    fn merge(&mut self, unit: U) {
        self.units.push_back(unit);
    }
}

/// Unit backed by a closure.
///
/// Every closure has its own type, so each `FnUnit` call site forms its own
/// group kind.
pub struct FnUnit<D, F> {
    f: F,
    _device: PhantomData<fn() -> D>,
}

impl<D, F> FnUnit<D, F>
where
    D: Device,
    F: FnOnce(&Registrar<D>) -> Result<()> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _device: PhantomData,
        }
    }
}

impl<D, F> EvalUnit<D> for FnUnit<D, F>
where
    D: Device,
    F: FnOnce(&Registrar<D>) -> Result<()> + Send + 'static,
{
    fn run(self: Box<Self>, registrar: &Registrar<D>) -> Result<()> {
        (self.f)(registrar)
    }
}
