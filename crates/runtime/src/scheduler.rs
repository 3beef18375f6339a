//! Per-worker scheduling context and the evaluation entry point.
//!
//! A [`Scheduler`] owns one plan and the executor it last resolved. It is the
//! explicit replacement for a thread-local plan: a worker creates one, builds
//! expressions against its registrar and calls [`Scheduler::eval`]. Schedulers
//! are not shared; every thread that evaluates creates its own.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::backend::{BackendKind, BackendSelection, ExecutionBackend};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::handle::ConstHandle;
use crate::layer::Registrar;
use crate::plan::{EvalPlan, EvalStats};
use crate::types::{Device, SlotId};
use crate::unit::{EvalUnit, UnitGroup};

struct CachedBackend<D: Device> {
    kind: BackendKind,
    generation: u64,
    backend: Arc<dyn ExecutionBackend<D>>,
}

/// Owner of one evaluation plan and its cached executor.
pub struct Scheduler<D: Device> {
    plan: EvalPlan<D>,
    selection: BackendSelection,
    config: SchedulerConfig,
    cached: Option<CachedBackend<D>>,
}

impl<D: Device> Scheduler<D> {
    /// Scheduler following the process-wide selection.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Scheduler following the process-wide selection with custom settings.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_selection(BackendSelection::global().clone(), config)
    }

    /// Scheduler following a caller-provided selection.
    pub fn with_selection(selection: BackendSelection, config: SchedulerConfig) -> Self {
        Self {
            plan: EvalPlan::new(config.max_nesting),
            selection,
            config,
            cached: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The selection this scheduler observes.
    pub fn selection(&self) -> &BackendSelection {
        &self.selection
    }

    /// Registration handle for the plan.
    pub fn registrar(&self) -> &Registrar<D> {
        self.plan.registrar()
    }

    /// Register `unit` under group kind `G`.
    pub fn register<G: UnitGroup<D>>(
        &self,
        unit: G::Unit,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        self.plan.register::<G>(unit, output, operands)
    }

    /// Register `unit` in its default FIFO group.
    pub fn register_unit<U: EvalUnit<D>>(
        &self,
        unit: U,
        output: Option<SlotId>,
        operands: &[SlotId],
    ) -> Result<bool> {
        self.plan.register_unit(unit, output, operands)
    }

    /// Units waiting for the next evaluation.
    pub fn pending_units(&self) -> usize {
        self.plan.pending_units()
    }

    /// Kind of the executor resolved by the last evaluation, if any.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.cached.as_ref().map(|cached| cached.kind)
    }

    /// Run all registered work.
    ///
    /// The executor is re-resolved when the observed selection changed since
    /// the previous call. If no executor of the selected kind exists for the
    /// device the call fails and the registered work stays pending.
    #[instrument(skip(self), fields(device = D::NAME))]
    pub fn eval(&mut self) -> Result<EvalStats> {
        let backend = self.resolve_backend()?;
        self.plan.drain(backend.as_ref())
    }

    fn resolve_backend(&mut self) -> Result<Arc<dyn ExecutionBackend<D>>> {
        let (selected, generation) = self.selection.snapshot();
        let kind = self.config.backend.unwrap_or(selected);

        let current = self
            .cached
            .as_ref()
            .filter(|cached| cached.generation == generation && cached.kind == kind);
        if let Some(cached) = current {
            return Ok(Arc::clone(&cached.backend));
        }

        let backend = D::backend(kind)?;
        debug!(%kind, generation, "backend resolved");
        self.cached = Some(CachedBackend {
            kind,
            generation,
            backend: Arc::clone(&backend),
        });
        Ok(backend)
    }
}

impl<D: Device> Default for Scheduler<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> fmt::Debug for Scheduler<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("device", &D::NAME)
            .field("config", &self.config)
            .field("backend", &self.backend_kind())
            .field("plan", &self.plan)
            .finish()
    }
}

/// An expression that can schedule its own evaluation.
///
/// `eval_register` registers whatever units are needed to produce the value
/// (skipping parts that are already evaluated) and returns a handle that is
/// published once the scheduler has run.
pub trait Evaluable<D: Device> {
    type Output: Send + Sync + 'static;

    fn eval_register(&self, registrar: &Registrar<D>) -> Result<ConstHandle<Self::Output>>;
}

/// Register `data`, run the scheduler and return the evaluated result.
pub fn evaluate<D, E>(scheduler: &mut Scheduler<D>, data: &E) -> Result<ConstHandle<E::Output>>
where
    D: Device,
    E: Evaluable<D> + ?Sized,
{
    let handle = data.eval_register(scheduler.registrar())?;
    scheduler.eval()?;
    handle.value()?;
    Ok(handle)
}
