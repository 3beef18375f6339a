//! Integration test harness for the deferred runtime.
//!
//! Builds small integer graphs out of traced units so tests can check what
//! ran, in which order, and what each node published.

use std::sync::{Arc, Mutex, Once, PoisonError};

use tracing::trace;
use tracing_subscriber::{EnvFilter, fmt};

use deferred_runtime::{
    BackendKind, BackendSelection, DeferredValue, Device, DynConstHandle, EvalStats, EvalUnit,
    Registrar, Result, Scheduler, SchedulerConfig,
};

/// Initialize logging once per test binary.
///
/// Use the `RUST_LOG` environment variable to override the default filter.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,deferred_runtime=debug"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Names of units in the order they ran.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    pub fn record(&self, name: &str) {
        self.lock().push(name.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Position of `name` in the run order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.lock().iter().position(|entry| entry == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.lock().iter().filter(|entry| *entry == name).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Work a [`TracedUnit`] registers when it runs.
#[derive(Debug, Clone)]
pub struct Spawn {
    /// Name of the discovered unit.
    pub name: String,
    /// Where the discovered unit publishes.
    pub out: DeferredValue<i64>,
}

/// Unit publishing `base + sum(inputs)` and recording its name.
pub struct TracedUnit {
    name: String,
    base: i64,
    inputs: Vec<DynConstHandle<i64>>,
    out: DeferredValue<i64>,
    trace: Trace,
    spawn: Option<Spawn>,
}

impl<D: Device> EvalUnit<D> for TracedUnit {
    fn run(self: Box<Self>, registrar: &Registrar<D>) -> Result<()> {
        let mut total = self.base;
        for input in &self.inputs {
            total += *input.value()?;
        }
        trace!(unit = %self.name, total, "traced unit");
        self.trace.record(&self.name);
        self.out.allocate(total)?;
        self.out.set_eval()?;

        if let Some(spawn) = self.spawn {
            let child = TracedUnit {
                name: spawn.name,
                base: 0,
                inputs: vec![DynConstHandle::new(self.out.clone())],
                out: spawn.out.clone(),
                trace: self.trace.clone(),
                spawn: None,
            };
            registrar.register_unit(child, Some(spawn.out.slot()), &[self.out.slot()])?;
        }
        Ok(())
    }
}

/// A scheduler plus a trace, with helpers for building integer graphs.
pub struct Harness<D: Device> {
    scheduler: Scheduler<D>,
    selection: BackendSelection,
    trace: Trace,
}

impl<D: Device> Harness<D> {
    /// Harness with a private selection starting at `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_config(kind, SchedulerConfig::default())
    }

    pub fn with_config(kind: BackendKind, config: SchedulerConfig) -> Self {
        init_logging();
        let selection = BackendSelection::new(kind);
        Self {
            scheduler: Scheduler::with_selection(selection.clone(), config),
            selection,
            trace: Trace::default(),
        }
    }

    pub fn scheduler(&mut self) -> &mut Scheduler<D> {
        &mut self.scheduler
    }

    pub fn selection(&self) -> &BackendSelection {
        &self.selection
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Register a source node publishing `value`.
    pub fn constant(&self, name: &str, value: i64) -> DeferredValue<i64> {
        self.node(name, value, &[], None)
    }

    /// Register a node publishing the sum of `inputs`.
    pub fn sum(&self, name: &str, inputs: &[&DeferredValue<i64>]) -> DeferredValue<i64> {
        self.node(name, 0, inputs, None)
    }

    /// Register a node that, when it runs, registers `child` reading its output.
    pub fn spawner(&self, name: &str, value: i64, child: &str) -> (DeferredValue<i64>, DeferredValue<i64>) {
        let child_out = DeferredValue::new();
        let spawn = Spawn {
            name: child.to_string(),
            out: child_out.clone(),
        };
        (self.node(name, value, &[], Some(spawn)), child_out)
    }

    /// Register `unit` under `out`, reading `inputs`. Returns whether it was kept.
    pub fn register_raw(&self, name: &str, out: &DeferredValue<i64>, inputs: &[&DeferredValue<i64>]) -> bool {
        let unit = self.unit(name, 0, inputs, out, None);
        let operands: Vec<_> = inputs.iter().map(|input| input.slot()).collect();
        self.scheduler
            .register_unit(unit, Some(out.slot()), &operands)
            .expect("registration failed")
    }

    pub fn eval(&mut self) -> Result<EvalStats> {
        self.scheduler.eval()
    }

    fn node(
        &self,
        name: &str,
        base: i64,
        inputs: &[&DeferredValue<i64>],
        spawn: Option<Spawn>,
    ) -> DeferredValue<i64> {
        let out = DeferredValue::new();
        let unit = self.unit(name, base, inputs, &out, spawn);
        let operands: Vec<_> = inputs.iter().map(|input| input.slot()).collect();
        self.scheduler
            .register_unit(unit, Some(out.slot()), &operands)
            .expect("registration failed");
        out
    }

    fn unit(
        &self,
        name: &str,
        base: i64,
        inputs: &[&DeferredValue<i64>],
        out: &DeferredValue<i64>,
        spawn: Option<Spawn>,
    ) -> TracedUnit {
        TracedUnit {
            name: name.to_string(),
            base,
            inputs: inputs
                .iter()
                .map(|input| DynConstHandle::new((*input).clone()))
                .collect(),
            out: out.clone(),
            trace: self.trace.clone(),
            spawn,
        }
    }
}
