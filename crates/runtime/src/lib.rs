//! Deferred Runtime
//!
//! Deferred dataflow evaluation: operations are expressed eagerly, registered
//! as evaluation units and run later, batched by kind and ordered by data
//! dependency rather than by program order.
//!
//! # Flow
//!
//! ```text
//! expression ──eval_register──▶ Registrar ──▶ EvalLayer (depth, kind) ──▶ EvalPlan
//!                                                                           │
//!                              ExecutionBackend ◀── process / barrier ──────┘
//! ```
//!
//! - [`handle`] - Write-once value slots and read-only views
//! - [`unit`] - Units of work and same-kind groups
//! - [`layer`] - Depth leveling and the registration stack
//! - [`plan`] - Depth-by-depth draining with nested discovery
//! - [`backend`] - Pluggable executors and the shared backend selection
//! - [`scheduler`] - Per-worker context and [`evaluate`]
//! - [`ops`] - Reference matrix operators

pub mod backend;
pub mod config;
pub mod error;
pub mod handle;
pub mod layer;
pub mod ops;
pub mod plan;
pub mod scheduler;
pub mod types;
pub mod unit;

pub use backend::{
    BACKEND_ENV_VAR, BackendKind, BackendSelection, ExecutionBackend, QueuedBackend, TrivialBackend,
};
pub use config::{DEFAULT_MAX_NESTING, SchedulerConfig};
pub use error::{Error, Result};
pub use handle::{ConstHandle, DeferredValue, DynConstHandle, EvalBuffer, ValueSource};
pub use layer::{Cluster, EvalLayer, LayerSummary, Registrar};
pub use plan::{EvalPlan, EvalStats};
pub use scheduler::{Evaluable, Scheduler, evaluate};
pub use types::{Cpu, Device, Gpu, SlotId};
pub use unit::{EvalGroup, EvalUnit, FifoGroup, FnUnit, GroupKind, UnitGroup};
