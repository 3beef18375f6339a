//! Evaluation layers and dependency-depth leveling.
//!
//! A layer collects registered units and assigns each one a dependency depth
//! the moment it is registered, without ever materializing the graph:
//!
//! ```text
//! depth(unit) = 1 + max(depth(operand) for tracked operands)   (0 if none)
//! ```
//!
//! Operands that were not registered as an output of the same layer are
//! treated as already satisfied inputs. Units at one depth never depend on each
//! other, so a plan can run a whole depth, place a barrier, and move on.
//!
//! # Structure
//!
//! - [`EvalLayer`] - Per-depth clusters of groups plus the depth bookkeeping
//! - [`LayerSummary`] - Copied-out counters of a layer
//! - [`Cluster`] - Groups at one depth, keyed by [`GroupKind`](crate::unit::GroupKind)
//! - [`Registrar`] - Shared handle to a plan's stack of layers; registrations
//!   always land in the innermost layer

mod depth;
mod eval_layer;
mod registrar;


pub use eval_layer::{Cluster, EvalLayer, LayerSummary};
pub use registrar::Registrar;
