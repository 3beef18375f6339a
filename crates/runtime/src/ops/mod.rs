//! Reference elementwise operators.
//!
//! A dense [`Matrix`] leaf plus two expression nodes, [`Abs`] and [`Add`],
//! that evaluate through the scheduler. They are small on purpose: enough to
//! drive registration, depth leveling and shared-subexpression dedup from
//! real expression trees.
//!
//! Expression nodes keep their output in an [`EvalBuffer`](crate::EvalBuffer).
//! Cloning a node shares that buffer, so a subexpression used twice in one tree
//! presents the same output slot both times and runs once.
//!
//! ```
//! use deferred_runtime::ops::{Abs, Add, Matrix};
//! use deferred_runtime::{evaluate, BackendSelection, Cpu, Scheduler, SchedulerConfig};
//!
//! let a = Matrix::<Cpu>::new(1, 2, vec![1.0, -4.0]).unwrap();
//! let b = Matrix::<Cpu>::new(1, 2, vec![-3.0, 1.0]).unwrap();
//! let expr = Abs::new(Add::new(a, b));
//!
//! let mut scheduler =
//!     Scheduler::<Cpu>::with_selection(BackendSelection::default(), SchedulerConfig::default());
//! let result = evaluate(&mut scheduler, &expr).unwrap();
//! assert_eq!(result.value().unwrap().as_slice(), &[2.0, 3.0]);
//! ```

mod elementwise;
mod matrix;


pub use elementwise::{Abs, AbsUnit, Add, AddUnit};
pub use matrix::Matrix;
