//! Errors raised by the deferred evaluation scheduler.
//!
//! # Error Categories
//!
//! - **State violations**: [`Error::NotEvaluated`], [`Error::AlreadyEvaluated`],
//!   [`Error::Unallocated`], [`Error::GroupKindMismatch`]
//! - **Configuration errors**: [`Error::BackendUnavailable`], [`Error::InvalidBackend`],
//!   [`Error::NestingTooDeep`]
//! - **Operator errors**: [`Error::Shape`]
//!
//! # Error Handling Policy
//!
//! State violations mean an invariant was broken by whoever built the graph.
//! They are raised synchronously from the call that detected them and are never
//! retried. Registering with a null output or an output the current layer
//! already knows is *not* an error: those registrations are silently dropped.

use thiserror::Error;

use crate::backend::BackendKind;
use crate::types::SlotId;

/// Scheduler result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering or evaluating deferred work.
#[derive(Debug, Error)]
pub enum Error {
    /// A deferred value was read before its producer published it.
    #[error("value in {0} is not evaluated yet")]
    NotEvaluated(SlotId),

    /// A deferred value was written, mutated or marked after publication.
    ///
    /// Published values are immutable; a second producer for the same slot
    /// indicates the graph was wired incorrectly.
    #[error("value in {0} is already evaluated")]
    AlreadyEvaluated(SlotId),

    /// A deferred value was mutated or published before anything was allocated.
    #[error("value in {0} was never allocated")]
    Unallocated(SlotId),

    /// A group stored under a kind key did not have the expected concrete type.
    #[error("evaluation group kind mismatch for {kind}")]
    GroupKindMismatch {
        /// Type name of the group that was expected under the key.
        kind: &'static str,
    },

    /// No executor of the selected kind exists for the device.
    #[error("no {kind} backend available for device {device}")]
    BackendUnavailable {
        /// The backend kind that was selected.
        kind: BackendKind,
        /// Name of the device the plan evaluates on.
        device: &'static str,
    },

    /// A backend name could not be parsed.
    #[error("unknown backend kind: {0:?}")]
    InvalidBackend(String),

    /// Units kept registering new work past the configured nesting bound.
    #[error("nested evaluation layers exceeded the limit of {limit}")]
    NestingTooDeep {
        /// Configured maximum number of simultaneously nested layers.
        limit: usize,
    },

    /// Operand shapes of an elementwise operator disagree.
    #[error("shape mismatch in {op}: expected {expected:?}, found {found:?}")]
    Shape {
        /// Operator that detected the mismatch.
        op: &'static str,
        /// Shape of the first operand as `(rows, cols)`.
        expected: (usize, usize),
        /// Shape of the offending operand as `(rows, cols)`.
        found: (usize, usize),
    },
}

impl Error {
    /// Whether this error reports a broken write-once/read-after-publish rule.
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            Error::NotEvaluated(_)
                | Error::AlreadyEvaluated(_)
                | Error::Unallocated(_)
                | Error::GroupKindMismatch { .. }
        )
    }
}
