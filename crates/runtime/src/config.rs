//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// Default bound on simultaneously nested evaluation layers.
pub const DEFAULT_MAX_NESTING: usize = 64;

/// Per-scheduler settings.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use deferred_runtime::{BackendKind, SchedulerConfig};
///
/// let config: SchedulerConfig = serde_json::from_str(r#"{ "backend": "queued" }"#).unwrap();
/// assert_eq!(config.backend, Some(BackendKind::Queued));
/// assert_eq!(config.max_nesting, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of nested layers a single evaluation may open.
    /// Units that keep registering new work past this fail the evaluation.
    pub max_nesting: usize,

    /// Backend kind to use regardless of the shared selection.
    /// `None` follows the selection the scheduler observes.
    pub backend: Option<BackendKind>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
            backend: None,
        }
    }
}

impl SchedulerConfig {
    /// Pin the backend kind.
    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }
}
