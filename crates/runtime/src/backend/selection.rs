//! Process-wide backend selection.

use std::env;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, warn};

use super::BackendKind;

/// Environment variable read by [`BackendSelection::from_env`].
pub const BACKEND_ENV_VAR: &str = "DEFERRED_EVAL_BACKEND";

#[derive(Debug, Clone, Copy)]
struct SelectionState {
    kind: BackendKind,
    generation: u64,
}

/// Shared, switchable choice of backend kind.
///
/// Schedulers cache the executor they resolved together with the generation
/// they saw; every [`select`](Self::select) bumps the generation, so the
/// change is picked up on each scheduler's next evaluation. Clones observe
/// the same selection.
#[derive(Debug, Clone)]
pub struct BackendSelection {
    state: Arc<RwLock<SelectionState>>,
}

impl BackendSelection {
    /// Selection starting at `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            state: Arc::new(RwLock::new(SelectionState {
                kind,
                generation: 0,
            })),
        }
    }

    /// Selection initialized from `DEFERRED_EVAL_BACKEND`.
    ///
    /// An unset variable selects the default kind; an unparsable one is
    /// reported and also falls back to the default.
    pub fn from_env() -> Self {
        Self::new(kind_from_var(env::var(BACKEND_ENV_VAR).ok().as_deref()))
    }

    /// The process-wide selection, initialized from the environment on first use.
    pub fn global() -> &'static BackendSelection {
        static GLOBAL: OnceLock<BackendSelection> = OnceLock::new();
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Switch to `kind`. Takes effect on each observer's next evaluation.
    pub fn select(&self, kind: BackendKind) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.kind = kind;
        state.generation += 1;
        debug!(%kind, generation = state.generation, "backend selected");
    }

    /// Currently selected kind.
    pub fn kind(&self) -> BackendKind {
        self.snapshot().0
    }

    /// Number of `select` calls so far.
    pub fn generation(&self) -> u64 {
        self.snapshot().1
    }

    /// Kind and generation read together.
    pub fn snapshot(&self) -> (BackendKind, u64) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.kind, state.generation)
    }
}

impl Default for BackendSelection {
    fn default() -> Self {
        Self::new(BackendKind::default())
    }
}

fn kind_from_var(value: Option<&str>) -> BackendKind {
    match value.map(str::parse::<BackendKind>) {
        None => BackendKind::default(),
        Some(Ok(kind)) => kind,
        Some(Err(err)) => {
            warn!(%err, var = BACKEND_ENV_VAR, "falling back to default backend");
            BackendKind::default()
        }
    }
}
