//! Core identity and device types.
//!
//! # Key Types
//!
//! - [`SlotId`] - Opaque identity of a deferred value, used as the dependency key
//! - [`Device`] - Device tag that owns its backend singletons
//! - [`Cpu`], [`Gpu`] - The two device tags

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, ExecutionBackend, QueuedBackend, TrivialBackend};
use crate::error::{Error, Result};

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

/// Identity of a deferred value slot.
///
/// Slot ids are issued from a process-wide counter when a value cell (or a
/// plain constant snapshot) is created and are never reused, so two live
/// values never share an id and a dropped value cannot alias a new one.
///
/// # Example
///
/// ```
/// use deferred_runtime::SlotId;
///
/// let a = SlotId::fresh();
/// let b = SlotId::fresh();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(NonZeroU64);

impl SlotId {
    /// Issue a new, never before seen slot id.
    pub fn fresh() -> Self {
        let raw = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Raw numeric value, for logging.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// A device that evaluation plans run against.
///
/// Each device owns one executor per [`BackendKind`] it supports. Executors are
/// created on first use and shared by every scheduler in the process.
pub trait Device: fmt::Debug + Copy + Default + Send + Sync + 'static {
    /// Short device name used in logs and errors.
    const NAME: &'static str;

    /// Fetch the process-wide executor of the given kind.
    fn backend(kind: BackendKind) -> Result<Arc<dyn ExecutionBackend<Self>>>;
}

/// Host device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cpu;

/// Accelerator device.
///
/// Only the synchronous backend exists for it; selecting any other kind is a
/// configuration error when a plan on this device is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Gpu;

impl Device for Cpu {
    const NAME: &'static str = "cpu";

    fn backend(kind: BackendKind) -> Result<Arc<dyn ExecutionBackend<Self>>> {
        static TRIVIAL: OnceLock<Arc<TrivialBackend<Cpu>>> = OnceLock::new();
        static QUEUED: OnceLock<Arc<QueuedBackend<Cpu>>> = OnceLock::new();

        let backend: Arc<dyn ExecutionBackend<Self>> = match kind {
            BackendKind::Trivial => TRIVIAL.get_or_init(|| Arc::new(TrivialBackend::new())).clone(),
            BackendKind::Queued => QUEUED.get_or_init(|| Arc::new(QueuedBackend::new())).clone(),
        };
        Ok(backend)
    }
}

impl Device for Gpu {
    const NAME: &'static str = "gpu";

    fn backend(kind: BackendKind) -> Result<Arc<dyn ExecutionBackend<Self>>> {
        static TRIVIAL: OnceLock<Arc<TrivialBackend<Gpu>>> = OnceLock::new();

        match kind {
            BackendKind::Trivial => {
                let backend: Arc<dyn ExecutionBackend<Self>> =
                    TRIVIAL.get_or_init(|| Arc::new(TrivialBackend::new())).clone();
                Ok(backend)
            }
            other => Err(Error::BackendUnavailable {
                kind: other,
                device: Self::NAME,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_ids_are_unique_and_ordered() {
        let ids: Vec<SlotId> = (0..100).map(|_| SlotId::fresh()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_slot_display() {
        let id = SlotId::fresh();
        assert_eq!(id.to_string(), format!("slot#{}", id.get()));
    }

    #[test]
    fn test_cpu_backends_are_singletons() {
        let a = Cpu::backend(BackendKind::Trivial).unwrap();
        let b = Cpu::backend(BackendKind::Trivial).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let q = Cpu::backend(BackendKind::Queued).unwrap();
        assert_eq!(q.kind(), BackendKind::Queued);
        assert!(Arc::ptr_eq(&q, &Cpu::backend(BackendKind::Queued).unwrap()));
    }

    #[test]
    fn test_gpu_trivial_backend_is_a_singleton() {
        let a = Gpu::backend(BackendKind::Trivial).unwrap();
        let b = Gpu::backend(BackendKind::Trivial).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.kind(), BackendKind::Trivial);
    }

    #[test]
    fn test_gpu_rejects_queued_backend() {
        assert!(Gpu::backend(BackendKind::Trivial).is_ok());
        let err = Gpu::backend(BackendKind::Queued).err().unwrap();
        assert!(matches!(
            err,
            Error::BackendUnavailable {
                kind: BackendKind::Queued,
                device: "gpu"
            }
        ));
    }
}
