//! Deferred value handles.
//!
//! A [`DeferredValue`] is a write-once slot shared between the unit that
//! produces it and every consumer that reads it. Handles are cheap to clone:
//! a clone is another reference to the same cell, never a copy of the value.
//!
//! # Key Types
//!
//! - [`DeferredValue`] - Mutable until published, read-only afterwards
//! - [`ConstHandle`] - Read-only view of a deferred value or a plain constant
//! - [`DynConstHandle`] - Type-erased read-only handle over any [`ValueSource`]
//! - [`EvalBuffer`] - Per-expression cache of an output slot
//!
//! # Lifecycle
//!
//! ```text
//!   Unevaluated ──allocate()/with_mutable_value()──▶ Unevaluated
//!        │
//!     set_eval()
//!        ▼
//!    Evaluated ──value()──▶ &T  (forever)
//! ```
//!
//! # Example
//!
//! ```
//! use deferred_runtime::DeferredValue;
//!
//! let slot = DeferredValue::<f64>::new();
//! assert!(slot.value().is_err());
//!
//! slot.allocate(1.5).unwrap();
//! slot.with_mutable_value(|v| *v *= 2.0).unwrap();
//! slot.set_eval().unwrap();
//!
//! assert_eq!(*slot.value().unwrap(), 3.0);
//! assert!(slot.set_eval().is_err());
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{Error, Result};
use crate::types::SlotId;

struct Cell<T> {
    slot: SlotId,
    /// Value being built by the producer. Emptied on publication.
    staging: Mutex<Option<T>>,
    published: OnceLock<T>,
}

/// Single-assignment value slot with an evaluated flag.
pub struct DeferredValue<T> {
    cell: Arc<Cell<T>>,
}

impl<T> DeferredValue<T> {
    /// Create an empty, unevaluated slot with a fresh identity.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Cell {
                slot: SlotId::fresh(),
                staging: Mutex::new(None),
                published: OnceLock::new(),
            }),
        }
    }

    /// Create a slot that is already published with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            cell: Arc::new(Cell {
                slot: SlotId::fresh(),
                staging: Mutex::new(None),
                published: OnceLock::from(value),
            }),
        }
    }

    /// Identity of the underlying cell. Stable for the cell's lifetime.
    pub fn slot(&self) -> SlotId {
        self.cell.slot
    }

    /// Whether the value has been published.
    pub fn is_evaluated(&self) -> bool {
        self.cell.published.get().is_some()
    }

    /// Write (or overwrite) the staged value.
    pub fn allocate(&self, value: T) -> Result<()> {
        let mut staging = self.staging();
        if self.is_evaluated() {
            return Err(Error::AlreadyEvaluated(self.slot()));
        }
        *staging = Some(value);
        Ok(())
    }

    /// Mutate the staged value in place.
    pub fn with_mutable_value<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut staging = self.staging();
        if self.is_evaluated() {
            return Err(Error::AlreadyEvaluated(self.slot()));
        }
        let value = staging.as_mut().ok_or(Error::Unallocated(self.slot()))?;
        Ok(f(value))
    }

    /// Publish the staged value. One-way: the slot can never be written again.
    pub fn set_eval(&self) -> Result<()> {
        let mut staging = self.staging();
        if self.is_evaluated() {
            return Err(Error::AlreadyEvaluated(self.slot()));
        }
        let value = staging.take().ok_or(Error::Unallocated(self.slot()))?;
        self.cell
            .published
            .set(value)
            .map_err(|_| Error::AlreadyEvaluated(self.slot()))
    }

    /// Read the published value.
    pub fn value(&self) -> Result<&T> {
        self.cell
            .published
            .get()
            .ok_or(Error::NotEvaluated(self.slot()))
    }

    /// Whether both handles reference the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    // Holding the staging lock across the published check keeps allocate
    // and set_eval from interleaving.
    fn staging(&self) -> MutexGuard<'_, Option<T>> {
        self.cell
            .staging
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for DeferredValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DeferredValue<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValue")
            .field("slot", &self.slot())
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}

/// Read-only capability shared by every handle flavor.
pub trait ValueSource<T>: Send + Sync {
    /// Read the value, failing if it is not published yet.
    fn value(&self) -> Result<&T>;

    /// Identity used for dependency tracking.
    fn slot(&self) -> SlotId;
}

impl<T: Send + Sync> ValueSource<T> for DeferredValue<T> {
    fn value(&self) -> Result<&T> {
        DeferredValue::value(self)
    }

    fn slot(&self) -> SlotId {
        DeferredValue::slot(self)
    }
}

/// Immutable view used wherever an operand is referenced.
///
/// A `Plain` handle carries its own copy of a constant and its own identity;
/// since no unit ever produces that identity, the scheduler treats it as an
/// already satisfied input.
pub enum ConstHandle<T> {
    /// A constant snapshot.
    Plain {
        /// Identity issued when the snapshot was taken.
        slot: SlotId,
        /// The copied value.
        value: Arc<T>,
    },
    /// A read-only view of a deferred slot.
    View(DeferredValue<T>),
}

impl<T> ConstHandle<T> {
    /// Snapshot a constant.
    pub fn plain(value: T) -> Self {
        ConstHandle::Plain {
            slot: SlotId::fresh(),
            value: Arc::new(value),
        }
    }

    /// View a deferred slot without write access.
    pub fn view(handle: &DeferredValue<T>) -> Self {
        ConstHandle::View(handle.clone())
    }

    /// Read the value. Fails for a view whose slot is not published.
    pub fn value(&self) -> Result<&T> {
        match self {
            ConstHandle::Plain { value, .. } => Ok(value.as_ref()),
            ConstHandle::View(handle) => handle.value(),
        }
    }

    /// Identity used for dependency tracking.
    pub fn slot(&self) -> SlotId {
        match self {
            ConstHandle::Plain { slot, .. } => *slot,
            ConstHandle::View(handle) => handle.slot(),
        }
    }

    /// Constants are always evaluated.
    pub fn is_evaluated(&self) -> bool {
        match self {
            ConstHandle::Plain { .. } => true,
            ConstHandle::View(handle) => handle.is_evaluated(),
        }
    }
}

impl<T> Clone for ConstHandle<T> {
    fn clone(&self) -> Self {
        match self {
            ConstHandle::Plain { slot, value } => ConstHandle::Plain {
                slot: *slot,
                value: Arc::clone(value),
            },
            ConstHandle::View(handle) => ConstHandle::View(handle.clone()),
        }
    }
}

impl<T> From<DeferredValue<T>> for ConstHandle<T> {
    fn from(handle: DeferredValue<T>) -> Self {
        ConstHandle::View(handle)
    }
}

impl<T> fmt::Debug for ConstHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstHandle::Plain { slot, .. } => f.debug_tuple("Plain").field(slot).finish(),
            ConstHandle::View(handle) => f.debug_tuple("View").field(handle).finish(),
        }
    }
}

impl<T: Send + Sync> ValueSource<T> for ConstHandle<T> {
    fn value(&self) -> Result<&T> {
        ConstHandle::value(self)
    }

    fn slot(&self) -> SlotId {
        ConstHandle::slot(self)
    }
}

/// Type-erased read-only handle.
///
/// Lets operand lists mix handle flavors (and operator-specific sources)
/// behind one element type.
pub struct DynConstHandle<T> {
    source: Arc<dyn ValueSource<T>>,
}

impl<T> DynConstHandle<T> {
    /// Erase the concrete type of `source`.
    pub fn new<S>(source: S) -> Self
    where
        S: ValueSource<T> + 'static,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// Read the value.
    pub fn value(&self) -> Result<&T> {
        self.source.value()
    }

    /// Identity of the erased source.
    pub fn slot(&self) -> SlotId {
        self.source.slot()
    }
}

impl<T> Clone for DynConstHandle<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> fmt::Debug for DynConstHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynConstHandle").field(&self.slot()).finish()
    }
}

impl<T: Send + Sync + 'static> From<ConstHandle<T>> for DynConstHandle<T> {
    fn from(handle: ConstHandle<T>) -> Self {
        Self::new(handle)
    }
}

/// Output slot cache owned by an expression node.
///
/// Clones share the slot, so an expression registered from two call sites
/// presents the same output identity both times and is scheduled once.
pub struct EvalBuffer<T> {
    handle: DeferredValue<T>,
}

impl<T> EvalBuffer<T> {
    /// Create a buffer with an empty slot.
    pub fn new() -> Self {
        Self {
            handle: DeferredValue::new(),
        }
    }

    /// Writable handle, for the producing unit.
    pub fn handle(&self) -> DeferredValue<T> {
        self.handle.clone()
    }

    /// Read-only handle, for consumers.
    pub fn const_handle(&self) -> ConstHandle<T> {
        ConstHandle::view(&self.handle)
    }

    pub fn is_evaluated(&self) -> bool {
        self.handle.is_evaluated()
    }
}

impl<T> Default for EvalBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EvalBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> fmt::Debug for EvalBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EvalBuffer").field(&self.handle).finish()
    }
}
