//! Dense row-major matrix leaf.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handle::ConstHandle;
use crate::layer::Registrar;
use crate::scheduler::Evaluable;
use crate::types::Device;

/// Immutable dense matrix tagged with the device it lives on.
///
/// Storage is shared, so clones are cheap.
pub struct Matrix<D> {
    rows: usize,
    cols: usize,
    data: Arc<[f64]>,
    _device: PhantomData<fn() -> D>,
}

impl<D: Device> Matrix<D> {
    /// Wrap row-major `data`. Fails unless `data.len() == rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::Shape {
                op: "matrix",
                expected: (rows, cols),
                found: (data.len(), 1),
            });
        }
        Ok(Self::from_parts(rows, cols, data.into()))
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_parts(rows, cols, vec![0.0; rows * cols].into())
    }

    /// Build element `(r, c)` from `f(r, c)`.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let data: Vec<f64> = (0..rows * cols).map(|i| f(i / cols, i % cols)).collect();
        Self::from_parts(rows, cols, data.into())
    }

    fn from_parts(rows: usize, cols: usize, data: Arc<[f64]>) -> Self {
        Self {
            rows,
            cols,
            data,
            _device: PhantomData,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        let data: Vec<f64> = self.data.iter().map(|&v| f(v)).collect();
        Self::from_parts(self.rows, self.cols, data.into())
    }

    /// Combine with `other` element by element. Shapes must match.
    pub fn zip_with(&self, other: &Self, op: &'static str, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.shape() != other.shape() {
            return Err(Error::Shape {
                op,
                expected: self.shape(),
                found: other.shape(),
            });
        }
        let data: Vec<f64> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self::from_parts(self.rows, self.cols, data.into()))
    }
}

impl<D> Clone for Matrix<D> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: Arc::clone(&self.data),
            _device: PhantomData,
        }
    }
}

impl<D> PartialEq for Matrix<D> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.data == other.data
    }
}

impl<D: Device> fmt::Debug for Matrix<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("device", &D::NAME)
            .field("shape", &self.shape())
            .field("data", &self.data)
            .finish()
    }
}

/// A leaf is already evaluated: it registers nothing and hands out a snapshot.
impl<D: Device> Evaluable<D> for Matrix<D> {
    type Output = Matrix<D>;

    fn eval_register(&self, _registrar: &Registrar<D>) -> Result<ConstHandle<Matrix<D>>> {
        Ok(ConstHandle::plain(self.clone()))
    }
}
