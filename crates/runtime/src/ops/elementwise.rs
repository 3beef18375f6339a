//! Elementwise expression nodes and their evaluation units.

use tracing::trace;

use crate::error::Result;
use crate::handle::{ConstHandle, DeferredValue, EvalBuffer};
use crate::layer::Registrar;
use crate::scheduler::Evaluable;
use crate::types::Device;
use crate::unit::EvalUnit;

use super::matrix::Matrix;

/// `|x|` applied to every element of the operand.
pub struct Abs<D: Device, E> {
    operand: E,
    buffer: EvalBuffer<Matrix<D>>,
}

impl<D: Device, E> Abs<D, E>
where
    E: Evaluable<D, Output = Matrix<D>>,
{
    pub fn new(operand: E) -> Self {
        Self {
            operand,
            buffer: EvalBuffer::new(),
        }
    }

    /// Read-only handle on this node's output.
    pub fn output(&self) -> ConstHandle<Matrix<D>> {
        self.buffer.const_handle()
    }
}

impl<D: Device, E: Clone> Clone for Abs<D, E> {
    fn clone(&self) -> Self {
        Self {
            operand: self.operand.clone(),
            buffer: self.buffer.clone(),
        }
    }
}

impl<D: Device, E> Evaluable<D> for Abs<D, E>
where
    E: Evaluable<D, Output = Matrix<D>>,
{
    type Output = Matrix<D>;

    fn eval_register(&self, registrar: &Registrar<D>) -> Result<ConstHandle<Matrix<D>>> {
        if self.buffer.is_evaluated() {
            return Ok(self.buffer.const_handle());
        }

        let input = self.operand.eval_register(registrar)?;
        let out = self.buffer.handle();
        let operands = [input.slot()];
        registrar.register_unit(
            AbsUnit {
                input,
                out: out.clone(),
            },
            Some(out.slot()),
            &operands,
        )?;
        Ok(self.buffer.const_handle())
    }
}

/// Unit computing one [`Abs`] node.
pub struct AbsUnit<D: Device> {
    input: ConstHandle<Matrix<D>>,
    out: DeferredValue<Matrix<D>>,
}

impl<D: Device> EvalUnit<D> for AbsUnit<D> {
    fn run(self: Box<Self>, _registrar: &Registrar<D>) -> Result<()> {
        let result = self.input.value()?.map(f64::abs);
        trace!(output = %self.out.slot(), "abs");
        self.out.allocate(result)?;
        self.out.set_eval()
    }
}

/// Elementwise sum of two operands of equal shape.
pub struct Add<D: Device, L, R> {
    lhs: L,
    rhs: R,
    buffer: EvalBuffer<Matrix<D>>,
}

impl<D: Device, L, R> Add<D, L, R>
where
    L: Evaluable<D, Output = Matrix<D>>,
    R: Evaluable<D, Output = Matrix<D>>,
{
    pub fn new(lhs: L, rhs: R) -> Self {
        Self {
            lhs,
            rhs,
            buffer: EvalBuffer::new(),
        }
    }

    /// Read-only handle on this node's output.
    pub fn output(&self) -> ConstHandle<Matrix<D>> {
        self.buffer.const_handle()
    }
}

impl<D: Device, L: Clone, R: Clone> Clone for Add<D, L, R> {
    fn clone(&self) -> Self {
        Self {
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
            buffer: self.buffer.clone(),
        }
    }
}

impl<D: Device, L, R> Evaluable<D> for Add<D, L, R>
where
    L: Evaluable<D, Output = Matrix<D>>,
    R: Evaluable<D, Output = Matrix<D>>,
{
    type Output = Matrix<D>;

    fn eval_register(&self, registrar: &Registrar<D>) -> Result<ConstHandle<Matrix<D>>> {
        if self.buffer.is_evaluated() {
            return Ok(self.buffer.const_handle());
        }

        let lhs = self.lhs.eval_register(registrar)?;
        let rhs = self.rhs.eval_register(registrar)?;
        let out = self.buffer.handle();
        let operands = [lhs.slot(), rhs.slot()];
        registrar.register_unit(
            AddUnit {
                lhs,
                rhs,
                out: out.clone(),
            },
            Some(out.slot()),
            &operands,
        )?;
        Ok(self.buffer.const_handle())
    }
}

/// Unit computing one [`Add`] node.
pub struct AddUnit<D: Device> {
    lhs: ConstHandle<Matrix<D>>,
    rhs: ConstHandle<Matrix<D>>,
    out: DeferredValue<Matrix<D>>,
}

impl<D: Device> EvalUnit<D> for AddUnit<D> {
    fn run(self: Box<Self>, _registrar: &Registrar<D>) -> Result<()> {
        let lhs = self.lhs.value()?;
        let rhs = self.rhs.value()?;
        let result = lhs.zip_with(rhs, "add", |a, b| a + b)?;
        trace!(output = %self.out.slot(), "add");
        self.out.allocate(result)?;
        self.out.set_eval()
    }
}
