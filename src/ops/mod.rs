//! Dispatch layer: shape-checked public operations
//!
//! One type-generic entry point per operation. Every op validates its
//! operands (destination sized, sources sized, shapes compatible, mode
//! recognized) before touching any memory, selects the most capable kernel
//! set the element type supports at or below the requested instruction set,
//! and composes it over the full shape with the blocked composer.
//!
//! Each operation has a `*_with(inst, ...)` sibling that forces a specific
//! [`InstSet`](crate::InstSet) — the test seam for dispatch-equivalence
//! checks and benchmarks. The plain form is exactly
//! `*_with(InstSet::detect(), ...)`. Forcing a set this host cannot execute
//! fails with `UnsupportedInstantiation` instead of faulting.

mod activate;
mod convert;
mod multiply;
mod onehot;
mod reduce;
mod window;

pub use activate::{exp, exp_with, sigmoid, sigmoid_with, ActivateElement};
pub use convert::{
    convert, convert_scaled, convert_scaled_with, convert_with, copy_sample_scaled,
    copy_sample_scaled_with, ExactConvert, ScaledConvert,
};
pub use multiply::{
    multiply_mm, multiply_mm_bias, multiply_mm_bias_with, multiply_mm_with, multiply_mv,
    multiply_mv_with, multiply_tm, multiply_tm_with, multiply_vm, multiply_vm_with, MulElement,
};
pub use onehot::{onehot_subtract, onehot_subtract_with};
pub use reduce::{col_sum, col_sum_with, reduce, reduce_with, ColSumElement, Reduce, ReduceElement};
pub use window::{window_indices, Window};

use crate::error::{CentellaError, Result};
use crate::kernels;
use crate::matrix::Matrix;
use crate::tensor::Tensor;
use crate::vector::Vector;
use crate::InstSet;

/// Contiguous dense buffer the element-wise operations run over
///
/// Implemented by all three containers; element-wise ops (conversion,
/// activation, full reduction) are shape-agnostic and only need the flat
/// storage.
pub trait Dense<T> {
    /// Flat storage
    fn as_slice(&self) -> &[T];
    /// Flat mutable storage
    fn as_mut_slice(&mut self) -> &mut [T];
    /// Element count
    fn len(&self) -> usize;
    /// True when the container has no storage
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy> Dense<T> for Vector<T> {
    fn as_slice(&self) -> &[T] {
        Vector::as_slice(self)
    }
    fn as_mut_slice(&mut self) -> &mut [T] {
        Vector::as_mut_slice(self)
    }
    fn len(&self) -> usize {
        Vector::len(self)
    }
}

impl<T: Copy> Dense<T> for Matrix<T> {
    fn as_slice(&self) -> &[T] {
        Matrix::as_slice(self)
    }
    fn as_mut_slice(&mut self) -> &mut [T] {
        Matrix::as_mut_slice(self)
    }
    fn len(&self) -> usize {
        Matrix::len(self)
    }
}

impl<T: Copy> Dense<T> for Tensor<T> {
    fn as_slice(&self) -> &[T] {
        Tensor::as_slice(self)
    }
    fn as_mut_slice(&mut self) -> &mut [T] {
        Tensor::as_mut_slice(self)
    }
    fn len(&self) -> usize {
        Tensor::len(self)
    }
}

/// Multiply-family kernel table for one element type and instruction set
///
/// `dot` and `axpy` require slice lengths that are multiples of `width`;
/// the blocked composer guarantees that. Public only because the sealed
/// element traits return it.
#[doc(hidden)]
pub struct MulKernels<T: Copy> {
    pub width: usize,
    pub dot: unsafe fn(&[T], &[T]) -> T,
    pub axpy: unsafe fn(T, &[T], &mut [T]),
}

/// Reduction kernel table for one element type and instruction set
#[doc(hidden)]
pub struct ReduceKernels<T: Copy> {
    pub width: usize,
    pub sum: unsafe fn(&[T]) -> T,
    pub min: unsafe fn(&[T]) -> T,
    pub max: unsafe fn(&[T]) -> T,
}

/// Reject instruction sets this host cannot execute
pub(crate) fn check_inst(inst: InstSet) -> Result<()> {
    if kernels::is_executable(inst) {
        Ok(())
    } else {
        Err(CentellaError::UnsupportedInstantiation { inst })
    }
}

/// Destination must have storage
pub(crate) fn check_dest<T, C: Dense<T>>(dest: &C) -> Result<()> {
    if dest.is_empty() {
        Err(CentellaError::UninitializedDestination)
    } else {
        Ok(())
    }
}

/// Source must have storage
pub(crate) fn check_src<T, C: Dense<T>>(src: &C) -> Result<()> {
    if src.is_empty() {
        Err(CentellaError::UninitializedSource)
    } else {
        Ok(())
    }
}

/// Extents must agree
pub(crate) fn check_shape(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CentellaError::ShapeMismatch { expected, actual })
    }
}
